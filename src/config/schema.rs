//! Typed view of a Lima template.
//!
//! Only the fields the resolution pipeline reads (plus a few that `validate`
//! checks) are modelled. Unknown fields are ignored; the document tree in
//! [`crate::yaml`] stays the source of truth for everything written back.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;

use crate::error::{Result, TemplateError};
use crate::yaml::Document;

/// Root of a Lima template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimaConfig {
    /// Base templates, in merge order.
    #[serde(deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub base: Vec<LocatorWithDigest>,

    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub minimum_lima_version: Option<String>,

    #[serde(deserialize_with = "null_default")]
    pub vm_opts: VmOpts,

    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    #[serde(deserialize_with = "null_default", skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,

    #[serde(deserialize_with = "null_default", skip_serializing_if = "Vec::is_empty")]
    pub additional_disks: Vec<Disk>,

    #[serde(deserialize_with = "null_default", skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,

    #[serde(deserialize_with = "lenient_strings", skip_serializing_if = "Vec::is_empty")]
    pub mount_types_unsupported: Vec<String>,

    #[serde(deserialize_with = "null_default", skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<Network>,

    #[serde(deserialize_with = "lenient_strings", skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,

    #[serde(deserialize_with = "null_default", skip_serializing_if = "Vec::is_empty")]
    pub provision: Vec<Provision>,

    #[serde(deserialize_with = "null_default", skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<Probe>,
}

impl LimaConfig {
    /// Reads the typed view of a parsed document.
    pub fn from_document(locator: &str, doc: &Document) -> Result<Self> {
        serde_yaml::from_value(doc.to_value()).map_err(|e| TemplateError::parse(locator, e))
    }

    /// `vmOpts.qemu.minimumVersion`
    pub fn minimum_qemu_version(&self) -> Option<&str> {
        self.vm_opts.qemu.minimum_version.as_deref()
    }
}

/// A reference to another template or script, optionally pinned by digest.
///
/// Written either as a plain string or as `{url: ..., digest: ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LocatorRepr")]
pub struct LocatorWithDigest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocatorRepr {
    Url(String),
    Full {
        #[serde(default, deserialize_with = "lenient_string")]
        url: String,
        #[serde(default, deserialize_with = "scalar_string")]
        digest: Option<String>,
    },
}

impl From<LocatorRepr> for LocatorWithDigest {
    fn from(repr: LocatorRepr) -> Self {
        match repr {
            LocatorRepr::Url(url) => Self { url, digest: None },
            LocatorRepr::Full { url, digest } => Self { url, digest },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmOpts {
    #[serde(deserialize_with = "null_default")]
    pub qemu: QemuOpts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QemuOpts {
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub minimum_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    #[serde(deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// An additional disk, written either as a bare name or as a mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DiskRepr", rename_all = "camelCase")]
pub struct Disk {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fs_args: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DiskRepr {
    Full(DiskFields),
    Name(Value),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiskFields {
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default)]
    format: Option<bool>,
    #[serde(default, deserialize_with = "scalar_string")]
    fs_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    fs_args: Vec<String>,
}

impl TryFrom<DiskRepr> for Disk {
    type Error = String;

    fn try_from(repr: DiskRepr) -> std::result::Result<Self, Self::Error> {
        Ok(match repr {
            DiskRepr::Name(name) => Self {
                name: scalar_text(name)?.unwrap_or_default(),
                ..Self::default()
            },
            DiskRepr::Full(d) => Self {
                name: d.name,
                format: d.format,
                fs_type: d.fs_type,
                fs_args: d.fs_args,
            },
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Mount {
    #[serde(deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writable: Option<bool>,
    #[serde(deserialize_with = "null_default")]
    pub sshfs: Sshfs,
    #[serde(rename = "9p", deserialize_with = "null_default")]
    pub nine_p: NineP,
    #[serde(deserialize_with = "null_default")]
    pub virtiofs: Virtiofs,
}

impl Mount {
    /// The guest mount point; defaults to the host location.
    pub fn target(&self) -> &str {
        self.mount_point.as_deref().unwrap_or(&self.location)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sshfs {
    pub cache: Option<bool>,
    pub follow_symlinks: Option<bool>,
    #[serde(deserialize_with = "scalar_string")]
    pub sftp_driver: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NineP {
    #[serde(deserialize_with = "scalar_string")]
    pub security_model: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub protocol_version: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub msize: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub cache: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Virtiofs {
    pub queue_size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Network {
    #[serde(deserialize_with = "scalar_string")]
    pub lima: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub socket: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub interface: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub mac_address: Option<String>,
    #[serde(rename = "vzNAT")]
    pub vz_nat: Option<bool>,
    pub metric: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provision {
    #[serde(deserialize_with = "scalar_string")]
    pub mode: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub script: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub content: Option<String>,
    pub file: Option<LocatorWithDigest>,
}

impl Provision {
    /// Data provisioning writes `content` instead of running a `script`.
    pub fn is_data(&self) -> bool {
        self.mode.as_deref() == Some("data")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Probe {
    #[serde(deserialize_with = "scalar_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub script: Option<String>,
    pub file: Option<LocatorWithDigest>,
    #[serde(deserialize_with = "scalar_string")]
    pub hint: Option<String>,
}

fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<LocatorWithDigest>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(LocatorWithDigest),
        Many(Vec<LocatorWithDigest>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(locator)) => vec![locator],
        Some(OneOrMany::Many(locators)) => locators,
    })
}

/// Reads a scalar the way a string field would: numbers and booleans keep
/// their text, null is `None`.
fn scalar_text(value: Value) -> std::result::Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Tagged(tagged) => scalar_text(tagged.value),
        other => Err(format!("expected a scalar, got {other:?}")),
    }
}

/// Accepts any scalar as a string; versions like `2.0` are read as floats otherwise.
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => scalar_text(value).map_err(D::Error::custom),
    }
}

/// Like [`scalar_string`], with null read as the empty string.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_string(deserializer)?.unwrap_or_default())
}

fn lenient_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<Value>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(|value| Ok(scalar_text(value).map_err(D::Error::custom)?.unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(text: &str) -> LimaConfig {
        let doc = Document::parse("test.yaml", text.as_bytes()).unwrap();
        LimaConfig::from_document("test.yaml", &doc).unwrap()
    }

    #[test]
    fn base_accepts_string_map_and_list() {
        assert_eq!(config("base: a.yaml").base[0].url, "a.yaml");

        let base = config("base: {url: a.yaml, digest: 'sha256:abc1234'}").base;
        assert_eq!(base[0].digest.as_deref(), Some("sha256:abc1234"));

        let base = config("base:\n- a.yaml\n- url: b.yaml\n").base;
        assert_eq!(base.len(), 2);
        assert_eq!(base[1].url, "b.yaml");

        assert!(config("base:").base.is_empty());
    }

    #[test]
    fn disks_accept_names_and_mappings() {
        let disks = config("additionalDisks:\n- data\n- name: logs\n  format: false\n").additional_disks;
        assert_eq!(disks[0].name, "data");
        assert_eq!(disks[1].format, Some(false));
    }

    #[test]
    fn mount_target_defaults_to_location() {
        let mounts = config("mounts:\n- location: /tmp\n- location: ~\n  mountPoint: /home\n").mounts;
        assert_eq!(mounts[0].target(), "/tmp");
        assert_eq!(mounts[1].target(), "/home");
    }

    #[test]
    fn versions_read_as_strings() {
        let cfg = config("minimumLimaVersion: 2.0\nvmOpts:\n  qemu:\n    minimumVersion: 8.2.1\n");
        assert_eq!(cfg.minimum_lima_version.as_deref(), Some("2.0"));
        assert_eq!(cfg.minimum_qemu_version(), Some("8.2.1"));
    }

    #[test]
    fn provision_data_mode() {
        let cfg = config("provision:\n- mode: data\n  file: a.txt\n- file: b.sh\n");
        assert!(cfg.provision[0].is_data());
        assert!(!cfg.provision[1].is_data());
        assert_eq!(cfg.provision[1].file.as_ref().unwrap().url, "b.sh");
    }

    #[test]
    fn scalars_are_read_as_strings() {
        let cfg = config(
            "probes: [{script: 1}]\nprovision: [{script: true}]\nmounts: [{location: ~, mountPoint: /x}]\nadditionalDisks: [123, {name: 7, fsArgs: [1, ~]}]\ndns: [1.5]\nimages: [{location: ~}]\n",
        );
        assert_eq!(cfg.probes[0].script.as_deref(), Some("1"));
        assert_eq!(cfg.provision[0].script.as_deref(), Some("true"));
        assert_eq!(cfg.mounts[0].location, "");
        assert_eq!(cfg.mounts[0].target(), "/x");
        assert_eq!(cfg.additional_disks[0].name, "123");
        assert_eq!(cfg.additional_disks[1].name, "7");
        assert_eq!(cfg.additional_disks[1].fs_args, ["1", ""]);
        assert_eq!(cfg.dns, ["1.5"]);
        assert_eq!(cfg.images[0].location, "");
    }

    #[test]
    fn nested_disk_names_are_rejected() {
        let doc = Document::parse("bad.yaml", b"additionalDisks: [{name: [a]}]\n").unwrap();
        assert!(LimaConfig::from_document("bad.yaml", &doc).is_err());
    }

    #[test]
    fn wrong_types_are_parse_errors() {
        let doc = Document::parse("bad.yaml", b"mounts: 5\n").unwrap();
        let err = LimaConfig::from_document("bad.yaml", &doc).unwrap_err();
        assert!(matches!(err, TemplateError::Parse { .. }));
    }
}
