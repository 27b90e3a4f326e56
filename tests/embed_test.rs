//! Integration tests for base embedding.
//!
//! Each case writes its bases next to the template as `base0.yaml`,
//! `base1.yaml`, ... (or `baseN.sh` for bases starting with `#!`). The
//! template gets `base: base0.yaml` prepended unless base0 is a script.
//! Templates starting with `#` are compared textually so comment handling
//! is checked; all others are compared as YAML values.

use std::fs;

use limatmpl::config::Settings;
use limatmpl::fetch::FetchContext;
use limatmpl::template::Template;
use limatmpl::{EmbedOptions, TemplateError};
use serde_yaml::Value;
use tempfile::TempDir;

struct Case {
    description: &'static str,
    template: &'static str,
    base: &'static str,
    expected: &'static str,
}

const CASES: &[Case] = &[
    Case {
        description: "empty template",
        template: "",
        base: "vmType: qemu",
        expected: "vmType: qemu",
    },
    Case {
        description: "base doesn't override existing values",
        template: "vmType: vz",
        base: "{arch: aarch64, vmType: qemu}",
        expected: "{arch: aarch64, vmType: vz}",
    },
    Case {
        description: "comments are copied over as well",
        template: "#
# VM Type is QEMU
vmType: qemu # QEMU
",
        base: "
# Arch is x86_64
arch: x86_64 # X86
",
        expected: "
# VM Type is QEMU
vmType: qemu # QEMU
# Arch is x86_64
arch: x86_64 # X86
",
    },
    Case {
        description: "mountTypesUnsupported are concatenated and duplicates removed",
        template: "mountTypesUnsupported: [9p,reverse-sshfs]",
        base: "mountTypesUnsupported: [9p,virtiofs]",
        expected: "mountTypesUnsupported: [9p,reverse-sshfs,virtiofs]",
    },
    Case {
        description: "minimumLimaVersion (including comments) is updated when the base version is higher",
        template: "#
# Works with Lima 0.8.0 and later
minimumLimaVersion: 0.8.0 # needs 0.8.0
",
        base: "
# Requires at least 1.0.2
minimumLimaVersion: 1.0.2    # or later
",
        expected: "
# Requires at least 1.0.2
minimumLimaVersion: 1.0.2 # or later
",
    },
    Case {
        description: "minimumLimaVersion is kept when the template version is higher",
        template: "minimumLimaVersion: 1.0.2",
        base: "minimumLimaVersion: 0.8.0",
        expected: "minimumLimaVersion: 1.0.2",
    },
    Case {
        description: "vmOpts.qemu.minimumVersion is updated when the base version is higher",
        template: "vmOpts: {qemu: {minimumVersion: 8.2.1}}",
        base: "vmOpts: {qemu: {minimumVersion: 9.1.0}}",
        expected: "vmOpts: {qemu: {minimumVersion: 9.1.0}}",
    },
    Case {
        description: "dns list is not appended, but the highest priority one is picked",
        template: "dns: [1.1.1.1]",
        base: "dns: [8.8.8.8, 1.2.3.4]",
        expected: "dns: [1.1.1.1]",
    },
    Case {
        description: "update comments on existing maps and lists that don't have comments yet",
        template: "#
additionalDisks:
- name: disk1 # One
",
        base: "
# Mount additional disks
additionalDisks: # comment
# This is disk2
- name: disk2 # Two
",
        expected: "
# Mount additional disks
additionalDisks: # comment
- name: disk1 # One
# This is disk2
- name: disk2 # Two
",
    },
    Case {
        description: "probes and provision scripts are prepended instead of appended",
        template: "probes: [{script: 1}]\nprovision: [{script: One}]",
        base: "probes: [{script: 2}]\nprovision: [{script: Two}]",
        expected: "probes: [{script: 2},{script: 1}]\nprovision: [{script: Two},{script: One}]",
    },
    Case {
        description: "additionalDisks append, but merge fields on shared name",
        template: "additionalDisks: [{name: disk1}]",
        base: "additionalDisks: [{name: disk2},{name: disk1, format: true}]",
        expected: "additionalDisks: [{name: disk1, format: true},{name: disk2}]",
    },
    Case {
        description: "mounts append, but merge fields on shared mountPoint",
        template: "mounts: [{location: loc1}, {location: loc1, mountPoint: loc2}]",
        base: "mounts: [{location: loc1, mountPoint: loc2, writable: true, sshfs: {followSymlinks: true}}, {location: loc1, mountPoint: loc3, writable: true}]",
        expected: "mounts: [{location: loc1}, {location: loc1, mountPoint: loc2, writable: true, sshfs: {followSymlinks: true}}, {location: loc1, mountPoint: loc3, writable: true}]",
    },
    Case {
        description: "template:// URLs are not embedded without embed_all",
        template: "",
        base: "
base: template://default
provision:
- file:
    url: template://provision.sh
probes:
- file: template://probe.sh
",
        expected: "
base: template://default
provision:
- file:
    url: template://provision.sh
probes:
- file: template://probe.sh
",
    },
    Case {
        description: "ERROR each template must only be embedded once",
        template: "#
arch: aarch64
",
        base: "
base: base0.yaml
vmType: qemu
",
        expected: "loop detected",
    },
    Case {
        description: "ERROR a base after a kept template:// base",
        template: "",
        base: "base: [template://default, base1.yaml]",
        expected: "after not embedding",
    },
    Case {
        description: "ERROR a nested base after a kept template:// base",
        template: "",
        base: "
base: [base1.yaml, base2.yaml]
---
base: template://default
---
base: baseX.yaml",
        expected: "after not embedding",
    },
    Case {
        description: "bases are embedded depth-first",
        template: "#",
        base: "
base: [base1.yaml, {url: base2.yaml}]
additionalDisks: [disk0]
---
base: base3.yaml
additionalDisks: [disk1]
---
additionalDisks: [disk2]
---
additionalDisks: [disk3]
",
        expected: "additionalDisks: [disk0, disk1, disk3, disk2]",
    },
    Case {
        description: "additionalDisks with name '*' are merged with all previous entries",
        template: "
additionalDisks:
- name: disk1
- name: disk2
- name: disk3
  format: false
",
        base: "
additionalDisks:
- name: disk4
- name: \"*\"
  format: true # will apply to disk1, disk2, and disk4
- name: disk5
",
        expected: "
additionalDisks:
- name: disk1
  format: true
- name: disk2
  format: true
- name: disk3
  format: false
- name: disk4
  format: true
- name: disk5
",
    },
    Case {
        description: "additionalDisks will be upgraded from string to map",
        template: "additionalDisks: [mine]",
        base: "additionalDisks: [{name: \"*\", format: true}]",
        expected: "additionalDisks: [{name: mine, format: true}]",
    },
    Case {
        description: "networks without interface name are not merged",
        template: "
networks:
- interface: lima1
",
        base: "
networks:
- interface: lima2
# The metric will not be merged with anything
- metric: 250
- interface: lima1
  metric: 100     # will be set on the first entry
- interface: '*'  # wildcard
  metric: 123     # will be set on the first entry
",
        expected: "
networks:
- interface: lima1
  metric: 100
- interface: lima2
  metric: 123
- metric: 250
",
    },
    Case {
        description: "scripts are embedded with comments moved",
        template: "#
# Hi There!
provision:
# This script will be merged from an external file
- file: base1.sh # This comment will move to the \"script\" key
",
        base: "
# base0.yaml is ignored
---
#!/usr/bin/env bash
echo \"This is base1.sh\"
",
        expected: "
# Hi There!
provision:
# This script will be merged from an external file
- script: |- # This comment will move to the \"script\" key
    #!/usr/bin/env bash
    echo \"This is base1.sh\"
# base0.yaml is ignored
",
    },
    Case {
        description: "script files are embedded even when no base property exists",
        template: "provision: [{file: base0.sh}]",
        base: "#! my script",
        expected: "provision: [{script: \"#! my script\"}]",
    },
    Case {
        description: "data provisioning is embedded as content",
        template: "provision: [{mode: data, path: /etc/motd, file: base0.sh}]",
        base: "#! welcome",
        expected: "provision: [{mode: data, path: /etc/motd, content: \"#! welcome\"}]",
    },
];

fn context() -> FetchContext {
    FetchContext::new(&Settings::default()).unwrap()
}

/// Writes the case's files and returns the embedded template, or the error.
fn embed_case(temp: &TempDir, case: &Case) -> Result<String, TemplateError> {
    let template = case.template.strip_prefix('#').unwrap_or(case.template).trim();
    let bases = case.base.trim();

    for (i, base) in bases.split("---\n").enumerate() {
        let extension = if base.starts_with("#!") { "sh" } else { "yaml" };
        fs::write(temp.path().join(format!("base{i}.{extension}")), base).unwrap();
    }
    let mut text = if bases.starts_with("#!") {
        String::new()
    } else {
        "base: base0.yaml\n".to_string()
    };
    text.push_str(template);
    text.push('\n');

    let path = temp.path().join("tmpl.yaml");
    fs::write(&path, &text).unwrap();
    let ctx = context();
    let mut tmpl = Template::read(&ctx, "", path.to_str().unwrap())?;
    tmpl.embed(&ctx, &EmbedOptions::default())?;
    Ok(String::from_utf8(tmpl.into_bytes()).unwrap())
}

#[test]
fn embed_cases() {
    for case in CASES {
        let temp = TempDir::new().unwrap();
        let result = embed_case(&temp, case);
        let expected = case.expected.trim();

        if case.description.starts_with("ERROR") {
            let err = result.expect_err(case.description);
            assert!(
                err.to_string().contains(expected),
                "{}: {err}",
                case.description
            );
            continue;
        }

        let actual = result.unwrap_or_else(|e| panic!("{}: {e}", case.description));
        if case.template.starts_with('#') {
            assert_eq!(actual.trim(), expected, "{}", case.description);
        } else {
            let actual: Value = serde_yaml::from_str(&actual).unwrap();
            let expected: Value = serde_yaml::from_str(expected).unwrap();
            assert_eq!(actual, expected, "{}", case.description);
        }
    }
}

#[test]
fn embedding_is_idempotent() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("b.yaml"), "# memory\nmemory: 4GiB\nmounts:\n- location: /b\n").unwrap();
    let path = temp.path().join("a.yaml");
    fs::write(&path, "base: b.yaml\n# cpus\ncpus: 2 # two\nmounts:\n- location: /a\n").unwrap();

    let ctx = context();
    let mut tmpl = Template::read(&ctx, "", path.to_str().unwrap()).unwrap();
    tmpl.embed(&ctx, &EmbedOptions::default()).unwrap();
    let once = tmpl.bytes().to_vec();
    tmpl.embed(&ctx, &EmbedOptions::default()).unwrap();
    assert_eq!(tmpl.bytes(), &once[..]);

    insta::assert_snapshot!(String::from_utf8(once).unwrap(), @r###"
    # cpus
    cpus: 2 # two
    mounts:
    - location: /a
    - location: /b
    # memory
    memory: 4GiB
    "###);
}

#[test]
fn indirect_cycle_is_detected() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.yaml"), "base: b.yaml\n").unwrap();
    fs::write(temp.path().join("b.yaml"), "base: a.yaml\n").unwrap();

    let ctx = context();
    let path = temp.path().join("a.yaml");
    let mut tmpl = Template::read(&ctx, "", path.to_str().unwrap()).unwrap();
    let err = tmpl.embed(&ctx, &EmbedOptions::default()).unwrap_err();
    assert!(matches!(err, TemplateError::CyclicBase { .. }), "{err}");
    assert!(tmpl.bytes().is_empty());
}

#[test]
fn size_ceiling_is_enforced() {
    let temp = TempDir::new().unwrap();
    let filler: String = (0..20).map(|i| format!("key{i}: {}\n", "x".repeat(20))).collect();
    fs::write(temp.path().join("b.yaml"), &filler).unwrap();
    let path = temp.path().join("a.yaml");
    fs::write(&path, format!("base: b.yaml\n{}", filler.replace("key", "other"))).unwrap();

    let ctx = context().with_max_size(filler.len() + 100);
    let mut tmpl = Template::read(&ctx, "", path.to_str().unwrap()).unwrap();
    let err = tmpl.embed(&ctx, &EmbedOptions::default()).unwrap_err();
    assert!(matches!(err, TemplateError::TooLarge { .. }), "{err}");
}

#[test]
fn embed_all_resolves_builtin_templates() {
    let ctx = context();
    let mut tmpl = Template::read(&ctx, "", "template://docker").unwrap();
    let options = EmbedOptions {
        embed_all: true,
        default_base: None,
    };
    tmpl.embed(&ctx, &options).unwrap();

    let config = tmpl.config().unwrap();
    assert!(config.base.is_empty());
    assert_eq!(config.images.len(), 3);
    assert_eq!(config.mounts.len(), 2);
    assert_eq!(config.provision.len(), 2);
}

#[test]
fn builtin_bases_are_kept_without_embed_all() {
    let ctx = context();
    let mut tmpl = Template::read(&ctx, "", "template://default").unwrap();
    tmpl.embed(&ctx, &EmbedOptions::default()).unwrap();
    let config = tmpl.config().unwrap();
    assert_eq!(config.base.len(), 2);
    assert!(config.images.is_empty());
}

#[test]
fn stdin_template_with_relative_base_fails() {
    let ctx = context().with_stdin("base: b.yaml\n");
    let mut tmpl = Template::read(&ctx, "", "-").unwrap();
    let err = tmpl.embed(&ctx, &EmbedOptions::default()).unwrap_err();
    assert!(matches!(err, TemplateError::AnchorlessRelative { .. }), "{err}");
}

#[test]
fn base_digest_is_checked() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("b.yaml"), "cpus: 2\n").unwrap();
    let path = temp.path().join("a.yaml");
    fs::write(&path, format!("base:\n- url: b.yaml\n  digest: sha256:{}\n", "0".repeat(64))).unwrap();

    let ctx = context();
    let mut tmpl = Template::read(&ctx, "", path.to_str().unwrap()).unwrap();
    let err = tmpl.embed(&ctx, &EmbedOptions::default()).unwrap_err();
    assert!(matches!(err, TemplateError::DigestMismatch { .. }), "{err}");
}

#[test]
fn binary_scripts_are_base64_encoded() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("blob.bin"), b"\x00\x01\x02").unwrap();
    let path = temp.path().join("a.yaml");
    fs::write(&path, "provision:\n- mode: data\n  path: /blob\n  file: blob.bin\n").unwrap();

    let ctx = context();
    let mut tmpl = Template::read(&ctx, "", path.to_str().unwrap()).unwrap();
    tmpl.embed(&ctx, &EmbedOptions::default()).unwrap();
    assert_eq!(
        tmpl.bytes(),
        b"provision:\n- mode: data\n  path: /blob\n  content: !!binary AAEC\n"
    );
}
