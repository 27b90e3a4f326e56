//! Locator classification.
//!
//! A locator is any string naming template content: a path, a URL, a
//! `template://` store name, a `github:` shorthand, a disk image, or `-`
//! for stdin. An optional `@[ALGORITHM:]HEX` suffix pins the content digest.

pub mod digest;
pub mod github;
pub mod image;
pub mod name;

use std::path::PathBuf;

use tracing::debug;

pub use digest::{split_digest, Algorithm, Digest};
pub use github::{GithubEndpoints, GithubRef};
pub use name::{seems_yaml_path, validate_name};

use crate::error::{Result, TemplateError};

pub const TEMPLATE_SCHEME: &str = "template://";

/// What a locator points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorKind {
    /// `template://NAME`
    Store(String),
    /// `http://` or `https://`
    Http,
    /// `file://PATH`
    FileUrl(PathBuf),
    /// `github:ORG[/REPO][/PATH][@BRANCH]`
    Github,
    /// A disk image URL or path.
    Image,
    /// A local YAML file.
    Path,
    /// `-`
    Stdin,
    /// Not a locator at all; just the name of an instance.
    InstanceName,
}

/// A classified locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// The locator without its digest suffix.
    pub text: String,
    pub kind: LocatorKind,
    pub digest: Option<Digest>,
}

impl Locator {
    /// Classifies `input`. Store names and URL schemes are checked before
    /// the local-path heuristic.
    pub fn classify(input: &str) -> Result<Self> {
        let (text, digest) = if input.starts_with(github::SCHEME) {
            digest::split_qualified_digest(input)
        } else {
            split_digest(input)
        };
        let kind = classify_text(text)?;
        debug!(locator = input, ?kind, "Classified locator");
        Ok(Self {
            text: text.to_string(),
            kind,
            digest,
        })
    }

    /// The instance name this locator implies, if any.
    pub fn default_name(&self) -> Result<Option<String>> {
        let locator = self.text.as_str();
        let name = match &self.kind {
            LocatorKind::Store(template) => {
                let base = template.rsplit('/').next().unwrap_or(template);
                name::trim_yaml_ext(base).to_string()
            }
            LocatorKind::Http | LocatorKind::FileUrl(_) => name::name_from_url(locator)?,
            LocatorKind::Github => {
                let shorthand = locator.strip_prefix(github::SCHEME).unwrap_or(locator);
                GithubRef::parse(shorthand)?.name(locator)?
            }
            LocatorKind::Image => {
                let name = image::name_from_image(locator, image::native_arch());
                validate_name(locator, &name)?;
                name
            }
            LocatorKind::Path => name::name_from_yaml_path(locator, locator)?,
            LocatorKind::Stdin => return Ok(None),
            LocatorKind::InstanceName => locator.to_string(),
        };
        Ok(Some(name))
    }
}

fn classify_text(text: &str) -> Result<LocatorKind> {
    if text.is_empty() {
        return Err(TemplateError::InvalidLocator {
            locator: String::new(),
            message: "locator is empty".to_string(),
        });
    }
    if text == "-" {
        return Ok(LocatorKind::Stdin);
    }
    if let Some(template) = text.strip_prefix(TEMPLATE_SCHEME) {
        return Ok(LocatorKind::Store(template.to_string()));
    }

    match url_scheme(text) {
        Some("http" | "https") if image::is_image(text) => Ok(LocatorKind::Image),
        Some("http" | "https") => Ok(LocatorKind::Http),
        Some("file") if image::is_image(text) => Ok(LocatorKind::Image),
        Some("file") => Ok(LocatorKind::FileUrl(PathBuf::from(
            text.trim_start_matches("file://"),
        ))),
        Some("github") => Ok(LocatorKind::Github),
        Some(scheme) if scheme.len() > 1 => Err(TemplateError::Classification {
            locator: text.to_string(),
            message: format!("unsupported scheme {scheme:?}"),
        }),
        _ if image::is_image(text) => Ok(LocatorKind::Image),
        _ if seems_yaml_path(text) => Ok(LocatorKind::Path),
        _ => {
            validate_name(text, text).map_err(|e| TemplateError::Classification {
                locator: text.to_string(),
                message: e.to_string(),
            })?;
            Ok(LocatorKind::InstanceName)
        }
    }
}

/// The URL scheme of `text`: a letter followed by letters, digits, `+`,
/// `-` or `.`, terminated by `:`.
pub fn url_scheme(text: &str) -> Option<&str> {
    let (scheme, _) = text.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    let valid = first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Whether `text` is a URL with a scheme longer than one character.
///
/// Single-letter schemes are Windows drive letters.
pub fn is_url(text: &str) -> bool {
    url_scheme(text).is_some_and(|s| s.len() > 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(input: &str) -> LocatorKind {
        Locator::classify(input).unwrap().kind
    }

    #[test]
    fn classifies_each_form() {
        assert_eq!(kind("template://foo/bar"), LocatorKind::Store("foo/bar".into()));
        assert_eq!(kind("https://foo/"), LocatorKind::Http);
        assert_eq!(kind("http://foo/a.yaml"), LocatorKind::Http);
        assert_eq!(kind("file:///foo"), LocatorKind::FileUrl(PathBuf::from("/foo")));
        assert_eq!(kind("github:lima-vm/lima"), LocatorKind::Github);
        assert_eq!(kind("https://example.com/disk.qcow2"), LocatorKind::Image);
        assert_eq!(kind("./disk.img.xz"), LocatorKind::Image);
        assert_eq!(kind("foo.yaml"), LocatorKind::Path);
        assert_eq!(kind("dir/foo"), LocatorKind::Path);
        assert_eq!(kind("-"), LocatorKind::Stdin);
        assert_eq!(kind("default"), LocatorKind::InstanceName);
    }

    #[test]
    fn digest_is_split_before_classification() {
        let locator = Locator::classify("https://example.com/a.yaml@sha256:2cf24dba").unwrap();
        assert_eq!(locator.text, "https://example.com/a.yaml");
        assert_eq!(locator.kind, LocatorKind::Http);
        assert_eq!(locator.digest.unwrap().hex, "2cf24dba");
    }

    #[test]
    fn github_bare_suffix_is_a_branch() {
        let locator = Locator::classify("github:org/repo@abcdef12").unwrap();
        assert_eq!(locator.text, "github:org/repo@abcdef12");
        assert_eq!(locator.digest, None);
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(matches!(
            Locator::classify("ftp://example.com/a.yaml"),
            Err(TemplateError::Classification { .. })
        ));
        assert!(matches!(
            Locator::classify("not a name"),
            Err(TemplateError::Classification { .. })
        ));
        assert!(matches!(
            Locator::classify(""),
            Err(TemplateError::InvalidLocator { .. })
        ));
    }

    #[test]
    fn default_names() {
        let name = |input: &str| Locator::classify(input).unwrap().default_name().unwrap();
        assert_eq!(name("template://experimental/foo").as_deref(), Some("foo"));
        assert_eq!(name("https://example.com/x/Fedora.yaml").as_deref(), Some("fedora"));
        assert_eq!(name("/tmp/alpine.yml").as_deref(), Some("alpine"));
        assert_eq!(name("github:org/repo/templates/docker@main").as_deref(), Some("docker"));
        assert_eq!(name("https://example.com/rocky-8-8.10.raw").as_deref(), Some("rocky-8.10"));
        assert_eq!(name("mybox").as_deref(), Some("mybox"));
        assert_eq!(name("-"), None);
    }

    #[test]
    fn scheme_detection() {
        assert_eq!(url_scheme("github:org"), Some("github"));
        assert_eq!(url_scheme("C:\\foo"), Some("C"));
        assert_eq!(url_scheme("/abs/path"), None);
        assert!(is_url("template://foo"));
        assert!(!is_url("C:\\foo"));
        assert!(!is_url("./foo"));
    }
}
