//! Error types for template resolution.
//!
//! This module defines [`TemplateError`], the error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Every variant names the locator (or template) that caused it
//! - Errors are returned to the direct caller; nothing in the pipeline retries
//! - Use `anyhow::Error` (via `TemplateError::Other`) for unexpected errors

use thiserror::Error;

/// Core error type for template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The locator cannot be interpreted as any known form.
    #[error("Don't know how to interpret {locator:?} as a template locator: {message}")]
    Classification { locator: String, message: String },

    /// The instance name derived from a locator is not a valid identifier.
    #[error("Invalid instance name {name:?} derived from {locator:?}: {message}")]
    InvalidName {
        locator: String,
        name: String,
        message: String,
    },

    /// A locator is structurally unusable (empty, volume-qualified relative path, ...).
    #[error("Invalid locator {locator:?}: {message}")]
    InvalidLocator { locator: String, message: String },

    /// Network, filesystem, or template store lookup failed.
    #[error("Failed to fetch {locator}: {message}")]
    Fetch { locator: String, message: String },

    /// Integrity suffix does not match the fetched content.
    #[error("Digest mismatch for {locator}: expected {algorithm}:{expected}, got {algorithm}:{actual}")]
    DigestMismatch {
        locator: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    /// A base template was reached twice within one resolution tree.
    #[error("Base template loop detected: template {locator:?} already included")]
    CyclicBase { locator: String },

    /// The merged template grew beyond the size ceiling.
    #[error("Template {locator:?} embedding exceeded the size limit ({limit} bytes)")]
    TooLarge { locator: String, limit: usize },

    /// A relative reference tries to leave its anchor directory.
    #[error("Relative locator path {locator:?} must not contain '../' segments")]
    Traversal { locator: String },

    /// A relative reference inside a template read from STDIN.
    #[error("Can't use relative path {locator:?} when reading template from STDIN")]
    AnchorlessRelative { locator: String },

    /// Malformed YAML.
    #[error("Failed to parse YAML from {locator}: {message}")]
    Parse { locator: String, message: String },

    /// A GitHub `.lima.yaml` redirect violates its rules.
    #[error("Invalid GitHub redirect in {locator}: {message}")]
    RedirectValidation { locator: String, message: String },

    /// The default branch of a GitHub repository could not be determined.
    #[error("Failed to get default branch for {org}/{repo}: {message}")]
    BranchResolution {
        org: String,
        repo: String,
        message: String,
    },

    /// A non-`template://` base follows a `template://` base that was not embedded.
    #[error("Cannot embed template {locator:?} after not embedding {skipped:?}")]
    EmbedOrder { locator: String, skipped: String },

    /// The fetch context was cancelled.
    #[error("Template resolution cancelled")]
    Cancelled,

    /// The fetch context deadline passed.
    #[error("Deadline exceeded while fetching {locator}")]
    DeadlineExceeded { locator: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TemplateError {
    pub(crate) fn fetch(locator: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            locator: locator.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn parse(locator: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            locator: locator.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_displays_locator_and_message() {
        let err = TemplateError::fetch("https://example.com/a.yaml", "HTTP 404");
        let msg = err.to_string();
        assert!(msg.contains("https://example.com/a.yaml"));
        assert!(msg.contains("HTTP 404"));
    }

    #[test]
    fn cyclic_base_displays_locator() {
        let err = TemplateError::CyclicBase {
            locator: "/tmp/base0.yaml".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("loop detected"));
        assert!(msg.contains("/tmp/base0.yaml"));
    }

    #[test]
    fn digest_mismatch_displays_both_digests() {
        let err = TemplateError::DigestMismatch {
            locator: "a.yaml".into(),
            algorithm: "sha256".into(),
            expected: "deadbeef".into(),
            actual: "cafebabe".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sha256:deadbeef"));
        assert!(msg.contains("sha256:cafebabe"));
    }

    #[test]
    fn traversal_mentions_dotdot() {
        let err = TemplateError::Traversal {
            locator: "../foo".into(),
        };
        assert!(err.to_string().contains("'../'"));
    }

    #[test]
    fn anchorless_mentions_stdin() {
        let err = TemplateError::AnchorlessRelative {
            locator: "foo.yaml".into(),
        };
        assert!(err.to_string().contains("STDIN"));
    }

    #[test]
    fn too_large_displays_limit() {
        let err = TemplateError::TooLarge {
            locator: "tmpl.yaml".into(),
            limit: 4096,
        };
        assert!(err.to_string().contains("4096 bytes"));
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: TemplateError = io_err.into();
        assert!(matches!(err, TemplateError::Io(_)));
    }

    #[test]
    fn result_type_alias_works() {
        fn returns_error() -> Result<()> {
            Err(TemplateError::Cancelled)
        }
        assert!(returns_error().is_err());
    }
}
