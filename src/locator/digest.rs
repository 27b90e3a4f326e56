//! Integrity suffixes: `LOCATOR@[ALGORITHM:]HEX`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use sha2::Digest as _;
use sha2::{Sha256, Sha384, Sha512};

use crate::error::{Result, TemplateError};

/// Minimum number of hex digits in a digest suffix.
pub const MIN_DIGEST_LEN: usize = 7;

static DIGEST_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?:(sha256|sha384|sha512):)?([0-9a-fA-F]{7,})$")
        .expect("DIGEST_SUFFIX must compile")
});

static QUALIFIED_DIGEST_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(sha256|sha384|sha512):([0-9a-fA-F]{7,})$")
        .expect("QUALIFIED_DIGEST_SUFFIX must compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Lowercase hex digest of `bytes`.
    pub fn hash(self, bytes: &[u8]) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(bytes)),
            Self::Sha384 => hex::encode(Sha384::digest(bytes)),
            Self::Sha512 => hex::encode(Sha512::digest(bytes)),
        }
    }
}

/// An expected content digest. The hex part may be a prefix of the full digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub algorithm: Algorithm,
    pub hex: String,
}

impl Digest {
    /// Parses `[ALGORITHM:]HEX`, as written in a `{url, digest}` base entry.
    pub fn parse(text: &str) -> Option<Self> {
        let (algorithm, hex) = match text.split_once(':') {
            Some((name, hex)) => (Algorithm::parse(name)?, hex),
            None => (Algorithm::Sha256, text),
        };
        if hex.len() < MIN_DIGEST_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Fails with [`TemplateError::DigestMismatch`] unless the digest of
    /// `bytes` starts with the expected hex.
    pub fn verify(&self, locator: &str, bytes: &[u8]) -> Result<()> {
        let actual = self.algorithm.hash(bytes);
        if actual.starts_with(&self.hex) {
            return Ok(());
        }
        Err(TemplateError::DigestMismatch {
            locator: locator.to_string(),
            algorithm: self.algorithm.name().to_string(),
            expected: self.hex.clone(),
            actual: actual[..self.hex.len().min(actual.len())].to_string(),
        })
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.name(), self.hex)
    }
}

/// Splits a trailing `@[ALGORITHM:]HEX` suffix off `locator`.
pub fn split_digest(locator: &str) -> (&str, Option<Digest>) {
    split_with(&DIGEST_SUFFIX, locator)
}

/// Like [`split_digest`], but only an algorithm-qualified suffix counts.
///
/// For `github:` locators a bare `@ref` names a branch.
pub fn split_qualified_digest(locator: &str) -> (&str, Option<Digest>) {
    split_with(&QUALIFIED_DIGEST_SUFFIX, locator)
}

fn split_with<'a>(re: &Regex, locator: &'a str) -> (&'a str, Option<Digest>) {
    let Some(caps) = re.captures(locator) else {
        return (locator, None);
    };
    let (Some(whole), Some(hex)) = (caps.get(0), caps.get(2)) else {
        return (locator, None);
    };
    let algorithm = caps
        .get(1)
        .and_then(|m| Algorithm::parse(m.as_str()))
        .unwrap_or_default();
    (
        &locator[..whole.start()],
        Some(Digest {
            algorithm,
            hex: hex.as_str().to_ascii_lowercase(),
        }),
    )
}
