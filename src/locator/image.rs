//! Disk image locators.
//!
//! A locator pointing at a disk image rather than a template gets a
//! synthesized template with a single image, and a name derived from the
//! image file name with the usual distro noise removed.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::warn;

static IMAGE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(?:img|qcow2|raw|iso|vhdx?|vmdk)(?:\.(?:gz|xz|bz2|zst|zstd))?$")
        .expect("IMAGE_FILE must compile")
});

static DATE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-_.]20\d{6}(?:[-_.]\d+)?\b").expect("DATE_TAG must compile")
});

static GENERIC_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[-_.](?:base|cloud|cloudimg|generic|genericcloud|image|latest|linux|minimal|server|stream|uefi|qemu)([-_.]|$)",
    )
    .expect("GENERIC_TAGS must compile")
});

static LEADING_ARCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^arch\b").expect("LEADING_ARCH must compile"));

static REPEATED_MAJOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d+)-(\d+)\.").expect("REPEATED_MAJOR must compile"));

/// Architecture names and the keywords that identify them in file names.
const ARCH_KEYWORDS: &[(&str, &str)] = &[
    ("aarch64", r"\b(?:aarch64|arm64)\b"),
    ("armv7l", r"\b(?:armv7l|armhf)\b"),
    ("x86_64", r"\b(?:x86_64|amd64)\b"),
    ("riscv64", r"\briscv64\b"),
    ("s390x", r"\bs390x\b"),
    ("ppc64le", r"\bppc64le\b"),
];

static ARCH_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    ARCH_KEYWORDS
        .iter()
        .map(|(arch, pattern)| (*arch, Regex::new(pattern).expect("arch pattern must compile")))
        .collect()
});

/// Whether `locator` names a disk image (optionally compressed).
pub fn is_image(locator: &str) -> bool {
    IMAGE_FILE.is_match(locator)
}

/// The host architecture, in template spelling.
pub fn native_arch() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" => "aarch64",
        "arm" => "armv7l",
        "riscv64" => "riscv64",
        "s390x" => "s390x",
        "powerpc64" => "ppc64le",
        _ => "x86_64",
    }
}

/// Finds an architecture keyword in `locator`.
pub fn detect_arch(locator: &str) -> Option<&'static str> {
    ARCH_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(locator))
        .map(|(arch, _)| *arch)
}

/// Template body for a bare image, plus the architecture it declares.
pub fn image_template(locator: &str) -> (Vec<u8>, &'static str) {
    let arch = detect_arch(locator).unwrap_or_else(|| {
        let arch = native_arch();
        warn!(locator, arch, "Cannot determine image architecture; assuming host architecture");
        arch
    });
    let location = serde_yaml::to_string(locator).unwrap_or_else(|_| format!("{locator:?}\n"));
    let body = format!(
        "arch: {arch}\nimages:\n- location: {}  arch: {arch}\n",
        location
    );
    (body.into_bytes(), arch)
}

/// Instance name for an image file name.
///
/// Strips the format and compression extensions, generic tags like
/// `cloudimg`, the architecture when it is `native_arch`, and date stamps.
pub fn name_from_image(locator: &str, native_arch: &str) -> String {
    let base = locator.rsplit('/').next().unwrap_or(locator).to_lowercase();
    let mut name = IMAGE_FILE.replace(&base, "").into_owned();
    if let Some(rest) = name.strip_prefix("nocloud_") {
        name = rest.to_string();
    }
    // The trailing separator is kept for the next tag, so repeat until stable.
    while GENERIC_TAGS.is_match(&name) {
        name = GENERIC_TAGS.replace_all(&name, "${1}").into_owned();
    }

    let native = Regex::new(&format!(r"[-_.]{}\b", regex::escape(native_arch)));
    if let Ok(native) = native {
        name = native.replace_all(&name, "").into_owned();
    }
    name = DATE_TAG.replace_all(&name, "").into_owned();
    name = LEADING_ARCH.replace(&name, "archlinux").into_owned();
    REPEATED_MAJOR
        .replace_all(&name, |caps: &Captures| {
            if caps[1] == caps[2] {
                format!("-{}.", &caps[2])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}
