//! Instance names derived from locators.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{Result, TemplateError};

/// Longest accepted instance name.
pub const MAX_NAME_LEN: usize = 76;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]+(?:[._-][A-Za-z0-9]+)*$").expect("IDENTIFIER must compile")
});

/// Checks `name` against the instance identifier rules.
pub fn validate_name(locator: &str, name: &str) -> Result<()> {
    let message = if name.is_empty() {
        "identifier must not be empty"
    } else if name.len() > MAX_NAME_LEN {
        "identifier is longer than 76 characters"
    } else if !IDENTIFIER.is_match(name) {
        "identifier must be letters and digits separated by single '.', '_' or '-'"
    } else {
        return Ok(());
    };
    Err(TemplateError::InvalidName {
        locator: locator.to_string(),
        name: name.to_string(),
        message: message.to_string(),
    })
}

/// Anything containing a `/` or ending in `.yml`/`.yaml`.
pub fn seems_yaml_path(arg: &str) -> bool {
    if arg.contains('/') {
        return true;
    }
    let lower = arg.to_ascii_lowercase();
    lower.ends_with(".yml") || lower.ends_with(".yaml")
}

/// Lowercased file name without its `.yml`/`.yaml` extension.
pub fn name_from_yaml_path(locator: &str, path: &str) -> Result<String> {
    let base = path
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let name = trim_yaml_ext(&base).to_string();
    validate_name(locator, &name)?;
    Ok(name)
}

/// Like [`name_from_yaml_path`], using the last segment of the URL path.
pub fn name_from_url(locator: &str) -> Result<String> {
    let url = Url::parse(locator).map_err(|e| TemplateError::Classification {
        locator: locator.to_string(),
        message: e.to_string(),
    })?;
    name_from_yaml_path(locator, url.path())
}

pub(crate) fn trim_yaml_ext(name: &str) -> &str {
    let name = name.strip_suffix(".yml").unwrap_or(name);
    name.strip_suffix(".yaml").unwrap_or(name)
}
