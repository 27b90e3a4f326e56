//! The `template://` store.
//!
//! Names resolve against local template directories first
//! (`$LIMA_TEMPLATES_PATH`), then against the templates compiled into the
//! binary from `templates/`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use tracing::debug;

use crate::config::Settings;
use crate::error::{Result, TemplateError};

/// Embedded templates directory.
static TEMPLATES_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Looks up templates by name.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    dirs: Vec<PathBuf>,
}

impl TemplateStore {
    /// A store searching `dirs` before the embedded templates.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.templates_path.clone())
    }

    /// Maps a template name to its file name.
    ///
    /// `.yaml` is appended when the name has no extension, or when the
    /// "extension" is really a version number (`ubuntu-24.04`).
    pub fn file_name(name: &str) -> Result<String> {
        let invalid = |message: &str| TemplateError::InvalidLocator {
            locator: format!("template://{name}"),
            message: message.to_string(),
        };
        if name.is_empty() {
            return Err(invalid("template name is empty"));
        }
        if name.starts_with('/') || name.contains('\\') {
            return Err(invalid("template name must be a relative path"));
        }
        if name.split('/').any(|segment| segment == ".." || segment == ".") {
            return Err(invalid("template name must not contain '.' or '..' segments"));
        }

        let file = name.rsplit('/').next().unwrap_or(name);
        let needs_ext = match file.rsplit_once('.') {
            None => true,
            Some((stem, _)) if stem.is_empty() => true,
            Some((_, ext)) => ext.starts_with(|c: char| c.is_ascii_digit()),
        };
        Ok(if needs_ext {
            format!("{name}.yaml")
        } else {
            name.to_string()
        })
    }

    /// Reads the template `name`.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let file = Self::file_name(name)?;
        for dir in &self.dirs {
            let candidate = dir.join(&file);
            if candidate.is_file() {
                debug!(template = name, path = %candidate.display(), "Reading template from local directory");
                return Ok(fs::read(&candidate)?);
            }
        }
        TEMPLATES_DIR
            .get_file(&file)
            .map(|f| f.contents().to_vec())
            .ok_or_else(|| TemplateError::fetch(format!("template://{name}"), "template not found"))
    }

    /// Names of all available `.yaml` templates, sorted.
    ///
    /// Files and directories starting with `.` or `_` are internal and not
    /// listed, although they can still be read by name.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for dir in &self.dirs {
            if dir.is_dir() {
                collect_local(dir, dir, &mut names)?;
            }
        }
        collect_embedded(&TEMPLATES_DIR, &mut names);
        Ok(names.into_iter().collect())
    }
}

fn listed_name(relative: &Path) -> Option<String> {
    let text = relative.to_str()?.replace('\\', "/");
    if text
        .split('/')
        .any(|segment| segment.starts_with('.') || segment.starts_with('_'))
    {
        return None;
    }
    text.strip_suffix(".yaml").map(str::to_string)
}

fn collect_local(root: &Path, dir: &Path, names: &mut BTreeSet<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_local(root, &path, names)?;
        } else if let Some(name) = path.strip_prefix(root).ok().and_then(listed_name) {
            names.insert(name);
        }
    }
    Ok(())
}

fn collect_embedded(dir: &Dir<'_>, names: &mut BTreeSet<String>) {
    for file in dir.files() {
        if let Some(name) = listed_name(file.path()) {
            names.insert(name);
        }
    }
    for sub in dir.dirs() {
        collect_embedded(sub, names);
    }
}
