//! Runtime settings read from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Size ceiling for a single fetched source and for a merged template.
pub const DEFAULT_MAX_TEMPLATE_SIZE: usize = 4 * 1024 * 1024;

/// Default network timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Name of the optional base template merged into every embedded template.
pub const DEFAULT_BASE_FILENAME: &str = "base.yaml";

/// Settings shared by the CLI and the resolution pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Lima home directory (`$LIMA_HOME`, default `~/.lima`).
    pub lima_home: PathBuf,

    /// Directories searched for `template://` names before the built-in templates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates_path: Vec<PathBuf>,

    /// Token for GitHub API requests (`$GH_TOKEN` or `$GITHUB_TOKEN`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    /// Network timeout in seconds.
    pub timeout: u64,

    /// Maximum template size in bytes.
    pub max_template_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lima_home: default_lima_home(),
            templates_path: Vec::new(),
            github_token: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            max_template_size: DEFAULT_MAX_TEMPLATE_SIZE,
        }
    }
}

fn default_lima_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lima")
}

impl Settings {
    /// Builds settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut settings = Self::default();
        if let Some(home) = non_empty("LIMA_HOME") {
            settings.lima_home = PathBuf::from(home);
        }
        if let Some(paths) = non_empty("LIMA_TEMPLATES_PATH") {
            settings.templates_path = paths
                .split(':')
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        settings.github_token = non_empty("GH_TOKEN").or_else(|| non_empty("GITHUB_TOKEN"));
        settings
    }

    /// `$LIMA_HOME/_config`
    pub fn config_dir(&self) -> PathBuf {
        self.lima_home.join("_config")
    }

    /// `$LIMA_HOME/_config/base.yaml`
    pub fn default_base(&self) -> PathBuf {
        self.config_dir().join(DEFAULT_BASE_FILENAME)
    }

    /// The default base, if the file exists.
    pub fn existing_default_base(&self) -> Option<PathBuf> {
        let path = self.default_base();
        is_file(&path).then_some(path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}
