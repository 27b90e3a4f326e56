//! CLI argument definitions.
//!
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;

/// limatmpl - Resolve, embed, and validate Lima templates.
#[derive(Debug, Parser)]
#[command(name = "limatmpl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Lima home directory (overrides $LIMA_HOME)
    #[arg(long, global = true, value_name = "DIR")]
    pub lima_home: Option<PathBuf>,

    /// Network timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Applies global flags on top of `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(home) = &self.lima_home {
            settings.lima_home = home.clone();
        }
        if let Some(timeout) = self.timeout {
            settings.timeout = timeout;
        }
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Copy a template to a file or stdout
    Copy(CopyArgs),

    /// List the templates available as template://NAME
    List(ListArgs),

    /// Validate templates
    Validate(ValidateArgs),
}

/// Arguments for the `copy` command.
#[derive(Debug, Clone, Default, clap::Args)]
#[command(after_help = "\
Template locators are local files, file://, https://, github:, or template:// URLs.

  # Copy default template to STDOUT
  limatmpl copy template://default -

  # Copy template from web location to local file
  limatmpl copy https://example.com/lima.yaml mighty-machine.yaml")]
pub struct CopyArgs {
    /// Embed base templates and scripts, except template:// references
    #[arg(long, conflicts_with = "embed_all")]
    pub embed: bool,

    /// Embed all base templates and scripts, including template:// references
    #[arg(long)]
    pub embed_all: bool,

    /// Rewrite relative base and script references as absolute locators
    #[arg(long)]
    pub abs: bool,

    /// Don't merge $LIMA_HOME/_config/base.yaml when embedding
    #[arg(long)]
    pub no_default_base: bool,

    /// Template locator
    pub template: String,

    /// Destination file, or `-` for stdout
    pub dest: String,
}

/// Arguments for the `list` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ValidateArgs {
    /// Don't merge $LIMA_HOME/_config/base.yaml before validating
    #[arg(long)]
    pub no_default_base: bool,

    /// Template locators
    #[arg(required = true)]
    pub templates: Vec<String>,
}
