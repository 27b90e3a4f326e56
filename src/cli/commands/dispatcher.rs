//! Routing parsed subcommands to their [`Command`] implementations.

use crate::cli::args::{Cli, Commands};
use crate::cli::output::Output;
use crate::config::Settings;
use crate::error::Result;

/// A subcommand ready to run.
pub trait Command {
    /// Runs the command. Template output and messages go to `out`.
    fn execute(&self, out: &mut dyn Output) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    settings: Settings,
}

impl CommandDispatcher {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Routes the CLI subcommand to its implementation and executes it.
    pub fn dispatch(&self, cli: &Cli, out: &mut dyn Output) -> Result<CommandResult> {
        match &cli.command {
            Commands::Copy(args) => {
                let cmd = super::copy::CopyCommand::new(&self.settings, args.clone());
                cmd.execute(out)
            }
            Commands::List(args) => {
                let cmd = super::list::ListCommand::new(&self.settings, args.clone());
                cmd.execute(out)
            }
            Commands::Validate(args) => {
                let cmd = super::validate::ValidateCommand::new(&self.settings, args.clone());
                cmd.execute(out)
            }
        }
    }
}
