//! List command implementation.
//!
//! The `limatmpl list` command lists the templates reachable as
//! `template://NAME`.

use crate::cli::args::ListArgs;
use crate::cli::output::Output;
use crate::config::Settings;
use crate::error::{Result, TemplateError};
use crate::store::TemplateStore;

use super::dispatcher::{Command, CommandResult};

/// The list command implementation.
pub struct ListCommand {
    settings: Settings,
    args: ListArgs,
}

impl ListCommand {
    pub fn new(settings: &Settings, args: ListArgs) -> Self {
        Self {
            settings: settings.clone(),
            args,
        }
    }

    pub fn args(&self) -> &ListArgs {
        &self.args
    }
}

impl Command for ListCommand {
    fn execute(&self, out: &mut dyn Output) -> Result<CommandResult> {
        let names = TemplateStore::from_settings(&self.settings).list()?;
        if self.args.json {
            let json = serde_json::to_string_pretty(&names).map_err(|e| TemplateError::Other(e.into()))?;
            out.message(&json);
        } else {
            for name in &names {
                out.message(name);
            }
        }
        Ok(CommandResult::success())
    }
}
