//! Validate command implementation.
//!
//! The `limatmpl validate` command resolves each template completely and
//! checks that the result reads as a Lima configuration.

use tracing::debug;

use crate::cli::args::ValidateArgs;
use crate::cli::output::Output;
use crate::config::Settings;
use crate::error::{Result, TemplateError};
use crate::fetch::FetchContext;
use crate::template::EmbedOptions;

use super::dispatcher::{Command, CommandResult};
use super::{fetch_context, read_template};

/// The validate command implementation.
pub struct ValidateCommand {
    settings: Settings,
    args: ValidateArgs,
}

impl ValidateCommand {
    pub fn new(settings: &Settings, args: ValidateArgs) -> Self {
        Self {
            settings: settings.clone(),
            args,
        }
    }

    pub fn args(&self) -> &ValidateArgs {
        &self.args
    }

    fn validate(&self, ctx: &FetchContext, options: &EmbedOptions, locator: &str) -> Result<()> {
        let mut tmpl = read_template(ctx, locator)?;
        if tmpl.name.is_empty() {
            return Err(TemplateError::InvalidName {
                locator: locator.to_string(),
                name: String::new(),
                message: "can't determine instance name from template locator".to_string(),
            });
        }
        tmpl.embed(ctx, options)?;
        let name = tmpl.name.clone();
        let config = tmpl.config()?;
        debug!(
            locator,
            name = %name,
            images = config.images.len(),
            mounts = config.mounts.len(),
            "Template resolved"
        );
        Ok(())
    }
}

impl Command for ValidateCommand {
    fn execute(&self, out: &mut dyn Output) -> Result<CommandResult> {
        let ctx = fetch_context(&self.settings)?;
        let options = EmbedOptions {
            embed_all: true,
            default_base: if self.args.no_default_base {
                None
            } else {
                self.settings.existing_default_base()
            },
        };

        let mut failed = false;
        for locator in &self.args.templates {
            match self.validate(&ctx, &options, locator) {
                Ok(()) => out.message(&format!("{locator:?}: OK")),
                Err(e) => {
                    out.error(&format!("{locator:?}: {e}"));
                    failed = true;
                }
            }
        }
        Ok(if failed {
            CommandResult::failure(1)
        } else {
            CommandResult::success()
        })
    }
}
