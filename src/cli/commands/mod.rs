//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results. Commands are
//! routed by [`CommandDispatcher`].

pub mod copy;
pub mod dispatcher;
pub mod list;
pub mod validate;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};

use crate::config::Settings;
use crate::error::{Result, TemplateError};
use crate::fetch::FetchContext;
use crate::template::Template;

/// Reads `locator`, rejecting locators that don't name any template content.
fn read_template(ctx: &FetchContext, locator: &str) -> Result<Template> {
    let tmpl = Template::read(ctx, "", locator)?;
    if tmpl.bytes().is_empty() {
        return Err(TemplateError::Classification {
            locator: locator.to_string(),
            message: "no template content found".to_string(),
        });
    }
    Ok(tmpl)
}

/// A fetch context with the deadline derived from the configured timeout.
fn fetch_context(settings: &Settings) -> Result<FetchContext> {
    Ok(FetchContext::new(settings)?.with_deadline(std::time::Instant::now() + settings.timeout()))
}
