//! Copy command implementation.
//!
//! The `limatmpl copy` command reads a template, optionally embeds its bases
//! and scripts, and writes it to a file or stdout.

use std::fs;

use anyhow::Context;
use tracing::debug;

use crate::cli::args::CopyArgs;
use crate::cli::output::Output;
use crate::config::Settings;
use crate::error::{Result, TemplateError};
use crate::template::EmbedOptions;

use super::dispatcher::{Command, CommandResult};
use super::{fetch_context, read_template};

/// The copy command implementation.
pub struct CopyCommand {
    settings: Settings,
    args: CopyArgs,
}

impl CopyCommand {
    pub fn new(settings: &Settings, args: CopyArgs) -> Self {
        Self {
            settings: settings.clone(),
            args,
        }
    }

    pub fn args(&self) -> &CopyArgs {
        &self.args
    }

    fn embed_options(&self) -> Option<EmbedOptions> {
        if !self.args.embed && !self.args.embed_all {
            return None;
        }
        let default_base = if self.args.no_default_base {
            None
        } else {
            self.settings.existing_default_base()
        };
        Some(EmbedOptions {
            embed_all: self.args.embed_all,
            default_base,
        })
    }
}

impl Command for CopyCommand {
    fn execute(&self, out: &mut dyn Output) -> Result<CommandResult> {
        let ctx = fetch_context(&self.settings)?;
        let mut tmpl = read_template(&ctx, &self.args.template)?;

        if let Some(options) = self.embed_options() {
            tmpl.embed(&ctx, &options)?;
        } else if self.args.abs {
            tmpl.use_abs_locators()?;
        }

        debug!(dest = %self.args.dest, bytes = tmpl.bytes().len(), "Writing template");
        if self.args.dest == "-" {
            out.write_bytes(tmpl.bytes())?;
        } else {
            fs::write(&self.args.dest, tmpl.bytes())
                .with_context(|| format!("failed to write {}", self.args.dest))
                .map_err(TemplateError::Other)?;
        }
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::output::MockOutput;
    use tempfile::TempDir;

    fn settings(temp: &TempDir) -> Settings {
        Settings {
            lima_home: temp.path().join("lima"),
            ..Settings::default()
        }
    }

    fn args(template: &str, dest: &str) -> CopyArgs {
        CopyArgs {
            template: template.to_string(),
            dest: dest.to_string(),
            ..CopyArgs::default()
        }
    }

    #[test]
    fn copies_to_stdout_verbatim() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.yaml");
        fs::write(&src, "# keep me\ncpus:   2\n").unwrap();

        let cmd = CopyCommand::new(&settings(&temp), args(src.to_str().unwrap(), "-"));
        let mut out = MockOutput::new();
        assert!(cmd.execute(&mut out).unwrap().success);
        assert_eq!(out.written(), "# keep me\ncpus:   2\n");
    }

    #[test]
    fn embeds_into_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.yaml"), "memory: 2GiB\n").unwrap();
        let src = temp.path().join("a.yaml");
        fs::write(&src, "base: b.yaml\ncpus: 2\n").unwrap();
        let dest = temp.path().join("out.yaml");

        let mut copy = args(src.to_str().unwrap(), dest.to_str().unwrap());
        copy.embed = true;
        let cmd = CopyCommand::new(&settings(&temp), copy);
        cmd.execute(&mut MockOutput::new()).unwrap();
        assert_eq!(fs::read_to_string(dest).unwrap(), "cpus: 2\nmemory: 2GiB\n");
    }

    #[test]
    fn abs_rewrites_relative_bases() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.yaml");
        fs::write(&src, "base: b.yaml\n").unwrap();

        let mut copy = args(src.to_str().unwrap(), "-");
        copy.abs = true;
        let cmd = CopyCommand::new(&settings(&temp), copy);
        let mut out = MockOutput::new();
        cmd.execute(&mut out).unwrap();
        let expected = format!("base: {}\n", temp.path().join("b.yaml").display());
        assert_eq!(out.written(), expected);
    }

    #[test]
    fn default_base_used_unless_disabled() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);
        fs::create_dir_all(settings.config_dir()).unwrap();
        fs::write(settings.default_base(), "memory: 8GiB\n").unwrap();
        let src = temp.path().join("a.yaml");
        fs::write(&src, "cpus: 2\n").unwrap();

        let mut copy = args(src.to_str().unwrap(), "-");
        copy.embed = true;
        let mut out = MockOutput::new();
        CopyCommand::new(&settings, copy.clone()).execute(&mut out).unwrap();
        assert_eq!(out.written(), "cpus: 2\nmemory: 8GiB\n");

        copy.no_default_base = true;
        let mut out = MockOutput::new();
        CopyCommand::new(&settings, copy).execute(&mut out).unwrap();
        assert_eq!(out.written(), "cpus: 2\n");
    }

    #[test]
    fn instance_name_is_rejected() {
        let temp = TempDir::new().unwrap();
        let cmd = CopyCommand::new(&settings(&temp), args("myvm", "-"));
        let err = cmd.execute(&mut MockOutput::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Classification { .. }));
    }
}
