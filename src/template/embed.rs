//! Embedding: resolving the whole `base` chain into one document.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::abs::absolute_locator;
use super::{Stage, Template};
use crate::config::LocatorWithDigest;
use crate::error::{Result, TemplateError};
use crate::fetch::FetchContext;
use crate::locator::TEMPLATE_SCHEME;
use crate::yaml::{Edit, Node, NodePath};

/// How far [`Template::embed`] goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedOptions {
    /// Also embed `template://` bases and scripts.
    pub embed_all: bool,
    /// Merged before any other base, e.g. `$LIMA_HOME/_config/base.yaml`.
    pub default_base: Option<PathBuf>,
}

impl Template {
    /// Merges every base into the template, inlines external scripts, and
    /// combines list entries that share a key.
    ///
    /// On success the template no longer has a `base` field, unless
    /// `template://` bases were left in place because `embed_all` is unset.
    pub fn embed(&mut self, ctx: &FetchContext, options: &EmbedOptions) -> Result<()> {
        let result = self.embed_impl(ctx, options);
        self.clear_on_error(result)
    }

    fn embed_impl(&mut self, ctx: &FetchContext, options: &EmbedOptions) -> Result<()> {
        self.use_abs_locators_impl()?;
        let mut seen = HashSet::new();
        if self.locator != "-" {
            seen.insert(absolute_locator(&self.locator)?);
        }
        self.embed_all_bases(ctx, options.embed_all, options.default_base.as_deref(), &mut seen)?;
        // Wildcards must see the entries contributed by every base.
        self.combine_list_entries_impl()?;
        self.enter(Stage::Resolved);
        Ok(())
    }

    fn embed_all_bases(
        &mut self,
        ctx: &FetchContext,
        embed_all: bool,
        default_base: Option<&Path>,
        seen: &mut HashSet<String>,
    ) -> Result<()> {
        debug!(locator = %self.locator, "Embedding templates");
        if let Some(path) = default_base {
            self.queue(Edit::Insert {
                path: NodePath::root().key("base"),
                index: 0,
                node: Node::string(path.to_string_lossy()),
            });
            self.eval_edits()?;
        }

        loop {
            let bases = self.config()?.base.clone();
            let Some(first) = bases.first() else { break };
            if !embed_all && first.url.starts_with(TEMPLATE_SCHEME) {
                // once a template:// base is kept, nothing after it can be embedded
                if let Some(later) = bases[1..].iter().find(|b| !b.url.starts_with(TEMPLATE_SCHEME)) {
                    return Err(TemplateError::EmbedOrder {
                        locator: later.url.clone(),
                        skipped: first.url.clone(),
                    });
                }
                break;
            }
            if !seen.insert(first.url.clone()) {
                return Err(TemplateError::CyclicBase {
                    locator: first.url.clone(),
                });
            }
            self.embed_base(ctx, embed_all, first, seen)?;
        }

        self.embed_all_scripts(ctx, embed_all)?;
        self.check_size(ctx.max_size())
    }

    fn embed_base(
        &mut self,
        ctx: &FetchContext,
        embed_all: bool,
        entry: &LocatorWithDigest,
        seen: &mut HashSet<String>,
    ) -> Result<()> {
        debug!(locator = %self.locator, base = %entry.url, "Embedding base");
        self.enter(Stage::MergingBases);
        let mut base = Template::fetch_entry(ctx, entry)?;
        base.use_abs_locators_impl()?;
        base.embed_all_bases(ctx, embed_all, None, seen)?;
        self.merge_impl(&mut base)?;
        self.check_size(ctx.max_size())
    }
}
