//! Reading templates and scripts from locators.

use std::path::Path;

use tracing::debug;

use super::{Stage, Template};
use crate::config::LocatorWithDigest;
use crate::error::{Result, TemplateError};
use crate::fetch::FetchContext;
use crate::locator::{github, image, Digest, Locator, LocatorKind};

impl Template {
    /// Reads the template at `locator`.
    ///
    /// When `name` is empty the instance name is derived from the locator.
    /// A plain instance name (no path, URL, or store reference) yields an
    /// empty template with that name; the caller decides what it means.
    pub fn read(ctx: &FetchContext, name: &str, locator: &str) -> Result<Self> {
        let parsed = Locator::classify(locator)?;
        let mut tmpl = Self::fetch_locator(ctx, &parsed, None)?;
        tmpl.name = if name.is_empty() {
            parsed.default_name()?.unwrap_or_default()
        } else {
            name.to_string()
        };
        debug!(locator, name = %tmpl.name, "Read template");
        Ok(tmpl)
    }

    /// Fetches a base template or script. No instance name is derived.
    ///
    /// `digest` is checked in addition to any `@digest` suffix on the locator.
    pub fn fetch(ctx: &FetchContext, locator: &str, digest: Option<&Digest>) -> Result<Self> {
        let parsed = Locator::classify(locator)?;
        if parsed.kind == LocatorKind::InstanceName {
            return Err(TemplateError::Classification {
                locator: locator.to_string(),
                message: "expected a path, URL, or template:// reference".to_string(),
            });
        }
        Self::fetch_locator(ctx, &parsed, digest)
    }

    /// Fetches a `base` or `file` reference, checking its `digest` if set.
    pub(super) fn fetch_entry(ctx: &FetchContext, entry: &LocatorWithDigest) -> Result<Self> {
        let digest = match entry.digest.as_deref() {
            Some(text) => Some(Digest::parse(text).ok_or_else(|| TemplateError::InvalidLocator {
                locator: entry.url.clone(),
                message: format!("invalid digest {text:?}"),
            })?),
            None => None,
        };
        Self::fetch(ctx, &entry.url, digest.as_ref())
    }

    fn fetch_locator(ctx: &FetchContext, locator: &Locator, digest: Option<&Digest>) -> Result<Self> {
        let mut tmpl = Template::new("", locator.text.clone(), Vec::new());
        tmpl.enter(Stage::Fetching);

        let bytes = match &locator.kind {
            LocatorKind::Store(name) => ctx.read_template(name)?,
            LocatorKind::Http => ctx.http_get(&locator.text)?,
            LocatorKind::FileUrl(path) => ctx.read_file(path)?,
            LocatorKind::Github => {
                let url = github::resolve(ctx, &locator.text)?;
                debug!(locator = %locator.text, %url, "Resolved GitHub locator");
                let bytes = ctx.http_get(&url)?;
                tmpl.locator = url;
                bytes
            }
            LocatorKind::Image => image::image_template(&locator.text).0,
            LocatorKind::Path => ctx.read_file(Path::new(&locator.text))?,
            LocatorKind::Stdin => ctx.read_stdin()?,
            LocatorKind::InstanceName => Vec::new(),
        };

        for expected in locator.digest.iter().chain(digest) {
            expected.verify(&locator.text, &bytes)?;
        }
        tmpl.set_bytes(bytes);
        Ok(tmpl)
    }
}
