//! The template value object and its resolution pipeline.
//!
//! A [`Template`] is read from a locator ([`Template::read`]), then mutated in
//! place: relative references become absolute ([`Template::use_abs_locators`]),
//! bases are merged in and scripts inlined ([`Template::embed`]). Every pass
//! queues [`Edit`]s and applies them to the bytes in one go, so comments in
//! the source survive. A failed pass clears the template.

mod abs;
mod combine;
mod embed;
mod merge;
mod read;
mod script;

use std::fmt;

use tracing::debug;

pub use abs::{abs_path, base_path, clean_path};
pub use embed::EmbedOptions;
pub use script::{binary_string, encode_script_reason, BASE64_CHUNK_LENGTH, MAX_LINE_LENGTH};

use crate::config::LimaConfig;
use crate::error::{Result, TemplateError};
use crate::yaml::{Document, Edit};

/// Where a template is in its resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Unresolved,
    Fetching,
    Normalizing,
    MergingBases,
    EmbeddingScripts,
    Combining,
    Resolved,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unresolved => "unresolved",
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::MergingBases => "merging bases",
            Self::EmbeddingScripts => "embedding scripts",
            Self::Combining => "combining list entries",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A template being resolved.
#[derive(Debug, Clone)]
pub struct Template {
    /// Instance name; derived from the locator when not given.
    pub name: String,
    /// Where the bytes came from: an absolute path, a URL, or `-`.
    pub locator: String,
    bytes: Vec<u8>,
    config: Option<LimaConfig>,
    edits: Vec<Edit>,
    stage: Stage,
}

impl Template {
    pub fn new(name: impl Into<String>, locator: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
            bytes: bytes.into(),
            config: None,
            edits: Vec::new(),
            stage: Stage::Unresolved,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Replaces the bytes; the typed config is re-derived on next use.
    pub fn set_bytes(&mut self, bytes: impl Into<Vec<u8>>) {
        self.bytes = bytes.into();
        self.config = None;
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The typed view of the bytes, parsed on first use.
    pub fn config(&mut self) -> Result<&LimaConfig> {
        if self.config.is_none() {
            let doc = self.document()?;
            self.config = Some(LimaConfig::from_document(&self.locator, &doc)?);
        }
        self.config
            .as_ref()
            .ok_or_else(|| TemplateError::parse(&self.locator, "template has no configuration"))
    }

    /// Parses the bytes into a comment-preserving document.
    pub fn document(&self) -> Result<Document> {
        Document::parse(&self.locator, &self.bytes)
    }

    /// Wipes bytes, config, and queued edits if `result` is an error.
    pub fn clear_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.bytes.clear();
            self.config = None;
            self.edits.clear();
            self.enter(Stage::Failed);
        }
        result
    }

    fn enter(&mut self, stage: Stage) {
        if self.stage != stage {
            debug!(locator = %self.locator, %stage, "Template stage");
            self.stage = stage;
        }
    }

    fn queue(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    /// Applies the queued edits to the bytes.
    fn eval_edits(&mut self) -> Result<()> {
        if self.edits.is_empty() {
            return Ok(());
        }
        let doc = self.document()?;
        let source = doc.clone();
        self.apply_edits(doc, &source)
    }

    /// Applies the queued edits to `target`, reading copies from `source`,
    /// and stores the result as the new bytes.
    fn apply_edits(&mut self, mut target: Document, source: &Document) -> Result<()> {
        let edits = std::mem::take(&mut self.edits);
        debug!(locator = %self.locator, edits = edits.len(), "Applying template edits");
        target.apply(&edits, source)?;
        self.set_bytes(target.to_yaml());
        Ok(())
    }

    fn check_size(&self, limit: usize) -> Result<()> {
        if self.bytes.len() > limit {
            return Err(TemplateError::TooLarge {
                locator: self.locator.clone(),
                limit,
            });
        }
        Ok(())
    }
}
