//! A parsed template document.

use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::edit::{self, Edit};
use super::emitter;
use super::node::{untag, Node};
use super::parser;
use super::path::NodePath;
use crate::error::{Result, TemplateError};

/// A YAML document: the root node plus comments after the last node.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Node,
    pub foot: Vec<String>,
}

impl Document {
    /// Parses template bytes.
    ///
    /// The bytes are validated with `serde_yaml` first, so malformed YAML
    /// always surfaces as [`TemplateError::Parse`]. If the comment-keeping
    /// reader can't represent the document exactly, the document is still
    /// returned, just without comments.
    pub fn parse(locator: &str, bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| TemplateError::parse(locator, e))?;
        let value: Value =
            serde_yaml::from_str(text).map_err(|e| TemplateError::parse(locator, e))?;
        let expected = match untag(value.clone()) {
            Value::Null => Value::Mapping(Mapping::new()),
            other => other,
        };

        match parser::parse(text) {
            Ok(parsed) if parsed.root.to_value() == expected => {
                return Ok(Self {
                    root: parsed.root,
                    foot: parsed.foot,
                })
            }
            Ok(_) => debug!(locator, "Comment-preserving read diverged from YAML value; dropping comments"),
            Err(reason) => debug!(locator, %reason, "Comment-preserving read failed; dropping comments"),
        }
        let root = match value {
            Value::Null => Node::mapping(),
            other => Node::from_value(&other),
        };
        Ok(Self {
            root,
            foot: Vec::new(),
        })
    }

    /// The document as a plain YAML value (tags removed).
    pub fn to_value(&self) -> Value {
        self.root.to_value()
    }

    /// Renders the document as YAML text.
    pub fn to_yaml(&self) -> String {
        emitter::emit(&self.root, &self.foot)
    }

    pub fn get(&self, path: &NodePath) -> Option<&Node> {
        self.root.at(path)
    }

    /// Applies `edits` in order. `source` supplies the nodes that copy-style
    /// edits read from.
    pub fn apply(&mut self, edits: &[Edit], source: &Document) -> Result<()> {
        for e in edits {
            edit::apply(&mut self.root, &mut self.foot, e, &source.root, &source.foot)
                .map_err(|err| err.context(format!("applying {e:?}")))?;
        }
        Ok(())
    }
}
