//! Comment-carrying YAML node tree.
//!
//! Comments are attached to the node they describe: a head comment is the
//! block of `#` lines right above a mapping key or sequence item, and a line
//! comment is the trailing `# ...` on the key's (or item's) line. For mapping
//! entries the comments live on the value node, so copying a value copies
//! its annotations with it.

use serde_yaml::{Mapping, Value};

use super::path::{NodePath, Segment};

/// Head and line comments attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    /// Full comment lines (including the leading `#`) above the node.
    pub head: Vec<String>,
    /// Trailing comment (including the leading `#`) on the node's line.
    pub line: Option<String>,
}

impl Comments {
    /// Returns true if neither comment is set.
    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.line.is_none()
    }
}

/// The shape of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Null, bool, number, or string. `raw` keeps the source spelling of
    /// single-line scalars so untouched values are written back verbatim.
    Scalar { value: Value, raw: Option<String> },
    /// Ordered key/value entries.
    Mapping(Vec<(String, Node)>),
    /// Ordered items.
    Sequence(Vec<Node>),
}

/// A YAML node with its comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub comments: Comments,
    /// Explicit tag such as `!!binary`.
    pub tag: Option<String>,
    /// Collection was written in flow style (`[a, b]`, `{a: b}`).
    pub flow: bool,
}

impl Node {
    /// A scalar node without source spelling.
    pub fn scalar(value: Value) -> Self {
        Self::from_kind(NodeKind::Scalar { value, raw: None })
    }

    /// A scalar that remembers how it was spelled in the source.
    pub(crate) fn scalar_with_raw(value: Value, raw: Option<String>) -> Self {
        Self::from_kind(NodeKind::Scalar { value, raw })
    }

    /// A string scalar.
    pub fn string(s: impl Into<String>) -> Self {
        Self::scalar(Value::String(s.into()))
    }

    /// A null scalar written as an empty value (`key:`).
    pub fn empty() -> Self {
        Self::from_kind(NodeKind::Scalar {
            value: Value::Null,
            raw: Some(String::new()),
        })
    }

    /// An empty block mapping.
    pub fn mapping() -> Self {
        Self::from_kind(NodeKind::Mapping(Vec::new()))
    }

    /// A block sequence of the given items.
    pub fn sequence(items: Vec<Node>) -> Self {
        Self::from_kind(NodeKind::Sequence(items))
    }

    fn from_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            comments: Comments::default(),
            tag: None,
            flow: false,
        }
    }

    /// Builds a comment-free node tree from a plain YAML value.
    pub fn from_value(value: &Value) -> Self {
        Self::from_value_with_style(value, false)
    }

    /// Builds a node tree from a flow collection parsed elsewhere.
    pub(crate) fn from_flow_value(value: &Value) -> Self {
        Self::from_value_with_style(value, true)
    }

    fn from_value_with_style(value: &Value, flow: bool) -> Self {
        match value {
            Value::Mapping(map) => {
                let entries = map
                    .iter()
                    .map(|(k, v)| (key_text(k), Self::from_value_with_style(v, flow)))
                    .collect();
                Self {
                    flow,
                    ..Self::from_kind(NodeKind::Mapping(entries))
                }
            }
            Value::Sequence(items) => {
                let items = items
                    .iter()
                    .map(|v| Self::from_value_with_style(v, flow))
                    .collect();
                Self {
                    flow,
                    ..Self::from_kind(NodeKind::Sequence(items))
                }
            }
            Value::Tagged(tagged) => {
                let mut node = Self::from_value_with_style(&tagged.value, flow);
                node.tag = Some(tagged.tag.to_string());
                node
            }
            scalar => Self::scalar(scalar.clone()),
        }
    }

    /// Converts the tree back into a plain YAML value. Tags are dropped.
    pub fn to_value(&self) -> Value {
        match &self.kind {
            NodeKind::Scalar { value, .. } => value.clone(),
            NodeKind::Mapping(entries) => {
                let mut map = Mapping::new();
                for (k, v) in entries {
                    map.insert(Value::String(k.clone()), v.to_value());
                }
                Value::Mapping(map)
            }
            NodeKind::Sequence(items) => {
                Value::Sequence(items.iter().map(Node::to_value).collect())
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(&self.kind, NodeKind::Scalar { value: Value::Null, .. })
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, NodeKind::Sequence(_))
    }

    /// Returns the string value of a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar {
                value: Value::String(s),
                ..
            } => Some(s),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&[(String, Node)]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a mapping entry.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        match &mut self.kind {
            NodeKind::Mapping(entries) => entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Follows a path from this node.
    pub fn at(&self, path: &NodePath) -> Option<&Node> {
        path.segments().iter().try_fold(self, |node, seg| match seg {
            Segment::Key(k) => node.get(k),
            Segment::Index(i) => node.items()?.get(*i),
        })
    }

    pub fn at_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        let mut node = self;
        for seg in path.segments() {
            node = match seg {
                Segment::Key(k) => node.get_mut(k)?,
                Segment::Index(i) => match &mut node.kind {
                    NodeKind::Sequence(items) => items.get_mut(*i)?,
                    _ => return None,
                },
            };
        }
        Some(node)
    }

    /// True if this node or any descendant carries comments.
    pub fn has_comments(&self) -> bool {
        if !self.comments.is_empty() {
            return true;
        }
        match &self.kind {
            NodeKind::Scalar { .. } => false,
            NodeKind::Mapping(entries) => entries.iter().any(|(_, v)| v.has_comments()),
            NodeKind::Sequence(items) => items.iter().any(Node::has_comments),
        }
    }

    /// Removes all comments from this node and its descendants.
    pub fn strip_comments(&mut self) {
        self.comments = Comments::default();
        match &mut self.kind {
            NodeKind::Scalar { .. } => {}
            NodeKind::Mapping(entries) => entries.iter_mut().for_each(|(_, v)| v.strip_comments()),
            NodeKind::Sequence(items) => items.iter_mut().for_each(Node::strip_comments),
        }
    }
}

/// Mapping keys are kept as text; non-string scalar keys use their YAML spelling.
fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Recursively removes tags so values compare by content only.
pub(crate) fn untag(value: Value) -> Value {
    match value {
        Value::Tagged(tagged) => untag(tagged.value),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(untag).collect()),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (Value::String(key_text(&k)), untag(v)))
                .collect(),
        ),
        other => other,
    }
}
