//! Paths into a YAML document, e.g. `mounts[2].sshfs.cache`.

use std::fmt;

/// One step of a [`NodePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a node relative to the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<Segment>);

impl NodePath {
    /// The document root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Appends a mapping key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(Segment::Key(key.into()));
        self
    }

    /// Appends a sequence index.
    pub fn index(mut self, idx: usize) -> Self {
        self.0.push(Segment::Index(idx));
        self
    }

    /// Appends a dotted field path such as `sshfs.cache`. An empty field is a no-op.
    pub fn field(self, dotted: &str) -> Self {
        dotted
            .split('.')
            .filter(|s| !s.is_empty())
            .fold(self, |path, key| path.key(key))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits off the last segment.
    pub fn split_last(&self) -> Option<(NodePath, &Segment)> {
        let (last, parent) = self.0.split_last()?;
        Some((NodePath(parent.to_vec()), last))
    }

    /// The first key of the path, if the path starts with one.
    pub fn top_key(&self) -> Option<&str> {
        match self.0.first() {
            Some(Segment::Key(k)) => Some(k),
            _ => None,
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, ".");
        }
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                Segment::Key(k) if i == 0 => write!(f, "{k}")?,
                Segment::Key(k) => write!(f, ".{k}")?,
                Segment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}
