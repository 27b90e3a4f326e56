//! Structural edits applied to a [`Document`](super::Document).
//!
//! Edits are applied in order against the target document. Paths in edits
//! that read from elsewhere (`Copy`, `CopyComments`, `Extend`) resolve
//! against a separate, unchanging source document.

use anyhow::{anyhow, bail};

use super::node::{Comments, Node, NodeKind};
use super::path::{NodePath, Segment};

/// Where [`Edit::Extend`] puts the source items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Append,
    Prepend,
}

/// A single change to a document.
#[derive(Debug, Clone)]
pub enum Edit {
    /// Replaces or creates the node at `path`, creating intermediate mappings.
    /// With `keep_comments`, comments already on the replaced node carry over.
    Set {
        path: NodePath,
        node: Node,
        keep_comments: bool,
    },
    /// Copies the source node at `src` to `dst`. Without `comments` the copy
    /// is stripped of its comments and keeps any already at `dst`.
    Copy {
        dst: NodePath,
        src: NodePath,
        comments: bool,
    },
    /// Copies the head and line comments of `src` onto `dst`, each one only
    /// where `dst` has none.
    CopyComments { dst: NodePath, src: NodePath },
    /// Adds the items of the source list at `src` to the list at `path`.
    /// Non-list values on either side are treated as one-element lists.
    Extend {
        path: NodePath,
        src: NodePath,
        position: Position,
    },
    /// Inserts `node` into the list at `path`, creating the list if needed.
    Insert {
        path: NodePath,
        index: usize,
        node: Node,
    },
    /// Removes a mapping entry or list item.
    Remove { path: NodePath },
    /// Turns the scalar list item at `path` into a mapping `{key: scalar}`.
    Promote { path: NodePath, key: String },
    /// Renames the mapping key at `path`, keeping its position and comments.
    Rename { path: NodePath, to: String },
    /// Removes repeated values from the list at `path`, keeping first occurrences.
    Dedup { path: NodePath },
    /// Copies the source document's foot comment if the target has none.
    CopyFootComment,
}

pub(crate) fn apply(
    root: &mut Node,
    foot: &mut Vec<String>,
    edit: &Edit,
    source: &Node,
    source_foot: &[String],
) -> anyhow::Result<()> {
    match edit {
        Edit::Set {
            path,
            node,
            keep_comments,
        } => {
            let mut node = node.clone();
            if *keep_comments {
                if let Some(existing) = root.at(path) {
                    inherit_comments(&mut node.comments, &existing.comments);
                }
            }
            set_at(root, path, node)
        }
        Edit::Copy { dst, src, comments } => {
            let Some(found) = source.at(src) else {
                return Ok(());
            };
            let mut node = found.clone();
            if !*comments {
                node.strip_comments();
                if let Some(existing) = root.at(dst) {
                    node.comments = existing.comments.clone();
                }
            }
            set_at(root, dst, node)
        }
        Edit::CopyComments { dst, src } => {
            let (Some(from), Some(to)) = (source.at(src), root.at_mut(dst)) else {
                return Ok(());
            };
            inherit_comments(&mut to.comments, &from.comments);
            Ok(())
        }
        Edit::Extend {
            path,
            src,
            position,
        } => {
            let Some(found) = source.at(src) else {
                return Ok(());
            };
            let items = match &found.kind {
                NodeKind::Sequence(items) => items.clone(),
                _ => vec![found.clone()],
            };
            let Some(target) = root.at_mut(path) else {
                return set_at(root, path, Node::sequence(items));
            };
            let list = as_list(target)?;
            match position {
                Position::Append => list.extend(items),
                Position::Prepend => {
                    list.splice(0..0, items);
                }
            }
            Ok(())
        }
        Edit::Insert { path, index, node } => {
            let Some(target) = root.at_mut(path) else {
                return set_at(root, path, Node::sequence(vec![node.clone()]));
            };
            let list = as_list(target)?;
            let index = (*index).min(list.len());
            list.insert(index, node.clone());
            Ok(())
        }
        Edit::Remove { path } => {
            remove_at(root, path);
            Ok(())
        }
        Edit::Promote { path, key } => {
            let item = root
                .at_mut(path)
                .ok_or_else(|| anyhow!("no list item at {path}"))?;
            if item.is_mapping() {
                return Ok(());
            }
            let mut value = std::mem::replace(item, Node::mapping());
            item.comments.head = std::mem::take(&mut value.comments.head);
            item.kind = NodeKind::Mapping(vec![(key.clone(), value)]);
            Ok(())
        }
        Edit::Rename { path, to } => {
            let Some((parent, Segment::Key(from))) = path.split_last() else {
                bail!("cannot rename {path}: not a mapping key");
            };
            let Some(NodeKind::Mapping(entries)) = root.at_mut(&parent).map(|n| &mut n.kind) else {
                bail!("cannot rename {path}: parent is not a mapping");
            };
            entries.retain(|(k, _)| k != to || k == from);
            if let Some(entry) = entries.iter_mut().find(|(k, _)| k == from) {
                entry.0 = to.clone();
            }
            Ok(())
        }
        Edit::Dedup { path } => {
            if let Some(NodeKind::Sequence(items)) = root.at_mut(path).map(|n| &mut n.kind) {
                let mut seen = Vec::new();
                items.retain(|item| {
                    let value = item.to_value();
                    if seen.contains(&value) {
                        false
                    } else {
                        seen.push(value);
                        true
                    }
                });
            }
            Ok(())
        }
        Edit::CopyFootComment => {
            if foot.is_empty() {
                *foot = source_foot.to_vec();
            }
            Ok(())
        }
    }
}

fn inherit_comments(to: &mut Comments, from: &Comments) {
    if to.head.is_empty() && !from.head.is_empty() {
        to.head = from.head.clone();
    }
    if to.line.is_none() && from.line.is_some() {
        to.line = from.line.clone();
    }
}

/// Views `node` as a list, wrapping a scalar or mapping into a one-item list.
fn as_list(node: &mut Node) -> anyhow::Result<&mut Vec<Node>> {
    if !node.is_sequence() {
        let mut old = std::mem::replace(node, Node::sequence(Vec::new()));
        node.comments = std::mem::take(&mut old.comments);
        if !old.is_null() {
            if let NodeKind::Sequence(items) = &mut node.kind {
                items.push(old);
            }
        }
    }
    match &mut node.kind {
        NodeKind::Sequence(items) => Ok(items),
        _ => bail!("expected a list"),
    }
}

fn set_at(root: &mut Node, path: &NodePath, node: Node) -> anyhow::Result<()> {
    let Some((parent_path, last)) = path.split_last() else {
        *root = node;
        return Ok(());
    };
    let parent = ensure(root, parent_path.segments())?;
    match last {
        Segment::Key(key) => {
            let entries = as_mapping(parent)?;
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = node,
                None => entries.push((key.clone(), node)),
            }
        }
        Segment::Index(idx) => match &mut parent.kind {
            NodeKind::Sequence(items) if *idx < items.len() => items[*idx] = node,
            NodeKind::Sequence(items) if *idx == items.len() => items.push(node),
            _ => bail!("no list item at {path}"),
        },
    }
    Ok(())
}

/// Walks `segments`, creating mappings for missing keys.
fn ensure<'a>(node: &'a mut Node, segments: &[Segment]) -> anyhow::Result<&'a mut Node> {
    let Some((first, rest)) = segments.split_first() else {
        return Ok(node);
    };
    let child = match first {
        Segment::Key(key) => {
            let entries = as_mapping(node)?;
            let pos = match entries.iter().position(|(k, _)| k == key) {
                Some(pos) => pos,
                None => {
                    entries.push((key.clone(), Node::mapping()));
                    entries.len() - 1
                }
            };
            &mut entries[pos].1
        }
        Segment::Index(idx) => match &mut node.kind {
            NodeKind::Sequence(items) => items
                .get_mut(*idx)
                .ok_or_else(|| anyhow!("list index {idx} out of range"))?,
            _ => bail!("expected a list before index {idx}"),
        },
    };
    ensure(child, rest)
}

/// Views `node` as a mapping, replacing a non-mapping value with an empty one.
fn as_mapping(node: &mut Node) -> anyhow::Result<&mut Vec<(String, Node)>> {
    if !node.is_mapping() {
        let comments = std::mem::take(&mut node.comments);
        *node = Node::mapping();
        node.comments = comments;
    }
    match &mut node.kind {
        NodeKind::Mapping(entries) => Ok(entries),
        _ => bail!("expected a mapping"),
    }
}

fn remove_at(root: &mut Node, path: &NodePath) -> Option<Node> {
    let (parent_path, last) = path.split_last()?;
    let parent = root.at_mut(&parent_path)?;
    match (&mut parent.kind, last) {
        (NodeKind::Mapping(entries), Segment::Key(key)) => {
            let pos = entries.iter().position(|(k, _)| k == key)?;
            Some(entries.remove(pos).1)
        }
        (NodeKind::Sequence(items), Segment::Index(idx)) if *idx < items.len() => {
            Some(items.remove(*idx))
        }
        _ => None,
    }
}
