//! Absolute locators.
//!
//! Relative `base` and script `file` references are resolved against the
//! directory of the template's own locator, so the template can be copied
//! anywhere and still refer to the same files.

use std::path::Path;

use url::Url;

use super::{Stage, Template};
use crate::error::{Result, TemplateError};
use crate::locator::{is_url, url_scheme};
use crate::yaml::{Edit, Node, NodeKind, NodePath};

impl Template {
    /// Rewrites every relative base and script reference as an absolute one.
    pub fn use_abs_locators(&mut self) -> Result<()> {
        let result = self.use_abs_locators_impl();
        self.clear_on_error(result)
    }

    pub(super) fn use_abs_locators_impl(&mut self) -> Result<()> {
        self.enter(Stage::Normalizing);
        self.config()?;
        let doc = self.document()?;
        let base_path = base_path(&self.locator)?;

        let mut edits = Vec::new();
        match doc.root.get("base") {
            Some(node) if node.is_sequence() => {
                for (i, item) in node.items().unwrap_or_default().iter().enumerate() {
                    locator_edit(&mut edits, NodePath::root().key("base").index(i), item, &base_path)?;
                }
            }
            Some(node) => locator_edit(&mut edits, NodePath::root().key("base"), node, &base_path)?,
            None => {}
        }
        for list in ["probes", "provision"] {
            let items = doc.root.get(list).and_then(Node::items).unwrap_or_default();
            for (i, item) in items.iter().enumerate() {
                if let Some(file) = item.get("file") {
                    let path = NodePath::root().key(list).index(i).key("file");
                    locator_edit(&mut edits, path, file, &base_path)?;
                }
            }
        }

        self.edits.extend(edits);
        self.eval_edits()
    }
}

/// Queues a rewrite of the locator at `path` (a string, or a mapping with
/// a `url`) unless it is already absolute.
fn locator_edit(edits: &mut Vec<Edit>, path: NodePath, node: &Node, base_path: &str) -> Result<()> {
    let (path, current) = match &node.kind {
        NodeKind::Mapping(_) => match node.get("url").and_then(Node::as_str) {
            Some(url) => (path.key("url"), url),
            None => return Ok(()),
        },
        _ => match node.as_str() {
            Some(url) => (path, url),
            None => return Ok(()),
        },
    };
    let absolute = abs_path(current, base_path)?;
    if absolute != current {
        edits.push(Edit::Set {
            path,
            node: Node::string(absolute),
            keep_comments: true,
        });
    }
    Ok(())
}

/// The absolute form of `locator` without its file name part.
///
/// URLs keep their scheme (`https://host/dir/a.yaml` becomes
/// `https://host/dir`); local paths are made absolute against the current
/// directory. Stdin (`-`) has no directory and stays `-`.
pub fn base_path(locator: &str) -> Result<String> {
    if locator == "-" {
        return Ok("-".to_string());
    }
    if is_url(locator) {
        let scheme = url_scheme(locator).unwrap_or_default();
        let rest = &locator[scheme.len() + 1..];
        let rest = rest.strip_prefix("//").unwrap_or(rest);
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let cleaned = clean_path(rest);
        return Ok(format!("{scheme}://{}", parent(&cleaned)));
    }
    let dir = match Path::new(locator).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => ".".into(),
    };
    let dir = if dir.is_absolute() {
        dir
    } else {
        std::env::current_dir()?.join(dir)
    };
    Ok(clean_path(&dir.to_string_lossy()))
}

/// Resolves `locator` against `base_path` unless it is already absolute.
///
/// Relative locators must not contain `../`, and cannot be resolved when
/// the template came from stdin.
pub fn abs_path(locator: &str, base_path: &str) -> Result<String> {
    let invalid = |message: String| TemplateError::InvalidLocator {
        locator: locator.to_string(),
        message,
    };
    if locator.is_empty() {
        return Err(invalid("locator is empty".to_string()));
    }
    if is_url(locator) {
        return Ok(locator.to_string());
    }

    let volume_len = volume_len(locator);
    let rooted = locator[volume_len..].starts_with(['/', '\\']);
    if rooted {
        return Ok(clean_path(locator));
    }
    if base_path.is_empty() {
        return Err(invalid("basePath is empty".to_string()));
    }
    if base_path == "-" {
        return Err(TemplateError::AnchorlessRelative {
            locator: locator.to_string(),
        });
    }
    if locator.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(TemplateError::Traversal {
            locator: locator.to_string(),
        });
    }
    if volume_len != 0 {
        return Err(invalid(format!(
            "relative locator path {locator:?} must not include a volume name"
        )));
    }

    let relative = clean_path(locator);
    if is_url(base_path) {
        if let Some(joined) = join_url(base_path, &relative) {
            return Ok(joined);
        }
        let separator = if base_path.ends_with('/') { "" } else { "/" };
        return Ok(format!("{base_path}{separator}{relative}"));
    }
    Ok(clean_path(&format!("{base_path}/{relative}")))
}

/// Appends path segments to a URL anchor. `None` for anchors without a host
/// or path, such as `template://`, which the url crate cannot extend.
fn join_url(base: &str, relative: &str) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    if url.host_str().unwrap_or_default().is_empty() && url.path().is_empty() {
        return None;
    }
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(relative.split('/'));
    Some(url.to_string())
}

/// The absolute form of a template's own locator; URLs are kept as is.
pub(super) fn absolute_locator(locator: &str) -> Result<String> {
    if is_url(locator) || locator == "-" {
        return Ok(locator.to_string());
    }
    let path = Path::new(locator);
    if path.is_absolute() {
        return Ok(clean_path(locator));
    }
    let cwd = std::env::current_dir()?;
    Ok(clean_path(&cwd.join(path).to_string_lossy()))
}

/// Length of a Windows drive prefix such as `C:`.
fn volume_len(locator: &str) -> usize {
    let bytes = locator.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        2
    } else {
        0
    }
}

/// Lexically cleans a slash-separated path: collapses repeated separators,
/// drops `.` segments, and resolves `..` where possible.
pub fn clean_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Directory part of a cleaned path; empty when there is none.
fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "",
    }
}
