//! Merging a base template into a template.
//!
//! Settings the template doesn't have are copied from the base together
//! with their comments. Lists present on both sides are concatenated; base
//! `provision` and `probes` entries run first, so they are prepended. A
//! template `dns` list replaces the base list instead of extending it.

use tracing::{debug, warn};

use super::{Stage, Template};
use crate::config::is_newer_version;
use crate::error::Result;
use crate::yaml::{Edit, Node, NodePath, Position};

/// Version fields where the higher of the two values wins.
const VERSION_FIELDS: &[&str] = &["minimumLimaVersion", "vmOpts.qemu.minimumVersion"];

impl Template {
    /// Merges `base` into this template and drops the first `base` entry,
    /// which is the one being merged.
    pub fn merge(&mut self, base: &mut Template) -> Result<()> {
        let result = self.merge_impl(base);
        self.clear_on_error(result)
    }

    pub(super) fn merge_impl(&mut self, base: &mut Template) -> Result<()> {
        self.enter(Stage::MergingBases);
        debug!(template = %self.locator, base = %base.locator, "Merging base template");
        self.merge_versions(base)?;

        let target = self.document()?;
        let source = base.document()?;
        let mut edits = Vec::new();
        base_edits(&mut edits, &target.root, &source.root);
        fill(&mut edits, &NodePath::root(), &target.root, &source.root);
        edits.push(Edit::Dedup {
            path: NodePath::root().key("mountTypesUnsupported"),
        });
        edits.push(Edit::CopyFootComment);

        self.edits.extend(edits);
        self.apply_edits(target, &source)
    }

    /// Keeps the higher minimum version when both sides set one.
    fn merge_versions(&mut self, base: &mut Template) -> Result<()> {
        let ours = versions(self)?;
        let theirs = versions(base)?;
        for ((field, current), candidate) in VERSION_FIELDS.iter().zip(ours).zip(theirs) {
            let (Some(current), Some(candidate)) = (current, candidate) else {
                continue;
            };
            match is_newer_version(&candidate, &current) {
                Some(true) => {
                    let path = NodePath::root().field(field);
                    self.queue(Edit::Copy {
                        dst: path.clone(),
                        src: path,
                        comments: true,
                    });
                }
                Some(false) => {}
                None => warn!(
                    locator = %self.locator,
                    "Cannot compare {field} {current:?} with {candidate:?} from {}; keeping {current:?}",
                    base.locator
                ),
            }
        }
        Ok(())
    }
}

fn versions(tmpl: &mut Template) -> Result<[Option<String>; 2]> {
    let config = tmpl.config()?;
    Ok([
        config.minimum_lima_version.clone(),
        config.minimum_qemu_version().map(str::to_string),
    ])
}

/// Drops the base being merged from the template's `base` list and adds
/// the base's own bases in its place.
fn base_edits(edits: &mut Vec<Edit>, target: &Node, source: &Node) {
    let path = NodePath::root().key("base");
    let remaining = target
        .get("base")
        .and_then(Node::items)
        .map_or(0, |items| items.len().saturating_sub(1));
    let inherited = source.get("base").is_some_and(|b| !b.is_null());

    if remaining > 0 {
        edits.push(Edit::Remove {
            path: path.clone().index(0),
        });
        if inherited {
            edits.push(Edit::Extend {
                path: path.clone(),
                src: path,
                position: Position::Prepend,
            });
        }
        return;
    }

    edits.push(Edit::Remove { path: path.clone() });
    if inherited {
        edits.push(Edit::Copy {
            dst: path.clone(),
            src: path,
            comments: true,
        });
    }
}

/// Copies the mapping entries of `source` that `target` lacks, descending
/// into mappings present on both sides and extending shared lists.
fn fill(edits: &mut Vec<Edit>, path: &NodePath, target: &Node, source: &Node) {
    let Some(entries) = source.entries() else {
        return;
    };
    for (key, value) in entries {
        if path.is_root() && (key == "base" || (key == "dns" && target.get("dns").is_some())) {
            continue;
        }
        let child = path.clone().key(key.as_str());
        match target.get(key) {
            None => edits.push(Edit::Copy {
                dst: child.clone(),
                src: child,
                comments: true,
            }),
            Some(existing) if existing.is_mapping() && value.is_mapping() => {
                edits.push(Edit::CopyComments {
                    dst: child.clone(),
                    src: child.clone(),
                });
                fill(edits, &child, existing, value);
            }
            Some(existing) if existing.is_sequence() && value.is_sequence() => {
                let position = match child.top_key() {
                    Some("provision" | "probes") => Position::Prepend,
                    _ => Position::Append,
                };
                edits.push(Edit::Extend {
                    path: child.clone(),
                    src: child.clone(),
                    position,
                });
                edits.push(Edit::CopyComments {
                    dst: child.clone(),
                    src: child,
                });
            }
            Some(_) => {}
        }
    }
}
