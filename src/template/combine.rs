//! Combining list entries that share a key.
//!
//! After merging, `additionalDisks`, `mounts` and `networks` may hold
//! several entries for the same disk, mount point, or interface. Fields the
//! earlier entry leaves unset are filled in from the later one, and the later
//! one is removed. An entry keyed `*` fills in every entry before it.

use std::collections::HashMap;

use super::{Stage, Template};
use crate::config::{Disk, Mount, Network};
use crate::error::Result;
use crate::yaml::{Edit, NodePath};

const WILDCARD: &str = "*";

impl Template {
    /// Folds duplicate and wildcard list entries into their earlier siblings.
    pub fn combine_list_entries(&mut self) -> Result<()> {
        let result = self.combine_list_entries_impl();
        self.clear_on_error(result)
    }

    pub(super) fn combine_list_entries_impl(&mut self) -> Result<()> {
        self.enter(Stage::Combining);
        let config = self.config()?;
        let mut edits = Vec::new();
        combine(
            "additionalDisks",
            &config.additional_disks,
            |disk: &Disk| disk.name.as_str(),
            &[""],
            fill_disk,
            &mut edits,
        );
        combine(
            "mounts",
            &config.mounts,
            Mount::target,
            &["", "sshfs", "9p", "virtiofs"],
            fill_mount,
            &mut edits,
        );
        combine(
            "networks",
            &config.networks,
            |network: &Network| network.interface.as_deref().unwrap_or_default(),
            &[""],
            fill_network,
            &mut edits,
        );
        self.edits.extend(edits);
        self.eval_edits()
    }
}

/// Edits that move fields from entry `src` into entry `dst`.
///
/// Indices refer to the list as it was before combining; removals are
/// queued after all copies, highest index first, so they stay valid.
struct EntryEdits<'a> {
    list: &'static str,
    dst: usize,
    src: usize,
    promote_key: Option<&'static str>,
    edits: &'a mut Vec<Edit>,
}

impl EntryEdits<'_> {
    fn item(&self, idx: usize) -> NodePath {
        NodePath::root().key(self.list).index(idx)
    }

    fn copy(&mut self, field: &str) {
        if let Some(key) = self.promote_key.take() {
            self.edits.push(Edit::Promote {
                path: self.item(self.dst),
                key: key.to_string(),
            });
        }
        self.edits.push(Edit::Copy {
            dst: self.item(self.dst).field(field),
            src: self.item(self.src).field(field),
            comments: true,
        });
    }

    fn copy_comments(&mut self, field: &str) {
        let (mut dst, mut src) = (self.item(self.dst), self.item(self.src));
        if !field.is_empty() {
            dst = dst.field(field);
            src = src.field(field);
        }
        self.edits.push(Edit::CopyComments { dst, src });
    }
}

fn combine<T: Clone>(
    list: &'static str,
    entries: &[T],
    key: impl Fn(&T) -> &str,
    comment_fields: &[&str],
    fill: impl Fn(&mut T, &T, &mut EntryEdits<'_>),
    edits: &mut Vec<Edit>,
) {
    let promote_key = (list == "additionalDisks").then_some("name");
    let mut survivors: Vec<(usize, T)> = Vec::with_capacity(entries.len());
    let mut by_key: HashMap<&str, usize> = HashMap::new();
    let mut removed = Vec::new();

    for (src, entry) in entries.iter().enumerate() {
        let entry_key = key(entry);
        let targets: Vec<usize> = if entry_key == WILDCARD {
            (0..survivors.len()).collect()
        } else if let Some(&pos) = by_key.get(entry_key) {
            vec![pos]
        } else {
            if !entry_key.is_empty() {
                by_key.insert(entry_key, survivors.len());
            }
            survivors.push((src, entry.clone()));
            continue;
        };

        for pos in targets {
            let (dst, dest) = &mut survivors[pos];
            let mut entry_edits = EntryEdits {
                list,
                dst: *dst,
                src,
                promote_key,
                edits: &mut *edits,
            };
            fill(dest, entry, &mut entry_edits);
            if entry_key != WILDCARD {
                for field in comment_fields {
                    entry_edits.copy_comments(field);
                }
            }
        }
        removed.push(src);
    }

    for src in removed.into_iter().rev() {
        edits.push(Edit::Remove {
            path: NodePath::root().key(list).index(src),
        });
    }
}

/// Copies `src` into `dst` (and queues the edit) when `dst` is unset.
fn fill_option<V: Clone>(dst: &mut Option<V>, src: &Option<V>, field: &str, e: &mut EntryEdits<'_>) {
    if dst.is_none() && src.is_some() {
        e.copy(field);
        *dst = src.clone();
    }
}

fn fill_disk(dest: &mut Disk, disk: &Disk, e: &mut EntryEdits<'_>) {
    fill_option(&mut dest.format, &disk.format, "format", e);
    fill_option(&mut dest.fs_type, &disk.fs_type, "fsType", e);
    // inherited all-or-nothing, never appended
    if dest.fs_args.is_empty() && !disk.fs_args.is_empty() {
        e.copy("fsArgs");
        dest.fs_args = disk.fs_args.clone();
    }
}

fn fill_mount(dest: &mut Mount, mount: &Mount, e: &mut EntryEdits<'_>) {
    fill_option(&mut dest.mount_point, &mount.mount_point, "mountPoint", e);
    fill_option(&mut dest.writable, &mount.writable, "writable", e);
    fill_option(&mut dest.sshfs.cache, &mount.sshfs.cache, "sshfs.cache", e);
    fill_option(&mut dest.sshfs.follow_symlinks, &mount.sshfs.follow_symlinks, "sshfs.followSymlinks", e);
    fill_option(&mut dest.sshfs.sftp_driver, &mount.sshfs.sftp_driver, "sshfs.sftpDriver", e);
    fill_option(&mut dest.nine_p.security_model, &mount.nine_p.security_model, "9p.securityModel", e);
    fill_option(&mut dest.nine_p.protocol_version, &mount.nine_p.protocol_version, "9p.protocolVersion", e);
    fill_option(&mut dest.nine_p.msize, &mount.nine_p.msize, "9p.msize", e);
    fill_option(&mut dest.nine_p.cache, &mount.nine_p.cache, "9p.cache", e);
    fill_option(&mut dest.virtiofs.queue_size, &mount.virtiofs.queue_size, "virtiofs.queueSize", e);
}

fn is_unset(value: &Option<String>) -> bool {
    value.as_deref().unwrap_or_default().is_empty()
}

fn fill_network(dest: &mut Network, network: &Network, e: &mut EntryEdits<'_>) {
    // lima and socket are mutually exclusive
    if is_unset(&dest.lima) && is_unset(&dest.socket) {
        if !is_unset(&network.lima) {
            e.copy("lima");
            dest.lima = network.lima.clone();
        }
        if !is_unset(&network.socket) {
            e.copy("socket");
            dest.socket = network.socket.clone();
        }
    }
    if is_unset(&dest.mac_address) && !is_unset(&network.mac_address) {
        e.copy("macAddress");
        dest.mac_address = network.mac_address.clone();
    }
    fill_option(&mut dest.vz_nat, &network.vz_nat, "vzNAT", e);
    fill_option(&mut dest.metric, &network.metric, "metric", e);
}
