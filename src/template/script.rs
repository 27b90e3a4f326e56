//! Inlining of provisioning and probe scripts.

use base64::Engine as _;
use tracing::info;

use super::{Stage, Template};
use crate::config::LocatorWithDigest;
use crate::error::Result;
use crate::fetch::FetchContext;
use crate::locator::TEMPLATE_SCHEME;
use crate::yaml::{Edit, Node, NodePath};

/// Longest line (newline included) written as plain text. Longer lines
/// make the script go out base64 encoded.
pub const MAX_LINE_LENGTH: usize = 65000;

/// Line width of base64 encoded scripts.
pub const BASE64_CHUNK_LENGTH: usize = 76;

impl Template {
    /// Replaces `file` references in `probes` and `provision` with the
    /// script text, under `script` (or `content` for `mode: data`).
    ///
    /// Entries that already carry a script are left alone. `template://`
    /// scripts are only inlined when `embed_all` is set.
    pub(super) fn embed_all_scripts(&mut self, ctx: &FetchContext, embed_all: bool) -> Result<()> {
        self.enter(Stage::EmbeddingScripts);
        let config = self.config()?;

        let mut pending: Vec<(&str, usize, &str, LocatorWithDigest)> = Vec::new();
        for (i, probe) in config.probes.iter().enumerate() {
            let Some(file) = &probe.file else { continue };
            if probe.script.as_deref().is_some_and(|s| !s.is_empty()) {
                continue;
            }
            pending.push(("probes", i, "script", file.clone()));
        }
        for (i, provision) in config.provision.iter().enumerate() {
            let Some(file) = &provision.file else { continue };
            let key = if provision.is_data() {
                if provision.content.is_some() {
                    continue;
                }
                "content"
            } else {
                if provision.script.as_deref().is_some_and(|s| !s.is_empty()) {
                    continue;
                }
                "script"
            };
            pending.push(("provision", i, key, file.clone()));
        }

        for (list, index, key, file) in pending {
            if !embed_all && file.url.starts_with(TEMPLATE_SCHEME) {
                continue;
            }
            ctx.check(&file.url)?;
            let script = Template::fetch_entry(ctx, &file)?;
            let path = NodePath::root().key(list).index(index).key("file");
            self.queue(Edit::Set {
                path: path.clone(),
                node: script_node(&file.url, script.bytes()),
                keep_comments: true,
            });
            self.queue(Edit::Rename {
                path,
                to: key.to_string(),
            });
        }
        self.eval_edits()
    }
}

/// The node holding script text: a plain string, or `!!binary` base64 when
/// the text would not survive as YAML.
fn script_node(file: &str, bytes: &[u8]) -> Node {
    match encode_script_reason(bytes) {
        None => Node::string(String::from_utf8_lossy(bytes).into_owned()),
        Some(reason) => {
            info!("File {file:?} is being base64 encoded: {reason}");
            let mut node = Node::string(binary_string(bytes));
            node.tag = Some("!!binary".to_string());
            node
        }
    }
}

/// Why `script` has to be base64 encoded, or `None` if it can be written
/// as text.
pub fn encode_script_reason(script: &[u8]) -> Option<String> {
    line_limited_reason(script, MAX_LINE_LENGTH)
}

fn line_limited_reason(script: &[u8], max_line_length: usize) -> Option<String> {
    let text = match std::str::from_utf8(script) {
        Ok(text) => text,
        Err(err) => return Some(format!("invalid UTF-8 at offset {}", err.valid_up_to())),
    };
    let mut start = 0;
    let mut line = 1;
    for (i, c) in text.char_indices() {
        if !(is_printable(c) || matches!(c, '\n' | '\r' | '\t')) {
            return Some(format!("unprintable character {c:?} at offset {i}"));
        }
        if i - start >= max_line_length {
            return Some(format!(
                "line {line} (offset {start}) is longer than {max_line_length} characters"
            ));
        }
        if c == '\n' {
            line += 1;
            start = i + 1;
        }
    }
    None
}

/// Graphic characters and the ASCII space.
fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !(c.is_control()
        || c.is_whitespace()
        || matches!(c, '\u{200b}'..='\u{200f}' | '\u{202a}'..='\u{202e}' | '\u{2060}'..='\u{2064}' | '\u{feff}'))
}

/// Base64 encodes `bytes`, broken into lines of [`BASE64_CHUNK_LENGTH`]
/// characters when it doesn't fit on one.
pub fn binary_string(bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    if encoded.len() <= BASE64_CHUNK_LENGTH {
        return encoded;
    }
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_CHUNK_LENGTH + 1);
    for chunk in encoded.as_bytes().chunks(BASE64_CHUNK_LENGTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out
}
