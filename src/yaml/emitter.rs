//! Writes a node tree back to block-style YAML.

use serde_yaml::Value;

use super::node::{Node, NodeKind};

const INDENT: usize = 2;

/// Renders a document root and its foot comments.
pub(crate) fn emit(root: &Node, foot: &[String]) -> String {
    let mut out = Emitter::default();
    for comment in &root.comments.head {
        out.line(0, comment);
    }
    match &root.kind {
        NodeKind::Mapping(entries) if entries.is_empty() => {
            if foot.is_empty() {
                out.line(0, "{}");
            }
        }
        NodeKind::Mapping(_) => out.mapping(root, 0),
        NodeKind::Sequence(items) if !items.is_empty() => out.sequence(root, 0),
        _ => out.value(String::new(), root, 0),
    }
    for comment in foot {
        out.line(0, comment);
    }
    out.buf
}

#[derive(Default)]
struct Emitter {
    buf: String,
}

impl Emitter {
    fn line(&mut self, indent: usize, text: &str) {
        self.buf.push_str(&" ".repeat(indent));
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    fn line_with_comment(&mut self, indent: usize, text: &str, comment: Option<&str>) {
        match comment {
            Some(comment) if text.is_empty() => self.line(indent, comment),
            Some(comment) => self.line(indent, &format!("{text} {comment}")),
            None => self.line(indent, text),
        }
    }

    fn mapping(&mut self, node: &Node, indent: usize) {
        let Some(entries) = node.entries() else {
            return;
        };
        for (key, value) in entries {
            for comment in &value.comments.head {
                self.line(indent, comment);
            }
            self.value(format!("{}:", format_key(key, false)), value, indent);
        }
    }

    fn sequence(&mut self, node: &Node, indent: usize) {
        let Some(items) = node.items() else {
            return;
        };
        for item in items {
            for comment in &item.comments.head {
                self.line(indent, comment);
            }
            if is_block_collection(item) && can_inline_first(item) {
                // First entry shares the line with the dash.
                let mut nested = Emitter::default();
                match item.kind {
                    NodeKind::Mapping(_) => nested.mapping(item, indent + INDENT),
                    _ => nested.sequence(item, indent + INDENT),
                }
                self.buf.push_str(&" ".repeat(indent));
                self.buf.push_str("- ");
                self.buf.push_str(&nested.buf[indent + INDENT..]);
            } else if is_block_collection(item) {
                let header = join(&["-", item.tag.as_deref().unwrap_or("")]);
                self.line_with_comment(indent, &header, item.comments.line.as_deref());
                match item.kind {
                    NodeKind::Mapping(_) => self.mapping(item, indent + INDENT),
                    _ => self.sequence(item, indent + INDENT),
                }
            } else {
                self.value("-".to_string(), item, indent);
            }
        }
    }

    /// Writes `prefix` (a `key:` or `-`) followed by `node`.
    fn value(&mut self, prefix: String, node: &Node, indent: usize) {
        let comment = node.comments.line.as_deref();
        let tag = node.tag.as_deref().unwrap_or("");
        if let Some(text) = inline_text(node) {
            self.line_with_comment(indent, &join(&[&prefix, tag, &text]), comment);
            return;
        }
        match &node.kind {
            NodeKind::Scalar {
                value: Value::String(s),
                ..
            } => {
                self.line_with_comment(indent, &join(&[&prefix, tag, &literal_header(s)]), comment);
                self.literal(s, indent + INDENT);
            }
            NodeKind::Mapping(_) => {
                self.line_with_comment(indent, &join(&[&prefix, tag]), comment);
                self.mapping(node, indent + INDENT);
            }
            NodeKind::Sequence(_) => {
                self.line_with_comment(indent, &join(&[&prefix, tag]), comment);
                // Sequences under a key are written without extra indentation.
                let nested = if prefix == "-" { indent + INDENT } else { indent };
                self.sequence(node, nested);
            }
            NodeKind::Scalar { .. } => {}
        }
    }

    fn literal(&mut self, s: &str, indent: usize) {
        let body = s.trim_end_matches('\n');
        let trailing = s.len() - body.len();
        for line in body.split('\n') {
            if line.is_empty() {
                self.buf.push('\n');
            } else {
                self.line(indent, line);
            }
        }
        for _ in 1..trailing {
            self.buf.push('\n');
        }
    }
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_block_collection(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Mapping(entries) => !entries.is_empty() && !is_flow(node),
        NodeKind::Sequence(items) => !items.is_empty() && !is_flow(node),
        NodeKind::Scalar { .. } => false,
    }
}

fn can_inline_first(item: &Node) -> bool {
    if item.tag.is_some() || item.comments.line.is_some() {
        return false;
    }
    match &item.kind {
        NodeKind::Mapping(entries) => entries[0].1.comments.head.is_empty(),
        NodeKind::Sequence(items) => items[0].comments.head.is_empty(),
        NodeKind::Scalar { .. } => false,
    }
}

/// Flow style survives only while nothing inside carries comments.
fn is_flow(node: &Node) -> bool {
    if !node.flow {
        return false;
    }
    match &node.kind {
        NodeKind::Mapping(entries) => entries.iter().all(|(_, v)| !v.has_comments()),
        NodeKind::Sequence(items) => items.iter().all(|v| !v.has_comments()),
        NodeKind::Scalar { .. } => true,
    }
}

/// Single-line rendering of a node, or `None` if it needs a block.
fn inline_text(node: &Node) -> Option<String> {
    match &node.kind {
        NodeKind::Scalar { value, raw } => match (value, raw) {
            (_, Some(raw)) if !raw.contains('\n') => Some(raw.clone()),
            (Value::String(s), _) if needs_literal(s) => None,
            (value, _) => Some(scalar_text(value, false)),
        },
        NodeKind::Mapping(entries) if entries.is_empty() => Some("{}".to_string()),
        NodeKind::Sequence(items) if items.is_empty() => Some("[]".to_string()),
        _ if is_flow(node) => Some(flow_text(node)),
        _ => None,
    }
}

fn flow_text(node: &Node) -> String {
    let text = match &node.kind {
        NodeKind::Scalar { value, .. } => scalar_text(value, true),
        NodeKind::Mapping(entries) => {
            let inner: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", format_key(k, true), flow_text(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        NodeKind::Sequence(items) => {
            let inner: Vec<String> = items.iter().map(flow_text).collect();
            format!("[{}]", inner.join(", "))
        }
    };
    match &node.tag {
        Some(tag) => format!("{tag} {text}"),
        None => text,
    }
}

fn scalar_text(value: &Value, flow: bool) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s, flow),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn needs_literal(s: &str) -> bool {
    s.contains('\n')
        && !s.trim_end_matches('\n').is_empty()
        && !s.chars().any(|c| c.is_control() && c != '\n' && c != '\t')
}

fn literal_header(s: &str) -> String {
    let body = s.trim_end_matches('\n');
    let chomp = match s.len() - body.len() {
        0 => "-",
        1 => "",
        _ => "+",
    };
    let leading_space = body
        .split('\n')
        .find(|l| !l.is_empty())
        .is_some_and(|l| l.starts_with(' '));
    let indicator = if leading_space { "2" } else { "" };
    format!("|{indicator}{chomp}")
}

fn format_key(key: &str, flow: bool) -> String {
    let probe = if flow {
        format!("{{{key}: x}}")
    } else {
        format!("{key}: x")
    };
    let plain = is_plain_safe(key)
        && matches!(
            serde_yaml::from_str::<Value>(&probe),
            Ok(Value::Mapping(map)) if map.len() == 1 && map.contains_key(key)
        );
    if plain {
        key.to_string()
    } else {
        quoted(key)
    }
}

/// Quotes a string scalar unless reading it back plain yields the same string.
fn quote(s: &str, flow: bool) -> String {
    let probe = if flow {
        format!("k: [{s}]")
    } else {
        format!("k: {s}")
    };
    let plain = is_plain_safe(s)
        && match serde_yaml::from_str::<Value>(&probe) {
            Ok(doc) => {
                let expected = Value::String(s.to_string());
                match doc.get("k") {
                    Some(Value::Sequence(items)) if flow => items.len() == 1 && items[0] == expected,
                    Some(value) if !flow => *value == expected,
                    _ => false,
                }
            }
            Err(_) => false,
        };
    if plain {
        s.to_string()
    } else {
        quoted(s)
    }
}

fn is_plain_safe(s: &str) -> bool {
    !s.is_empty() && s.trim() == s && !s.contains('\n') && !s.contains(" #")
}

fn quoted(s: &str) -> String {
    if s.chars().any(char::is_control) {
        double_quoted(s)
    } else {
        format!("'{}'", s.replace('\'', "''"))
    }
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaml::parser;

    fn round_trip(text: &str) -> String {
        let parsed = parser::parse(text).unwrap();
        emit(&parsed.root, &parsed.foot)
    }

    #[test]
    fn untouched_documents_round_trip() {
        let text = "\
# header
cpus: 4 # four cpus
images:
- location: https://example.com/img.qcow2
  arch: x86_64
# mounts
mounts:
- location: '~'
  writable: true
provision:
- mode: system
  script: |
    #!/bin/sh
    echo hi
list: [a, b]
empty:
# trailer
";
        assert_eq!(round_trip(text), text);
    }

    #[test]
    fn indented_sequences_are_rewritten_indentless() {
        assert_eq!(round_trip("base:\n  - a.yaml\n  - b.yaml\n"), "base:\n- a.yaml\n- b.yaml\n");
    }

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(quote("plain", false), "plain");
        assert_eq!(quote("true", false), "'true'");
        assert_eq!(quote("a: b", false), "'a: b'");
        assert_eq!(quote("it's", false), "it's");
        assert_eq!(quote("#x", false), "'#x'");
        assert_eq!(quote("", false), "''");
        assert_eq!(quote("a,b", true), "'a,b'");
        assert_eq!(quote("bell\u{7}", false), "\"bell\\u0007\"");
    }

    #[test]
    fn literal_headers_pick_chomping() {
        assert_eq!(literal_header("a\nb"), "|-");
        assert_eq!(literal_header("a\nb\n"), "|");
        assert_eq!(literal_header("a\nb\n\n"), "|+");
        assert_eq!(literal_header("  indented\nb\n"), "|2");
    }

    #[test]
    fn new_multiline_strings_become_literal_blocks() {
        let mut root = Node::mapping();
        root.kind = NodeKind::Mapping(vec![("script".into(), Node::string("echo a\necho b\n"))]);
        assert_eq!(emit(&root, &[]), "script: |\n  echo a\n  echo b\n");
    }

    #[test]
    fn item_with_head_comment_on_first_key_uses_bare_dash() {
        let text = "disks:\n-\n  # the name\n  name: data\n";
        assert_eq!(round_trip(text), text);
    }

    #[test]
    fn flow_style_dropped_when_children_gain_comments() {
        let mut parsed = parser::parse("list: [a, b]\n").unwrap();
        let list = parsed.root.get_mut("list").unwrap();
        if let NodeKind::Sequence(items) = &mut list.kind {
            items[0].comments.line = Some("# first".into());
        }
        assert_eq!(emit(&parsed.root, &parsed.foot), "list:\n- a # first\n- b\n");
    }
}
