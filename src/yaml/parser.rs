//! Line-oriented YAML reader that keeps comments.
//!
//! Handles the block-style subset that templates are written in: block
//! mappings and sequences (including indentless sequences under a key),
//! plain, quoted and block scalars, tags on scalars, and flow collections.
//! Scalar text is handed to `serde_yaml` for typing, so only the layout is
//! interpreted here. Anything outside the subset (anchors, complex keys,
//! multiple documents) is reported as an error and the caller falls back to
//! a comment-free tree.

use serde_yaml::Value;

use super::node::{untag, Node, NodeKind};

type ParseResult<T> = std::result::Result<T, String>;

/// Output of a successful parse.
#[derive(Debug)]
pub(crate) struct Parsed {
    pub root: Node,
    pub foot: Vec<String>,
}

#[derive(Debug, Clone)]
struct Line {
    indent: usize,
    text: String,
}

impl Line {
    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn is_comment(&self) -> bool {
        self.text.starts_with('#')
    }

    fn raw(&self) -> String {
        format!("{}{}", " ".repeat(self.indent), self.text)
    }
}

/// Parses `text` into a node tree with comments attached.
pub(crate) fn parse(text: &str) -> ParseResult<Parsed> {
    let mut lines = Vec::new();
    let mut seen_content = false;
    for raw in text.lines() {
        let body = raw.trim_start_matches(' ');
        let line = Line {
            indent: raw.len() - body.len(),
            text: body.to_string(),
        };
        if !line.is_blank() && !line.is_comment() {
            if line.indent == 0 && (body.starts_with("---") || body.starts_with("...")) {
                if seen_content || body.trim_end() != "---" {
                    return Err("document markers are not supported".to_string());
                }
                lines.push(Line {
                    indent: 0,
                    text: String::new(),
                });
                continue;
            }
            if line.indent == 0 && body.starts_with('%') {
                return Err("directives are not supported".to_string());
            }
            if body.starts_with('\t') {
                return Err("tab indentation is not supported".to_string());
            }
            seen_content = true;
        }
        lines.push(line);
    }
    Parser { lines, pos: 0 }.document()
}

struct Parser {
    lines: Vec<Line>,
    pos: usize,
}

impl Parser {
    fn document(mut self) -> ParseResult<Parsed> {
        let root = match self.peek_content() {
            None => Node::mapping(),
            Some(idx) => {
                let indent = self.lines[idx].indent;
                self.block(indent)?
            }
        };
        if let Some(idx) = self.peek_content() {
            return Err(format!("unexpected content on line {}", idx + 1));
        }
        let foot = self.take_comments(self.lines.len());
        Ok(Parsed { root, foot })
    }

    /// Index of the next line that is neither blank nor a comment.
    fn peek_content(&self) -> Option<usize> {
        (self.pos..self.lines.len()).find(|&i| {
            let line = &self.lines[i];
            !line.is_blank() && !line.is_comment()
        })
    }

    /// Consumes lines up to `until`, returning the comment lines among them.
    fn take_comments(&mut self, until: usize) -> Vec<String> {
        let comments = self.lines[self.pos..until]
            .iter()
            .filter(|l| l.is_comment())
            .map(|l| l.text.trim_end().to_string())
            .collect();
        self.pos = until;
        comments
    }

    fn block(&mut self, indent: usize) -> ParseResult<Node> {
        let idx = self
            .peek_content()
            .ok_or_else(|| "expected a node".to_string())?;
        let text = self.lines[idx].text.clone();
        if is_item(&text) {
            return self.sequence(indent);
        }
        if split_key(&text).is_some() {
            return self.mapping(indent);
        }
        let head = self.take_comments(idx);
        self.pos = idx + 1;
        let (value, comment) = split_comment(&text);
        let mut node = self.value(value, indent.saturating_sub(1), false)?;
        node.comments.head = head;
        if comment.is_some() {
            node.comments.line = comment;
        }
        Ok(node)
    }

    fn mapping(&mut self, indent: usize) -> ParseResult<Node> {
        let mut entries: Vec<(String, Node)> = Vec::new();
        while let Some(idx) = self.peek_content() {
            let (line_indent, text) = {
                let line = &self.lines[idx];
                (line.indent, line.text.clone())
            };
            if line_indent < indent {
                break;
            }
            if line_indent > indent || is_item(&text) {
                return Err(format!("unexpected indentation on line {}", idx + 1));
            }
            let Some((key, rest)) = split_key(&text) else {
                return Err(format!("expected a mapping key on line {}", idx + 1));
            };
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(format!("duplicate key {key:?} on line {}", idx + 1));
            }
            let head = self.take_comments(idx);
            self.pos = idx + 1;
            let (value_text, comment) = split_comment(rest);
            let mut value = self.value(value_text, indent, true)?;
            value.comments.head.splice(0..0, head);
            if comment.is_some() {
                value.comments.line = comment;
            }
            entries.push((key, value));
        }
        let mut node = Node::mapping();
        node.kind = NodeKind::Mapping(entries);
        Ok(node)
    }

    fn sequence(&mut self, indent: usize) -> ParseResult<Node> {
        let mut items = Vec::new();
        while let Some(idx) = self.peek_content() {
            let (line_indent, text) = {
                let line = &self.lines[idx];
                (line.indent, line.text.clone())
            };
            if line_indent < indent || (line_indent == indent && !is_item(&text)) {
                break;
            }
            if line_indent > indent {
                return Err(format!("unexpected indentation on line {}", idx + 1));
            }
            let head = self.take_comments(idx);
            let rest = &text[1..];
            let content = rest.trim_start();
            let mut item = if content.is_empty() || content.starts_with('#') {
                self.pos = idx + 1;
                let mut node = self.value("", indent, false)?;
                if !content.is_empty() {
                    node.comments.line = Some(content.trim_end().to_string());
                }
                node
            } else if is_item(content) || split_key(content).is_some() {
                // Re-read the rest of the line as the first line of a nested block.
                let nested = indent + 1 + (rest.len() - content.len());
                self.lines[idx] = Line {
                    indent: nested,
                    text: content.to_string(),
                };
                self.pos = idx;
                self.block(nested)?
            } else {
                self.pos = idx + 1;
                let (value, comment) = split_comment(content);
                let mut node = self.value(value, indent, false)?;
                if comment.is_some() {
                    node.comments.line = comment;
                }
                node
            };
            item.comments.head.splice(0..0, head);
            items.push(item);
        }
        Ok(Node::sequence(items))
    }

    /// Parses the value that starts with `text` on the current line.
    /// `parent` is the indentation of the enclosing collection.
    fn value(&mut self, text: &str, parent: usize, in_mapping: bool) -> ParseResult<Node> {
        let text = text.trim();
        let (tag, body) = split_tag(text);
        if body.is_empty() {
            if tag.is_some() {
                return Err("tagged collections are not supported".to_string());
            }
            if let Some(idx) = self.peek_content() {
                let line = &self.lines[idx];
                let nested = line.indent > parent
                    || (in_mapping && line.indent == parent && is_item(&line.text));
                if nested {
                    let indent = line.indent;
                    return self.block(indent);
                }
            }
            return Ok(Node::empty());
        }
        if body.starts_with('&') || body.starts_with('*') {
            return Err("anchors and aliases are not supported".to_string());
        }
        if body.starts_with('|') || body.starts_with('>') {
            return self.block_scalar(text, tag, parent);
        }
        self.inline_value(text, tag, body, parent)
    }

    fn block_scalar(&mut self, header: &str, tag: Option<&str>, parent: usize) -> ParseResult<Node> {
        let mut end = self.pos;
        while let Some(line) = self.lines.get(end) {
            if !line.is_blank() && line.indent <= parent {
                break;
            }
            end += 1;
        }
        let mut snippet = format!("x: {header}\n");
        for line in &self.lines[self.pos..end] {
            let raw = line.raw();
            snippet.push_str(raw.get(parent..).unwrap_or(""));
            snippet.push('\n');
        }
        self.pos = end;
        let value = parse_snippet(&snippet)?;
        let mut node = Node::scalar(untag(value));
        node.tag = tag.map(str::to_string);
        Ok(node)
    }

    fn inline_value(
        &mut self,
        text: &str,
        tag: Option<&str>,
        body: &str,
        parent: usize,
    ) -> ParseResult<Node> {
        let mut continuation: Vec<String> = Vec::new();
        if starts_flow_or_quote(body) {
            let mut joined = body.to_string();
            while is_open(&joined) {
                let line = self
                    .lines
                    .get(self.pos)
                    .ok_or_else(|| "unterminated flow scalar".to_string())?;
                let part = if body.starts_with('[') || body.starts_with('{') {
                    split_comment(line.text.trim()).0.to_string()
                } else {
                    line.text.trim().to_string()
                };
                joined.push(' ');
                joined.push_str(&part);
                continuation.push(part);
                self.pos += 1;
            }
        } else {
            let mut cursor = self.pos;
            let mut blanks = 0;
            while let Some(line) = self.lines.get(cursor) {
                if line.is_blank() {
                    blanks += 1;
                    cursor += 1;
                    continue;
                }
                if line.is_comment() || line.indent <= parent {
                    break;
                }
                continuation.extend(std::iter::repeat_n(String::new(), blanks));
                blanks = 0;
                continuation.push(line.text.trim().to_string());
                cursor += 1;
                self.pos = cursor;
            }
        }

        let mut snippet = format!("x: {text}");
        for part in &continuation {
            snippet.push_str("\n  ");
            snippet.push_str(part);
        }
        let value = untag(parse_snippet(&snippet)?);
        let mut node = match value {
            Value::Mapping(_) | Value::Sequence(_) => Node::from_flow_value(&value),
            scalar => {
                let raw = continuation.is_empty().then(|| body.to_string());
                Node::scalar_with_raw(scalar, raw)
            }
        };
        node.tag = tag.map(str::to_string);
        Ok(node)
    }
}

fn parse_snippet(snippet: &str) -> ParseResult<Value> {
    let doc: Value = serde_yaml::from_str(snippet).map_err(|e| e.to_string())?;
    doc.get("x")
        .cloned()
        .ok_or_else(|| "scalar did not parse to a value".to_string())
}

fn is_item(text: &str) -> bool {
    text == "-" || text.starts_with("- ") || text.starts_with("-\t")
}

fn starts_flow_or_quote(text: &str) -> bool {
    matches!(text.chars().next(), Some('"' | '\'' | '[' | '{'))
}

/// Splits a leading `!tag` off a value.
fn split_tag(text: &str) -> (Option<&str>, &str) {
    if !text.starts_with('!') {
        return (None, text);
    }
    match text.find(char::is_whitespace) {
        Some(end) => (Some(&text[..end]), text[end..].trim_start()),
        None => (Some(text), ""),
    }
}

fn at_token_start(chars: &[char], i: usize) -> bool {
    i == 0 || matches!(chars[i - 1], ' ' | '\t' | '[' | '{' | ',' | ':')
}

/// True if `text` leaves a quote or flow bracket open.
fn is_open(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some('"') => match c {
                '\\' => i += 1,
                '"' => quote = None,
                _ => {}
            },
            Some(_) => {
                if c == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        i += 1;
                    } else {
                        quote = None;
                    }
                }
            }
            None => match c {
                '"' | '\'' if at_token_start(&chars, i) => quote = Some(c),
                '[' | '{' => depth += 1,
                ']' | '}' => depth -= 1,
                '#' if i == 0 || chars[i - 1].is_whitespace() => break,
                _ => {}
            },
        }
        i += 1;
    }
    quote.is_some() || depth > 0
}

/// Splits a trailing `# comment` off a line, ignoring `#` inside quotes.
pub(crate) fn split_comment(text: &str) -> (&str, Option<String>) {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let plain: Vec<char> = chars.iter().map(|(_, c)| *c).collect();
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let (byte, c) = chars[i];
        match quote {
            Some('"') => match c {
                '\\' => i += 1,
                '"' => quote = None,
                _ => {}
            },
            Some(_) => {
                if c == '\'' {
                    if plain.get(i + 1) == Some(&'\'') {
                        i += 1;
                    } else {
                        quote = None;
                    }
                }
            }
            None => match c {
                '"' | '\'' if at_token_start(&plain, i) => quote = Some(c),
                '#' if i == 0 || plain[i - 1].is_whitespace() => {
                    return (
                        text[..byte].trim_end(),
                        Some(text[byte..].trim_end().to_string()),
                    );
                }
                _ => {}
            },
        }
        i += 1;
    }
    (text.trim_end(), None)
}

/// Byte index of the quote closing the quoted scalar that starts `text`.
fn closing_quote(text: &str) -> Option<usize> {
    let mut chars = text.char_indices();
    let (_, open) = chars.next()?;
    let mut escaped = false;
    let mut pending_single = None;
    for (i, c) in chars {
        if let Some(at) = pending_single.take() {
            if c == '\'' {
                continue;
            }
            return Some(at);
        }
        if open == '"' {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                return Some(i);
            }
        } else if c == '\'' {
            pending_single = Some(i);
        }
    }
    pending_single
}

fn is_value_separator(text: &str, colon: usize) -> bool {
    matches!(text[colon + 1..].chars().next(), None | Some(' ' | '\t'))
}

/// Splits `key: rest` into the key text and the remainder after the colon.
fn split_key(text: &str) -> Option<(String, &str)> {
    let first = text.chars().next()?;
    if is_item(text)
        || matches!(
            first,
            '[' | '{' | '#' | '|' | '>' | '!' | '&' | '*' | '?' | '%' | '@' | '`'
        )
    {
        return None;
    }
    let colon = if first == '"' || first == '\'' {
        let close = closing_quote(text)?;
        let after = text[close + 1..].trim_start();
        if !after.starts_with(':') {
            return None;
        }
        text.len() - after.len()
    } else {
        let mut found = None;
        for (i, c) in text.char_indices() {
            if c == '#' && text[..i].ends_with(char::is_whitespace) {
                break;
            }
            if c == ':' && is_value_separator(text, i) {
                found = Some(i);
                break;
            }
        }
        found?
    };
    if !is_value_separator(text, colon) {
        return None;
    }
    let source = text[..colon].trim_end();
    let key = if first == '"' || first == '\'' {
        match serde_yaml::from_str::<Value>(source).ok()? {
            Value::String(key) => key,
            _ => return None,
        }
    } else {
        source.to_string()
    };
    Some((key, &text[colon + 1..]))
}
