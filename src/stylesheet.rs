use crate::error::{PurgeError, Result};
use std::borrow::Cow;
use std::fmt;

/// An ordered tree of at-rules, comments and style rules.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stylesheet {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    AtRule {
        name: String,
        params: String,
        block: Option<Block>,
    },
    Comment {
        text: String,
    },
    Rule {
        selector: String,
        declarations: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Nodes(Vec<Node>),
    Declarations(String),
}

impl Node {
    pub fn comment(text: impl Into<String>) -> Self {
        Node::Comment {
            text: text.into().trim().to_string(),
        }
    }

    pub fn rule(selector: impl Into<String>, declarations: impl Into<String>) -> Self {
        Node::Rule {
            selector: selector.into(),
            declarations: declarations.into(),
        }
    }

    pub fn at_rule(name: impl Into<String>, params: impl Into<String>) -> Self {
        Node::AtRule {
            name: name.into(),
            params: params.into(),
            block: None,
        }
    }

    pub fn comment_text(&self) -> Option<&str> {
        match self {
            Node::Comment { text } => Some(text.trim()),
            _ => None,
        }
    }

    pub fn is_at_rule(&self, wanted: &str) -> bool {
        matches!(self, Node::AtRule { name, .. } if name == wanted)
    }
}

impl Stylesheet {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn parse(css: &str) -> Result<Self> {
        let nodes = Parser { src: css, base: 0 }.parse_nodes()?;
        Ok(Self { nodes })
    }

    pub fn prepend(&mut self, node: Node) {
        self.nodes.insert(0, node);
    }

    pub fn append(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Keeps only the nodes for which `keep` returns true, at every depth.
    pub fn retain_deep<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Node) -> bool,
    {
        retain_nodes(&mut self.nodes, &mut keep);
    }

    /// Visits every comment in document order, at every depth.
    pub fn for_each_comment_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut String),
    {
        visit_comments(&mut self.nodes, &mut visit);
    }

    pub fn to_css(&self) -> String {
        let mut out = String::new();
        write_nodes(&mut out, &self.nodes, 0);
        out
    }
}

impl fmt::Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

fn retain_nodes<F>(nodes: &mut Vec<Node>, keep: &mut F)
where
    F: FnMut(&Node) -> bool,
{
    nodes.retain(|node| keep(node));
    for node in nodes.iter_mut() {
        if let Node::AtRule {
            block: Some(Block::Nodes(children)),
            ..
        } = node
        {
            retain_nodes(children, keep);
        }
    }
}

fn visit_comments<F>(nodes: &mut [Node], visit: &mut F)
where
    F: FnMut(&mut String),
{
    for node in nodes {
        match node {
            Node::Comment { text } => visit(text),
            Node::AtRule {
                block: Some(Block::Nodes(children)),
                ..
            } => visit_comments(children, visit),
            _ => {}
        }
    }
}

fn write_nodes(out: &mut String, nodes: &[Node], depth: usize) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            Node::Comment { text } => {
                out.push_str(&format!("{}/* {} */\n", indent, text));
            }
            Node::Rule {
                selector,
                declarations,
            } => {
                write_declaration_block(out, &indent, selector, declarations);
            }
            Node::AtRule {
                name,
                params,
                block,
            } => {
                let header = if params.is_empty() {
                    format!("@{}", name)
                } else {
                    format!("@{} {}", name, params)
                };
                match block {
                    None => out.push_str(&format!("{}{};\n", indent, header)),
                    Some(Block::Declarations(declarations)) => {
                        write_declaration_block(out, &indent, &header, declarations);
                    }
                    Some(Block::Nodes(children)) => {
                        out.push_str(&format!("{}{} {{\n", indent, header));
                        write_nodes(out, children, depth + 1);
                        out.push_str(&format!("{}}}\n", indent));
                    }
                }
            }
        }
    }
}

fn write_declaration_block(out: &mut String, indent: &str, header: &str, declarations: &str) {
    out.push_str(&format!("{}{} {{\n", indent, header));
    for line in declarations.lines() {
        let line = line.trim();
        if !line.is_empty() {
            out.push_str(&format!("{}  {}\n", indent, line));
        }
    }
    out.push_str(&format!("{}}}\n", indent));
}

struct Parser<'a> {
    src: &'a str,
    base: usize,
}

impl<'a> Parser<'a> {
    fn parse_nodes(&self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut cursor = 0usize;

        loop {
            cursor = skip_whitespace(self.src, cursor);
            if cursor >= self.src.len() {
                return Ok(nodes);
            }
            let rest = &self.src[cursor..];

            if rest.starts_with("/*") {
                let Some(end_rel) = rest[2..].find("*/") else {
                    return Err(self.error(cursor, "unterminated comment"));
                };
                nodes.push(Node::comment(&rest[2..2 + end_rel]));
                cursor += 2 + end_rel + 2;
                continue;
            }

            if rest.starts_with('}') {
                return Err(self.error(cursor, "unexpected '}'"));
            }

            let (prelude_end, terminator) = self.find_prelude_end(cursor)?;
            let prelude = strip_comments(&self.src[cursor..prelude_end]);
            let prelude = prelude.trim();
            if prelude.is_empty() && terminator == Terminator::Semicolon {
                cursor = prelude_end + 1;
                continue;
            }

            if let Some(at_rule) = prelude.strip_prefix('@') {
                let (name, params) = split_at_rule_prelude(at_rule);
                if terminator == Terminator::Semicolon {
                    nodes.push(Node::AtRule {
                        name,
                        params,
                        block: None,
                    });
                    cursor = prelude_end + 1;
                    continue;
                }
                let (close, nested) = self.find_block_end(prelude_end)?;
                let body = &self.src[prelude_end + 1..close];
                let block = if nested || is_grouping_rule(&name) {
                    let child = Parser {
                        src: body,
                        base: self.base + prelude_end + 1,
                    };
                    Block::Nodes(child.parse_nodes()?)
                } else {
                    Block::Declarations(normalize_declarations(body))
                };
                nodes.push(Node::AtRule {
                    name,
                    params,
                    block: Some(block),
                });
                cursor = close + 1;
                continue;
            }

            if terminator != Terminator::Brace {
                return Err(self.error(cursor, "expected '{' after selector"));
            }
            let (close, _) = self.find_block_end(prelude_end)?;
            nodes.push(Node::Rule {
                selector: normalize_selector(prelude),
                declarations: normalize_declarations(&self.src[prelude_end + 1..close]),
            });
            cursor = close + 1;
        }
    }

    /// Finds the `{` or `;` ending a rule or at-rule prelude, skipping
    /// comments, strings and parenthesised groups.
    fn find_prelude_end(&self, start: usize) -> Result<(usize, Terminator)> {
        let bytes = self.src.as_bytes();
        let mut depth = 0usize;
        let mut idx = start;
        while idx < bytes.len() {
            match bytes[idx] {
                b'/' if bytes.get(idx + 1) == Some(&b'*') => idx = self.skip_comment(idx)?,
                b'"' | b'\'' => idx = self.skip_string(idx)?,
                b'\\' => idx += 1,
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                b'{' if depth == 0 => return Ok((idx, Terminator::Brace)),
                b';' if depth == 0 => return Ok((idx, Terminator::Semicolon)),
                b'}' if depth == 0 => return Err(self.error(idx, "unexpected '}'")),
                _ => {}
            }
            idx += 1;
        }
        Err(self.error(start, "unexpected end of input"))
    }

    /// Returns the index of the `}` closing the block opened at `open`, and
    /// whether the block contains nested blocks.
    fn find_block_end(&self, open: usize) -> Result<(usize, bool)> {
        let bytes = self.src.as_bytes();
        let mut depth = 0usize;
        let mut nested = false;
        let mut idx = open;
        while idx < bytes.len() {
            match bytes[idx] {
                b'/' if bytes.get(idx + 1) == Some(&b'*') => idx = self.skip_comment(idx)?,
                b'"' | b'\'' => idx = self.skip_string(idx)?,
                b'\\' => idx += 1,
                b'{' => {
                    depth += 1;
                    if depth > 1 {
                        nested = true;
                    }
                }
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok((idx, nested));
                    }
                }
                _ => {}
            }
            idx += 1;
        }
        Err(self.error(open, "unclosed block"))
    }

    /// Returns the index of the `/` closing the comment opened at `open`.
    fn skip_comment(&self, open: usize) -> Result<usize> {
        match self.src[open + 2..].find("*/") {
            Some(end_rel) => Ok(open + 2 + end_rel + 1),
            None => Err(self.error(open, "unterminated comment")),
        }
    }

    fn skip_string(&self, open: usize) -> Result<usize> {
        let bytes = self.src.as_bytes();
        let quote = bytes[open];
        let mut idx = open + 1;
        while idx < bytes.len() {
            match bytes[idx] {
                b'\\' => idx += 1,
                ch if ch == quote => return Ok(idx),
                _ => {}
            }
            idx += 1;
        }
        Err(self.error(open, "unterminated string"))
    }

    fn error(&self, offset: usize, message: &str) -> PurgeError {
        PurgeError::css(self.base + offset, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Brace,
    Semicolon,
}

fn skip_whitespace(text: &str, mut idx: usize) -> usize {
    let bytes = text.as_bytes();
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx += 1;
    }
    idx
}

/// At-rules whose blocks hold rules rather than declarations, even when
/// the block is empty or holds only comments.
fn is_grouping_rule(name: &str) -> bool {
    matches!(
        name,
        "media" | "supports" | "layer" | "container" | "document" | "-moz-document"
    )
}

/// Replaces each comment with a space. Only called on text whose comment
/// bounds were already checked by `find_prelude_end`.
fn strip_comments(text: &str) -> Cow<'_, str> {
    if !text.contains("/*") {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("/*") {
        out.push_str(&rest[..open]);
        out.push(' ');
        rest = match rest[open + 2..].find("*/") {
            Some(end_rel) => &rest[open + 2 + end_rel + 2..],
            None => "",
        };
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn split_at_rule_prelude(prelude: &str) -> (String, String) {
    let name_end = prelude
        .find(|ch: char| ch.is_whitespace() || ch == '(' || ch == '"' || ch == '\'')
        .unwrap_or(prelude.len());
    (
        prelude[..name_end].to_string(),
        prelude[name_end..].trim().to_string(),
    )
}

fn normalize_selector(selector: &str) -> String {
    split_top_level_commas(selector).join(",\n")
}

fn normalize_declarations(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits a selector list on commas outside of parentheses, brackets and
/// strings.
pub fn split_top_level_commas(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut quote = None;
    let mut escaped = false;
    for (idx, ch) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if let Some(open) = quote {
            match ch {
                '\\' => escaped = true,
                _ if ch == open => quote = None,
                _ => {}
            }
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' | '\'' => quote = Some(ch),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(value[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < value.len() {
        parts.push(value[start..].trim());
    }
    parts.retain(|part| !part.is_empty());
    parts
}
