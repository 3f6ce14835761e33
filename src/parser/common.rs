//! Helpers shared by the tree-sitter front-ends

use crate::ast::{Literal, SourceUnit, Span};
use crate::error::Result;
use std::path::Path;
use tree_sitter::Node;

/// A front-end turning source text into a [`SourceUnit`]
pub trait Parser {
    fn parse(&self, path: &Path, source: &str) -> Result<SourceUnit>;
}

pub fn span_of(node: &Node) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start: node.start_byte(),
        end: node.end_byte(),
        line: start.row + 1,
        column: start.column + 1,
        end_line: end.row + 1,
        end_column: end.column + 1,
    }
}

pub fn node_text<'s>(node: &Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

pub fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub fn all_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

pub fn first_child_of_kind<'t>(node: &Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    named_children(node)
        .into_iter()
        .find(|c| kinds.contains(&c.kind()))
}

/// Strip generics, nullability and whitespace from a written type
pub fn clean_type_name(text: &str) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for ch in text.chars() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            '?' | ' ' | '\n' | '\t' => {}
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Decode an integer literal (`12`, `0x1F`, `0b101`, `1_000`, `017`, `5L`)
pub fn parse_int_literal(text: &str) -> Option<Literal> {
    let mut digits: String = text.chars().filter(|c| *c != '_').collect();
    let mut is_long = false;
    while digits.ends_with(['l', 'L', 'u', 'U']) {
        if digits.ends_with(['l', 'L']) {
            is_long = true;
        }
        digits.pop();
    }

    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()? as i64
    } else if let Some(bin) = digits
        .strip_prefix("0b")
        .or_else(|| digits.strip_prefix("0B"))
    {
        u64::from_str_radix(bin, 2).ok()? as i64
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8).ok()? as i64
    } else {
        digits.parse::<u64>().ok()? as i64
    };

    Some(if is_long {
        Literal::Long(value)
    } else {
        Literal::Int(value)
    })
}

/// Decode a floating point literal (`2.5`, `1e3`, `7f`, `0.5d`)
pub fn parse_float_literal(text: &str) -> Option<Literal> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if let Some(body) = cleaned.strip_suffix(['f', 'F']) {
        return body.parse::<f32>().ok().map(Literal::Float);
    }
    let body = cleaned.strip_suffix(['d', 'D']).unwrap_or(&cleaned);
    body.parse::<f64>().ok().map(Literal::Double)
}

/// Remove the quotes around a string literal and resolve simple escapes
pub fn unquote(text: &str) -> String {
    let trimmed = text
        .strip_prefix("\"\"\"")
        .and_then(|t| t.strip_suffix("\"\"\""))
        .or_else(|| text.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
        .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')))
        .unwrap_or(text);

    let mut out = String::with_capacity(trimmed.len());
    let mut chars = trimmed.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
