//! Text selectors: `text="exact"` and `text=fragment`
//!
//! Both match against an element's own normalized text, never text
//! aggregated from descendants.

use super::tree::{Document, NodeId};
use crate::error::SelectorSyntaxError;

const ENGINE: &str = "text";
const PREFIX: &str = "text=";

#[derive(Debug, Clone, PartialEq)]
pub enum TextQuery {
    /// Own text equals the value
    Exact(String),
    /// Own text contains the value, ignoring case
    Contains(String),
}

impl TextQuery {
    pub fn parse(input: &str) -> Result<Self, SelectorSyntaxError> {
        let err = |msg: &str| SelectorSyntaxError::new(ENGINE, input, msg);
        let rest = input
            .strip_prefix(PREFIX)
            .ok_or_else(|| err("missing text= prefix"))?;

        if let Some(body) = rest.strip_prefix('"') {
            let mut out = String::new();
            let mut chars = body.chars();
            loop {
                match chars.next() {
                    None => return Err(err("unterminated quoted text")),
                    Some('\\') => match chars.next() {
                        Some(c) => out.push(c),
                        None => return Err(err("dangling escape")),
                    },
                    Some('"') => break,
                    Some(c) => out.push(c),
                }
            }
            if chars.next().is_some() {
                return Err(err("trailing characters after quoted text"));
            }
            if out.is_empty() {
                return Err(err("empty text"));
            }
            return Ok(TextQuery::Exact(out));
        }

        let fragment = rest.trim();
        if fragment.is_empty() {
            return Err(err("empty text"));
        }
        Ok(TextQuery::Contains(fragment.to_lowercase()))
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if matches!(doc.tag(node), Some("script" | "style") | None) {
            return false;
        }
        let own = doc.own_text(node);
        match self {
            TextQuery::Exact(value) => own == *value,
            TextQuery::Contains(value) => own.to_lowercase().contains(value.as_str()),
        }
    }
}

/// Resolve a text selector against a tree scope
pub fn query_all(
    doc: &Document,
    scope: NodeId,
    selector: &str,
) -> Result<Vec<NodeId>, SelectorSyntaxError> {
    let query = TextQuery::parse(selector)?;
    Ok(doc
        .descendant_elements(scope)
        .into_iter()
        .filter(|n| query.matches(doc, *n))
        .collect())
}

/// Build an exact text selector, escaping quotes and backslashes
pub fn exact(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{}\"{}\"", PREFIX, escaped)
}

/// Build a case-insensitive substring selector
pub fn contains(fragment: &str) -> String {
    format!("{}{}", PREFIX, fragment)
}
