//! Document tree and selector resolution
//!
//! This module provides:
//! - An arena-backed document tree with shadow roots
//! - A snapshot parser for XHTML-style markup
//! - Resolution engines for CSS, XPath, text and role/label selectors

pub mod aria;
pub mod css;
pub mod parser;
pub mod text;
pub mod tree;
pub mod xpath;

pub use tree::{normalize_whitespace, Document, ElementData, InlineStyle, NodeId, NodeKind, Rect};

use crate::error::SelectorSyntaxError;

/// Resolution semantics for a selector string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Css,
    XPath,
    Text,
    Aria,
}

impl Engine {
    /// Pick the engine for a selector by its prefix: `role=`/`label=`, `text=`,
    /// a leading `/`, otherwise CSS
    pub fn detect(selector: &str) -> Engine {
        let s = selector.trim_start();
        if s.starts_with("role=") || s.starts_with("label=") {
            Engine::Aria
        } else if s.starts_with("text=") {
            Engine::Text
        } else if s.starts_with('/') {
            Engine::XPath
        } else {
            Engine::Css
        }
    }
}

/// Resolve `selector` inside `scope` with the given engine
pub fn resolve(
    doc: &Document,
    scope: NodeId,
    engine: Engine,
    selector: &str,
) -> Result<Vec<NodeId>, SelectorSyntaxError> {
    match engine {
        Engine::Css => css::query_all(doc, scope, selector),
        Engine::XPath => xpath::query_all(doc, scope, selector),
        Engine::Text => text::query_all(doc, scope, selector),
        Engine::Aria => aria::query_all(doc, scope, selector),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_detect() {
        assert_eq!(Engine::detect("role=button"), Engine::Aria);
        assert_eq!(Engine::detect("label=\"x\""), Engine::Aria);
        assert_eq!(Engine::detect("text=hi"), Engine::Text);
        assert_eq!(Engine::detect("//div"), Engine::XPath);
        assert_eq!(Engine::detect("div > a"), Engine::Css);
    }
}
