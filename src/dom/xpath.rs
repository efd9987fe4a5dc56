//! XPath subset
//!
//! Location paths built from `/` (child) and `//` (descendant-or-self)
//! steps with name tests or `*`, and predicates:
//! `[n]`, `[@a]`, `[@a='v']`, `[text()='v']`, `[normalize-space()='v']`,
//! `[contains(@a,'v')]`, `[contains(.,'v')]`.
//! Positional predicates are evaluated per context node, as XPath 1.0 does.

use std::collections::{HashMap, HashSet};

use super::tree::{Document, NodeId};
use crate::error::SelectorSyntaxError;

const ENGINE: &str = "xpath";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    DescendantOrSelf,
}

#[derive(Debug, Clone)]
enum Predicate {
    Position(usize),
    HasAttr(String),
    AttrEquals(String, String),
    AttrContains(String, String),
    OwnTextEquals(String),
    TextEquals(String),
    TextContains(String),
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    name: Option<String>,
    predicates: Vec<Predicate>,
}

/// A parsed location path
#[derive(Debug, Clone)]
pub struct XPath {
    steps: Vec<Step>,
}

impl XPath {
    pub fn parse(input: &str) -> Result<Self, SelectorSyntaxError> {
        let mut p = Parser {
            source: input,
            chars: input.trim().chars().collect(),
            pos: 0,
        };
        let mut steps = Vec::new();
        while p.pos < p.chars.len() {
            let axis = if p.eat_str("//") {
                Axis::DescendantOrSelf
            } else if p.eat('/') {
                Axis::Child
            } else {
                return Err(p.error("expected '/' or '//'"));
            };
            steps.push(p.parse_step(axis)?);
        }
        if steps.is_empty() {
            return Err(p.error("empty path"));
        }
        Ok(XPath { steps })
    }

    /// Evaluate from the tree scope root, returning elements in document order
    pub fn evaluate(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        let mut context = vec![scope];
        for step in &self.steps {
            let mut next = Vec::new();
            let mut seen = HashSet::new();
            for ctx in &context {
                let parents = match step.axis {
                    Axis::Child => vec![*ctx],
                    Axis::DescendantOrSelf => {
                        let mut all = vec![*ctx];
                        all.extend(doc.descendant_elements(*ctx));
                        all
                    }
                };
                for parent in parents {
                    for node in apply_step(doc, parent, step) {
                        if seen.insert(node) {
                            next.push(node);
                        }
                    }
                }
            }
            context = next;
        }

        let order: HashMap<NodeId, usize> = doc
            .descendant_elements(scope)
            .into_iter()
            .enumerate()
            .map(|(i, n)| (n, i))
            .collect();
        context.sort_by_key(|n| order.get(n).copied().unwrap_or(usize::MAX));
        context
    }
}

/// Resolve an XPath against a tree scope
pub fn query_all(
    doc: &Document,
    scope: NodeId,
    path: &str,
) -> Result<Vec<NodeId>, SelectorSyntaxError> {
    Ok(XPath::parse(path)?.evaluate(doc, scope))
}

fn apply_step(doc: &Document, parent: NodeId, step: &Step) -> Vec<NodeId> {
    let mut nodes: Vec<NodeId> = doc
        .element_children(parent)
        .filter(|c| match &step.name {
            Some(name) => doc.tag(*c) == Some(name.as_str()),
            None => true,
        })
        .collect();

    for predicate in &step.predicates {
        nodes = match predicate {
            Predicate::Position(n) => nodes.get(n - 1).copied().into_iter().collect(),
            other => nodes
                .into_iter()
                .filter(|node| matches_predicate(doc, *node, other))
                .collect(),
        };
    }
    nodes
}

fn matches_predicate(doc: &Document, node: NodeId, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Position(_) => true,
        Predicate::HasAttr(name) => doc.has_attr(node, name),
        Predicate::AttrEquals(name, value) => doc.attr(node, name) == Some(value.as_str()),
        Predicate::AttrContains(name, value) => {
            doc.attr(node, name).is_some_and(|a| a.contains(value.as_str()))
        }
        Predicate::OwnTextEquals(value) => doc.own_text(node) == *value,
        Predicate::TextEquals(value) => doc.text_content(node) == *value,
        Predicate::TextContains(value) => doc.text_content(node).contains(value.as_str()),
    }
}

/// Quote a literal for XPath 1.0, which has no escape syntax.
///
/// Returns `None` when the value contains both quote characters.
pub fn quote_literal(value: &str) -> Option<String> {
    if !value.contains('\'') {
        Some(format!("'{}'", value))
    } else if !value.contains('"') {
        Some(format!("\"{}\"", value))
    } else {
        None
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> SelectorSyntaxError {
        SelectorSyntaxError::new(
            ENGINE,
            self.source,
            format!("{} at {}", message.into(), self.pos),
        )
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        let len = s.chars().count();
        if self.pos + len <= self.chars.len()
            && self.chars[self.pos..self.pos + len].iter().copied().eq(s.chars())
        {
            self.pos += len;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: char) -> Result<(), SelectorSyntaxError> {
        self.skip_ws();
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c)))
        }
    }

    fn parse_name(&mut self) -> Result<String, SelectorSyntaxError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        {
            self.pos += 1;
        }
        if self.pos == start || self.chars[start].is_ascii_digit() {
            return Err(self.error("expected a name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_step(&mut self, axis: Axis) -> Result<Step, SelectorSyntaxError> {
        let name = if self.eat('*') {
            None
        } else {
            Some(self.parse_name()?.to_lowercase())
        };
        let mut predicates = Vec::new();
        while self.eat('[') {
            self.skip_ws();
            predicates.push(self.parse_predicate()?);
            self.expect(']')?;
        }
        Ok(Step {
            axis,
            name,
            predicates,
        })
    }

    fn parse_predicate(&mut self) -> Result<Predicate, SelectorSyntaxError> {
        if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            let digits: String = self.chars[start..self.pos].iter().collect();
            return match digits.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Predicate::Position(n)),
                _ => Err(self.error("position must be a positive integer")),
            };
        }

        if self.eat('@') {
            let name = self.parse_name()?.to_lowercase();
            self.skip_ws();
            if self.eat('=') {
                return Ok(Predicate::AttrEquals(name, self.parse_literal()?));
            }
            return Ok(Predicate::HasAttr(name));
        }

        if self.eat_str("text()") {
            self.expect('=')?;
            return Ok(Predicate::OwnTextEquals(self.parse_literal()?));
        }

        if self.eat_str("normalize-space(") {
            self.skip_ws();
            self.eat('.');
            self.expect(')')?;
            self.expect('=')?;
            return Ok(Predicate::TextEquals(self.parse_literal()?));
        }

        if self.eat_str("contains(") {
            self.skip_ws();
            let attr = if self.eat('@') {
                Some(self.parse_name()?.to_lowercase())
            } else if self.eat('.') || self.eat_str("text()") {
                None
            } else {
                return Err(self.error("unsupported contains() argument"));
            };
            self.expect(',')?;
            let value = self.parse_literal()?;
            self.expect(')')?;
            return Ok(match attr {
                Some(name) => Predicate::AttrContains(name, value),
                None => Predicate::TextContains(value),
            });
        }

        Err(self.error("unsupported predicate"))
    }

    fn parse_literal(&mut self) -> Result<String, SelectorSyntaxError> {
        self.skip_ws();
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a string literal")),
        };
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != quote) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.error("unterminated literal"));
        }
        let value = self.chars[start..self.pos].iter().collect();
        self.pos += 1;
        Ok(value)
    }
}
