//! CSS selector subset
//!
//! Supports type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `=`, `~=`, `^=`, `$=`, `*=`, `|=`, optional `i` flag),
//! `:nth-of-type(n)`, `:first-of-type`, `:last-of-type`, the descendant and
//! child combinators, and selector lists.

use std::collections::HashMap;

use super::tree::{Document, NodeId};
use crate::error::SelectorSyntaxError;

const ENGINE: &str = "css";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    Prefix,
    Suffix,
    Substring,
    DashMatch,
}

#[derive(Debug, Clone)]
struct AttrSelector {
    name: String,
    op: AttrOp,
    value: String,
    case_insensitive: bool,
}

#[derive(Debug, Clone, Copy)]
enum Pseudo {
    NthOfType(usize),
    FirstOfType,
    LastOfType,
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone)]
struct Complex {
    /// Compounds left to right; `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

/// A parsed selector list
#[derive(Debug, Clone)]
pub struct CssSelector {
    list: Vec<Complex>,
}

impl CssSelector {
    pub fn parse(input: &str) -> Result<Self, SelectorSyntaxError> {
        Parser::new(input).parse_list()
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.matches_in(doc, node, None)
    }

    fn matches_in(&self, doc: &Document, node: NodeId, types: Option<&TypePositions>) -> bool {
        doc.is_element(node)
            && self
                .list
                .iter()
                .any(|c| matches_complex(doc, node, c, c.compounds.len() - 1, types))
    }

    fn has_pseudos(&self) -> bool {
        self.list
            .iter()
            .flat_map(|c| c.compounds.iter())
            .any(|c| !c.pseudos.is_empty())
    }
}

/// `(index, count)` among same-tag siblings for every element under a scope
struct TypePositions(HashMap<NodeId, (usize, usize)>);

impl TypePositions {
    fn build(doc: &Document, scope: NodeId, elements: &[NodeId]) -> Self {
        let mut positions = HashMap::with_capacity(elements.len());
        for parent in std::iter::once(scope).chain(elements.iter().copied()) {
            let mut by_tag: HashMap<&str, Vec<NodeId>> = HashMap::new();
            for child in doc.element_children(parent) {
                if let Some(tag) = doc.tag(child) {
                    by_tag.entry(tag).or_default().push(child);
                }
            }
            for siblings in by_tag.values() {
                for (i, child) in siblings.iter().enumerate() {
                    positions.insert(*child, (i + 1, siblings.len()));
                }
            }
        }
        Self(positions)
    }

    fn get(&self, doc: &Document, node: NodeId) -> (usize, usize) {
        self.0
            .get(&node)
            .copied()
            .unwrap_or_else(|| doc.index_of_type(node))
    }
}

/// Resolve a selector against the elements of a tree scope, in document order
pub fn query_all(
    doc: &Document,
    scope: NodeId,
    selector: &str,
) -> Result<Vec<NodeId>, SelectorSyntaxError> {
    let parsed = CssSelector::parse(selector)?;
    let elements = doc.descendant_elements(scope);
    let types = parsed
        .has_pseudos()
        .then(|| TypePositions::build(doc, scope, &elements));
    Ok(elements
        .into_iter()
        .filter(|n| parsed.matches_in(doc, *n, types.as_ref()))
        .collect())
}

fn matches_complex(
    doc: &Document,
    node: NodeId,
    complex: &Complex,
    idx: usize,
    types: Option<&TypePositions>,
) -> bool {
    if !matches_compound(doc, node, &complex.compounds[idx], types) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match complex.combinators[idx - 1] {
        Combinator::Child => doc
            .parent(node)
            .filter(|p| doc.is_element(*p))
            .is_some_and(|p| matches_complex(doc, p, complex, idx - 1, types)),
        Combinator::Descendant => doc
            .ancestors(node)
            .filter(|a| doc.is_element(*a))
            .any(|a| matches_complex(doc, a, complex, idx - 1, types)),
    }
}

fn matches_compound(
    doc: &Document,
    node: NodeId,
    compound: &Compound,
    types: Option<&TypePositions>,
) -> bool {
    let Some(el) = doc.element(node) else {
        return false;
    };
    if let Some(tag) = &compound.tag {
        if *tag != el.tag {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if doc.attr(node, "id") != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let classes = doc.classes(node);
        if !compound.classes.iter().all(|c| classes.contains(&c.as_str())) {
            return false;
        }
    }
    for attr in &compound.attrs {
        let Some(actual) = doc.attr(node, &attr.name) else {
            return false;
        };
        if !matches_attr(actual, attr) {
            return false;
        }
    }
    for pseudo in &compound.pseudos {
        let (index, count) = match types {
            Some(types) => types.get(doc, node),
            None => doc.index_of_type(node),
        };
        let ok = match pseudo {
            Pseudo::NthOfType(n) => index == *n,
            Pseudo::FirstOfType => index == 1,
            Pseudo::LastOfType => index == count,
        };
        if !ok {
            return false;
        }
    }
    true
}

fn matches_attr(actual: &str, sel: &AttrSelector) -> bool {
    let (actual, expected) = if sel.case_insensitive {
        (actual.to_lowercase(), sel.value.to_lowercase())
    } else {
        (actual.to_string(), sel.value.clone())
    };
    match sel.op {
        AttrOp::Exists => true,
        AttrOp::Equals => actual == expected,
        AttrOp::Includes => !expected.is_empty() && actual.split_whitespace().any(|w| w == expected),
        AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
        AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
        AttrOp::Substring => !expected.is_empty() && actual.contains(&expected),
        AttrOp::DashMatch => actual == expected || actual.starts_with(&format!("{}-", expected)),
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

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

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> Result<CssSelector, SelectorSyntaxError> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            list.push(self.parse_complex()?);
            self.skip_ws();
            match self.bump() {
                None => break,
                Some(',') => continue,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(CssSelector { list })
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorSyntaxError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(',') | None => break,
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorSyntaxError> {
        let mut compound = Compound::default();
        let mut any = false;

        if self.eat('*') {
            any = true;
        } else if self.at_ident_start() {
            compound.tag = Some(self.parse_ident()?.to_lowercase());
            any = true;
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.pseudos.push(self.parse_pseudo()?);
                }
                _ => break,
            }
            any = true;
        }

        if !any {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn parse_attr(&mut self) -> Result<AttrSelector, SelectorSyntaxError> {
        self.skip_ws();
        let name = self.parse_ident()?.to_lowercase();
        self.skip_ws();

        let op = match (self.peek(), self.peek_at(1)) {
            (Some(']'), _) => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                    case_insensitive: false,
                });
            }
            (Some('='), _) => {
                self.pos += 1;
                AttrOp::Equals
            }
            (Some(c), Some('=')) => {
                let op = match c {
                    '~' => AttrOp::Includes,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    '*' => AttrOp::Substring,
                    '|' => AttrOp::DashMatch,
                    _ => return Err(self.error(format!("unknown attribute operator '{}='", c))),
                };
                self.pos += 2;
                op
            }
            _ => return Err(self.error("expected attribute operator")),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some('"') | Some('\'') => self.parse_string()?,
            _ => self.parse_ident()?,
        };
        self.skip_ws();
        let case_insensitive = matches!(self.peek(), Some('i') | Some('I'));
        if case_insensitive {
            self.pos += 1;
            self.skip_ws();
        }
        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(AttrSelector {
            name,
            op,
            value,
            case_insensitive,
        })
    }

    fn parse_pseudo(&mut self) -> Result<Pseudo, SelectorSyntaxError> {
        let name = self.parse_ident()?.to_lowercase();
        match name.as_str() {
            "first-of-type" => Ok(Pseudo::FirstOfType),
            "last-of-type" => Ok(Pseudo::LastOfType),
            "nth-of-type" => {
                if !self.eat('(') {
                    return Err(self.error("expected '('"));
                }
                self.skip_ws();
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                let n: usize = digits
                    .parse()
                    .map_err(|_| self.error("expected a positive integer"))?;
                self.skip_ws();
                if n == 0 || !self.eat(')') {
                    return Err(self.error("malformed :nth-of-type"));
                }
                Ok(Pseudo::NthOfType(n))
            }
            other => Err(self.error(format!("unsupported pseudo-class ':{}'", other))),
        }
    }

    fn at_ident_start(&self) -> bool {
        match self.peek() {
            Some(c) if is_name_start(c) || c == '\\' => true,
            Some('-') => match self.peek_at(1) {
                Some(c) => is_name_start(c) || c == '-' || c == '\\',
                None => false,
            },
            _ => false,
        }
    }

    fn parse_ident(&mut self) -> Result<String, SelectorSyntaxError> {
        if !self.at_ident_start() {
            return Err(self.error("expected identifier"));
        }
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                out.push(self.parse_escape()?);
            } else if is_name_char(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(out)
    }

    fn parse_escape(&mut self) -> Result<char, SelectorSyntaxError> {
        let start = self.pos;
        while self.pos - start < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.pos += 1;
        }
        if self.pos > start {
            let hex: String = self.chars[start..self.pos].iter().collect();
            if self.peek().is_some_and(char::is_whitespace) {
                self.pos += 1;
            }
            let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
            return Ok(char::from_u32(code)
                .filter(|c| *c != '\0')
                .unwrap_or('\u{FFFD}'));
        }
        match self.bump() {
            Some('\n') | None => Err(self.error("invalid escape")),
            Some(c) => Ok(c),
        }
    }

    fn parse_string(&mut self) -> Result<String, SelectorSyntaxError> {
        let Some(quote) = self.bump() else {
            return Err(self.error("expected string"));
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.parse_escape()?),
                Some(c) => out.push(c),
            }
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-'
}

/// Serialize a string as a CSS identifier (same rules as `CSS.escape`)
pub fn escape_ident(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        if c == '\0' {
            out.push('\u{FFFD}');
        } else if (1..=0x1f).contains(&code)
            || code == 0x7f
            || (i == 0 && c.is_ascii_digit())
            || (i == 1 && c.is_ascii_digit() && chars[0] == '-')
        {
            out.push_str(&format!("\\{:x} ", code));
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if !c.is_ascii() || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Quote a string for use as an attribute value
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\a "),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse(
            r#"<html><body>
                <nav class="menu main"><a href="/a" class="item">A</a><a href="/b" class="item active">B</a></nav>
                <form id="login">
                  <input name="user" type="text"/>
                  <input name="pass" type="password"/>
                  <button data-testid="go" lang="en-US">Go</button>
                </form>
                <div id="123abc">numeric</div>
              </body></html>"#,
        )
        .unwrap()
    }

    fn count(doc: &Document, sel: &str) -> usize {
        query_all(doc, doc.root(), sel).unwrap().len()
    }

    #[test]
    fn test_simple_selectors() {
        let doc = doc();
        assert_eq!(count(&doc, "a"), 2);
        assert_eq!(count(&doc, ".item.active"), 1);
        assert_eq!(count(&doc, "#login input"), 2);
        assert_eq!(count(&doc, "form > input[type=\"password\"]"), 1);
        assert_eq!(count(&doc, "body > input"), 0);
        assert_eq!(count(&doc, "[data-testid='go']"), 1);
        assert_eq!(count(&doc, "*"), 10);
    }

    #[test]
    fn test_attribute_operators() {
        let doc = doc();
        assert_eq!(count(&doc, "a[href^=\"/\"]"), 2);
        assert_eq!(count(&doc, "a[href$=b]"), 1);
        assert_eq!(count(&doc, "nav[class~=main]"), 1);
        assert_eq!(count(&doc, "[lang|=en]"), 1);
        assert_eq!(count(&doc, "input[name*=AS i]"), 1);
    }

    #[test]
    fn test_nth_of_type() {
        let doc = doc();
        assert_eq!(count(&doc, "form > input:nth-of-type(2)"), 1);
        assert_eq!(count(&doc, "nav > a:first-of-type"), 1);
        assert_eq!(count(&doc, "nav > a:last-of-type.active"), 1);
    }

    #[test]
    fn test_nth_of_type_on_long_sibling_runs() {
        let mut markup = String::from("<html><body><form>");
        for i in 0..400 {
            markup.push_str(&format!(r#"<label>L{i}</label><input name="f{i}"/>"#));
        }
        markup.push_str("</form><p>tail</p></body></html>");
        let doc = Document::parse(&markup).unwrap();

        let hits = query_all(&doc, doc.root(), "body > form > input:nth-of-type(390)").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(doc.attr(hits[0], "name"), Some("f389"));
        assert_eq!(count(&doc, "form > label:last-of-type"), 1);
        assert_eq!(count(&doc, "body > p:first-of-type:last-of-type"), 1);

        let sel = CssSelector::parse("input:nth-of-type(390)").unwrap();
        assert!(sel.matches(&doc, hits[0]));
    }

    #[test]
    fn test_selector_list() {
        let doc = doc();
        assert_eq!(count(&doc, "nav, form"), 2);
    }

    #[test]
    fn test_escaped_identifiers() {
        let doc = doc();
        assert_eq!(escape_ident("123abc"), "\\31 23abc");
        assert_eq!(count(&doc, &format!("#{}", escape_ident("123abc"))), 1);
        assert_eq!(escape_ident("a:b.c"), "a\\:b\\.c");
        assert_eq!(escape_ident("-"), "\\-");
        assert_eq!(escape_ident("-1x"), "-\\31 x");
    }

    #[test]
    fn test_malformed_selectors_are_errors() {
        let doc = doc();
        for bad in [
            "#123abc",
            "div[",
            "a[href=\"x]",
            "..x",
            "a >",
            "a:hover",
            ":nth-of-type(0)",
            "",
            "a,,b",
        ] {
            assert!(query_all(&doc, doc.root(), bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("say \"hi\""), "\"say \\\"hi\\\"\"");
        let doc = Document::parse(r#"<html><body><p title='say "hi"'>x</p></body></html>"#).unwrap();
        let sel = format!("p[title={}]", quote_string("say \"hi\""));
        assert_eq!(count(&doc, &sel), 1);
    }
}
