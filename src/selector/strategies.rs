//! The five candidate strategies
//!
//! Each strategy looks at one element and proposes zero or more selector
//! strings with a baseline confidence. Strategies never validate their own
//! output, except the class-combination search which needs uniqueness to
//! find the smallest sufficient subset.

use super::scorer::{anchored_xpath_baseline, class_combination_baseline, is_auto_generated, text_baseline};
use super::validator::UniquenessValidator;
use super::StrategyKind;
use crate::dom::{aria, css, text, xpath, Document, NodeId};
use crate::dom::aria::NameSource;
use crate::utils::config::RecorderConfig;

/// Longest class list searched for combinations
const MAX_CLASSES_SEARCHED: usize = 8;

/// Longest fragment used for a substring text candidate
const TEXT_FRAGMENT_MAX: usize = 30;

/// Everything a strategy may read about the target
pub struct SynthesisContext<'a> {
    pub doc: &'a Document,
    pub node: NodeId,
    pub config: &'a RecorderConfig,
}

/// Selector string with its unvalidated baseline confidence
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub value: String,
    pub baseline: f64,
}

impl RawCandidate {
    pub fn new(value: impl Into<String>, baseline: f64) -> Self {
        Self {
            value: value.into(),
            baseline,
        }
    }
}

/// A way of describing an element
pub trait SelectorStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn candidates(&self, ctx: &SynthesisContext<'_>) -> Vec<RawCandidate>;
}

/// All strategies in priority order
pub fn all() -> Vec<Box<dyn SelectorStrategy>> {
    vec![
        Box::new(DataAttributeStrategy),
        Box::new(SemanticStrategy),
        Box::new(CssStrategy),
        Box::new(XPathStrategy),
        Box::new(TextStrategy),
    ]
}

fn attr_selector(prefix: &str, name: &str, value: &str) -> String {
    format!("{}[{}={}]", prefix, css::escape_ident(name), css::quote_string(value))
}

/// Id usable as an anchor: present, not machine-generated
fn stable_id<'a>(doc: &'a Document, node: NodeId) -> Option<&'a str> {
    doc.id_attr(node).filter(|id| !is_auto_generated(id))
}

// ============================================================================
// DataAttribute
// ============================================================================

/// Test-hook attributes such as `data-testid`
pub struct DataAttributeStrategy;

impl SelectorStrategy for DataAttributeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DataAttribute
    }

    fn candidates(&self, ctx: &SynthesisContext<'_>) -> Vec<RawCandidate> {
        let (doc, node, config) = (ctx.doc, ctx.node, ctx.config);
        let mut out = Vec::new();

        for (rank, name) in config.test_attributes.iter().enumerate() {
            if let Some(value) = doc.attr(node, name).filter(|v| !v.is_empty()) {
                out.push(RawCandidate::new(
                    attr_selector("", name, value),
                    1.0 - 0.01 * rank as f64,
                ));
            }
        }

        let Some(element) = doc.element(node) else {
            return out;
        };
        for (name, value) in &element.attributes {
            if value.is_empty() || config.test_attributes.contains(name) {
                continue;
            }
            if config
                .test_attribute_prefixes
                .iter()
                .any(|p| name.starts_with(p.as_str()))
            {
                out.push(RawCandidate::new(attr_selector("", name, value), 0.9));
            }
        }
        out
    }
}

// ============================================================================
// Semantic
// ============================================================================

/// Role and accessible name, form labels, and meaningful tag+attribute pairs
pub struct SemanticStrategy;

impl SelectorStrategy for SemanticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Semantic
    }

    fn candidates(&self, ctx: &SynthesisContext<'_>) -> Vec<RawCandidate> {
        let (doc, node) = (ctx.doc, ctx.node);
        let Some(tag) = doc.tag(node) else {
            return Vec::new();
        };
        let tag = css::escape_ident(tag);
        let mut out = Vec::new();

        if let (Some(role), Some((name, source))) =
            (aria::role(doc, node), aria::accessible_name(doc, node))
        {
            let baseline = if source == NameSource::Content { 0.85 } else { 0.9 };
            out.push(RawCandidate::new(aria::role_selector(&role, &name), baseline));
        }

        if let Some(label) = aria::label_text(doc, node) {
            out.push(RawCandidate::new(aria::label_selector(&label), 0.85));
        }

        let attr_pairs: [(&str, f64); 4] = [
            ("aria-label", 0.8),
            ("name", 0.75),
            ("placeholder", 0.7),
            ("title", 0.7),
        ];
        for (attr, baseline) in attr_pairs {
            if let Some(value) = doc.attr(node, attr).filter(|v| !v.trim().is_empty()) {
                out.push(RawCandidate::new(attr_selector(&tag, attr, value), baseline));
            }
        }
        if tag == "img" {
            if let Some(alt) = doc.attr(node, "alt").filter(|v| !v.trim().is_empty()) {
                out.push(RawCandidate::new(attr_selector(&tag, "alt", alt), 0.7));
            }
        }
        out
    }
}

// ============================================================================
// Css
// ============================================================================

/// `#id`, minimal class combinations, and an nth-of-type path
pub struct CssStrategy;

impl SelectorStrategy for CssStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Css
    }

    fn candidates(&self, ctx: &SynthesisContext<'_>) -> Vec<RawCandidate> {
        let (doc, node) = (ctx.doc, ctx.node);
        if !doc.is_element(node) {
            return Vec::new();
        }
        let mut out = Vec::new();

        if let Some(id) = stable_id(doc, node) {
            out.push(RawCandidate::new(format!("#{}", css::escape_ident(id)), 0.8));
        }
        if let Some(candidate) = class_combination(ctx) {
            out.push(candidate);
        }
        if let Some(candidate) = structural_path(doc, node) {
            out.push(candidate);
        }
        out
    }
}

/// Smallest class subset that is unique; if none is, the first usable class
fn class_combination(ctx: &SynthesisContext<'_>) -> Option<RawCandidate> {
    let (doc, node, config) = (ctx.doc, ctx.node, ctx.config);
    let tag = css::escape_ident(doc.tag(node)?);
    let usable: Vec<String> = doc
        .classes(node)
        .into_iter()
        .filter(|c| !is_auto_generated(c) && !c.starts_with(config.ui_marker_prefix.as_str()))
        .take(MAX_CLASSES_SEARCHED)
        .map(css::escape_ident)
        .collect();
    if usable.is_empty() {
        return None;
    }

    let build = |subset: &[&String]| {
        let mut selector = tag.clone();
        for class in subset {
            selector.push('.');
            selector.push_str(class);
        }
        selector
    };

    for size in 1..=config.max_class_combination.min(usable.len()) {
        for subset in combinations(&usable, size) {
            let selector = build(&subset);
            if UniquenessValidator::is_unique(doc, &selector, StrategyKind::Css, node) {
                return Some(RawCandidate::new(selector, class_combination_baseline(size)));
            }
        }
    }
    Some(RawCandidate::new(
        build(&[&usable[0]]),
        class_combination_baseline(1),
    ))
}

/// All `size`-element subsets in lexicographic index order
fn combinations<T>(items: &[T], size: usize) -> Vec<Vec<&T>> {
    if size == 0 {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for (i, item) in items.iter().enumerate() {
        for mut rest in combinations(&items[i + 1..], size - 1) {
            rest.insert(0, item);
            out.push(rest);
        }
    }
    out
}

/// Child-combinator path anchored at the nearest stable id, else at `body`
/// or the top of the tree scope
fn structural_path(doc: &Document, node: NodeId) -> Option<RawCandidate> {
    let mut steps = Vec::new();
    let mut current = node;
    let baseline = loop {
        let tag = doc.tag(current)?;
        if current != node {
            if let Some(id) = stable_id(doc, current) {
                steps.push(format!("#{}", css::escape_ident(id)));
                break 0.55;
            }
        }
        if tag == "body" {
            steps.push("body".to_string());
            break 0.5;
        }
        let (index, count) = doc.index_of_type(current);
        let tag = css::escape_ident(tag);
        steps.push(if count > 1 {
            format!("{}:nth-of-type({})", tag, index)
        } else {
            tag
        });
        match doc.parent(current) {
            Some(parent) if doc.is_element(parent) => current = parent,
            _ => break 0.5,
        }
    };
    if steps.len() < 2 {
        return None;
    }
    steps.reverse();
    Some(RawCandidate::new(steps.join(" > "), baseline))
}

// ============================================================================
// XPath
// ============================================================================

/// Id-anchored relative path, else a fully positional path
pub struct XPathStrategy;

impl SelectorStrategy for XPathStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::XPath
    }

    fn candidates(&self, ctx: &SynthesisContext<'_>) -> Vec<RawCandidate> {
        let (doc, node) = (ctx.doc, ctx.node);
        if !doc.is_element(node) {
            return Vec::new();
        }
        match anchored_xpath(doc, node) {
            Some(candidate) => vec![candidate],
            None => vec![RawCandidate::new(positional_xpath(doc, node), 0.3)],
        }
    }
}

/// One location step: `tag`, `tag[n]` when other same-tag siblings exist,
/// or `*[n]` for tags that are not plain XPath names
fn xpath_step(doc: &Document, node: NodeId) -> String {
    let tag = doc.tag(node).unwrap_or("*");
    let plain = tag
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && tag.starts_with(|c: char| c.is_ascii_alphabetic());
    if !plain {
        return format!("*[{}]", doc.child_index(node) + 1);
    }
    let (index, count) = doc.index_of_type(node);
    if count > 1 {
        format!("{}[{}]", tag, index)
    } else {
        tag.to_string()
    }
}

fn anchored_xpath(doc: &Document, node: NodeId) -> Option<RawCandidate> {
    let mut steps: Vec<String> = Vec::new();
    let mut current = node;
    loop {
        if let Some(literal) = stable_id(doc, current).and_then(xpath::quote_literal) {
            steps.reverse();
            let mut path = format!("//*[@id={}]", literal);
            for step in &steps {
                path.push('/');
                path.push_str(step);
            }
            return Some(RawCandidate::new(
                path,
                anchored_xpath_baseline(steps.len() + 1),
            ));
        }
        steps.push(xpath_step(doc, current));
        current = doc.parent(current).filter(|p| doc.is_element(*p))?;
    }
}

/// Absolute path from the top of the node's tree scope, one step per ancestor.
/// Sibling indices make the path resolve to this node alone.
pub fn positional_xpath(doc: &Document, node: NodeId) -> String {
    let mut steps = Vec::new();
    let mut current = node;
    loop {
        steps.push(xpath_step(doc, current));
        match doc.parent(current) {
            Some(parent) if doc.is_element(parent) => current = parent,
            _ => break,
        }
    }
    steps.reverse();
    format!("/{}", steps.join("/"))
}

// ============================================================================
// TextBased
// ============================================================================

/// Exact and substring matches on the element's own text
pub struct TextStrategy;

impl SelectorStrategy for TextStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TextBased
    }

    fn candidates(&self, ctx: &SynthesisContext<'_>) -> Vec<RawCandidate> {
        let (doc, node, config) = (ctx.doc, ctx.node, ctx.config);
        if matches!(doc.tag(node), Some("script" | "style") | None) {
            return Vec::new();
        }
        let own = doc.own_text(node);
        let length = own.chars().count();
        if length < config.text_selector_min_length || length > config.text_selector_max_length {
            return Vec::new();
        }

        let mut out = vec![RawCandidate::new(text::exact(&own), text_baseline(&own, true))];
        let fragment = text_fragment(&own);
        if !fragment.starts_with('"') {
            out.push(RawCandidate::new(
                text::contains(&fragment),
                text_baseline(&fragment, false),
            ));
        }
        out
    }
}

/// Leading whole words of the text, at most [`TEXT_FRAGMENT_MAX`] characters
fn text_fragment(text: &str) -> String {
    if text.chars().count() <= TEXT_FRAGMENT_MAX {
        return text.to_string();
    }
    let mut fragment = String::new();
    for word in text.split(' ') {
        let next = if fragment.is_empty() {
            word.chars().count()
        } else {
            fragment.chars().count() + 1 + word.chars().count()
        };
        if next > TEXT_FRAGMENT_MAX {
            break;
        }
        if !fragment.is_empty() {
            fragment.push(' ');
        }
        fragment.push_str(word);
    }
    if fragment.is_empty() {
        text.chars().take(TEXT_FRAGMENT_MAX).collect()
    } else {
        fragment
    }
}
