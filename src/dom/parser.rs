//! Snapshot parser: XHTML-style markup to [`Document`]
//!
//! Markup is read with quick-xml in a lenient mode: end tags close the
//! nearest matching open element, HTML void elements need no closing slash,
//! and valueless attributes (`<input checked>`) are accepted.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use super::tree::{Document, InlineStyle, NodeId, Rect};
use crate::error::DomError;

/// Pseudo-attribute carrying the element's layout box
pub const BOUNDS_ATTR: &str = "lumi:bounds";
/// Pseudo-attribute carrying computed style declarations
pub const STYLE_ATTR: &str = "lumi:style";
/// Root pseudo-attributes carrying page context
pub const URL_ATTR: &str = "lumi:url";
pub const VIEWPORT_ATTR: &str = "lumi:viewport";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

static DECIMAL_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&#(\d+);").unwrap());
static HEX_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&#[xX]([0-9A-Fa-f]+);").unwrap());

/// Decode common HTML entities in a string
/// Handles: &amp; &lt; &gt; &quot; &apos; &nbsp; &#NNN; (decimal) &#xHHH; (hex)
fn decode_html_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut result = s.to_string();
    result = result.replace("&lt;", "<");
    result = result.replace("&gt;", ">");
    result = result.replace("&quot;", "\"");
    result = result.replace("&apos;", "'");
    result = result.replace("&nbsp;", "\u{00A0}");

    result = DECIMAL_ENTITY
        .replace_all(&result, |caps: &regex::Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string();

    result = HEX_ENTITY
        .replace_all(&result, |caps: &regex::Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string();

    // Last, so "&amp;lt;" stays "&lt;"
    result.replace("&amp;", "&")
}

struct OpenElement {
    tag: String,
    container: NodeId,
}

impl Document {
    /// Parse a markup snapshot into a document
    pub fn parse(markup: &str) -> Result<Document, DomError> {
        let mut doc = Document::default();
        let mut reader = Reader::from_str(markup);
        reader.trim_text(false);
        reader.check_end_names(false);

        let mut stack: Vec<OpenElement> = Vec::new();
        let mut in_title = false;
        let mut buf = Vec::new();

        loop {
            let current = stack.last().map(|o| o.container).unwrap_or(doc.root());
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let tag = tag_name(e);
                    if tag == "template" && is_shadow_template(e) {
                        let shadow = doc.attach_shadow(current);
                        stack.push(OpenElement {
                            tag,
                            container: shadow,
                        });
                    } else {
                        let node = open_element(&mut doc, current, e);
                        in_title = tag == "title";
                        if !VOID_ELEMENTS.contains(&tag.as_str()) {
                            stack.push(OpenElement {
                                tag,
                                container: node,
                            });
                        }
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    open_element(&mut doc, current, e);
                }
                Ok(Event::End(ref e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                    if let Some(pos) = stack.iter().rposition(|o| o.tag == tag) {
                        stack.truncate(pos);
                    }
                    if tag == "title" {
                        in_title = false;
                    }
                }
                Ok(Event::Text(ref e)) => {
                    let text = decode_html_entities(&String::from_utf8_lossy(e));
                    if in_title {
                        doc.title = super::normalize_whitespace(&text);
                    }
                    if current != doc.root() {
                        doc.append_text(current, &text);
                    }
                }
                Ok(Event::CData(ref e)) => {
                    let text = String::from_utf8_lossy(e).to_string();
                    if current != doc.root() {
                        doc.append_text(current, &text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(DomError::Parse {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    })
                }
                _ => {}
            }
            buf.clear();
        }

        let Some(first) = doc.element_children(doc.root()).next() else {
            return Err(DomError::Empty);
        };
        if let Some(url) = doc.attr(first, URL_ATTR).map(str::to_string) {
            doc.url = url;
            doc.remove_attribute(first, URL_ATTR);
        }
        if let Some(viewport) = doc.attr(first, VIEWPORT_ATTR).map(str::to_string) {
            if let Some((w, h)) = viewport.split_once(['x', 'X']) {
                if let (Ok(w), Ok(h)) = (w.trim().parse(), h.trim().parse()) {
                    doc.viewport = (w, h);
                }
            }
            doc.remove_attribute(first, VIEWPORT_ATTR);
        }

        Ok(doc)
    }

    /// Read and parse a snapshot file
    pub fn load(path: &Path) -> Result<Document, DomError> {
        let markup = std::fs::read_to_string(path)?;
        Document::parse(&markup)
    }
}

fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_lowercase()
}

fn is_shadow_template(e: &BytesStart) -> bool {
    e.html_attributes().filter_map(|a| a.ok()).any(|a| {
        let key = String::from_utf8_lossy(a.key.as_ref()).to_lowercase();
        key == "shadowrootmode" || key == "shadowroot"
    })
}

fn open_element(doc: &mut Document, parent: NodeId, e: &BytesStart) -> NodeId {
    let node = doc.create_element(&tag_name(e), &[]);
    let mut style = InlineStyle::default();
    let mut computed: Option<InlineStyle> = None;

    for attr in e.html_attributes().filter_map(|a| a.ok()) {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();
        let value = decode_html_entities(&String::from_utf8_lossy(&attr.value));

        match key.as_str() {
            BOUNDS_ATTR => {
                if let Some(rect) = Rect::from_string(&value) {
                    doc.set_layout(node, rect);
                }
            }
            STYLE_ATTR => computed = Some(InlineStyle::parse(&value)),
            _ => {
                if key == "style" {
                    style = InlineStyle::parse(&value);
                }
                doc.set_attribute(node, &key, &value);
            }
        }
    }

    doc.set_style(node, computed.unwrap_or(style));
    doc.append_child(parent, node);
    node
}
