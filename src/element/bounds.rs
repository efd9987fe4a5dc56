use log::warn;

use super::facts::ComputedStyle;
use crate::dom::{Document, NodeId, Rect};
use crate::error::GeometryUnavailable;

/// Geometry and visibility of a node at probe time
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub bounds: Rect,
    pub is_visible: bool,
    pub style: ComputedStyle,
}

/// Reads layout, visibility and computed style. Stateless.
pub struct ElementBoundsProbe;

impl ElementBoundsProbe {
    /// Probe a node, substituting a zero rectangle and `is_visible = false`
    /// when geometry cannot be read
    pub fn probe(doc: &Document, node: NodeId) -> Geometry {
        match Self::try_probe(doc, node) {
            Ok(geometry) => geometry,
            Err(e) => {
                warn!("{}; recording zero bounds", e);
                Geometry {
                    bounds: Rect::default(),
                    is_visible: false,
                    style: Self::computed_style(doc, node),
                }
            }
        }
    }

    pub fn try_probe(doc: &Document, node: NodeId) -> Result<Geometry, GeometryUnavailable> {
        let Some(element) = doc.element(node) else {
            return Err(GeometryUnavailable {
                node,
                reason: "not an element",
            });
        };
        if !doc.is_connected(node) {
            return Err(GeometryUnavailable {
                node,
                reason: "node is detached",
            });
        }

        let style = Self::computed_style(doc, node);
        let laid_out = element.layout.map(|r| r.area() > 0.0).unwrap_or(true);
        let is_visible = laid_out && Self::rendered(doc, node);

        Ok(Geometry {
            bounds: element.layout.unwrap_or_default(),
            is_visible,
            style,
        })
    }

    /// Resolve display/visibility/opacity/z-index, inheriting visibility
    pub fn computed_style(doc: &Document, node: NodeId) -> ComputedStyle {
        let Some(element) = doc.element(node) else {
            return ComputedStyle::default();
        };
        let own = &element.style;

        let visibility = std::iter::once(node)
            .chain(doc.composed_ancestors(node))
            .find_map(|n| doc.element(n).and_then(|e| e.style.visibility.clone()))
            .unwrap_or_else(|| "visible".to_string());

        ComputedStyle {
            display: own
                .display
                .clone()
                .unwrap_or_else(|| default_display(&element.tag).to_string()),
            visibility,
            opacity: own.opacity.unwrap_or(1.0).clamp(0.0, 1.0),
            z_index: own.z_index.clone().unwrap_or_else(|| "auto".to_string()),
        }
    }

    /// No `display:none` or zero opacity on the node or a composed ancestor,
    /// and the effective visibility is not hidden
    fn rendered(doc: &Document, node: NodeId) -> bool {
        let chain: Vec<NodeId> = std::iter::once(node)
            .chain(doc.composed_ancestors(node))
            .filter(|n| doc.is_element(*n))
            .collect();

        let hidden_box = chain.iter().any(|n| {
            let style = Self::computed_style(doc, *n);
            style.display == "none" || style.opacity <= 0.0
        });
        if hidden_box {
            return false;
        }
        let visibility = Self::computed_style(doc, node).visibility;
        visibility != "hidden" && visibility != "collapse"
    }
}

fn default_display(tag: &str) -> &'static str {
    match tag {
        "head" | "script" | "style" | "template" | "title" | "meta" | "link" => "none",
        "li" => "list-item",
        "table" => "table",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        "button" | "input" | "select" | "textarea" | "img" => "inline-block",
        "html" | "body" | "div" | "p" | "form" | "ul" | "ol" | "section" | "article"
        | "header" | "footer" | "nav" | "main" | "aside" | "h1" | "h2" | "h3" | "h4" | "h5"
        | "h6" | "fieldset" | "dialog" => "block",
        _ => "inline",
    }
}
