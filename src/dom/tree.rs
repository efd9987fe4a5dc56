use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a node inside a [`Document`].
///
/// Two handles are equal exactly when they name the same node, which is the
/// identity the uniqueness checks rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout rectangle in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Parse "x,y,width,height"
    pub fn from_string(s: &str) -> Option<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [x, y, w, h] => Some(Rect::new(*x, *y, *w, *h)),
            _ => None,
        }
    }
}

/// Style declarations attached to an element in the snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    pub display: Option<String>,
    pub visibility: Option<String>,
    pub opacity: Option<f64>,
    pub z_index: Option<String>,
}

impl InlineStyle {
    /// Parse a `prop: value; prop: value` declaration block, ignoring unknown properties
    pub fn parse(decls: &str) -> Self {
        let mut style = InlineStyle::default();
        for decl in decls.split(';') {
            let Some((prop, value)) = decl.split_once(':') else {
                continue;
            };
            let value = value.trim().to_lowercase();
            match prop.trim().to_lowercase().as_str() {
                "display" => style.display = Some(value),
                "visibility" => style.visibility = Some(value),
                "opacity" => style.opacity = value.parse().ok(),
                "z-index" => style.z_index = Some(value),
                _ => {}
            }
        }
        style
    }
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub layout: Option<Rect>,
    pub style: InlineStyle,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    ShadowRoot,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Shadow root hosted by this element
    shadow_root: Option<NodeId>,
    /// Host element of this shadow root
    host: Option<NodeId>,
}

/// Arena-backed document tree.
///
/// Nodes are never deallocated; a detached node keeps its handle but is no
/// longer reachable from the root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    pub url: String,
    pub title: String,
    pub viewport: (u32, u32),
}

impl Default for Document {
    fn default() -> Self {
        Self::new("about:blank")
    }
}

impl Document {
    pub fn new(url: &str) -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                shadow_root: None,
                host: None,
            }],
            url: url.to_string(),
            title: String::new(),
            viewport: (1280, 720),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
            shadow_root: None,
            host: None,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_lowercase(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            layout: None,
            style: InlineStyle::default(),
        }))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Create an element and append it in one step
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> NodeId {
        let id = self.create_element(tag, attributes);
        self.append_child(parent, id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.push(NodeKind::Text(text.to_string()));
        self.append_child(parent, id);
        id
    }

    /// Attach an open shadow root to `host`, returning the existing one if present
    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        if let Some(existing) = self.nodes[host.0].shadow_root {
            return existing;
        }
        let root = self.push(NodeKind::ShadowRoot);
        self.nodes[root.0].host = Some(host);
        self.nodes[host.0].shadow_root = Some(root);
        root
    }

    /// Remove a node from its parent. The subtree stays addressable.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    pub fn set_layout(&mut self, node: NodeId, rect: Rect) {
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            data.layout = Some(rect);
        }
    }

    pub fn set_style(&mut self, node: NodeId, style: InlineStyle) {
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            data.style = style;
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            let name = name.to_lowercase();
            match data.attributes.iter_mut().find(|(k, _)| *k == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => data.attributes.push((name, value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            let name = name.to_lowercase();
            data.attributes.retain(|(k, _)| *k != name);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag.as_str())
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn id_attr(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "id").filter(|id| !id.is_empty())
    }

    pub fn classes(&self, node: NodeId) -> Vec<&str> {
        self.attr(node, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Parent in the composed tree: a shadow root's parent is its host
    pub fn composed_parent(&self, node: NodeId) -> Option<NodeId> {
        let n = &self.nodes[node.0];
        n.parent.or(n.host)
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.nodes[host.0].shadow_root
    }

    pub fn host(&self, shadow_root: NodeId) -> Option<NodeId> {
        self.nodes[shadow_root.0].host
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn element_children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(node)
            .iter()
            .copied()
            .filter(move |c| self.is_element(*c))
    }

    /// Ancestors inside the same tree scope, nearest first
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |n| self.parent(*n))
    }

    /// Ancestors across shadow boundaries, nearest first
    pub fn composed_ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.composed_parent(node), move |n| self.composed_parent(*n))
    }

    /// Root of the tree the node belongs to: the document, a shadow root, or
    /// the top of a detached subtree
    pub fn tree_scope(&self, node: NodeId) -> NodeId {
        self.ancestors(node).last().unwrap_or(node)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        node == self.root() || self.composed_ancestors(node).any(|a| a == self.root())
    }

    /// Descendant elements of `scope` in document order. Shadow trees are not entered.
    pub fn descendant_elements(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.is_element(node) {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// All elements of the document, descending into shadow trees, in document order
    pub fn all_elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            if self.is_element(node) {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
            if let Some(shadow) = self.shadow_root(node) {
                stack.push(shadow);
            }
        }
        out
    }

    /// Normalized text of direct text children only
    pub fn own_text(&self, node: NodeId) -> String {
        let raw: Vec<&str> = self
            .children(node)
            .iter()
            .filter_map(|c| match &self.nodes[c.0].kind {
                NodeKind::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        normalize_whitespace(&raw.join(" "))
    }

    /// Normalized text of the whole light subtree
    pub fn text_content(&self, node: NodeId) -> String {
        let mut parts = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            match &self.nodes[n.0].kind {
                NodeKind::Text(t) => parts.push(t.as_str()),
                NodeKind::Element(e) if matches!(e.tag.as_str(), "script" | "style") => continue,
                _ => {}
            }
            stack.extend(self.children(n).iter().rev().copied());
        }
        normalize_whitespace(&parts.join(" "))
    }

    /// Elements sharing the node's parent and tag, in order
    pub fn same_tag_siblings(&self, node: NodeId) -> Vec<NodeId> {
        let Some(tag) = self.tag(node) else {
            return vec![node];
        };
        match self.parent(node) {
            Some(parent) => self
                .element_children(parent)
                .filter(|c| self.tag(*c) == Some(tag))
                .collect(),
            None => vec![node],
        }
    }

    /// 1-based position among same-tag siblings, and the number of such siblings
    pub fn index_of_type(&self, node: NodeId) -> (usize, usize) {
        let siblings = self.same_tag_siblings(node);
        let index = siblings.iter().position(|s| *s == node).unwrap_or(0) + 1;
        (index, siblings.len())
    }

    /// 0-based position among element siblings
    pub fn child_index(&self, node: NodeId) -> usize {
        self.parent(node)
            .and_then(|p| self.element_children(p).position(|c| c == node))
            .unwrap_or(0)
    }

    /// Human-readable path used in log lines, e.g. `html > body > form > input`
    pub fn node_path(&self, node: NodeId) -> String {
        let mut tags: Vec<&str> = std::iter::once(node)
            .chain(self.ancestors(node))
            .filter_map(|n| self.tag(n))
            .collect();
        tags.reverse();
        tags.join(" > ")
    }

    /// The node itself when it is an element, else its nearest composed element
    /// ancestor. Falls back to the node when there is none.
    pub fn closest_element(&self, node: NodeId) -> NodeId {
        if self.is_element(node) {
            return node;
        }
        self.composed_ancestors(node)
            .find(|n| self.is_element(*n))
            .unwrap_or(node)
    }

    /// Find the first element with this id anywhere in the document, shadow trees included
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.all_elements()
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }
}

/// Collapse whitespace runs, map NBSP to a space and trim
pub fn normalize_whitespace(s: &str) -> String {
    s.replace('\u{00A0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
