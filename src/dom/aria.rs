//! Roles, accessible names and label association
//!
//! A pragmatic subset of the ARIA mapping: enough to describe interactive
//! controls by `role=<role>[name="..."]` and `label="..."`.

use std::collections::HashMap;

use super::tree::{normalize_whitespace, Document, NodeId};
use crate::error::SelectorSyntaxError;

const ENGINE: &str = "role";

/// Roles whose accessible name may come from their text content
const NAME_FROM_CONTENT: &[&str] = &[
    "button", "link", "heading", "option", "tab", "menuitem", "cell", "listitem", "checkbox",
    "radio", "switch", "treeitem",
];

/// Explicit `role` attribute, else the implicit role of the element
pub fn role(doc: &Document, node: NodeId) -> Option<String> {
    if let Some(explicit) = doc.attr(node, "role").and_then(|r| r.split_whitespace().next()) {
        return Some(explicit.to_lowercase());
    }
    implicit_role(doc, node).map(str::to_string)
}

fn implicit_role(doc: &Document, node: NodeId) -> Option<&'static str> {
    let tag = doc.tag(node)?;
    let role = match tag {
        "a" | "area" if doc.has_attr(node, "href") => "link",
        "button" => "button",
        "input" => match input_type(doc, node).as_str() {
            "button" | "submit" | "reset" | "image" => "button",
            "checkbox" => "checkbox",
            "radio" => "radio",
            "range" => "slider",
            "number" => "spinbutton",
            "search" => "searchbox",
            "text" | "email" | "tel" | "url" => "textbox",
            _ => return None,
        },
        "select" => {
            let sized = doc
                .attr(node, "size")
                .and_then(|s| s.parse::<u32>().ok())
                .is_some_and(|s| s > 1);
            if doc.has_attr(node, "multiple") || sized {
                "listbox"
            } else {
                "combobox"
            }
        }
        "textarea" => "textbox",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "img" if doc.attr(node, "alt").is_some_and(|a| !a.is_empty()) => "img",
        "nav" => "navigation",
        "main" => "main",
        "aside" => "complementary",
        "dialog" => "dialog",
        "ul" | "ol" => "list",
        "li" => "listitem",
        "table" => "table",
        "td" => "cell",
        "option" => "option",
        "form" if doc.has_attr(node, "aria-label") || doc.has_attr(node, "name") => "form",
        _ => return None,
    };
    Some(role)
}

/// Lower-cased `type` of an input, defaulting to `text`
pub fn input_type(doc: &Document, node: NodeId) -> String {
    doc.attr(node, "type")
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "text".to_string())
}

/// Elements a `<label>` can be associated with
pub fn is_labelable(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        Some("input") => input_type(doc, node) != "hidden",
        Some("select" | "textarea" | "button" | "meter" | "output" | "progress") => true,
        _ => false,
    }
}

/// `label[for]` and `id` lookups for one tree scope.
///
/// Built once per query so name and label checks stay constant-time per
/// candidate element. First occurrence in document order wins, as with
/// `getElementById`.
#[derive(Debug, Default)]
pub struct LabelIndex {
    labels_for: HashMap<String, NodeId>,
    ids: HashMap<String, NodeId>,
}

impl LabelIndex {
    /// Index the tree scope that contains `node`
    pub fn for_scope_of(doc: &Document, node: NodeId) -> Self {
        let mut index = Self::default();
        for n in doc.descendant_elements(doc.tree_scope(node)) {
            if let Some(id) = doc.attr(n, "id") {
                index.ids.entry(id.to_string()).or_insert(n);
            }
            if doc.tag(n) == Some("label") {
                if let Some(target) = doc.attr(n, "for") {
                    index.labels_for.entry(target.to_string()).or_insert(n);
                }
            }
        }
        index
    }

    pub fn label_for(&self, id: &str) -> Option<NodeId> {
        self.labels_for.get(id).copied()
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }
}

/// Text of the `<label>` associated with a control, by `for` or by nesting
pub fn label_text(doc: &Document, node: NodeId) -> Option<String> {
    if !is_labelable(doc, node) {
        return None;
    }
    label_text_in(doc, node, &LabelIndex::for_scope_of(doc, node))
}

fn label_text_in(doc: &Document, node: NodeId, index: &LabelIndex) -> Option<String> {
    if !is_labelable(doc, node) {
        return None;
    }
    let by_for = doc.id_attr(node).and_then(|id| index.label_for(id));
    if let Some(label) = by_for {
        let text = doc.text_content(label);
        if !text.is_empty() {
            return Some(text);
        }
    }
    doc.ancestors(node)
        .find(|a| doc.tag(*a) == Some("label"))
        .map(|label| doc.text_content(label))
        .filter(|t| !t.is_empty())
}

/// Where an accessible name came from; content-derived names are less stable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    AriaLabel,
    LabelledBy,
    Label,
    Content,
    Attribute,
}

/// Compute the accessible name and its source
pub fn accessible_name(doc: &Document, node: NodeId) -> Option<(String, NameSource)> {
    accessible_name_in(doc, node, &LabelIndex::for_scope_of(doc, node))
}

fn accessible_name_in(
    doc: &Document,
    node: NodeId,
    index: &LabelIndex,
) -> Option<(String, NameSource)> {
    let non_empty = |s: String| Some(s).filter(|s| !s.is_empty());

    if let Some(label) = doc.attr(node, "aria-label").map(normalize_whitespace) {
        if let Some(label) = non_empty(label) {
            return Some((label, NameSource::AriaLabel));
        }
    }

    if let Some(ids) = doc.attr(node, "aria-labelledby") {
        let parts: Vec<String> = ids
            .split_whitespace()
            .filter_map(|id| index.element_by_id(id))
            .map(|n| doc.text_content(n))
            .collect();
        if let Some(joined) = non_empty(normalize_whitespace(&parts.join(" "))) {
            return Some((joined, NameSource::LabelledBy));
        }
    }

    if let Some(label) = label_text_in(doc, node, index) {
        return Some((label, NameSource::Label));
    }

    if doc.tag(node) == Some("input")
        && matches!(
            input_type(doc, node).as_str(),
            "button" | "submit" | "reset"
        )
    {
        if let Some(value) = doc.attr(node, "value").map(normalize_whitespace).and_then(non_empty) {
            return Some((value, NameSource::Attribute));
        }
    }

    let from_content = role(doc, node)
        .map(|r| NAME_FROM_CONTENT.contains(&r.as_str()))
        .unwrap_or(false);
    if from_content {
        if let Some(text) = non_empty(doc.text_content(node)) {
            return Some((text, NameSource::Content));
        }
    }

    for attr in ["alt", "title", "placeholder"] {
        if let Some(value) = doc.attr(node, attr).map(normalize_whitespace).and_then(non_empty) {
            return Some((value, NameSource::Attribute));
        }
    }
    None
}

// ============================================================================
// role= and label= selectors
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AriaQuery {
    Role { role: String, name: Option<String> },
    Label(String),
}

impl AriaQuery {
    pub fn parse(input: &str) -> Result<Self, SelectorSyntaxError> {
        let err = |msg: &str| SelectorSyntaxError::new(ENGINE, input, msg);

        if let Some(rest) = input.strip_prefix("label=") {
            let (value, tail) = parse_quoted(rest).ok_or_else(|| err("expected quoted label"))?;
            if !tail.is_empty() || value.is_empty() {
                return Err(err("malformed label selector"));
            }
            return Ok(AriaQuery::Label(value));
        }

        let rest = input
            .strip_prefix("role=")
            .ok_or_else(|| err("expected role= or label="))?;
        let end = rest.find('[').unwrap_or(rest.len());
        let role = &rest[..end];
        if role.is_empty() || !role.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(err("malformed role name"));
        }
        let tail = &rest[end..];
        if tail.is_empty() {
            return Ok(AriaQuery::Role {
                role: role.to_lowercase(),
                name: None,
            });
        }
        let inner = tail
            .strip_prefix("[name=")
            .ok_or_else(|| err("expected [name=...]"))?;
        let (name, after) = parse_quoted(inner).ok_or_else(|| err("expected quoted name"))?;
        if after != "]" {
            return Err(err("expected ']'"));
        }
        Ok(AriaQuery::Role {
            role: role.to_lowercase(),
            name: Some(name),
        })
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.matches_in(doc, node, &LabelIndex::for_scope_of(doc, node))
    }

    /// Match against a prebuilt index of the node's tree scope
    pub fn matches_in(&self, doc: &Document, node: NodeId, index: &LabelIndex) -> bool {
        match self {
            AriaQuery::Role { role: wanted, name } => {
                if role(doc, node).as_deref() != Some(wanted.as_str()) {
                    return false;
                }
                match name {
                    Some(name) => {
                        accessible_name_in(doc, node, index).is_some_and(|(n, _)| n == *name)
                    }
                    None => true,
                }
            }
            AriaQuery::Label(text) => label_text_in(doc, node, index).is_some_and(|l| l == *text),
        }
    }
}

/// Parse a leading `"..."` with `\"` and `\\` escapes, returning the value and the rest
fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let body = s.strip_prefix('"')?;
    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some((out, &body[i + 1..]));
        } else {
            out.push(c);
        }
    }
    None
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// `role=<role>[name="<name>"]`
pub fn role_selector(role: &str, name: &str) -> String {
    format!("role={}[name={}]", role, quote(name))
}

/// `label="<text>"`
pub fn label_selector(text: &str) -> String {
    format!("label={}", quote(text))
}

/// Resolve a role/label selector against a tree scope
pub fn query_all(
    doc: &Document,
    scope: NodeId,
    selector: &str,
) -> Result<Vec<NodeId>, SelectorSyntaxError> {
    let query = AriaQuery::parse(selector)?;
    let index = LabelIndex::for_scope_of(doc, scope);
    Ok(doc
        .descendant_elements(scope)
        .into_iter()
        .filter(|n| query.matches_in(doc, *n, &index))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse(
            r#"<html><body>
                <form>
                  <label for="email">Email address</label>
                  <input id="email" type="email"/>
                  <label>Remember me <input type="checkbox" id="remember"/></label>
                  <input type="submit" value="Sign in" id="go"/>
                  <button aria-label="Close dialog" id="close">X</button>
                  <span id="hint">Search the shop</span>
                  <input type="search" aria-labelledby="hint" id="q"/>
                  <input type="password" id="pw" placeholder="Password"/>
                </form>
                <a href="/help" id="help">Need <b>help</b>?</a>
              </body></html>"#,
        )
        .unwrap()
    }

    fn by_id(doc: &Document, id: &str) -> NodeId {
        doc.get_element_by_id(id).unwrap()
    }

    #[test]
    fn test_roles() {
        let doc = doc();
        assert_eq!(role(&doc, by_id(&doc, "email")).as_deref(), Some("textbox"));
        assert_eq!(role(&doc, by_id(&doc, "remember")).as_deref(), Some("checkbox"));
        assert_eq!(role(&doc, by_id(&doc, "go")).as_deref(), Some("button"));
        assert_eq!(role(&doc, by_id(&doc, "q")).as_deref(), Some("searchbox"));
        assert_eq!(role(&doc, by_id(&doc, "pw")), None);
        assert_eq!(role(&doc, by_id(&doc, "help")).as_deref(), Some("link"));
    }

    #[test]
    fn test_accessible_names() {
        let doc = doc();
        let name = |id: &str| accessible_name(&doc, by_id(&doc, id));
        assert_eq!(name("email"), Some(("Email address".into(), NameSource::Label)));
        assert_eq!(name("remember"), Some(("Remember me".into(), NameSource::Label)));
        assert_eq!(name("go"), Some(("Sign in".into(), NameSource::Attribute)));
        assert_eq!(name("close"), Some(("Close dialog".into(), NameSource::AriaLabel)));
        assert_eq!(name("q"), Some(("Search the shop".into(), NameSource::LabelledBy)));
        assert_eq!(name("help"), Some(("Need help ?".into(), NameSource::Content)));
        assert_eq!(name("pw"), Some(("Password".into(), NameSource::Attribute)));
    }

    #[test]
    fn test_role_and_label_queries() {
        let doc = doc();
        let q = |s: &str| query_all(&doc, doc.root(), s).unwrap();
        assert_eq!(q(&role_selector("button", "Sign in")), vec![by_id(&doc, "go")]);
        assert_eq!(q("role=button").len(), 2);
        assert_eq!(q(&label_selector("Email address")), vec![by_id(&doc, "email")]);
        assert!(q(&role_selector("button", "Nope")).is_empty());
    }

    #[test]
    fn test_label_index_keeps_first_occurrence() {
        let doc = Document::parse(
            r#"<html><body>
                <label for="qty">Quantity</label>
                <label for="qty">Amount</label>
                <input id="qty" type="number"/>
                <span id="note">First</span>
                <span id="note">Second</span>
                <input id="n" aria-labelledby="note"/>
              </body></html>"#,
        )
        .unwrap();
        let index = LabelIndex::for_scope_of(&doc, doc.root());
        let qty = by_id(&doc, "qty");
        assert_eq!(label_text(&doc, qty).as_deref(), Some("Quantity"));
        assert_eq!(
            accessible_name(&doc, by_id(&doc, "n")),
            Some(("First".into(), NameSource::LabelledBy))
        );
        assert!(index.label_for("qty").is_some());
        assert!(index.label_for("missing").is_none());
    }

    #[test]
    fn test_label_query_on_large_form_matches_each_field() {
        let mut markup = String::from("<html><body><form>");
        for i in 0..300 {
            markup.push_str(&format!(
                r#"<label for="f{i}">Field {i}</label><input id="f{i}" type="text"/>"#
            ));
        }
        markup.push_str("</form></body></html>");
        let doc = Document::parse(&markup).unwrap();

        for i in [0, 150, 299] {
            let field = by_id(&doc, &format!("f{i}"));
            let q = |s: &str| query_all(&doc, doc.root(), s).unwrap();
            assert_eq!(q(&label_selector(&format!("Field {i}"))), vec![field]);
            assert_eq!(
                q(&role_selector("textbox", &format!("Field {i}"))),
                vec![field]
            );
        }
    }

    #[test]
    fn test_malformed_aria_selectors() {
        for bad in [
            "role=",
            "role=but ton",
            "role=button[name=Sign]",
            "role=button[name=\"x\"",
            "label=Email",
            "label=\"\"",
            "button",
        ] {
            assert!(AriaQuery::parse(bad).is_err(), "{bad} should fail");
        }
    }
}
