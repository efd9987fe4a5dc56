use std::collections::BTreeMap;

use super::bounds::ElementBoundsProbe;
use super::facts::{ElementFacts, FormState, ParentFacts};
use crate::dom::{aria, Document, NodeId};

/// Reads attributes, text, sibling position and form state of an element
pub struct AttributeExtractor {
    max_text_length: usize,
}

impl AttributeExtractor {
    pub fn new(max_text_length: usize) -> Self {
        Self { max_text_length }
    }

    /// Build a fresh facts snapshot. Non-elements yield empty facts.
    pub fn extract(&self, doc: &Document, node: NodeId) -> ElementFacts {
        let Some(element) = doc.element(node) else {
            return ElementFacts::default();
        };
        let geometry = ElementBoundsProbe::probe(doc, node);

        let attributes: BTreeMap<String, String> = element.attributes.iter().cloned().collect();

        let parent = doc
            .parent(node)
            .filter(|p| doc.is_element(*p))
            .map(|p| ParentFacts {
                tag: doc.tag(p).unwrap_or_default().to_string(),
                id: doc.id_attr(p).map(str::to_string),
                child_index: doc.child_index(node),
            });

        ElementFacts {
            tag: element.tag.clone(),
            id: doc.id_attr(node).map(str::to_string),
            classes: doc.classes(node).into_iter().map(str::to_string).collect(),
            text: truncate_chars(&doc.text_content(node), self.max_text_length),
            own_text: truncate_chars(&doc.own_text(node), self.max_text_length),
            attributes,
            bounds: geometry.bounds,
            is_visible: geometry.is_visible,
            style: geometry.style,
            parent,
            form: form_state(doc, node),
        }
    }
}

fn form_state(doc: &Document, node: NodeId) -> FormState {
    let placeholder = doc.attr(node, "placeholder").map(str::to_string);
    match doc.tag(node) {
        Some("input") => {
            let input_type = aria::input_type(doc, node);
            let checked = matches!(input_type.as_str(), "checkbox" | "radio")
                .then(|| doc.has_attr(node, "checked"));
            FormState {
                value: doc.attr(node, "value").map(str::to_string),
                input_type: Some(input_type),
                placeholder,
                checked,
                multiple: false,
            }
        }
        Some("textarea") => FormState {
            value: Some(
                doc.attr(node, "value")
                    .map(str::to_string)
                    .unwrap_or_else(|| doc.text_content(node)),
            ),
            placeholder,
            ..FormState::default()
        },
        Some("select") => {
            let multiple = doc.has_attr(node, "multiple");
            let options: Vec<NodeId> = doc
                .descendant_elements(node)
                .into_iter()
                .filter(|o| doc.tag(*o) == Some("option"))
                .collect();
            let mut selected: Vec<NodeId> = options
                .iter()
                .copied()
                .filter(|o| doc.has_attr(*o, "selected"))
                .collect();
            if selected.is_empty() && !multiple {
                selected.extend(options.first().copied());
            }
            if !multiple {
                selected.truncate(1);
            }
            let texts: Vec<String> = selected
                .into_iter()
                .map(|o| {
                    doc.attr(o, "label")
                        .map(str::to_string)
                        .unwrap_or_else(|| doc.text_content(o))
                })
                .collect();
            FormState {
                value: (!texts.is_empty()).then(|| texts.join(", ")),
                multiple,
                ..FormState::default()
            }
        }
        _ => FormState::default(),
    }
}

/// Cut a string to at most `max` characters
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse(
            r#"<html><body>
                <form id="f">
                  <input id="name" name="name" value="Ada" placeholder="Your name" class="field wide"/>
                  <input id="agree" type="checkbox" checked/>
                  <select id="size"><option>S</option><option selected>M</option></select>
                  <select id="tags" multiple><option selected>a</option><option>b</option><option selected label="C">c</option></select>
                  <select id="empty"><option>First</option><option>Second</option></select>
                  <textarea id="bio">Hello  there</textarea>
                </form>
              </body></html>"#,
        )
        .unwrap()
    }

    fn facts(doc: &Document, id: &str) -> ElementFacts {
        AttributeExtractor::new(100).extract(doc, doc.get_element_by_id(id).unwrap())
    }

    #[test]
    fn test_basic_facts() {
        let doc = doc();
        let f = facts(&doc, "name");
        assert_eq!(f.tag, "input");
        assert_eq!(f.id.as_deref(), Some("name"));
        assert_eq!(f.classes, vec!["field", "wide"]);
        assert_eq!(f.attr("name"), Some("name"));
        let parent = f.parent.unwrap();
        assert_eq!(parent.tag, "form");
        assert_eq!(parent.id.as_deref(), Some("f"));
        assert_eq!(parent.child_index, 0);
        assert_eq!(f.form.value.as_deref(), Some("Ada"));
        assert_eq!(f.form.placeholder.as_deref(), Some("Your name"));
        assert_eq!(f.form.input_type.as_deref(), Some("text"));
    }

    #[test]
    fn test_form_state() {
        let doc = doc();
        assert_eq!(facts(&doc, "agree").form.checked, Some(true));
        assert_eq!(facts(&doc, "size").form.value.as_deref(), Some("M"));
        assert_eq!(facts(&doc, "tags").form.value.as_deref(), Some("a, C"));
        assert!(facts(&doc, "tags").form.multiple);
        assert_eq!(facts(&doc, "empty").form.value.as_deref(), Some("First"));
        assert_eq!(facts(&doc, "bio").form.value.as_deref(), Some("Hello there"));
    }

    #[test]
    fn test_text_is_truncated() {
        let doc = Document::parse("<html><body><p id=\"p\">abcdefghij</p></body></html>").unwrap();
        let f = AttributeExtractor::new(4).extract(&doc, doc.get_element_by_id("p").unwrap());
        assert_eq!(f.text, "abcd");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 5), "hi");
    }
}
