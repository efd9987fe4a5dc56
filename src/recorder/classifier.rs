use serde::{Deserialize, Serialize};

use super::session::ActionType;
use crate::element::extractor::truncate_chars;
use crate::element::ElementFacts;

/// Input types whose interaction records a typed value
const TEXT_INPUT_TYPES: &[&str] = &[
    "text",
    "email",
    "password",
    "search",
    "tel",
    "url",
    "number",
    "date",
    "datetime-local",
    "month",
    "week",
    "time",
];

/// Raw interaction reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionKind {
    /// Click or equivalent activation
    Activate,
    /// A field committed its value
    Change,
    /// Keystroke-level edit
    Input,
    Submit,
    PointerMove,
}

/// Refines an interaction into an action type and value using element facts
#[derive(Debug, Clone)]
pub struct ActionClassifier {
    click_value_max_length: usize,
}

impl ActionClassifier {
    pub fn new(click_value_max_length: usize) -> Self {
        Self {
            click_value_max_length,
        }
    }

    /// Total and deterministic: depends only on `kind` and `facts`
    pub fn classify(&self, kind: InteractionKind, facts: &ElementFacts) -> (ActionType, String) {
        if kind == InteractionKind::Submit {
            let name = facts
                .attr("name")
                .or(facts.id.as_deref())
                .unwrap_or_default();
            return (ActionType::Submit, name.to_string());
        }

        match facts.tag.as_str() {
            "input" => {
                let input_type = facts.form.input_type.as_deref().unwrap_or("text");
                if TEXT_INPUT_TYPES.contains(&input_type) {
                    return (ActionType::Input, field_value(facts));
                }
                if matches!(input_type, "checkbox" | "radio") {
                    let state = if facts.form.checked.unwrap_or(false) {
                        "checked"
                    } else {
                        "unchecked"
                    };
                    return (ActionType::Check, state.to_string());
                }
            }
            "textarea" => return (ActionType::Input, field_value(facts)),
            "select" => {
                return (
                    ActionType::Select,
                    facts.form.value.clone().unwrap_or_default(),
                )
            }
            _ => {}
        }

        let text = if facts.own_text.is_empty() {
            &facts.text
        } else {
            &facts.own_text
        };
        (
            ActionType::Click,
            truncate_chars(text, self.click_value_max_length),
        )
    }
}

/// Current value, else the placeholder, else empty
fn field_value(facts: &ElementFacts) -> String {
    facts
        .form
        .value
        .clone()
        .filter(|v| !v.is_empty())
        .or_else(|| facts.form.placeholder.clone())
        .unwrap_or_default()
}
