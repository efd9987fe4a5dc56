use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dom::Rect;

/// Snapshot of everything the recorder needs to know about an element at
/// capture time. Built fresh for every capture; never a live view of the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementFacts {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// Normalized text content, truncated
    pub text: String,
    /// Normalized text of direct text children
    pub own_text: String,
    pub attributes: BTreeMap<String, String>,
    pub bounds: Rect,
    pub is_visible: bool,
    pub style: ComputedStyle,
    pub parent: Option<ParentFacts>,
    pub form: FormState,
}

impl ElementFacts {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub z_index: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "inline".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            z_index: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentFacts {
    pub tag: String,
    pub id: Option<String>,
    /// 0-based position of the element among its parent's element children
    pub child_index: usize,
}

/// Live form-control state at capture time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    /// Lower-cased `type` for inputs
    pub input_type: Option<String>,
    /// Field value; for selects, the display text of the selected option(s)
    pub value: Option<String>,
    pub placeholder: Option<String>,
    /// Set for checkbox and radio inputs
    pub checked: Option<bool>,
    pub multiple: bool,
}
