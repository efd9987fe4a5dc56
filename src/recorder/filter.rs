use log::trace;
use serde::{Deserialize, Serialize};

use super::classifier::InteractionKind;
use super::session::RecordingMode;
use crate::dom::{Document, NodeId};
use crate::utils::config::RecorderConfig;

/// An interaction event as delivered by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub kind: InteractionKind,
    pub target: NodeId,
    /// Host monotonic clock, milliseconds
    pub time_stamp_ms: u64,
}

impl RawEvent {
    pub fn new(kind: InteractionKind, target: NodeId, time_stamp_ms: u64) -> Self {
        Self {
            kind,
            target,
            time_stamp_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Disarmed,
    /// Target belongs to the recorder's own UI
    ToolUi,
    /// Highlight arrived inside the throttle interval
    Throttled,
    /// Repeat activation of the same element
    Debounced,
    /// Event kind does not produce actions in the current mode
    NotQualifying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Capture,
    Highlight,
    Ignore(IgnoreReason),
}

/// Decides which raw events reach the capture pipeline.
///
/// Highlight throttling and activation debouncing keep separate clocks, so a
/// burst of pointer movement never delays or drops a click.
#[derive(Debug)]
pub struct EventFilter {
    armed: Option<RecordingMode>,
    ui_roots: Vec<NodeId>,
    marker_prefix: String,
    marker_attribute: String,
    highlight_throttle_ms: u64,
    activation_debounce_ms: u64,
    last_highlight_ms: Option<u64>,
    last_activation: Option<(NodeId, u64)>,
}

impl EventFilter {
    pub fn new(config: &RecorderConfig) -> Self {
        Self {
            armed: None,
            ui_roots: Vec::new(),
            marker_prefix: config.ui_marker_prefix.clone(),
            marker_attribute: config.ui_marker_attribute.clone(),
            highlight_throttle_ms: config.highlight_throttle_ms,
            activation_debounce_ms: config.activation_debounce_ms,
            last_highlight_ms: None,
            last_activation: None,
        }
    }

    pub fn arm(&mut self, mode: RecordingMode) {
        self.armed = Some(mode);
        self.last_highlight_ms = None;
        self.last_activation = None;
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    pub fn armed_mode(&self) -> Option<RecordingMode> {
        self.armed
    }

    /// Register the root of an injected recorder UI subtree
    pub fn register_ui_root(&mut self, root: NodeId) {
        if !self.ui_roots.contains(&root) {
            self.ui_roots.push(root);
        }
    }

    pub fn unregister_ui_root(&mut self, root: NodeId) {
        self.ui_roots.retain(|r| *r != root);
    }

    /// Whether the node is, or is inside, the recorder's own UI. Walks composed
    /// ancestors so shadow-hosted UI is covered.
    pub fn is_tool_ui(&self, doc: &Document, node: NodeId) -> bool {
        let mut chain = std::iter::once(node).chain(doc.composed_ancestors(node));
        chain.any(|n| self.ui_roots.contains(&n) || self.has_marker(doc, n))
    }

    fn has_marker(&self, doc: &Document, node: NodeId) -> bool {
        if !doc.is_element(node) {
            return false;
        }
        if !self.marker_attribute.is_empty() && doc.has_attr(node, &self.marker_attribute) {
            return true;
        }
        if self.marker_prefix.is_empty() {
            return false;
        }
        doc.id_attr(node)
            .is_some_and(|id| id.starts_with(self.marker_prefix.as_str()))
            || doc
                .classes(node)
                .iter()
                .any(|c| c.starts_with(self.marker_prefix.as_str()))
    }

    pub fn decide(&mut self, event: &RawEvent, doc: &Document) -> FilterDecision {
        let decision = self.evaluate(event, doc);
        trace!("{:?} on {} -> {:?}", event.kind, event.target, decision);
        decision
    }

    fn evaluate(&mut self, event: &RawEvent, doc: &Document) -> FilterDecision {
        let Some(mode) = self.armed else {
            return FilterDecision::Ignore(IgnoreReason::Disarmed);
        };
        if self.is_tool_ui(doc, event.target) {
            return FilterDecision::Ignore(IgnoreReason::ToolUi);
        }

        match (event.kind, mode) {
            (InteractionKind::PointerMove, _) => {
                let due = self.last_highlight_ms.map_or(true, |last| {
                    event.time_stamp_ms.saturating_sub(last) >= self.highlight_throttle_ms
                });
                if due {
                    self.last_highlight_ms = Some(event.time_stamp_ms);
                    FilterDecision::Highlight
                } else {
                    FilterDecision::Ignore(IgnoreReason::Throttled)
                }
            }
            (InteractionKind::Activate, RecordingMode::Manual) => FilterDecision::Capture,
            (InteractionKind::Activate, RecordingMode::Auto) => {
                let target = doc.closest_element(event.target);
                let repeated = self.last_activation.is_some_and(|(last, at)| {
                    last == target
                        && event.time_stamp_ms.saturating_sub(at) < self.activation_debounce_ms
                });
                if repeated {
                    return FilterDecision::Ignore(IgnoreReason::Debounced);
                }
                self.last_activation = Some((target, event.time_stamp_ms));
                FilterDecision::Capture
            }
            (InteractionKind::Change | InteractionKind::Submit, RecordingMode::Auto) => {
                FilterDecision::Capture
            }
            _ => FilterDecision::Ignore(IgnoreReason::NotQualifying),
        }
    }

    pub fn should_capture(&mut self, event: &RawEvent, doc: &Document) -> bool {
        self.decide(event, doc) == FilterDecision::Capture
    }
}
