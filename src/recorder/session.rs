use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::dom::Document;
use crate::element::ElementFacts;
use crate::selector::SelectorSet;
use crate::utils::config::RecorderConfig;

/// Which triggering rule capture follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    /// Qualifying interactions are captured continuously
    Auto,
    /// Each element needs a confirmation click
    Manual,
}

impl fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingMode::Auto => f.write_str("auto"),
            RecordingMode::Manual => f.write_str("manual"),
        }
    }
}

/// Recording session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingState {
    Inactive,
    AutoRecording,
    ManualSelection,
    Paused,
}

impl RecordingState {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RecordingState::AutoRecording | RecordingState::ManualSelection
        )
    }

    /// Active state for a mode
    pub fn for_mode(mode: RecordingMode) -> Self {
        match mode {
            RecordingMode::Auto => RecordingState::AutoRecording,
            RecordingMode::Manual => RecordingState::ManualSelection,
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordingState::Inactive => "inactive",
            RecordingState::AutoRecording => "auto-recording",
            RecordingState::ManualSelection => "manual-selection",
            RecordingState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Classified kind of a recorded action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Click,
    Input,
    Check,
    Select,
    Submit,
    Network,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionType::Click => "click",
            ActionType::Input => "input",
            ActionType::Check => "check",
            ActionType::Select => "select",
            ActionType::Submit => "submit",
            ActionType::Network => "network",
        };
        f.write_str(name)
    }
}

/// A network call reported by an interception collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkCall {
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
}

/// Where an action came from. Exactly one source per action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CaptureSource {
    Element {
        facts: Box<ElementFacts>,
        selectors: Box<SelectorSet>,
    },
    Network(NetworkCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Page the action happened on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    pub url: String,
    pub title: String,
    pub viewport: Viewport,
}

impl PageContext {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            url: doc.url.clone(),
            title: doc.title.clone(),
            viewport: Viewport {
                width: doc.viewport.0,
                height: doc.viewport.1,
            },
        }
    }
}

/// One captured, classified interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action_type: ActionType,
    pub source: CaptureSource,
    pub value: String,
    pub notes: String,
    pub context: PageContext,
}

impl ActionRecord {
    pub fn from_element(
        action_type: ActionType,
        value: String,
        facts: ElementFacts,
        selectors: SelectorSet,
        context: PageContext,
    ) -> Self {
        Self::new(
            action_type,
            value,
            CaptureSource::Element {
                facts: Box::new(facts),
                selectors: Box::new(selectors),
            },
            context,
        )
    }

    pub fn from_network(call: NetworkCall, context: PageContext) -> Self {
        let value = format!("{} {}", call.method, call.url);
        Self::new(ActionType::Network, value, CaptureSource::Network(call), context)
    }

    fn new(action_type: ActionType, value: String, source: CaptureSource, context: PageContext) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action_type,
            source,
            value,
            notes: String::new(),
            context,
        }
    }

    pub fn selectors(&self) -> Option<&SelectorSet> {
        match &self.source {
            CaptureSource::Element { selectors, .. } => Some(selectors),
            CaptureSource::Network(_) => None,
        }
    }

    pub fn facts(&self) -> Option<&ElementFacts> {
        match &self.source {
            CaptureSource::Element { facts, .. } => Some(facts),
            CaptureSource::Network(_) => None,
        }
    }

    /// Best selector value, or the URL for network actions
    pub fn target_label(&self) -> &str {
        match &self.source {
            CaptureSource::Element { selectors, .. } => &selectors.best.value,
            CaptureSource::Network(call) => &call.url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub recorder_version: String,
    pub mode_at_start: RecordingMode,
    pub title: String,
    pub viewport: Viewport,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// One recording episode and its ordered action log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub name: String,
    pub url: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub actions: Vec<ActionRecord>,
    pub settings: RecorderConfig,
    pub metadata: SessionMetadata,
}

impl Session {
    pub fn new(name: &str, mode: RecordingMode, page: &PageContext, settings: RecorderConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            url: page.url.clone(),
            start_time: Utc::now(),
            end_time: None,
            actions: Vec::new(),
            settings,
            metadata: SessionMetadata {
                recorder_version: env!("CARGO_PKG_VERSION").to_string(),
                mode_at_start: mode,
                title: page.title.clone(),
                viewport: page.viewport,
                extra: BTreeMap::new(),
            },
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn action(&self, id: &str) -> Option<&ActionRecord> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn action_mut(&mut self, id: &str) -> Option<&mut ActionRecord> {
        self.actions.iter_mut().find(|a| a.id == id)
    }

    /// Wall-clock length; for an open session, up to now
    pub fn duration_ms(&self) -> i64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds()
    }

    pub(crate) fn close(&mut self) {
        let now = Utc::now();
        self.end_time = Some(now.max(self.start_time));
    }
}
