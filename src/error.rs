use thiserror::Error;

use crate::dom::NodeId;
use crate::recorder::RecordingState;

/// Errors raised while building a [`crate::dom::Document`] from a snapshot
#[derive(Debug, Error)]
pub enum DomError {
    #[error("snapshot parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },
    #[error("snapshot has no root element")]
    Empty,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A selector string that is not valid for the engine it was handed to.
///
/// Only the uniqueness validator and the CLI ever see this; the capture
/// pipeline treats it as "not unique".
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid {engine} selector `{selector}`: {message}")]
pub struct SelectorSyntaxError {
    pub engine: &'static str,
    pub selector: String,
    pub message: String,
}

impl SelectorSyntaxError {
    pub fn new(engine: &'static str, selector: &str, message: impl Into<String>) -> Self {
        Self {
            engine,
            selector: selector.to_string(),
            message: message.into(),
        }
    }
}

/// Geometry could not be read for a node (detached, or not an element)
#[derive(Debug, Clone, Error, PartialEq)]
#[error("geometry unavailable for node {node}: {reason}")]
pub struct GeometryUnavailable {
    pub node: NodeId,
    pub reason: &'static str,
}

/// Errors surfaced by the recording state machine and session edits
#[derive(Debug, Error, PartialEq)]
pub enum RecorderError {
    #[error("cannot {event} while {state}")]
    InvalidTransition {
        state: RecordingState,
        event: &'static str,
    },
    #[error("no action with id {0}")]
    ActionNotFound(String),
    #[error("no session is retained")]
    NoRetainedSession,
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Persistence collaborator failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
