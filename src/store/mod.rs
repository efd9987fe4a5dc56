//! Session persistence
//!
//! The recorder hands finished sessions to a [`SessionStore`]. Two backends
//! are provided: pretty JSON files on disk and an in-memory map for tests and
//! embedding.

pub mod json;
pub mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::recorder::Session;

/// Short listing entry for a stored session
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub url: String,
    pub action_count: usize,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            name: session.name.clone(),
            url: session.url.clone(),
            action_count: session.actions.len(),
            start_time: session.start_time,
        }
    }
}

/// Persistence collaborator for recorded sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Save a session, replacing any earlier copy with the same id
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    async fn load(&self, id: &str) -> Result<Session, StoreError>;

    /// All stored sessions, oldest first
    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError>;
}
