use log::{info, warn};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::events::{RecorderEvent, StateSnapshot};
use super::filter::RawEvent;
use super::machine::RecordingStateMachine;
use super::session::{ActionRecord, NetworkCall, PageContext, RecordingMode, RecordingState, Session};
use crate::dom::{Document, NodeId};
use crate::error::{RecorderError, StoreError};
use crate::store::{SessionStore, SessionSummary};
use crate::utils::config::RecorderConfig;

/// A closed session that could not be persisted. The session stays retained
/// in memory and can be saved again with [`Recorder::save_retained`].
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceWarning {
    pub session_id: String,
    pub message: String,
}

/// Result of stopping a recording
#[derive(Debug, Clone)]
pub struct StopReport {
    pub session: Session,
    pub warning: Option<PersistenceWarning>,
}

impl StopReport {
    pub fn persisted(&self) -> bool {
        self.warning.is_none()
    }
}

/// Recorder facade: drives the state machine and hands closed sessions to
/// the persistence collaborator
pub struct Recorder {
    machine: RecordingStateMachine,
    store: Arc<dyn SessionStore>,
}

impl Recorder {
    pub fn new(config: RecorderConfig, store: Arc<dyn SessionStore>) -> Self {
        Self {
            machine: RecordingStateMachine::new(config),
            store,
        }
    }

    pub fn machine(&self) -> &RecordingStateMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut RecordingStateMachine {
        &mut self.machine
    }

    pub fn state(&self) -> RecordingState {
        self.machine.state()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.machine.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.machine.subscribe()
    }

    pub fn register_ui_root(&mut self, root: NodeId) {
        self.machine.register_ui_root(root);
    }

    pub fn start(&mut self, mode: RecordingMode, name: &str, page: PageContext) -> Result<(), RecorderError> {
        self.machine.start(mode, name, page)
    }

    pub fn switch_mode(&mut self) -> Result<(), RecorderError> {
        self.machine.switch_mode()
    }

    pub fn pause(&mut self) -> Result<(), RecorderError> {
        self.machine.pause()
    }

    pub fn resume(&mut self) -> Result<(), RecorderError> {
        self.machine.resume()
    }

    pub fn handle_event(&mut self, doc: &Document, event: &RawEvent) -> Option<ActionRecord> {
        self.machine.handle_event(doc, event)
    }

    pub fn record_external(&mut self, call: NetworkCall, page: PageContext) -> Result<ActionRecord, RecorderError> {
        self.machine.record_external(call, page)
    }

    /// Stop recording and persist the closed session.
    ///
    /// The transition always completes; a save failure only produces a
    /// warning in the report.
    pub async fn stop(&mut self) -> Result<StopReport, RecorderError> {
        let session = self.machine.stop()?;
        let warning = match self.store.save(&session).await {
            Ok(()) => {
                info!("Session {} saved", session.id);
                None
            }
            Err(e) => Some(self.persistence_failed(&session.id, e)),
        };
        Ok(StopReport { session, warning })
    }

    /// Save the retained session again, e.g. after post-hoc edits
    pub async fn save_retained(&self) -> Result<(), StoreError> {
        let session = self
            .machine
            .retained_session()
            .ok_or_else(|| StoreError::NotFound("retained session".to_string()))?;
        self.store.save(session).await
    }

    pub async fn load(&self, id: &str) -> Result<Session, StoreError> {
        self.store.load(id).await
    }

    pub async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        self.store.list().await
    }

    fn persistence_failed(&self, session_id: &str, error: StoreError) -> PersistenceWarning {
        warn!("Failed to persist session {}: {}", session_id, error);
        let warning = PersistenceWarning {
            session_id: session_id.to_string(),
            message: error.to_string(),
        };
        self.machine.emit(RecorderEvent::PersistenceFailed {
            session_id: warning.session_id.clone(),
            message: warning.message.clone(),
        });
        warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::classifier::InteractionKind;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl SessionStore for FailingStore {
        async fn save(&self, _session: &Session) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        async fn load(&self, id: &str) -> Result<Session, StoreError> {
            Err(StoreError::NotFound(id.to_string()))
        }

        async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn doc() -> Document {
        Document::parse(
            r#"<html lumi:url="https://app.test/"><body><button id="go">Go</button></body></html>"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_stop_persists_session() {
        let doc = doc();
        let store = Arc::new(MemoryStore::new());
        let mut recorder = Recorder::new(RecorderConfig::default(), store.clone());
        recorder
            .start(RecordingMode::Auto, "go", PageContext::from_document(&doc))
            .unwrap();
        let go = doc.get_element_by_id("go").unwrap();
        recorder
            .handle_event(&doc, &RawEvent::new(InteractionKind::Activate, go, 0))
            .unwrap();

        let report = recorder.stop().await.unwrap();
        assert!(report.persisted());
        assert_eq!(store.len().await, 1);
        let loaded = recorder.load(&report.session.id).await.unwrap();
        assert_eq!(loaded.actions.len(), 1);
        assert_eq!(recorder.list().await.unwrap()[0].name, "go");
    }

    #[tokio::test]
    async fn test_save_failure_is_a_warning() {
        let doc = doc();
        let mut recorder = Recorder::new(RecorderConfig::default(), Arc::new(FailingStore));
        let mut events = recorder.subscribe();
        recorder
            .start(RecordingMode::Manual, "ro", PageContext::from_document(&doc))
            .unwrap();

        let report = recorder.stop().await.unwrap();
        let warning = report.warning.clone().unwrap();
        assert_eq!(warning.session_id, report.session.id);
        assert!(warning.message.contains("read-only"));
        assert_eq!(recorder.state(), RecordingState::Inactive);
        assert_eq!(
            recorder.machine().retained_session().map(|s| s.id.clone()),
            Some(report.session.id.clone())
        );

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let RecorderEvent::PersistenceFailed { session_id, .. } = event {
                saw_failure = session_id == report.session.id;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_stop_while_inactive_is_rejected() {
        let mut recorder = Recorder::new(RecorderConfig::default(), Arc::new(MemoryStore::new()));
        assert!(matches!(
            recorder.stop().await,
            Err(RecorderError::InvalidTransition { .. })
        ));
        assert!(recorder.save_retained().await.is_err());
    }
}
