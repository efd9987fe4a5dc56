//! Recording session state machine
//!
//! | From | Event | To |
//! |---|---|---|
//! | Inactive | start(auto) | AutoRecording |
//! | Inactive | start(manual) | ManualSelection |
//! | AutoRecording / ManualSelection | switch_mode | the other mode |
//! | AutoRecording / ManualSelection | pause | Paused |
//! | Paused | resume | the mode that was paused |
//! | any but Inactive | stop | Inactive |
//!
//! Anything else is rejected with [`RecorderError::InvalidTransition`] and
//! leaves the state untouched.

use log::{debug, info};
use tokio::sync::broadcast;

use super::classifier::{ActionClassifier, InteractionKind};
use super::events::{EventEmitter, RecorderEvent, StateSnapshot};
use super::filter::{EventFilter, FilterDecision, RawEvent};
use super::session::{ActionRecord, NetworkCall, PageContext, RecordingMode, RecordingState, Session};
use crate::dom::{Document, NodeId};
use crate::element::{AttributeExtractor, ElementBoundsProbe};
use crate::error::RecorderError;
use crate::selector::SelectorSynthesizer;
use crate::utils::config::RecorderConfig;

/// Events accepted by [`RecordingStateMachine::transition`]
#[derive(Debug, Clone)]
pub enum Transition {
    Start {
        mode: RecordingMode,
        name: String,
        page: PageContext,
    },
    SwitchMode,
    Pause,
    Resume,
    Stop,
}

impl Transition {
    fn name(&self) -> &'static str {
        match self {
            Transition::Start { .. } => "start",
            Transition::SwitchMode => "switch mode",
            Transition::Pause => "pause",
            Transition::Resume => "resume",
            Transition::Stop => "stop",
        }
    }
}

/// Owns the current session and the capture pipeline.
///
/// Only this type appends to a session. Observers get snapshots through the
/// event emitter.
pub struct RecordingStateMachine {
    config: RecorderConfig,
    state: RecordingState,
    /// Mode to return to on resume; also the mode while active
    mode: Option<RecordingMode>,
    current: Option<Session>,
    retained: Option<Session>,
    filter: EventFilter,
    extractor: AttributeExtractor,
    synthesizer: SelectorSynthesizer,
    classifier: ActionClassifier,
    emitter: EventEmitter,
}

impl RecordingStateMachine {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            state: RecordingState::Inactive,
            mode: None,
            current: None,
            retained: None,
            filter: EventFilter::new(&config),
            extractor: AttributeExtractor::new(config.max_text_length),
            synthesizer: SelectorSynthesizer::new(config.clone()),
            classifier: ActionClassifier::new(config.click_value_max_length),
            emitter: EventEmitter::default(),
            config,
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Active or paused-in mode; `None` while inactive
    pub fn mode(&self) -> Option<RecordingMode> {
        self.mode
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Last stopped session, kept for export until cleared
    pub fn retained_session(&self) -> Option<&Session> {
        self.retained.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.emitter.subscribe()
    }

    pub(crate) fn emit(&self, event: RecorderEvent) {
        self.emitter.emit(event);
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            state: self.state,
            mode: self.mode,
            session_id: self.current.as_ref().map(|s| s.id.clone()),
            action_count: self.current.as_ref().map_or(0, |s| s.actions.len()),
        }
    }

    /// Register the root of the recorder's own UI so it is never captured
    pub fn register_ui_root(&mut self, root: NodeId) {
        self.filter.register_ui_root(root);
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Apply a transition. The stopped session, if any, is returned for `Stop`.
    pub fn transition(&mut self, transition: Transition) -> Result<Option<Session>, RecorderError> {
        let from = self.state;
        let rejected = RecorderError::InvalidTransition {
            state: from,
            event: transition.name(),
        };

        let closed = match (from, transition) {
            (RecordingState::Inactive, Transition::Start { mode, name, page }) => {
                let session = Session::new(&name, mode, &page, self.config.clone());
                info!("Recording session {} started in {} mode", session.id, mode);
                self.current = Some(session);
                self.enter(mode);
                None
            }
            (RecordingState::AutoRecording | RecordingState::ManualSelection, Transition::SwitchMode) => {
                let next = match self.mode {
                    Some(RecordingMode::Auto) => RecordingMode::Manual,
                    _ => RecordingMode::Auto,
                };
                self.enter(next);
                None
            }
            (RecordingState::AutoRecording | RecordingState::ManualSelection, Transition::Pause) => {
                self.filter.disarm();
                self.state = RecordingState::Paused;
                None
            }
            (RecordingState::Paused, Transition::Resume) => {
                let mode = self.mode.unwrap_or(RecordingMode::Auto);
                self.enter(mode);
                None
            }
            (
                RecordingState::AutoRecording | RecordingState::ManualSelection | RecordingState::Paused,
                Transition::Stop,
            ) => {
                let mut session = self.current.take().ok_or(rejected)?;
                self.filter.disarm();
                self.state = RecordingState::Inactive;
                self.mode = None;
                session.close();
                info!(
                    "Recording session {} stopped with {} actions",
                    session.id,
                    session.actions.len()
                );
                self.retained = Some(session.clone());
                Some(session)
            }
            _ => return Err(rejected),
        };

        self.notify(from);
        if let Some(session) = &closed {
            self.emitter.emit(RecorderEvent::SessionClosed(session.clone()));
        }
        Ok(closed)
    }

    fn enter(&mut self, mode: RecordingMode) {
        self.mode = Some(mode);
        self.state = RecordingState::for_mode(mode);
        self.filter.arm(mode);
    }

    fn notify(&self, from: RecordingState) {
        let snapshot = self.snapshot();
        debug!("State {} -> {}", from, snapshot.state);
        self.emitter.emit(RecorderEvent::StateChanged {
            from,
            to: snapshot.state,
            snapshot,
        });
    }

    pub fn start(&mut self, mode: RecordingMode, name: &str, page: PageContext) -> Result<(), RecorderError> {
        self.transition(Transition::Start {
            mode,
            name: name.to_string(),
            page,
        })
        .map(|_| ())
    }

    pub fn switch_mode(&mut self) -> Result<(), RecorderError> {
        self.transition(Transition::SwitchMode).map(|_| ())
    }

    pub fn pause(&mut self) -> Result<(), RecorderError> {
        self.transition(Transition::Pause).map(|_| ())
    }

    pub fn resume(&mut self) -> Result<(), RecorderError> {
        self.transition(Transition::Resume).map(|_| ())
    }

    /// Close the current session and return a copy of it
    pub fn stop(&mut self) -> Result<Session, RecorderError> {
        self.transition(Transition::Stop)?
            .ok_or(RecorderError::NoRetainedSession)
    }

    // ========================================================================
    // Capture pipeline
    // ========================================================================

    /// Run one raw event through filter, synthesis and classification.
    /// Returns the appended action when the event was captured.
    pub fn handle_event(&mut self, doc: &Document, event: &RawEvent) -> Option<ActionRecord> {
        match self.filter.decide(event, doc) {
            FilterDecision::Capture => self.capture(doc, event.kind, event.target),
            FilterDecision::Highlight => {
                let target = doc.closest_element(event.target);
                let geometry = ElementBoundsProbe::probe(doc, target);
                self.emitter.emit(RecorderEvent::Highlight {
                    target,
                    bounds: geometry.bounds,
                });
                None
            }
            FilterDecision::Ignore(reason) => {
                debug!("Ignored {:?} on {}: {:?}", event.kind, event.target, reason);
                None
            }
        }
    }

    fn capture(&mut self, doc: &Document, kind: InteractionKind, node: NodeId) -> Option<ActionRecord> {
        let session = self.current.as_mut()?;
        let target = doc.closest_element(node);

        let facts = self.extractor.extract(doc, target);
        let selectors = self.synthesizer.synthesize(doc, target);
        let (action_type, value) = self.classifier.classify(kind, &facts);
        let action = ActionRecord::from_element(
            action_type,
            value,
            facts,
            selectors,
            PageContext::from_document(doc),
        );

        debug!(
            "Captured {} on {} via `{}`",
            action.action_type,
            doc.node_path(target),
            action.target_label()
        );
        session.actions.push(action.clone());
        self.emitter.emit(RecorderEvent::ActionCaptured(action.clone()));
        Some(action)
    }

    /// Append an action from an external collaborator such as network
    /// interception. Only accepted while actively recording.
    pub fn record_external(&mut self, call: NetworkCall, page: PageContext) -> Result<ActionRecord, RecorderError> {
        if !self.state.is_active() {
            return Err(RecorderError::InvalidTransition {
                state: self.state,
                event: "record",
            });
        }
        let session = self.current.as_mut().ok_or(RecorderError::NoRetainedSession)?;
        let action = ActionRecord::from_network(call, page);
        session.actions.push(action.clone());
        self.emitter.emit(RecorderEvent::ActionCaptured(action.clone()));
        Ok(action)
    }

    // ========================================================================
    // Post-hoc edits on the retained session
    // ========================================================================

    fn retained_action(&mut self, id: &str) -> Result<&mut ActionRecord, RecorderError> {
        self.retained
            .as_mut()
            .ok_or(RecorderError::NoRetainedSession)?
            .action_mut(id)
            .ok_or_else(|| RecorderError::ActionNotFound(id.to_string()))
    }

    pub fn set_notes(&mut self, id: &str, notes: &str) -> Result<(), RecorderError> {
        self.retained_action(id)?.notes = notes.to_string();
        Ok(())
    }

    pub fn set_value(&mut self, id: &str, value: &str) -> Result<(), RecorderError> {
        self.retained_action(id)?.value = value.to_string();
        Ok(())
    }

    pub fn remove_action(&mut self, id: &str) -> Result<ActionRecord, RecorderError> {
        let session = self.retained.as_mut().ok_or(RecorderError::NoRetainedSession)?;
        let index = session
            .actions
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| RecorderError::ActionNotFound(id.to_string()))?;
        Ok(session.actions.remove(index))
    }

    /// Drop the retained session
    pub fn clear_retained(&mut self) -> Option<Session> {
        self.retained.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::session::ActionType;

    const PAGE: &str = r#"<html lumi:url="https://app.test/login" lumi:viewport="1440x900">
        <head><title>Sign in</title></head>
        <body>
          <form id="login">
            <input id="user" name="user" value="ada"/>
            <input id="remember" type="checkbox" checked="checked"/>
            <button data-testid="sign-in">Sign in</button>
          </form>
          <div id="lumi-recorder-root"><button id="rec-stop">Stop</button></div>
        </body>
      </html>"#;

    fn setup() -> (Document, RecordingStateMachine) {
        let doc = Document::parse(PAGE).unwrap();
        (doc, RecordingStateMachine::new(RecorderConfig::default()))
    }

    fn start(machine: &mut RecordingStateMachine, doc: &Document, mode: RecordingMode) {
        machine
            .start(mode, "login flow", PageContext::from_document(doc))
            .unwrap();
    }

    fn click(doc: &Document, id: &str, ms: u64) -> RawEvent {
        RawEvent::new(InteractionKind::Activate, doc.get_element_by_id(id).unwrap(), ms)
    }

    #[test]
    fn test_transition_table() {
        let (doc, mut machine) = setup();
        assert_eq!(machine.state(), RecordingState::Inactive);

        start(&mut machine, &doc, RecordingMode::Auto);
        assert_eq!(machine.state(), RecordingState::AutoRecording);

        machine.switch_mode().unwrap();
        assert_eq!(machine.state(), RecordingState::ManualSelection);

        machine.pause().unwrap();
        assert_eq!(machine.state(), RecordingState::Paused);
        assert_eq!(machine.mode(), Some(RecordingMode::Manual));

        machine.resume().unwrap();
        assert_eq!(machine.state(), RecordingState::ManualSelection);

        let session = machine.stop().unwrap();
        assert_eq!(machine.state(), RecordingState::Inactive);
        assert!(session.end_time.is_some());
        assert_eq!(machine.retained_session().unwrap().id, session.id);
        assert!(machine.current_session().is_none());
    }

    #[test]
    fn test_invalid_transitions_are_rejected_without_change() {
        let (doc, mut machine) = setup();
        assert_eq!(
            machine.resume(),
            Err(RecorderError::InvalidTransition {
                state: RecordingState::Inactive,
                event: "resume",
            })
        );
        assert!(machine.pause().is_err());
        assert!(machine.switch_mode().is_err());
        assert!(machine.stop().is_err());
        assert_eq!(machine.state(), RecordingState::Inactive);

        start(&mut machine, &doc, RecordingMode::Manual);
        let before = machine.current_session().unwrap().id.clone();
        assert!(machine
            .start(RecordingMode::Auto, "again", PageContext::from_document(&doc))
            .is_err());
        assert!(machine.resume().is_err());
        assert_eq!(machine.state(), RecordingState::ManualSelection);
        assert_eq!(machine.current_session().unwrap().id, before);

        machine.pause().unwrap();
        assert!(machine.pause().is_err());
        assert!(machine.switch_mode().is_err());
        assert_eq!(machine.state(), RecordingState::Paused);
    }

    #[test]
    fn test_stop_keeps_action_count() {
        for pause_first in [false, true] {
            let (doc, mut machine) = setup();
            start(&mut machine, &doc, RecordingMode::Auto);
            machine.handle_event(&doc, &click(&doc, "user", 0)).unwrap();
            machine.handle_event(&doc, &click(&doc, "remember", 10)).unwrap();
            if pause_first {
                machine.pause().unwrap();
            }
            let count = machine.snapshot().action_count;
            let session = machine.stop().unwrap();
            assert_eq!(session.actions.len(), count);
            assert!(session.end_time.unwrap() >= session.start_time);
        }
    }

    #[test]
    fn test_capture_pipeline() {
        let (doc, mut machine) = setup();
        start(&mut machine, &doc, RecordingMode::Auto);

        let user = machine.handle_event(&doc, &click(&doc, "user", 0)).unwrap();
        assert_eq!(user.action_type, ActionType::Input);
        assert_eq!(user.value, "ada");
        assert_eq!(user.context.url, "https://app.test/login");
        assert_eq!(user.context.title, "Sign in");
        assert_eq!(user.context.viewport.width, 1440);

        let remember = machine.handle_event(&doc, &click(&doc, "remember", 50)).unwrap();
        assert_eq!(remember.action_type, ActionType::Check);
        assert_eq!(remember.value, "checked");

        let button = doc
            .all_elements()
            .into_iter()
            .find(|n| doc.attr(*n, "data-testid") == Some("sign-in"))
            .unwrap();
        let sign_in = machine
            .handle_event(&doc, &RawEvent::new(InteractionKind::Activate, button, 100))
            .unwrap();
        assert_eq!(sign_in.action_type, ActionType::Click);
        assert_eq!(sign_in.value, "Sign in");
        assert_eq!(sign_in.selectors().unwrap().best.value, "[data-testid=\"sign-in\"]");

        // recorder UI is never captured
        assert!(machine.handle_event(&doc, &click(&doc, "rec-stop", 500)).is_none());

        let session = machine.current_session().unwrap();
        let ids: Vec<&str> = session.actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec![user.id.as_str(), remember.id.as_str(), sign_in.id.as_str()]);
    }

    #[test]
    fn test_events_after_pause_are_ignored() {
        let (doc, mut machine) = setup();
        start(&mut machine, &doc, RecordingMode::Manual);
        machine.pause().unwrap();
        assert!(machine.handle_event(&doc, &click(&doc, "user", 0)).is_none());
        assert_eq!(machine.snapshot().action_count, 0);

        machine.resume().unwrap();
        assert!(machine.handle_event(&doc, &click(&doc, "user", 1)).is_some());
        machine.stop().unwrap();
        assert!(machine.handle_event(&doc, &click(&doc, "user", 2_000)).is_none());
        assert_eq!(machine.retained_session().unwrap().actions.len(), 1);
    }

    #[test]
    fn test_manual_mode_only_takes_confirmation_clicks() {
        let (doc, mut machine) = setup();
        start(&mut machine, &doc, RecordingMode::Manual);
        let user = doc.get_element_by_id("user").unwrap();
        let change = RawEvent::new(InteractionKind::Change, user, 0);
        assert!(machine.handle_event(&doc, &change).is_none());
        machine.switch_mode().unwrap();
        assert!(machine.handle_event(&doc, &change).is_some());
    }

    #[test]
    fn test_external_actions_and_post_hoc_edits() {
        let (doc, mut machine) = setup();
        let call = NetworkCall {
            method: "POST".to_string(),
            url: "https://app.test/api/session".to_string(),
            status: Some(200),
        };
        assert!(machine
            .record_external(call.clone(), PageContext::from_document(&doc))
            .is_err());

        start(&mut machine, &doc, RecordingMode::Auto);
        let clicked = machine.handle_event(&doc, &click(&doc, "user", 0)).unwrap();
        let network = machine
            .record_external(call, PageContext::from_document(&doc))
            .unwrap();
        machine.stop().unwrap();

        machine.set_notes(&clicked.id, "types the user name").unwrap();
        machine.set_value(&clicked.id, "grace").unwrap();
        let removed = machine.remove_action(&network.id).unwrap();
        assert_eq!(removed.id, network.id);
        assert_eq!(
            machine.set_notes("missing", "x"),
            Err(RecorderError::ActionNotFound("missing".to_string()))
        );

        let retained = machine.retained_session().unwrap();
        assert_eq!(retained.actions.len(), 1);
        assert_eq!(retained.actions[0].notes, "types the user name");
        assert_eq!(retained.actions[0].value, "grace");

        assert!(machine.clear_retained().is_some());
        assert_eq!(machine.set_value(&clicked.id, "x"), Err(RecorderError::NoRetainedSession));
    }

    #[test]
    fn test_state_changes_are_broadcast() {
        let (doc, mut machine) = setup();
        let mut events = machine.subscribe();
        start(&mut machine, &doc, RecordingMode::Auto);
        machine.stop().unwrap();

        match events.try_recv().unwrap() {
            RecorderEvent::StateChanged { from, to, snapshot } => {
                assert_eq!(from, RecordingState::Inactive);
                assert_eq!(to, RecordingState::AutoRecording);
                assert!(snapshot.session_id.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            events.try_recv().unwrap(),
            RecorderEvent::StateChanged {
                to: RecordingState::Inactive,
                ..
            }
        ));
        assert!(matches!(events.try_recv().unwrap(), RecorderEvent::SessionClosed(_)));
    }
}
