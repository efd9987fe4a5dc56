use serde::Serialize;
use tokio::sync::broadcast;

use super::session::{ActionRecord, RecordingMode, RecordingState, Session};
use crate::dom::{NodeId, Rect};

/// Immutable copy of the recorder state handed to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub state: RecordingState,
    pub mode: Option<RecordingMode>,
    pub session_id: Option<String>,
    pub action_count: usize,
}

/// Recorder events for real-time updates
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    StateChanged {
        from: RecordingState,
        to: RecordingState,
        snapshot: StateSnapshot,
    },
    ActionCaptured(ActionRecord),
    Highlight {
        target: NodeId,
        bounds: Rect,
    },
    SessionClosed(Session),
    PersistenceFailed {
        session_id: String,
        message: String,
    },
}

/// Event emitter for broadcasting recorder events
pub struct EventEmitter {
    sender: broadcast::Sender<RecorderEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<RecorderEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    /// Sending with no subscriber is not an error
    pub fn emit(&self, event: RecorderEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RecorderEvent>) {
        use colored::Colorize;

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    println!("  {} {} events skipped", "⚠".yellow(), skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                RecorderEvent::StateChanged { from, to, snapshot } => {
                    println!(
                        "{} {} {} {} ({} actions)",
                        "●".blue().bold(),
                        from.to_string().dimmed(),
                        "→".blue(),
                        to.to_string().white().bold(),
                        snapshot.action_count
                    );
                }
                RecorderEvent::ActionCaptured(action) => {
                    println!(
                        "  {} {:<7} {} {}",
                        "✓".green(),
                        action.action_type.to_string().cyan(),
                        action.target_label(),
                        if action.value.is_empty() {
                            String::new()
                        } else {
                            format!("= \"{}\"", action.value).dimmed().to_string()
                        }
                    );
                    if let Some(selectors) = action.selectors() {
                        if !selectors.reliable {
                            println!(
                                "    {} no unique selector, using best effort",
                                "⚠".yellow()
                            );
                        }
                    }
                }
                RecorderEvent::Highlight { .. } => {}
                RecorderEvent::SessionClosed(session) => {
                    println!(
                        "\n{} Session {} closed: {} actions in {}ms",
                        "■".blue().bold(),
                        session.name.cyan(),
                        session.actions.len(),
                        session.duration_ms()
                    );
                }
                RecorderEvent::PersistenceFailed {
                    session_id,
                    message,
                } => {
                    println!(
                        "  {} Could not save session {}: {}",
                        "⚠".yellow(),
                        session_id,
                        message.red()
                    );
                }
            }
        }
    }
}
