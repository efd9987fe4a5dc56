//! Recorder module for capturing user interactions into sessions
//!
//! This module provides:
//! - Event filtering (recorder UI exclusion, highlight throttling, activation debounce)
//! - Action classification from element facts
//! - The recording state machine that owns the current session
//! - The async `Recorder` facade that persists closed sessions

pub mod classifier;
pub mod controller;
pub mod events;
pub mod filter;
pub mod machine;
pub mod session;

pub use classifier::{ActionClassifier, InteractionKind};
pub use controller::{PersistenceWarning, Recorder, StopReport};
pub use events::{ConsoleEventListener, EventEmitter, RecorderEvent, StateSnapshot};
pub use filter::{EventFilter, FilterDecision, IgnoreReason, RawEvent};
pub use machine::{RecordingStateMachine, Transition};
pub use session::{
    ActionRecord, ActionType, CaptureSource, NetworkCall, PageContext, RecordingMode,
    RecordingState, Session, SessionMetadata, Viewport,
};
