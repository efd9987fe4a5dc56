pub mod dom;
pub mod element;
pub mod error;
pub mod recorder;
pub mod selector;
pub mod store;
pub mod utils;

// Re-export common items
pub use recorder::{Recorder, RecordingStateMachine};
pub use selector::{SelectorSet, SelectorSynthesizer};
