//! Element facts
//!
//! Reads a fresh, owned snapshot of an element at capture time: attributes,
//! text, sibling position, geometry, computed style and form state.

pub mod bounds;
pub mod extractor;
pub mod facts;

pub use bounds::{ElementBoundsProbe, Geometry};
pub use extractor::AttributeExtractor;
pub use facts::{ComputedStyle, ElementFacts, FormState, ParentFacts};
