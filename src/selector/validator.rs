use log::debug;

use super::StrategyKind;
use crate::dom::{self, Document, NodeId};
use crate::error::SelectorSyntaxError;

/// Checks that a selector resolves to exactly the intended element
pub struct UniquenessValidator;

impl UniquenessValidator {
    /// Resolve a candidate in the target's tree scope
    pub fn resolve(
        doc: &Document,
        value: &str,
        kind: StrategyKind,
        target: NodeId,
    ) -> Result<Vec<NodeId>, SelectorSyntaxError> {
        let scope = doc.tree_scope(target);
        dom::resolve(doc, scope, kind.engine(value), value)
    }

    /// True iff the selector matches one element and that element is `target`.
    /// Syntax errors count as not unique.
    pub fn is_unique(doc: &Document, value: &str, kind: StrategyKind, target: NodeId) -> bool {
        match Self::resolve(doc, value, kind, target) {
            Ok(matches) => matches.len() == 1 && matches[0] == target,
            Err(e) => {
                debug!("Discarding candidate: {}", e);
                false
            }
        }
    }
}
