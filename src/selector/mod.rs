//! Selector synthesis and validation
//!
//! This module provides:
//! - Five independent strategies producing candidate selectors for an element
//! - A uniqueness validator resolving each candidate against the live tree
//! - Confidence scoring and the ranked [`SelectorSet`]

pub mod scorer;
pub mod strategies;
pub mod synthesizer;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dom::Engine;

pub use scorer::ConfidenceScorer;
pub use strategies::SelectorStrategy;
pub use synthesizer::SelectorSynthesizer;
pub use validator::UniquenessValidator;

/// Strategy that produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    DataAttribute,
    Semantic,
    Css,
    XPath,
    TextBased,
}

impl StrategyKind {
    /// Tie-break rank, lower is preferred
    pub fn priority(self) -> u8 {
        match self {
            StrategyKind::DataAttribute => 0,
            StrategyKind::Semantic => 1,
            StrategyKind::Css => 2,
            StrategyKind::XPath => 3,
            StrategyKind::TextBased => 4,
        }
    }

    /// Resolution engine used for candidates of this kind
    pub fn engine(self, value: &str) -> Engine {
        match self {
            StrategyKind::DataAttribute | StrategyKind::Css => Engine::Css,
            StrategyKind::Semantic => Engine::detect(value),
            StrategyKind::XPath => Engine::XPath,
            StrategyKind::TextBased => Engine::Text,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::DataAttribute => "data-attribute",
            StrategyKind::Semantic => "semantic",
            StrategyKind::Css => "css",
            StrategyKind::XPath => "xpath",
            StrategyKind::TextBased => "text",
        };
        f.write_str(name)
    }
}

/// One proposed identifying expression for an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSelector {
    pub strategy_kind: StrategyKind,
    pub value: String,
    pub confidence: f64,
    pub is_unique: bool,
}

/// Ranked candidates for one element plus the chosen best
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSet {
    pub candidates: Vec<CandidateSelector>,
    pub best: CandidateSelector,
    /// False when no candidate resolved uniquely and `best` is a fallback
    pub reliable: bool,
}

impl SelectorSet {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateSelector> {
        self.candidates.iter()
    }

    /// First candidate of a strategy, in rank order
    pub fn first_of(&self, kind: StrategyKind) -> Option<&CandidateSelector> {
        self.candidates.iter().find(|c| c.strategy_kind == kind)
    }

    /// Unique candidates in rank order
    pub fn unique(&self) -> impl Iterator<Item = &CandidateSelector> {
        self.candidates.iter().filter(|c| c.is_unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut kinds = vec![
            StrategyKind::TextBased,
            StrategyKind::Css,
            StrategyKind::DataAttribute,
            StrategyKind::XPath,
            StrategyKind::Semantic,
        ];
        kinds.sort_by_key(|k| k.priority());
        assert_eq!(
            kinds,
            vec![
                StrategyKind::DataAttribute,
                StrategyKind::Semantic,
                StrategyKind::Css,
                StrategyKind::XPath,
                StrategyKind::TextBased,
            ]
        );
    }

    #[test]
    fn test_engine_mapping() {
        assert_eq!(StrategyKind::Semantic.engine("role=button[name=\"Go\"]"), Engine::Aria);
        assert_eq!(StrategyKind::Semantic.engine("input[name=\"q\"]"), Engine::Css);
        assert_eq!(StrategyKind::XPath.engine("//*[@id='a']"), Engine::XPath);
        assert_eq!(StrategyKind::TextBased.engine("text=Go"), Engine::Text);
    }
}
