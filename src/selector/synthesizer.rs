use log::{debug, warn};
use std::collections::HashSet;

use super::scorer::ConfidenceScorer;
use super::strategies::{self, positional_xpath, RawCandidate, SelectorStrategy, SynthesisContext};
use super::validator::UniquenessValidator;
use super::{CandidateSelector, SelectorSet, StrategyKind};
use crate::dom::{Document, NodeId};
use crate::utils::config::RecorderConfig;

/// Runs every strategy, validates and scores the candidates, and ranks them
pub struct SelectorSynthesizer {
    config: RecorderConfig,
    strategies: Vec<Box<dyn SelectorStrategy>>,
}

impl SelectorSynthesizer {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            strategies: strategies::all(),
        }
    }

    /// Build the ranked selector set for a node.
    ///
    /// Text and shadow-root nodes are described through their nearest element.
    /// The result always holds at least one candidate.
    pub fn synthesize(&self, doc: &Document, node: NodeId) -> SelectorSet {
        let target = doc.closest_element(node);
        let ctx = SynthesisContext {
            doc,
            node: target,
            config: &self.config,
        };

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for strategy in &self.strategies {
            let kind = strategy.kind();
            for raw in strategy.candidates(&ctx) {
                if seen.insert((kind, raw.value.clone())) {
                    candidates.push(evaluate(doc, target, kind, raw));
                }
            }
        }

        if !candidates.iter().any(|c| c.is_unique) && doc.is_element(target) {
            let fallback = RawCandidate::new(positional_xpath(doc, target), 0.3);
            if seen.insert((StrategyKind::XPath, fallback.value.clone())) {
                candidates.push(evaluate(doc, target, StrategyKind::XPath, fallback));
            }
        }
        if candidates.is_empty() {
            candidates.push(evaluate(
                doc,
                target,
                StrategyKind::XPath,
                RawCandidate::new("/*", 0.3),
            ));
        }

        rank(&mut candidates);

        let (best, reliable) = match candidates.iter().find(|c| c.is_unique) {
            Some(best) => (best.clone(), true),
            None => {
                let best = candidates[0].clone();
                warn!(
                    "No unique selector for {}; falling back to {} `{}`",
                    doc.node_path(target),
                    best.strategy_kind,
                    best.value
                );
                (best, false)
            }
        };

        debug!(
            "Synthesized {} candidates for {}, best {} `{}` ({:.2})",
            candidates.len(),
            doc.node_path(target),
            best.strategy_kind,
            best.value,
            best.confidence
        );

        SelectorSet {
            candidates,
            best,
            reliable,
        }
    }
}

fn evaluate(doc: &Document, target: NodeId, kind: StrategyKind, raw: RawCandidate) -> CandidateSelector {
    let is_unique = UniquenessValidator::is_unique(doc, &raw.value, kind, target);
    CandidateSelector {
        strategy_kind: kind,
        confidence: ConfidenceScorer::score(kind, raw.baseline, is_unique),
        value: raw.value,
        is_unique,
    }
}

/// Confidence first, then strategy priority, then unique before non-unique.
/// The sort is stable so generation order settles the rest.
fn rank(candidates: &mut [CandidateSelector]) {
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.strategy_kind.priority().cmp(&b.strategy_kind.priority()))
            .then_with(|| b.is_unique.cmp(&a.is_unique))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeKind;

    const PAGE: &str = r#"<html><body>
        <header><nav><a href="/">Home</a><a href="/docs">Docs</a></nav></header>
        <main id="content">
          <button data-testid="submit-btn" class="btn">Submit</button>
          <button class="btn">Submit</button>
          <form>
            <input type="text"/>
            <input type="text"/>
            <input type="text"/>
          </form>
          <div class="card"><span>12:30</span></div>
          <div class="card"><span>12:30</span></div>
          <p data-testid="dup">A</p>
          <p data-testid="dup">B</p>
        </main>
        <aside id="widget"><template shadowrootmode="open"><button>Shadow</button></template></aside>
      </body></html>"#;

    fn synth() -> SelectorSynthesizer {
        SelectorSynthesizer::new(RecorderConfig::default())
    }

    #[test]
    fn test_every_element_gets_a_sound_selector_set() {
        let doc = Document::parse(PAGE).unwrap();
        let synth = synth();
        for node in doc.all_elements() {
            let set = synth.synthesize(&doc, node);
            assert!(!set.is_empty());
            if set.best.is_unique {
                let matches =
                    UniquenessValidator::resolve(&doc, &set.best.value, set.best.strategy_kind, node)
                        .unwrap();
                assert_eq!(matches, vec![node], "{}", set.best.value);
            }
            assert!(set.reliable, "{} has no unique selector", doc.node_path(node));
        }
    }

    #[test]
    fn test_ordering_invariants() {
        let doc = Document::parse(PAGE).unwrap();
        let synth = synth();
        for node in doc.all_elements() {
            let set = synth.synthesize(&doc, node);
            for pair in set.candidates.windows(2) {
                assert!(pair[0].confidence >= pair[1].confidence);
            }
            let first_unique_data = set
                .candidates
                .iter()
                .position(|c| c.strategy_kind == StrategyKind::DataAttribute && c.is_unique);
            if let Some(data_pos) = first_unique_data {
                assert!(!set.candidates[..data_pos]
                    .iter()
                    .any(|c| c.strategy_kind == StrategyKind::TextBased && !c.is_unique));
            }
        }
    }

    #[test]
    fn test_data_attribute_wins() {
        let doc = Document::parse(PAGE).unwrap();
        let button = doc
            .all_elements()
            .into_iter()
            .find(|n| doc.attr(*n, "data-testid") == Some("submit-btn"))
            .unwrap();
        let set = synth().synthesize(&doc, button);
        assert_eq!(set.best.strategy_kind, StrategyKind::DataAttribute);
        assert_eq!(set.best.value, "[data-testid=\"submit-btn\"]");
        assert_eq!(set.best.confidence, 1.0);
        assert!(set.reliable);

        let text = set.first_of(StrategyKind::TextBased).unwrap();
        assert!(!text.is_unique);
    }

    #[test]
    fn test_anonymous_input_falls_back_to_structure() {
        let doc = Document::parse(PAGE).unwrap();
        let second = doc
            .all_elements()
            .into_iter()
            .filter(|n| doc.tag(*n) == Some("input"))
            .nth(1)
            .unwrap();
        let set = synth().synthesize(&doc, second);
        assert!(set.reliable);
        assert!(matches!(
            set.best.strategy_kind,
            StrategyKind::Css | StrategyKind::XPath
        ));
        assert_eq!(set.best.value, "#content > form > input:nth-of-type(2)");
        let xpath = set.first_of(StrategyKind::XPath).unwrap();
        assert_eq!(xpath.value, "//*[@id='content']/form/input[2]");
        assert!(xpath.is_unique);
    }

    #[test]
    fn test_duplicate_test_ids_still_rank_but_lose_best() {
        let doc = Document::parse(PAGE).unwrap();
        let first_p = doc
            .all_elements()
            .into_iter()
            .find(|n| doc.tag(*n) == Some("p"))
            .unwrap();
        let set = synth().synthesize(&doc, first_p);
        let data = set.first_of(StrategyKind::DataAttribute).unwrap();
        assert!(!data.is_unique);
        assert_eq!(data.confidence, 0.65);
        assert!(set.best.is_unique);
        assert_ne!(set.best.strategy_kind, StrategyKind::DataAttribute);
    }

    #[test]
    fn test_shadow_content_uses_scoped_selectors() {
        let doc = Document::parse(PAGE).unwrap();
        let inner = doc
            .all_elements()
            .into_iter()
            .find(|n| doc.own_text(*n) == "Shadow")
            .unwrap();
        let set = synth().synthesize(&doc, inner);
        assert!(set.reliable);
        assert_eq!(set.best.value, "role=button[name=\"Shadow\"]");
    }

    #[test]
    fn test_text_node_is_described_by_its_element() {
        let doc = Document::parse(PAGE).unwrap();
        let link = doc
            .all_elements()
            .into_iter()
            .find(|n| doc.own_text(*n) == "Docs")
            .unwrap();
        let text_node = doc.children(link)[0];
        assert!(matches!(doc.kind(text_node), NodeKind::Text(_)));
        let set = synth().synthesize(&doc, text_node);
        assert_eq!(set.best.value, "role=link[name=\"Docs\"]");
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let doc = Document::parse(PAGE).unwrap();
        let synth = synth();
        for node in doc.all_elements() {
            assert_eq!(synth.synthesize(&doc, node), synth.synthesize(&doc, node));
        }
    }

    #[test]
    fn test_detached_node_is_unreliable_but_non_empty() {
        let mut doc = Document::parse(PAGE).unwrap();
        let widget = doc.get_element_by_id("widget").unwrap();
        doc.detach(widget);
        let set = synth().synthesize(&doc, widget);
        assert!(!set.is_empty());
        assert!(!set.reliable);
    }
}
