use std::sync::Arc;
use std::time::{Duration, Instant};

use lumi_recorder::dom::{self, Document, Engine, NodeId};
use lumi_recorder::element::AttributeExtractor;
use lumi_recorder::error::RecorderError;
use lumi_recorder::recorder::{
    ActionClassifier, ActionType, InteractionKind, PageContext, RawEvent, Recorder,
    RecordingMode, RecordingState, RecordingStateMachine,
};
use lumi_recorder::selector::strategies::positional_xpath;
use lumi_recorder::selector::{SelectorSynthesizer, StrategyKind};
use lumi_recorder::store::{JsonFileStore, SessionStore};
use lumi_recorder::utils::RecorderConfig;

const CHECKOUT: &str = r#"<html lumi:url="https://shop.test/checkout" lumi:viewport="1280x720">
  <head><title>Checkout</title></head>
  <body>
    <form>
      <input type="text"/>
      <input type="text"/>
      <button data-testid="submit-btn">Submit</button>
    </form>
    <ul><li>One</li><li>Two</li><li>Three</li></ul>
  </body>
</html>"#;

fn checkout() -> Document {
    Document::parse(CHECKOUT).unwrap()
}

fn query(doc: &Document, selector: &str) -> Vec<NodeId> {
    dom::resolve(doc, doc.root(), Engine::detect(selector), selector).unwrap()
}

#[test]
fn test_test_id_button_gets_data_attribute_selector() {
    let doc = checkout();
    let button = query(&doc, "button")[0];

    let set = SelectorSynthesizer::new(RecorderConfig::default()).synthesize(&doc, button);
    assert_eq!(set.best.strategy_kind, StrategyKind::DataAttribute);
    assert!(set.best.is_unique);
    assert_eq!(query(&doc, &set.best.value), vec![button]);
}

#[test]
fn test_anonymous_input_falls_back_to_structure() {
    let doc = checkout();
    let second = query(&doc, "input")[1];

    let set = SelectorSynthesizer::new(RecorderConfig::default()).synthesize(&doc, second);
    assert!(matches!(
        set.best.strategy_kind,
        StrategyKind::Css | StrategyKind::XPath
    ));
    assert!(set.best.is_unique);
    assert!(set.reliable);
    assert_eq!(query(&doc, &set.best.value), vec![second]);

    let facts = AttributeExtractor::new(100).extract(&doc, second);
    let (action_type, _) = ActionClassifier::new(50).classify(InteractionKind::Activate, &facts);
    assert_eq!(action_type, ActionType::Input);
}

#[test]
fn test_manual_start_then_stop_closes_one_session() {
    let doc = checkout();
    let mut machine = RecordingStateMachine::new(RecorderConfig::default());
    machine
        .start(RecordingMode::Manual, "manual", PageContext::from_document(&doc))
        .unwrap();

    let inputs = query(&doc, "input");
    for (i, node) in inputs.iter().enumerate() {
        let event = RawEvent::new(InteractionKind::Activate, *node, i as u64 * 1_000);
        machine.handle_event(&doc, &event).unwrap();
    }

    let session = machine.stop().unwrap();
    assert_eq!(machine.state(), RecordingState::Inactive);
    assert!(session.end_time.unwrap() >= session.start_time);
    assert_eq!(session.actions.len(), 2);
    let targets: Vec<&str> = session
        .actions
        .iter()
        .map(|a| a.selectors().unwrap().best.value.as_str())
        .collect();
    assert_eq!(query(&doc, targets[0]), vec![inputs[0]]);
    assert_eq!(query(&doc, targets[1]), vec![inputs[1]]);
}

#[test]
fn test_resume_from_inactive_is_rejected() {
    let mut machine = RecordingStateMachine::new(RecorderConfig::default());
    assert_eq!(
        machine.resume(),
        Err(RecorderError::InvalidTransition {
            state: RecordingState::Inactive,
            event: "resume",
        })
    );
    assert_eq!(machine.state(), RecordingState::Inactive);
}

/// Drive a fresh machine into one of the non-inactive states
fn prepare(doc: &Document, variant: usize) -> RecordingStateMachine {
    let mut machine = RecordingStateMachine::new(RecorderConfig::default());
    let page = PageContext::from_document(doc);
    let button = query(doc, "button")[0];
    let click = RawEvent::new(InteractionKind::Activate, button, 0);
    match variant {
        0 => machine.start(RecordingMode::Auto, "auto", page).unwrap(),
        1 => machine.start(RecordingMode::Manual, "manual", page).unwrap(),
        2 => {
            machine.start(RecordingMode::Auto, "paused", page).unwrap();
            machine.handle_event(doc, &click);
            machine.pause().unwrap();
        }
        _ => {
            machine.start(RecordingMode::Manual, "switched", page).unwrap();
            machine.handle_event(doc, &click);
            machine.switch_mode().unwrap();
        }
    }
    machine
}

#[test]
fn test_stop_from_every_non_inactive_state() {
    let doc = checkout();
    for variant in 0..4 {
        let mut machine = prepare(&doc, variant);
        assert_ne!(machine.state(), RecordingState::Inactive);
        let before = machine.snapshot().action_count;

        let session = machine.stop().unwrap();
        assert_eq!(machine.state(), RecordingState::Inactive);
        assert!(session.end_time.is_some());
        assert_eq!(session.actions.len(), before);
    }
}

#[test]
fn test_positional_xpath_indexes_follow_sibling_order() {
    let doc = checkout();
    let items = query(&doc, "li");
    let paths: Vec<String> = items.iter().map(|n| positional_xpath(&doc, *n)).collect();

    for (i, path) in paths.iter().enumerate() {
        assert!(path.ends_with(&format!("li[{}]", i + 1)), "{}", path);
        assert_eq!(query(&doc, path), vec![items[i]]);
    }
}

#[test]
fn test_synthesis_on_large_labelled_form_stays_fast() {
    const FIELDS: usize = 4000;
    let mut markup = String::from("<html><body><form>");
    for i in 0..FIELDS {
        markup.push_str(&format!(
            r#"<label for="f{i}">Field {i}</label><input id="f{i}" type="text"/>"#
        ));
    }
    markup.push_str("</form></body></html>");
    let doc = Document::parse(&markup).unwrap();
    let target = doc.get_element_by_id(&format!("f{}", FIELDS - 10)).unwrap();

    let synthesizer = SelectorSynthesizer::new(RecorderConfig::default());
    let started = Instant::now();
    let set = synthesizer.synthesize(&doc, target);
    let elapsed = started.elapsed();

    assert!(set.reliable);
    assert_eq!(query(&doc, &set.best.value), vec![target]);
    assert!(set
        .iter()
        .any(|c| c.value.starts_with("label=") && c.is_unique));
    assert!(
        elapsed < Duration::from_secs(1),
        "synthesis over {} fields took {:?}",
        FIELDS,
        elapsed
    );
}

#[tokio::test]
async fn test_recorded_session_round_trips_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let doc = checkout();
    let inputs = query(&doc, "input");
    let button = query(&doc, "button")[0];

    let mut recorder = Recorder::new(RecorderConfig::default(), store.clone());
    recorder
        .start(RecordingMode::Auto, "checkout", PageContext::from_document(&doc))
        .unwrap();
    for (i, node) in [inputs[1], button, inputs[0]].into_iter().enumerate() {
        recorder.handle_event(&doc, &RawEvent::new(InteractionKind::Activate, node, i as u64 * 10));
    }
    let report = recorder.stop().await.unwrap();
    assert!(report.persisted());

    let loaded = store.load(&report.session.id).await.unwrap();
    let ids: Vec<&str> = loaded.actions.iter().map(|a| a.id.as_str()).collect();
    let expected: Vec<&str> = report.session.actions.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, expected);
    assert_eq!(loaded.actions[1].action_type, ActionType::Click);
    assert_eq!(loaded.actions[1].value, "Submit");
    assert_eq!(loaded.url, "https://shop.test/checkout");
    assert_eq!(loaded.metadata.mode_at_start, RecordingMode::Auto);
}
