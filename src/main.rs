use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lumi_recorder::dom::{self, Document, Engine, NodeId};
use lumi_recorder::recorder::{
    ConsoleEventListener, InteractionKind, NetworkCall, PageContext, RawEvent, Recorder,
    RecordingMode,
};
use lumi_recorder::selector::SelectorSynthesizer;
use lumi_recorder::store::{JsonFileStore, SessionStore};
use lumi_recorder::utils::RecorderConfig;

/// Virtual time between scripted steps (ms)
const STEP_INTERVAL_MS: u64 = 100;

#[derive(Parser)]
#[command(name = "lumi-recorder")]
#[command(author = "NL Team")]
#[command(version)]
#[command(about = "Selector synthesis and interaction recording for page snapshots", long_about = None)]
struct Cli {
    /// Recorder config (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize ranked selectors for one element of a snapshot
    Select {
        /// Snapshot file (XHTML)
        snapshot: PathBuf,

        /// Element to describe, as CSS, XPath, text= or role= selector
        #[arg(short, long)]
        target: String,
    },

    /// Replay a scripted interaction list through the recorder
    Record {
        /// Snapshot file (XHTML)
        snapshot: PathBuf,

        /// Steps file (YAML)
        #[arg(short, long)]
        script: PathBuf,

        /// Recording mode
        #[arg(short, long, value_enum, default_value = "auto")]
        mode: ModeArg,

        /// Session name
        #[arg(short, long, default_value = "recording")]
        name: String,

        /// Session store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Print recorder events as they happen
        #[arg(long, default_value = "false")]
        realtime: bool,
    },

    /// Print a stored session as JSON
    Show {
        session_id: String,

        /// Session store directory
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// List stored sessions
    List {
        /// Session store directory
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Auto,
    Manual,
}

impl From<ModeArg> for RecordingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => RecordingMode::Auto,
            ModeArg::Manual => RecordingMode::Manual,
        }
    }
}

/// One scripted interaction
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Step {
    Activate(String),
    Change { target: String, value: String },
    Input { target: String, value: String },
    Submit(String),
    Hover(String),
    Network(NetworkCall),
    Pause,
    Resume,
    Switch,
    Wait(u64),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = match &cli.config {
        Some(path) => RecorderConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RecorderConfig::default(),
    };

    match cli.command {
        Commands::Select { snapshot, target } => {
            let doc = load_snapshot(&snapshot)?;
            let node = find_target(&doc, &target)?;
            let set = SelectorSynthesizer::new(config).synthesize(&doc, node);

            println!(
                "🎯 Selectors for {}",
                doc.node_path(node).cyan()
            );
            for candidate in set.iter() {
                let unique = if candidate.is_unique {
                    "unique".green()
                } else {
                    "ambiguous".yellow()
                };
                println!(
                    "  {:.3}  {:<15} {:<9} {}",
                    candidate.confidence,
                    candidate.strategy_kind.to_string().dimmed(),
                    unique,
                    candidate.value
                );
            }
            let best = if set.reliable {
                set.best.value.green().bold()
            } else {
                set.best.value.yellow().bold()
            };
            println!("\n  Best: {}", best);
            if !set.reliable {
                println!("  {} No unique selector found", "⚠️ ".yellow());
            }
        }

        Commands::Record {
            snapshot,
            script,
            mode,
            name,
            store,
            realtime,
        } => {
            let mut doc = load_snapshot(&snapshot)?;
            let steps = load_script(&script)?;
            let store_dir = store.unwrap_or_else(|| config.session_dir());
            let store: Arc<dyn SessionStore> = Arc::new(JsonFileStore::new(&store_dir));

            println!(
                "{} Recording {} ({} steps, {} mode)",
                "🔴".to_string().red().bold(),
                snapshot.display().to_string().cyan(),
                steps.len(),
                RecordingMode::from(mode)
            );

            let mut recorder = Recorder::new(config, store);
            let listener = realtime.then(|| tokio::spawn(ConsoleEventListener::listen(recorder.subscribe())));

            recorder.start(mode.into(), &name, PageContext::from_document(&doc))?;
            let skipped = replay(&mut recorder, &mut doc, steps);
            let report = recorder.stop().await?;

            drop(recorder);
            if let Some(listener) = listener {
                listener.await.context("Event listener failed")?;
            }

            if !realtime {
                for action in &report.session.actions {
                    println!(
                        "  {} {:<7} {} {}",
                        "✓".green(),
                        action.action_type.to_string().cyan(),
                        action.target_label(),
                        action.value.dimmed()
                    );
                }
            }

            match &report.warning {
                None => {
                    println!("\n{} Recording complete!", "✅".green().bold());
                    println!("   Session: {}", report.session.id.cyan());
                    println!("   Actions: {}", report.session.actions.len());
                    if skipped > 0 {
                        println!("   Skipped steps: {}", skipped.to_string().yellow());
                    }
                    println!("   Store: {}", store_dir.display().to_string().cyan());
                }
                Some(warning) => {
                    println!(
                        "\n{} Recorded {} actions but could not save: {}",
                        "⚠️ ".yellow(),
                        report.session.actions.len(),
                        warning.message.red()
                    );
                }
            }
        }

        Commands::Show { session_id, store } => {
            let store = JsonFileStore::new(store.unwrap_or_else(|| config.session_dir()));
            let session = store
                .load(&session_id)
                .await
                .with_context(|| format!("Failed to load session {}", session_id))?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }

        Commands::List { store } => {
            let store = JsonFileStore::new(store.unwrap_or_else(|| config.session_dir()));
            let sessions = store.list().await.context("Failed to list sessions")?;
            if sessions.is_empty() {
                println!("No sessions in {}", store.dir().display());
            }
            for summary in sessions {
                println!(
                    "  {}  {}  {} actions  {}",
                    summary.id.cyan(),
                    summary.start_time.format("%Y-%m-%d %H:%M:%S"),
                    summary.action_count,
                    summary.name.bold()
                );
            }
        }
    }

    Ok(())
}

fn load_snapshot(path: &Path) -> anyhow::Result<Document> {
    Document::load(path).with_context(|| format!("Failed to load snapshot {}", path.display()))
}

fn load_script(path: &Path) -> anyhow::Result<Vec<Step>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Invalid script {}", path.display()))
}

fn find_target(doc: &Document, selector: &str) -> anyhow::Result<NodeId> {
    let matches = dom::resolve(doc, doc.root(), Engine::detect(selector), selector)?;
    matches
        .first()
        .copied()
        .with_context(|| format!("No element matches `{}`", selector))
}

/// Feed the steps to the recorder. A failing step is reported and skipped so
/// the session still reaches `stop`. Returns the number of skipped steps.
fn replay(recorder: &mut Recorder, doc: &mut Document, steps: Vec<Step>) -> usize {
    let mut clock = 0u64;
    let mut skipped = 0;

    for (i, step) in steps.into_iter().enumerate() {
        clock += STEP_INTERVAL_MS;
        if let Err(e) = apply_step(recorder, doc, step, &mut clock) {
            warn!("Step {} skipped: {:#}", i + 1, e);
            println!("  {} Step {} skipped: {:#}", "⚠️ ".yellow(), i + 1, e);
            skipped += 1;
        }
    }
    skipped
}

fn apply_step(
    recorder: &mut Recorder,
    doc: &mut Document,
    step: Step,
    clock: &mut u64,
) -> anyhow::Result<()> {
    let event = match step {
        Step::Activate(target) => Some((InteractionKind::Activate, find_target(doc, &target)?)),
        Step::Change { target, value } => {
            let node = find_target(doc, &target)?;
            set_field_value(doc, node, &value);
            Some((InteractionKind::Change, node))
        }
        Step::Input { target, value } => {
            let node = find_target(doc, &target)?;
            set_field_value(doc, node, &value);
            Some((InteractionKind::Input, node))
        }
        Step::Submit(target) => Some((InteractionKind::Submit, find_target(doc, &target)?)),
        Step::Hover(target) => Some((InteractionKind::PointerMove, find_target(doc, &target)?)),
        Step::Network(call) => {
            recorder.record_external(call, PageContext::from_document(doc))?;
            None
        }
        Step::Pause => {
            recorder.pause()?;
            None
        }
        Step::Resume => {
            recorder.resume()?;
            None
        }
        Step::Switch => {
            recorder.switch_mode()?;
            None
        }
        Step::Wait(ms) => {
            *clock += ms;
            None
        }
    };

    if let Some((kind, node)) = event {
        recorder.handle_event(doc, &RawEvent::new(kind, node, *clock));
    }
    Ok(())
}

/// Apply a scripted value the way a user edit would leave the field
fn set_field_value(doc: &mut Document, node: NodeId, value: &str) {
    let tag = doc.tag(node).map(str::to_string);
    let checkable = matches!(doc.attr(node, "type"), Some("checkbox") | Some("radio"));
    match tag.as_deref() {
        Some("select") => {
            let options: Vec<NodeId> = doc
                .descendant_elements(node)
                .into_iter()
                .filter(|o| doc.tag(*o) == Some("option"))
                .collect();
            for option in options {
                let matches = doc.attr(option, "value") == Some(value)
                    || dom::normalize_whitespace(&doc.text_content(option)) == value;
                if matches {
                    doc.set_attribute(option, "selected", "selected");
                } else {
                    doc.remove_attribute(option, "selected");
                }
            }
        }
        Some("input") if checkable => {
            if value == "checked" || value == "true" {
                doc.set_attribute(node, "checked", "checked");
            } else {
                doc.remove_attribute(node, "checked");
            }
        }
        _ => doc.set_attribute(node, "value", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumi_recorder::recorder::{ActionType, RecordingState};
    use lumi_recorder::store::MemoryStore;

    const PAGE: &str = r#"<html lumi:url="https://app.test/form"><body>
        <form id="signup">
          <input id="email" type="email"/>
          <button id="send">Send</button>
        </form>
      </body></html>"#;

    const SCRIPT: &str = r##"
- activate: "#missing"
- change: { target: "#email", value: "a@b.test" }
- resume
- activate: "div["
- activate: "#send"
"##;

    #[tokio::test]
    async fn test_failed_steps_are_skipped_and_session_is_saved() {
        let mut doc = Document::parse(PAGE).unwrap();
        let steps: Vec<Step> = serde_yaml::from_str(SCRIPT).unwrap();
        let store = Arc::new(MemoryStore::new());
        let mut recorder = Recorder::new(RecorderConfig::default(), store.clone());
        recorder
            .start(RecordingMode::Auto, "script", PageContext::from_document(&doc))
            .unwrap();

        let skipped = replay(&mut recorder, &mut doc, steps);
        assert_eq!(skipped, 3);
        assert_eq!(recorder.state(), RecordingState::AutoRecording);

        let report = recorder.stop().await.unwrap();
        assert!(report.persisted());
        assert_eq!(store.len().await, 1);
        let types: Vec<ActionType> = report.session.actions.iter().map(|a| a.action_type).collect();
        assert_eq!(types, vec![ActionType::Input, ActionType::Click]);
        assert_eq!(report.session.actions[0].value, "a@b.test");
    }

    #[test]
    fn test_wait_advances_the_clock() {
        let mut doc = Document::parse(PAGE).unwrap();
        let mut recorder = Recorder::new(RecorderConfig::default(), Arc::new(MemoryStore::new()));
        let mut clock = 0;
        apply_step(&mut recorder, &mut doc, Step::Wait(250), &mut clock).unwrap();
        assert_eq!(clock, 250);
        assert!(apply_step(&mut recorder, &mut doc, Step::Pause, &mut clock).is_err());
    }
}
