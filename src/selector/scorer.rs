//! Confidence scoring
//!
//! Every strategy has a confidence band; candidates are scored inside it and
//! penalized when they do not resolve uniquely.
//!
//! # Baselines
//! - **DataAttribute**: canonical test ids `1.0 - 0.01 * rank`, custom hooks `0.9`
//! - **Semantic**: role+name `0.9` (`0.85` from content), label `0.85`,
//!   `[aria-label]` `0.8`, `[name]` `0.75`, `[placeholder]`/`[title]`/`[alt]` `0.7`
//! - **Css**: `#id` `0.8`, classes `0.7 - 0.05 * (n - 1)`, structural path `0.55`/`0.5`
//! - **XPath**: id-anchored `0.6 - 0.05 * (steps - 1)` (floor `0.4`), positional `0.3`
//! - **TextBased**: exact `0.55`, substring `0.35`, adjusted for dynamic and short text
//!
//! A candidate that is not unique loses [`NON_UNIQUE_PENALTY`] or the width of
//! its band, whichever is larger, so it lands at or below every unique
//! candidate of its own strategy.

use regex::Regex;
use std::sync::LazyLock;

use super::StrategyKind;

/// Minimum deduction for a candidate that does not resolve uniquely
pub const NON_UNIQUE_PENALTY: f64 = 0.35;

/// Patterns that indicate machine-generated ids and class names
static AUTO_GENERATED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}").unwrap(), // UUID
        Regex::new(r"[_-]\d{6,}").unwrap(),                     // Timestamp suffix
        Regex::new(r"[A-Za-z]+\d{5,}").unwrap(),                // Random number suffix
        Regex::new(r"[-_][0-9a-f]{6,}$").unwrap(),              // Hash suffix
        Regex::new(r"^(generated|ember|react-select|mui|css|sc|jsx)-").unwrap(),
        Regex::new(r"^[a-z]{1,3}-[A-Za-z]*\d[A-Za-z0-9]{3,}$").unwrap(), // CSS-in-JS (css-1x2y3z)
        Regex::new(r"^:r[0-9a-z]+:$").unwrap(),               // React useId
        Regex::new(r"^\d").unwrap(),
    ]
});

/// Text that changes between runs
static DYNAMIC_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"^\d{4,6}$").unwrap(), "OTP code"),
        (Regex::new(r"0[0-9]{9,10}").unwrap(), "Phone number"),
        (Regex::new(r"\d{1,3}(,\d{3})+").unwrap(), "Formatted number"),
        (Regex::new(r"\d{1,2}/\d{1,2}/\d{4}").unwrap(), "Date"),
        (Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap(), "ISO date"),
        (Regex::new(r"\d{1,2}:\d{2}(:\d{2})?").unwrap(), "Time"),
    ]
});

/// Whether an id or class looks machine-generated
pub fn is_auto_generated(value: &str) -> bool {
    AUTO_GENERATED_PATTERNS.iter().any(|p| p.is_match(value))
}

/// Name of the first dynamic pattern the text matches
pub fn dynamic_text_kind(text: &str) -> Option<&'static str> {
    DYNAMIC_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, desc)| *desc)
}

/// Baseline for a text candidate
pub fn text_baseline(text: &str, exact: bool) -> f64 {
    let mut score: f64 = if exact { 0.55 } else { 0.35 };
    if dynamic_text_kind(text).is_some() {
        score -= 0.1;
    }
    if text.chars().count() <= 2 {
        score -= 0.05;
    }
    score.max(0.2)
}

/// Baseline for a class-combination selector of `classes` classes
pub fn class_combination_baseline(classes: usize) -> f64 {
    0.7 - 0.05 * classes.saturating_sub(1) as f64
}

/// Baseline for an id-anchored XPath with `steps` location steps
pub fn anchored_xpath_baseline(steps: usize) -> f64 {
    (0.6 - 0.05 * steps.saturating_sub(1) as f64).max(0.4)
}

pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// Confidence band `(low, high)` of a strategy
    pub fn band(kind: StrategyKind) -> (f64, f64) {
        match kind {
            StrategyKind::DataAttribute => (0.9, 1.0),
            StrategyKind::Semantic => (0.7, 0.9),
            StrategyKind::Css => (0.5, 0.8),
            StrategyKind::XPath => (0.3, 0.7),
            StrategyKind::TextBased => (0.2, 0.6),
        }
    }

    /// Clamp a baseline into its band, then penalize when not validated
    pub fn score(kind: StrategyKind, baseline: f64, validated: bool) -> f64 {
        let (low, high) = Self::band(kind);
        let base = baseline.clamp(low, high);
        let score = if validated {
            base
        } else {
            (base - NON_UNIQUE_PENALTY.max(high - low)).max(0.0)
        };
        round(score)
    }
}

/// Keep scores free of float noise such as 0.7000000000000001
fn round(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}
