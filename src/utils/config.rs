use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Recorder configuration
///
/// Every field has a default, so a YAML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RecorderConfig {
    /// Minimum interval between highlight updates from pointer movement (ms)
    pub highlight_throttle_ms: u64,

    /// Repeated activations of the same element inside this window are dropped (ms)
    pub activation_debounce_ms: u64,

    /// Text captured into element facts is cut to this many characters
    pub max_text_length: usize,

    /// Value recorded for click actions is cut to this many characters
    pub click_value_max_length: usize,

    /// Own text must be within this range (characters) to yield text selectors
    pub text_selector_min_length: usize,
    pub text_selector_max_length: usize,

    /// Largest class subset tried when building class-combination selectors
    pub max_class_combination: usize,

    /// Canonical test-id attributes, most preferred first
    pub test_attributes: Vec<String>,

    /// Prefixes marking custom test-hook attributes
    pub test_attribute_prefixes: Vec<String>,

    /// Id/class prefix used by the recorder's own injected UI
    pub ui_marker_prefix: String,

    /// Attribute present on the root of the recorder's own injected UI
    pub ui_marker_attribute: String,

    /// Where sessions are persisted; defaults to the platform data directory
    pub store_dir: Option<PathBuf>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            highlight_throttle_ms: 16,
            activation_debounce_ms: 300,
            max_text_length: 100,
            click_value_max_length: 50,
            text_selector_min_length: 1,
            text_selector_max_length: 80,
            max_class_combination: 3,
            test_attributes: [
                "data-testid",
                "data-test-id",
                "data-test",
                "data-cy",
                "data-qa",
                "data-automation-id",
                "data-e2e",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            test_attribute_prefixes: [
                "data-test-",
                "data-qa-",
                "data-cy-",
                "data-automation-",
                "data-e2e-",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ui_marker_prefix: "lumi-recorder".to_string(),
            ui_marker_attribute: "data-lumi-ui".to_string(),
            store_dir: None,
        }
    }
}

impl RecorderConfig {
    /// Load from a YAML file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.text_selector_min_length == 0
            || self.text_selector_min_length > self.text_selector_max_length
        {
            return Err(ConfigError::Invalid(
                "textSelectorMinLength must be between 1 and textSelectorMaxLength".to_string(),
            ));
        }
        if self.max_class_combination == 0 {
            return Err(ConfigError::Invalid(
                "maxClassCombination must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory used by the file store
    pub fn session_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("lumi-recorder")
                .join("sessions")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = RecorderConfig::from_yaml("highlightThrottleMs: 33\nstoreDir: /tmp/x\n").unwrap();
        assert_eq!(config.highlight_throttle_ms, 33);
        assert_eq!(config.activation_debounce_ms, 300);
        assert_eq!(config.test_attributes[0], "data-testid");
        assert_eq!(config.session_dir(), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(RecorderConfig::from_yaml("").unwrap(), RecorderConfig::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(RecorderConfig::from_yaml("throttle: 5\n").is_err());
    }

    #[test]
    fn test_invalid_ranges_are_rejected() {
        assert!(RecorderConfig::from_yaml("textSelectorMinLength: 0\n").is_err());
        assert!(RecorderConfig::from_yaml("textSelectorMinLength: 90\n").is_err());
        assert!(RecorderConfig::from_yaml("maxClassCombination: 0\n").is_err());
    }
}
