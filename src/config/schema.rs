use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::grading::{CreditRule, GroupCatalog, MatchingConfig, PassingConfig};

/// Full configuration file.
///
/// Every section is optional; an empty file selects singleton-per-module
/// mode with the default pass marks.
///
/// Example YAML:
/// ```yaml
/// catalog:
///   groups:
///     - name: UE Mathématiques
///       modules:
///         - { name: Algèbre, credits: 3 }
///         - { name: Analyse, credits: 2, aliases: [analyse numerique] }
/// credit_rules:
///   - { pattern: "projet & intégration", credits: 5 }
/// matching:
///   similarity_threshold: 0.7
/// passing:
///   module: 8
///   strict: 10
///   overall: 10
/// editing:
///   debounce: 500ms
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "GroupCatalog::is_empty")]
    pub catalog: GroupCatalog,

    /// Keyword shortcuts checked before the catalog
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credit_rules: Vec<CreditRule>,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub passing: PassingConfig,

    #[serde(default)]
    pub editing: EditingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EditingConfig {
    /// Quiet period before edits are recalculated, humantime format
    /// (default: "500ms")
    #[serde(default = "default_debounce")]
    pub debounce: String,
}

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

fn default_debounce() -> String {
    "500ms".to_string()
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
        }
    }
}

impl EditingConfig {
    /// Parsed debounce window. Falls back to 500ms when the value does not
    /// parse; `validate_config` reports that case.
    pub fn debounce_duration(&self) -> Duration {
        humantime::parse_duration(self.debounce.trim()).unwrap_or(DEFAULT_DEBOUNCE)
    }
}
