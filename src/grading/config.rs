use serde::{Deserialize, Serialize};

use super::matcher::{normalize_name, DEFAULT_SIMILARITY_THRESHOLD};
use super::types::{GroupRecord, ModuleRecord};

/// Grouping catalog: which modules make up each UE and what they weigh.
///
/// An empty catalog is a valid deployment: every module then forms its own
/// group.
///
/// Example YAML:
/// ```yaml
/// catalog:
///   groups:
///     - name: UE Mathématiques
///       modules:
///         - { name: Algèbre, credits: 3 }
///         - { name: Analyse, credits: 2, aliases: [analyse numerique] }
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GroupCatalog {
    #[serde(default)]
    pub groups: Vec<CatalogGroup>,
}

/// One named UE in the catalog.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CatalogGroup {
    pub name: String,
    #[serde(default)]
    pub modules: Vec<CatalogModule>,
}

/// A module entry inside a catalog group.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CatalogModule {
    pub name: String,
    pub credits: u32,
    /// Alternative spellings seen on grading portals. Entries without
    /// aliases also take part in loose substring credit lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
}

impl CatalogModule {
    pub fn new(name: impl Into<String>, credits: u32) -> Self {
        Self {
            name: name.into(),
            credits,
            aliases: None,
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// Declared aliases, `None` when the entry has none (an empty list
    /// counts as none).
    pub fn aliases(&self) -> Option<&[String]> {
        match &self.aliases {
            Some(list) if !list.is_empty() => Some(list.as_slice()),
            _ => None,
        }
    }
}

impl GroupCatalog {
    pub fn new(groups: Vec<CatalogGroup>) -> Self {
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&CatalogGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<CatalogGroup> {
        let idx = self.position(name)?;
        Some(self.groups.remove(idx))
    }

    /// Insert a group at `index` (clamped to the end), replacing any group
    /// with the same name.
    pub fn insert(&mut self, index: usize, group: CatalogGroup) {
        self.remove(&group.name);
        let index = index.min(self.groups.len());
        self.groups.insert(index, group);
    }

    /// All module entries in catalog order.
    pub fn modules(&self) -> impl Iterator<Item = &CatalogModule> {
        self.groups.iter().flat_map(|g| g.modules.iter())
    }
}

impl CatalogGroup {
    /// Catalog entry capturing the current membership of a live group.
    pub fn from_record(group: &GroupRecord) -> Self {
        Self {
            name: group.name.clone(),
            modules: group
                .members
                .iter()
                .map(|m| CatalogModule::new(m.designation.clone(), m.credits))
                .collect(),
        }
    }
}

/// Case-insensitive module name pattern.
///
/// Written as a plain string in YAML:
/// - `projet`: name contains the text
/// - `projet & intégration`: name contains every `&`-separated part
/// - `=pi`: name is exactly the text
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum NamePattern {
    Contains(String),
    AllOf(Vec<String>),
    Exact(String),
}

impl From<String> for NamePattern {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        if let Some(exact) = trimmed.strip_prefix('=') {
            NamePattern::Exact(normalize_name(exact))
        } else if trimmed.contains('&') {
            NamePattern::AllOf(
                trimmed
                    .split('&')
                    .map(normalize_name)
                    .filter(|p| !p.is_empty())
                    .collect(),
            )
        } else {
            NamePattern::Contains(normalize_name(trimmed))
        }
    }
}

impl From<&str> for NamePattern {
    fn from(raw: &str) -> Self {
        NamePattern::from(raw.to_string())
    }
}

impl From<NamePattern> for String {
    fn from(pattern: NamePattern) -> Self {
        match pattern {
            NamePattern::Contains(s) => s,
            NamePattern::AllOf(parts) => parts.join(" & "),
            NamePattern::Exact(s) => format!("={}", s),
        }
    }
}

impl NamePattern {
    pub fn matches(&self, name: &str) -> bool {
        let name = normalize_name(name);
        match self {
            NamePattern::Contains(s) => !s.is_empty() && name.contains(s.as_str()),
            NamePattern::AllOf(parts) => {
                !parts.is_empty() && parts.iter().all(|p| name.contains(p.as_str()))
            }
            NamePattern::Exact(s) => name == *s,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            NamePattern::Contains(s) | NamePattern::Exact(s) => s.is_empty(),
            NamePattern::AllOf(parts) => parts.is_empty(),
        }
    }
}

/// Keyword shortcut resolved before any catalog lookup.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CreditRule {
    pub pattern: NamePattern,
    pub credits: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    /// Similarity above which two module names are considered the same
    /// (default: 0.7)
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Marks needed to validate a module, a UE and the year.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PassingConfig {
    #[serde(default = "default_module_mark")]
    pub module: f64,
    #[serde(default = "default_strict_mark")]
    pub strict: f64,
    #[serde(default = "default_overall_mark")]
    pub overall: f64,
    /// Modules (and UEs containing them) judged against `strict`
    #[serde(default = "default_strict_patterns")]
    pub strict_patterns: Vec<NamePattern>,
}

fn default_module_mark() -> f64 {
    8.0
}

fn default_strict_mark() -> f64 {
    10.0
}

fn default_overall_mark() -> f64 {
    10.0
}

fn default_strict_patterns() -> Vec<NamePattern> {
    vec![
        NamePattern::from("projet & intégration"),
        NamePattern::from("projet & integration"),
        NamePattern::from("=pi"),
    ]
}

impl Default for PassingConfig {
    fn default() -> Self {
        Self {
            module: default_module_mark(),
            strict: default_strict_mark(),
            overall: default_overall_mark(),
            strict_patterns: default_strict_patterns(),
        }
    }
}

impl PassingConfig {
    pub fn is_strict(&self, name: &str) -> bool {
        self.strict_patterns.iter().any(|p| p.matches(name))
    }

    pub fn module_mark(&self, module: &ModuleRecord) -> f64 {
        if self.is_strict(&module.designation) {
            self.strict
        } else {
            self.module
        }
    }

    pub fn group_mark(&self, group: &GroupRecord) -> f64 {
        let strict = self.is_strict(&group.name)
            || group.members.iter().any(|m| self.is_strict(&m.designation));
        if strict {
            self.strict
        } else {
            self.module
        }
    }

    /// `None` when the module has no average yet.
    pub fn module_passes(&self, module: &ModuleRecord) -> Option<bool> {
        let mark = if module.is_aggregate {
            self.overall
        } else {
            self.module_mark(module)
        };
        module.average.map(|avg| avg >= mark)
    }

    pub fn group_passes(&self, group: &GroupRecord) -> bool {
        let mark = if group.is_aggregate {
            self.overall
        } else {
            self.group_mark(group)
        };
        group.average >= mark
    }

    pub fn overall_passes(&self, average: f64) -> bool {
        average >= self.overall
    }
}
