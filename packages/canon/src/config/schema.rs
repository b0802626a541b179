//! Typed configuration consumed by the resolution pipeline.

use std::collections::BTreeMap;

use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::rules::{Category, Severity};

/// Per-project settings controlling which rules are active and how.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Configuration {
    pub version: String,

    /// Categories active for the current project.
    pub categories: Vec<Category>,

    /// Target language standard (e.g. `c11`).
    pub c_standard: String,

    /// State of universal rules keyed by the rule id without its `universal-`
    /// scope. Absent keys are enabled.
    pub universal_rules: BTreeMap<String, RuleState>,

    /// Per-category adjustments.
    ///
    /// A section that does not match [`CategoryOverride`] is dropped with a
    /// warning rather than failing the whole configuration.
    #[serde(deserialize_with = "lenient_category_overrides")]
    pub category_overrides: BTreeMap<Category, CategoryOverride>,

    pub static_analysis: StaticAnalysis,

    /// Path or glob pointing at additional rule documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_rules: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            categories: vec![Category::Systems],
            c_standard: "c11".to_string(),
            universal_rules: BTreeMap::new(),
            category_overrides: BTreeMap::new(),
            static_analysis: StaticAnalysis::default(),
            custom_rules: None,
        }
    }
}

impl Configuration {
    /// State of a universal rule, defaulting to enabled.
    pub fn universal_rule_state(&self, key: &str) -> RuleState {
        self.universal_rules
            .get(key)
            .copied()
            .unwrap_or(RuleState::Enabled)
    }
}

/// The state of a universal rule in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleState {
    #[default]
    #[display("enabled")]
    Enabled,
    #[display("warning")]
    Warning,
    #[display("disabled")]
    Disabled,
}

/// Static analysis tools the project runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticAnalysis {
    pub clang_tidy: bool,
    pub cppcheck: bool,
    pub valgrind: bool,
}

/// Adjustments to the rules of one category.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CategoryOverride {
    /// Rule ids to disable in this category.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub disabled_rules: Vec<String>,

    /// Rule ids to enable in this category.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enabled_rules: Vec<String>,

    /// Severity changes keyed by rule id.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub severity: BTreeMap<String, Severity>,

    /// Explicit per-rule records, as written by an override export.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, RuleOverrideEntry>,

    /// Named switches such as `allow_dynamic_allocation`.
    #[serde(flatten)]
    pub flags: BTreeMap<String, Value>,
}

/// A per-rule record under `category_overrides.<category>.rules`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleOverrideEntry {
    pub action: OverrideAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// What an override does to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    #[display("disable")]
    Disable,
    #[display("enable")]
    Enable,
    #[display("change_severity")]
    ChangeSeverity,
}

fn lenient_category_overrides<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<Category, CategoryOverride>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Object(sections) => sections,
        Value::Null => return Ok(BTreeMap::new()),
        other => {
            tracing::warn!(%other, "ignoring category overrides that are not a map");
            return Ok(BTreeMap::new());
        }
    };

    let mut overrides = BTreeMap::new();
    for (key, value) in raw {
        let category = match key.parse::<Category>() {
            Ok(category) => category,
            Err(error) => {
                tracing::warn!(%error, "ignoring category override for unknown category");
                continue;
            }
        };

        match serde_json::from_value::<CategoryOverride>(value) {
            Ok(section) => {
                overrides.insert(category, section);
            }
            Err(error) => {
                tracing::warn!(%category, %error, "ignoring malformed category override");
            }
        }
    }

    Ok(overrides)
}
