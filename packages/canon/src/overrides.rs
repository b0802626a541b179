//! Configuration-derived rule overrides.
//!
//! An [`Override`] changes whether a rule is enabled, or its severity, for one
//! `(rule, category)` pair. Overrides are always applied to a copy of a rule;
//! the registry's record is never touched, so resolving twice gives the same
//! answer.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use bon::Builder;
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::{CategoryOverride, Configuration, RuleOverrideEntry, RuleState},
    rules::{Category, Rule, RuleRegistry, Severity},
};

pub use crate::config::OverrideAction;

/// Who produced an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppliedBy {
    /// The user's universal rule settings.
    #[display("user")]
    User,

    /// A category override section.
    #[display("category")]
    Category,

    /// Added programmatically.
    #[display("system")]
    System,
}

/// A directive changing a rule's enabled state or severity for a category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Builder)]
pub struct Override {
    #[builder(into)]
    pub rule_id: String,

    pub category: Category,

    pub action: OverrideAction,

    /// Only meaningful for [`OverrideAction::ChangeSeverity`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_severity: Option<Severity>,

    #[builder(into, default)]
    pub reason: String,

    #[builder(default = AppliedBy::System)]
    pub applied_by: AppliedBy,
}

impl Override {
    fn key(&self) -> String {
        override_key(&self.rule_id, self.category)
    }

    /// Apply this override to a rule in place.
    fn apply_to(&self, rule: &mut Rule) {
        match self.action {
            OverrideAction::Disable => rule.enabled = false,
            OverrideAction::Enable => rule.enabled = true,
            OverrideAction::ChangeSeverity => {
                if let Some(severity) = self.new_severity {
                    rule.severity = severity;
                }
            }
        }
    }
}

fn override_key(rule_id: &str, category: Category) -> String {
    format!("{rule_id}:{category}")
}

/// A named switch in a category override section and the override it implies
/// when set to `true`.
struct CategoryFlag {
    category: Category,
    flag: &'static str,
    rule_id: &'static str,
    action: OverrideAction,
    severity: Option<Severity>,
}

const CATEGORY_FLAGS: &[CategoryFlag] = &[
    CategoryFlag {
        category: Category::Embedded,
        flag: "allow_dynamic_allocation",
        rule_id: "embedded-no-dynamic-memory",
        action: OverrideAction::Disable,
        severity: None,
    },
    CategoryFlag {
        category: Category::Kernel,
        flag: "allow_floating_point",
        rule_id: "kernel-no-floating-point",
        action: OverrideAction::Disable,
        severity: None,
    },
    CategoryFlag {
        category: Category::Realtime,
        flag: "allow_blocking_calls",
        rule_id: "realtime-no-blocking",
        action: OverrideAction::Disable,
        severity: None,
    },
    CategoryFlag {
        category: Category::Legacy,
        flag: "strict_modern_c",
        rule_id: "legacy-compat-shims",
        action: OverrideAction::ChangeSeverity,
        severity: Some(Severity::Error),
    },
];

/// Synthesize the overrides a configuration implies, in a stable order.
#[tracing::instrument(skip_all)]
pub fn derive_overrides(config: &Configuration) -> Vec<Override> {
    let mut overrides = Vec::new();

    for (key, state) in &config.universal_rules {
        let action = match state {
            RuleState::Enabled => continue,
            RuleState::Warning => OverrideAction::ChangeSeverity,
            RuleState::Disabled => OverrideAction::Disable,
        };
        overrides.push(Override {
            rule_id: format!("universal-{key}"),
            category: Category::Universal,
            action,
            new_severity: (*state == RuleState::Warning).then_some(Severity::Warning),
            reason: format!("universal rule `{key}` is {state} in configuration"),
            applied_by: AppliedBy::User,
        });
    }

    for (category, section) in &config.category_overrides {
        overrides.extend(category_section_overrides(*category, section));
    }

    tracing::debug!(count = overrides.len(), "derived overrides from configuration");
    overrides
}

fn category_section_overrides(category: Category, section: &CategoryOverride) -> Vec<Override> {
    let mut overrides = Vec::new();
    let mut push = |rule_id: &str, action, new_severity, reason: String| {
        overrides.push(Override {
            rule_id: rule_id.to_string(),
            category,
            action,
            new_severity,
            reason,
            applied_by: AppliedBy::Category,
        });
    };

    for rule_id in &section.disabled_rules {
        push(
            rule_id,
            OverrideAction::Disable,
            None,
            format!("disabled for {category}"),
        );
    }
    for rule_id in &section.enabled_rules {
        push(
            rule_id,
            OverrideAction::Enable,
            None,
            format!("enabled for {category}"),
        );
    }
    for (rule_id, severity) in &section.severity {
        push(
            rule_id,
            OverrideAction::ChangeSeverity,
            Some(*severity),
            format!("severity set to {severity} for {category}"),
        );
    }
    for (rule_id, entry) in &section.rules {
        let reason = entry
            .reason
            .clone()
            .unwrap_or_else(|| format!("{} for {category}", entry.action));
        push(rule_id, entry.action, entry.severity, reason);
    }

    for (flag, value) in &section.flags {
        let known = CATEGORY_FLAGS
            .iter()
            .find(|known| known.category == category && known.flag == flag);
        match (known, value) {
            (Some(known), Value::Bool(true)) => push(
                known.rule_id,
                known.action,
                known.severity,
                format!("`{flag}` is set for {category}"),
            ),
            (Some(_), _) => {}
            (None, _) => tracing::debug!(%category, flag, "ignoring unrecognized category flag"),
        }
    }

    overrides
}

/// Whether a rule ends up enabled in `categories` once the configuration's
/// own overrides are replayed: `universal` overrides first, then those of each
/// listed category. Overrides for other categories are ignored, and rules the
/// configuration never mentions are enabled.
pub fn is_rule_enabled_in_config(
    config: &Configuration,
    rule_id: &str,
    categories: &[Category],
) -> bool {
    let overrides = derive_overrides(config);
    std::iter::once(Category::Universal)
        .chain(categories.iter().copied().filter(|c| *c != Category::Universal))
        .flat_map(|category| {
            overrides
                .iter()
                .filter(move |o| o.category == category && o.rule_id == rule_id)
        })
        .fold(true, |enabled, o| match o.action {
            OverrideAction::Disable => false,
            OverrideAction::Enable => true,
            OverrideAction::ChangeSeverity => enabled,
        })
}

/// The enabled state (if any override sets it) and severity (if any override
/// changes it) left after applying `overrides` in order.
fn net_effect(overrides: &[Override]) -> (Option<bool>, Option<Severity>) {
    overrides
        .iter()
        .fold((None, None), |(enabled, severity), o| match o.action {
            OverrideAction::Disable => (Some(false), severity),
            OverrideAction::Enable => (Some(true), severity),
            OverrideAction::ChangeSeverity => (enabled, o.new_severity.or(severity)),
        })
}

/// Result of [`RuleOverrideSystem::validate_overrides`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverrideValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// A configuration fragment equivalent to a set of overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigFragment {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub universal_rules: BTreeMap<String, RuleState>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub category_overrides: BTreeMap<Category, CategoryOverride>,
}

/// Ordered overrides keyed by `ruleId:category`.
#[derive(Debug, Clone, Default)]
pub struct RuleOverrideSystem {
    overrides: BTreeMap<String, Vec<Override>>,
}

impl RuleOverrideSystem {
    /// Build the override set a configuration implies.
    #[tracing::instrument(skip_all)]
    pub fn new(config: &Configuration) -> Self {
        let mut system = Self::default();
        for o in derive_overrides(config) {
            system.add_override(o);
        }
        system
    }

    /// Append an override. Later overrides for the same key win.
    pub fn add_override(&mut self, o: Override) {
        self.overrides.entry(o.key()).or_default().push(o);
    }

    /// Overrides for one `(rule, category)` pair, in application order.
    pub fn get_overrides(&self, rule_id: &str, category: Category) -> &[Override] {
        self.overrides
            .get(&override_key(rule_id, category))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every override, grouped by key.
    pub fn all_overrides(&self) -> impl Iterator<Item = &Override> {
        self.overrides.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.overrides.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Copy `rule` and apply the overrides for `(rule.id, category)` in order.
    pub fn apply_overrides(&self, rule: &Rule, category: Category) -> Rule {
        let mut rule = rule.clone();
        for o in self.get_overrides(&rule.id, category) {
            o.apply_to(&mut rule);
        }
        rule
    }

    /// [`RuleOverrideSystem::apply_overrides`] over a list of rules.
    pub fn apply_all_overrides<'r>(
        &self,
        rules: impl IntoIterator<Item = &'r Rule>,
        category: Category,
    ) -> Vec<Rule> {
        rules
            .into_iter()
            .map(|rule| self.apply_overrides(rule, category))
            .collect()
    }

    /// Apply `universal` overrides first, then those of each listed category.
    pub fn apply_layered(&self, rule: &Rule, categories: &[Category]) -> Rule {
        categories
            .iter()
            .filter(|c| **c != Category::Universal)
            .fold(
                self.apply_overrides(rule, Category::Universal),
                |rule, category| self.apply_overrides(&rule, *category),
            )
    }

    /// Check overrides for contradictions and references to unknown rules.
    ///
    /// - An `enable` and a `disable` for the same key is an error.
    /// - Several different severities for the same key is an error.
    /// - Any other repeated key is a warning; the last override wins.
    /// - A rule id missing from the registry is a warning, since the rule may
    ///   live in a category that is not loaded.
    #[tracing::instrument(skip_all)]
    pub fn validate_overrides(&self, registry: &RuleRegistry) -> OverrideValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for (key, list) in &self.overrides {
            if list.len() > 1 {
                let enables = list.iter().any(|o| o.action == OverrideAction::Enable);
                let disables = list.iter().any(|o| o.action == OverrideAction::Disable);

                let severities = list
                    .iter()
                    .filter(|o| o.action == OverrideAction::ChangeSeverity)
                    .filter_map(|o| o.new_severity)
                    .unique()
                    .collect::<Vec<_>>();

                if enables && disables {
                    errors.push(format!("conflicting overrides for {key}: both enable and disable"));
                } else if severities.len() > 1 {
                    let listed = severities
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    errors.push(format!(
                        "conflicting overrides for {key}: multiple severities ({listed})"
                    ));
                } else {
                    warnings.push(format!(
                        "{} overrides for {key}; the last one wins",
                        list.len()
                    ));
                }
            }

            if let Some(first) = list.first()
                && registry.get_rule(&first.rule_id).is_none()
            {
                warnings.push(format!(
                    "override for unknown rule `{}` ({})",
                    first.rule_id, first.category
                ));
            }
        }

        OverrideValidation {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Express the overrides as a configuration fragment.
    ///
    /// Each `(rule, category)` key is folded to its net effect first, so the
    /// fragment reproduces the same enabled state and severity when loaded.
    /// Universal rules use `universal_rules` where a [`RuleState`] can say it;
    /// the remainder goes to the `universal` category section.
    pub fn export_to_config(&self) -> ConfigFragment {
        let mut fragment = ConfigFragment::default();

        for group in self.overrides.values() {
            let Some(last) = group.last() else {
                continue;
            };
            let (enabled, severity) = net_effect(group);

            if let Some(key) = last
                .rule_id
                .strip_prefix("universal-")
                .filter(|_| last.category == Category::Universal)
            {
                let state = match (enabled, severity) {
                    (Some(false), _) => RuleState::Disabled,
                    (_, Some(Severity::Warning)) => RuleState::Warning,
                    _ => RuleState::Enabled,
                };
                fragment.universal_rules.insert(key.to_string(), state);

                let section = fragment
                    .category_overrides
                    .entry(Category::Universal)
                    .or_default();
                if enabled == Some(true) {
                    section.enabled_rules.push(last.rule_id.clone());
                }
                if let Some(severity) = severity.filter(|_| state != RuleState::Warning) {
                    section.severity.insert(last.rule_id.clone(), severity);
                }
                if *section == CategoryOverride::default() {
                    fragment.category_overrides.remove(&Category::Universal);
                }
                continue;
            }

            let section = fragment.category_overrides.entry(last.category).or_default();
            let reason = Some(last.reason.clone());
            match (enabled, severity) {
                (None, None) => {}
                (None, Some(severity)) => {
                    section.rules.insert(
                        last.rule_id.clone(),
                        RuleOverrideEntry {
                            action: OverrideAction::ChangeSeverity,
                            severity: Some(severity),
                            reason,
                        },
                    );
                }
                (Some(enabled), severity) => {
                    let action = if enabled {
                        OverrideAction::Enable
                    } else {
                        OverrideAction::Disable
                    };
                    section.rules.insert(
                        last.rule_id.clone(),
                        RuleOverrideEntry {
                            action,
                            severity: None,
                            reason,
                        },
                    );
                    if let Some(severity) = severity {
                        section.severity.insert(last.rule_id.clone(), severity);
                    }
                }
            }
        }

        fragment
    }

    /// Markdown summary of every override, grouped by category.
    pub fn generate_formatted_report(&self) -> String {
        let mut report = String::from("# Rule Override Report\n\n");

        if self.is_empty() {
            report.push_str("No overrides configured.\n");
            return report;
        }

        let _ = writeln!(report, "Total overrides: {}\n", self.len());

        let mut by_category = BTreeMap::<Category, Vec<&Override>>::new();
        for o in self.all_overrides() {
            by_category.entry(o.category).or_default().push(o);
        }

        for (category, overrides) in by_category {
            let _ = writeln!(report, "## {category}\n");
            report.push_str("| Rule | Action | Severity | Reason | Applied By |\n");
            report.push_str("|------|--------|----------|--------|------------|\n");
            for o in overrides {
                let severity = o
                    .new_severity
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let _ = writeln!(
                    report,
                    "| {} | {} | {} | {} | {} |",
                    o.rule_id, o.action, severity, o.reason, o.applied_by
                );
            }
            report.push('\n');
        }

        report
    }
}
