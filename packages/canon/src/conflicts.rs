//! Pairwise conflict detection over the active rule set.
//!
//! Detection is a fixed-vocabulary heuristic: every unordered pair of rules is
//! run through [`CHECKERS`] in priority order and the first match wins, so a
//! pair yields at most one [`Conflict`]. Each conflict then gets a
//! deterministic [`Resolution`].

use std::collections::BTreeMap;
use std::fmt::Write as _;

use bon::Builder;
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    config::Configuration,
    overrides::{RuleOverrideSystem, is_rule_enabled_in_config},
    rules::{Category, Rule, RuleQuery, RuleRegistry},
};

/// Words scanned for in a rule's name, description, and rationale.
pub const KEYWORDS: &[&str] = &[
    "deterministic",
    "dynamic",
    "realtime",
    "blocking",
    "embedded",
    "malloc",
    "free",
    "volatile",
    "static",
    "const",
    "posix",
    "kernel",
    "driver",
    "interrupt",
    "dma",
    "network",
    "legacy",
];

/// Keyword pairs that cannot both be honored.
pub const INCOMPATIBLE: &[(&str, &str)] = &[
    ("deterministic", "dynamic"),
    ("realtime", "blocking"),
    ("embedded", "malloc"),
];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    #[display("direct")]
    Direct,
    #[display("implicit")]
    Implicit,
    #[display("precedence")]
    Precedence,
    #[display("scope")]
    Scope,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    #[display("high")]
    High,
    #[display("medium")]
    Medium,
    #[display("low")]
    Low,
}

/// A detected tension between two distinct rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Conflict {
    #[serde(rename = "type")]
    pub kind: ConflictType,
    pub severity: ConflictSeverity,
    pub rule1: Rule,
    pub rule2: Rule,
    pub description: String,
    pub reason: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    #[display("use_rule1")]
    UseRule1,
    #[display("use_rule2")]
    UseRule2,
    #[display("merge")]
    Merge,
    #[display("user_decision")]
    UserDecision,
}

/// How a conflict is settled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Resolution {
    pub resolution: ResolutionKind,
    pub rationale: String,

    /// Id of the rule that takes effect, if one was picked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_rule: Option<String>,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.resolution != ResolutionKind::UserDecision
    }
}

/// A conflict paired with its resolution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConflictEntry {
    pub conflict: Conflict,
    pub resolution: Resolution,
}

/// Conflict counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Summary {
    pub total: usize,
    pub by_severity: BTreeMap<ConflictSeverity, usize>,
    pub by_type: BTreeMap<ConflictType, usize>,
    pub resolved: usize,
    pub unresolved: usize,
}

/// Output of [`ConflictDetector::detect_conflicts`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConflictReport {
    /// Categories that were scanned, `universal` included.
    pub categories: Vec<Category>,
    pub conflicts: Vec<ConflictEntry>,
    pub summary: Summary,
}

/// A pure classifier over a pair of rules.
pub type Checker = fn(&Rule, &Rule) -> Option<Conflict>;

/// Checkers in priority order.
pub const CHECKERS: &[Checker] = &[
    check_direct,
    check_implicit,
    check_precedence,
    check_scope,
];

/// Classify a pair using the first checker that matches.
pub fn classify(a: &Rule, b: &Rule) -> Option<Conflict> {
    CHECKERS.iter().find_map(|check| check(a, b))
}

/// Scan every unordered pair of `rules` once, in slice order.
#[tracing::instrument(skip_all, fields(rules = rules.len()))]
pub fn detect_in(rules: &[Rule]) -> Vec<Conflict> {
    rules
        .iter()
        .tuple_combinations()
        .filter(|(a, b)| a.id != b.id)
        .filter_map(|(a, b)| classify(a, b))
        .collect()
}

/// Keywords present in a rule's prose, in vocabulary order.
pub fn keywords(rule: &Rule) -> Vec<&'static str> {
    let text = format!("{} {} {}", rule.name, rule.description, rule.rationale).to_lowercase();
    KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| text.contains(keyword))
        .collect()
}

/// Rules overlap when they share a category or either applies everywhere.
fn categories_overlap(a: &Rule, b: &Rule) -> bool {
    a.is_universal() || b.is_universal() || a.category.iter().any(|c| b.has_category(*c))
}

fn conflict(
    kind: ConflictType,
    severity: ConflictSeverity,
    a: &Rule,
    b: &Rule,
    description: String,
    reason: String,
    suggestion: &str,
) -> Conflict {
    Conflict {
        kind,
        severity,
        rule1: a.clone(),
        rule2: b.clone(),
        description,
        reason,
        suggestion: suggestion.to_string(),
    }
}

/// Two memory rules where one allows what the other forbids.
pub fn check_direct(a: &Rule, b: &Rule) -> Option<Conflict> {
    if !(a.id.contains("memory") && b.id.contains("memory") && categories_overlap(a, b)) {
        return None;
    }

    let (da, db) = (a.description.to_lowercase(), b.description.to_lowercase());
    let opposed = (da.contains("allow") && db.contains("forbid"))
        || (da.contains("forbid") && db.contains("allow"));
    opposed.then(|| {
        conflict(
            ConflictType::Direct,
            ConflictSeverity::High,
            a,
            b,
            format!("`{}` and `{}` give opposite memory directives", a.id, b.id),
            "one rule allows what the other forbids".to_string(),
            "Keep the category-specific rule and disable the other for that category.",
        )
    })
}

/// Rules mentioning opposite sides of a known incompatible keyword pair.
pub fn check_implicit(a: &Rule, b: &Rule) -> Option<Conflict> {
    let (ka, kb) = (keywords(a), keywords(b));
    INCOMPATIBLE.iter().find_map(|&(x, y)| {
        let (left, right) = if ka.contains(&x) && kb.contains(&y) {
            (x, y)
        } else if ka.contains(&y) && kb.contains(&x) {
            (y, x)
        } else {
            return None;
        };
        Some(conflict(
            ConflictType::Implicit,
            ConflictSeverity::Medium,
            a,
            b,
            format!("`{}` concerns {left} while `{}` concerns {right}", a.id, b.id),
            format!("{x} and {y} requirements are incompatible"),
            "Decide which requirement takes priority for the shared categories.",
        ))
    })
}

/// Same topic in a shared category at different severities.
pub fn check_precedence(a: &Rule, b: &Rule) -> Option<Conflict> {
    let applies = categories_overlap(a, b) && a.severity != b.severity && a.topic() == b.topic();
    applies.then(|| {
        conflict(
            ConflictType::Precedence,
            ConflictSeverity::Low,
            a,
            b,
            format!(
                "`{}` ({}) and `{}` ({}) both cover `{}`",
                a.id,
                a.severity,
                b.id,
                b.severity,
                a.topic()
            ),
            "same topic with different severities".to_string(),
            "Align the severities or disable one of the rules.",
        )
    })
}

/// A universal rule and a category rule with substantially shared vocabulary.
pub fn check_scope(a: &Rule, b: &Rule) -> Option<Conflict> {
    if a.is_universal() == b.is_universal() {
        return None;
    }

    let kb = keywords(b);
    let shared = keywords(a)
        .into_iter()
        .filter(|k| kb.contains(k))
        .collect::<Vec<_>>();
    (shared.len() > 2).then(|| {
        let (universal, specific) = if a.is_universal() { (a, b) } else { (b, a) };
        conflict(
            ConflictType::Scope,
            ConflictSeverity::Low,
            a,
            b,
            format!(
                "universal rule `{}` overlaps category rule `{}`",
                universal.id, specific.id
            ),
            format!("shared keywords: {}", shared.join(", ")),
            "Narrow the universal rule or let the category rule take precedence.",
        )
    })
}

/// Settle a conflict with the first applicable step:
/// 1. exactly one rule is disabled by the configuration: use the other
/// 2. exactly one rule is category-specific: use it
/// 3. use the higher severity
/// 4. leave it to the user
///
/// Only configuration overrides for `categories` (and `universal`) count
/// towards the first step.
pub fn resolve_conflict(
    conflict: &Conflict,
    config: &Configuration,
    categories: &[Category],
) -> Resolution {
    let (r1, r2) = (&conflict.rule1, &conflict.rule2);
    let pick = |kind, rule: &Rule, rationale: String| Resolution {
        resolution: kind,
        rationale,
        applied_rule: Some(rule.id.clone()),
    };

    match (
        is_rule_enabled_in_config(config, &r1.id, categories),
        is_rule_enabled_in_config(config, &r2.id, categories),
    ) {
        (true, false) => {
            return pick(
                ResolutionKind::UseRule1,
                r1,
                format!("`{}` is disabled in configuration", r2.id),
            );
        }
        (false, true) => {
            return pick(
                ResolutionKind::UseRule2,
                r2,
                format!("`{}` is disabled in configuration", r1.id),
            );
        }
        _ => {}
    }

    match (r1.is_universal(), r2.is_universal()) {
        (false, true) => {
            return pick(
                ResolutionKind::UseRule1,
                r1,
                format!("`{}` is category-specific", r1.id),
            );
        }
        (true, false) => {
            return pick(
                ResolutionKind::UseRule2,
                r2,
                format!("`{}` is category-specific", r2.id),
            );
        }
        _ => {}
    }

    match r1.severity.rank().cmp(&r2.severity.rank()) {
        std::cmp::Ordering::Greater => pick(
            ResolutionKind::UseRule1,
            r1,
            format!("{} outranks {}", r1.severity, r2.severity),
        ),
        std::cmp::Ordering::Less => pick(
            ResolutionKind::UseRule2,
            r2,
            format!("{} outranks {}", r2.severity, r1.severity),
        ),
        std::cmp::Ordering::Equal => Resolution {
            resolution: ResolutionKind::UserDecision,
            rationale: "both rules are equally enabled, scoped, and severe".to_string(),
            applied_rule: None,
        },
    }
}

/// Tally conflicts by severity, type, and resolution outcome.
pub fn generate_summary(entries: &[ConflictEntry]) -> Summary {
    entries.iter().fold(
        Summary {
            total: entries.len(),
            ..Summary::default()
        },
        |mut summary, entry| {
            *summary
                .by_severity
                .entry(entry.conflict.severity)
                .or_default() += 1;
            *summary.by_type.entry(entry.conflict.kind).or_default() += 1;
            if entry.resolution.is_resolved() {
                summary.resolved += 1;
            } else {
                summary.unresolved += 1;
            }
            summary
        },
    )
}

/// Render a report as Markdown.
pub fn generate_report(report: &ConflictReport) -> String {
    let mut out = String::from("# Conflict Detection Report\n\n");
    let categories = report.categories.iter().join(", ");
    let _ = writeln!(out, "Categories: {categories}\n");

    if report.conflicts.is_empty() {
        out.push_str("No conflicts detected.\n");
        return out;
    }

    let summary = &report.summary;
    let _ = writeln!(
        out,
        "Total conflicts: {} ({} resolved, {} unresolved)\n",
        summary.total, summary.resolved, summary.unresolved
    );

    out.push_str("## By Severity\n\n");
    for (severity, count) in &summary.by_severity {
        let _ = writeln!(out, "- {severity}: {count}");
    }
    out.push_str("\n## By Type\n\n");
    for (kind, count) in &summary.by_type {
        let _ = writeln!(out, "- {kind}: {count}");
    }

    out.push_str("\n## Conflicts\n");
    for (n, ConflictEntry { conflict, resolution }) in report.conflicts.iter().enumerate() {
        let _ = writeln!(
            out,
            "\n### {}. {} conflict ({}): `{}` vs `{}`\n",
            n + 1,
            conflict.kind,
            conflict.severity,
            conflict.rule1.id,
            conflict.rule2.id
        );
        let _ = writeln!(out, "{}\n", conflict.description);
        let _ = writeln!(out, "- **Reason**: {}", conflict.reason);
        let _ = writeln!(out, "- **Suggestion**: {}", conflict.suggestion);
        match &resolution.applied_rule {
            Some(rule) => {
                let _ = writeln!(
                    out,
                    "- **Resolution**: {} (`{rule}`): {}",
                    resolution.resolution, resolution.rationale
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "- **Resolution**: {}: {}",
                    resolution.resolution, resolution.rationale
                );
            }
        }
    }

    out
}

/// Detects conflicts among the enabled rules of a registry.
#[derive(Debug, Clone, Builder)]
pub struct ConflictDetector<'a> {
    registry: &'a RuleRegistry,
    config: &'a Configuration,

    /// When set, rules are compared after overrides are applied.
    overrides: Option<&'a RuleOverrideSystem>,
}

impl ConflictDetector<'_> {
    /// Detect and resolve conflicts among the rules of `categories` (or the
    /// configured categories) plus universal rules.
    #[tracing::instrument(skip(self))]
    pub fn detect_conflicts(&self, categories: Option<&[Category]>) -> ConflictReport {
        let mut scanned = categories
            .map(<[Category]>::to_vec)
            .unwrap_or_else(|| self.config.categories.clone());
        if !scanned.contains(&Category::Universal) {
            scanned.push(Category::Universal);
        }

        let active = self.active_rules(&scanned);
        tracing::debug!(rules = active.len(), "scanning active rules");

        let conflicts = detect_in(&active)
            .into_iter()
            .map(|conflict| ConflictEntry {
                resolution: resolve_conflict(&conflict, self.config, &scanned),
                conflict,
            })
            .collect::<Vec<_>>();

        ConflictReport {
            categories: scanned,
            summary: generate_summary(&conflicts),
            conflicts,
        }
    }

    /// Rules in the scanned categories after overrides, restricted to enabled.
    fn active_rules(&self, categories: &[Category]) -> Vec<Rule> {
        let query = RuleQuery {
            categories: categories.to_vec(),
            enabled: None,
        };
        self.registry
            .query_rules(&query)
            .into_iter()
            .map(|rule| match self.overrides {
                Some(overrides) => overrides.apply_layered(rule, categories),
                None => rule.clone(),
            })
            .filter(|rule| rule.enabled)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq as pretty_assert_eq;
    use serde_json::json;
    use simple_test_case::test_case;

    use super::*;
    use crate::rules::Severity;

    fn rule(id: &str, category: &[Category], severity: Severity, description: &str) -> Rule {
        Rule::builder()
            .id(id)
            .name(id)
            .description(description)
            .category(category.to_vec())
            .severity(severity)
            .build()
    }

    fn scenario_a() -> RuleRegistry {
        RuleRegistry::from_iter([
            rule(
                "universal-memory_safety",
                &[Category::Universal],
                Severity::Error,
                "Allow dynamic allocation only with checked sizes.",
            ),
            rule(
                "embedded-no-dynamic-memory",
                &[Category::Embedded],
                Severity::Error,
                "Forbid dynamic allocation after initialization.",
            ),
        ])
    }

    #[test]
    fn test_direct_conflict_between_memory_rules() {
        let registry = scenario_a();
        let config = Configuration::default();
        let report = ConflictDetector::builder()
            .registry(&registry)
            .config(&config)
            .build()
            .detect_conflicts(Some(&[Category::Embedded]));

        pretty_assert_eq!(report.conflicts.len(), 1);
        let entry = &report.conflicts[0];
        pretty_assert_eq!(entry.conflict.kind, ConflictType::Direct);
        pretty_assert_eq!(entry.conflict.severity, ConflictSeverity::High);
        pretty_assert_eq!(entry.resolution.resolution, ResolutionKind::UseRule2);
        pretty_assert_eq!(
            entry.resolution.applied_rule.as_deref(),
            Some("embedded-no-dynamic-memory")
        );
        pretty_assert_eq!(
            report.categories,
            vec![Category::Embedded, Category::Universal]
        );
    }

    #[test]
    fn test_overrides_remove_disabled_rules() {
        let registry = scenario_a();
        let config: Configuration = serde_json::from_value(json!({
            "categories": ["embedded"],
            "category_overrides": { "embedded": { "allow_dynamic_allocation": true } }
        }))
        .unwrap();
        let overrides = RuleOverrideSystem::new(&config);

        let report = ConflictDetector::builder()
            .registry(&registry)
            .config(&config)
            .overrides(&overrides)
            .build()
            .detect_conflicts(None);
        assert!(report.conflicts.is_empty());
    }

    #[test]
    fn test_overrides_for_other_categories_do_not_resolve() {
        let registry = scenario_a();
        let config: Configuration = serde_json::from_value(json!({
            "category_overrides": {
                "kernel": { "disabled_rules": ["universal-memory_safety"] }
            }
        }))
        .unwrap();
        let overrides = RuleOverrideSystem::new(&config);

        let report = ConflictDetector::builder()
            .registry(&registry)
            .config(&config)
            .overrides(&overrides)
            .build()
            .detect_conflicts(Some(&[Category::Embedded]));

        pretty_assert_eq!(report.conflicts.len(), 1);
        let resolution = &report.conflicts[0].resolution;
        pretty_assert_eq!(resolution.resolution, ResolutionKind::UseRule2);
        pretty_assert_eq!(
            resolution.rationale,
            "`embedded-no-dynamic-memory` is category-specific"
        );
    }

    #[test]
    fn test_unrequested_categories_are_not_scanned() {
        let registry = scenario_a();
        let config = Configuration::default();
        let report = ConflictDetector::builder()
            .registry(&registry)
            .config(&config)
            .build()
            .detect_conflicts(None);

        pretty_assert_eq!(
            report.categories,
            vec![Category::Systems, Category::Universal]
        );
        assert!(report.conflicts.is_empty());
    }

    #[test_case(
        rule("realtime-timing", &[Category::Realtime], Severity::Error, "Keep loops deterministic."),
        rule("systems-buffers", &[Category::Systems], Severity::Error, "Prefer dynamic buffers.");
        "deterministic and dynamic"
    )]
    #[test_case(
        rule("systems-io", &[Category::Systems], Severity::Warning, "Blocking reads are fine."),
        rule("realtime-loops", &[Category::Realtime], Severity::Warning, "Realtime loops must finish in time.");
        "blocking and realtime reversed"
    )]
    #[test]
    fn test_implicit_conflict(a: Rule, b: Rule) {
        let conflict = classify(&a, &b).unwrap();
        pretty_assert_eq!(conflict.kind, ConflictType::Implicit);
        pretty_assert_eq!(conflict.severity, ConflictSeverity::Medium);
    }

    #[test]
    fn test_precedence_conflict() {
        let a = rule(
            "kernel-naming",
            &[Category::Kernel],
            Severity::Error,
            "Use snake_case identifiers.",
        );
        let b = rule(
            "kernel_api-naming",
            &[Category::Kernel, Category::Drivers],
            Severity::Info,
            "Prefix exported symbols.",
        );

        let conflict = classify(&a, &b).unwrap();
        pretty_assert_eq!(conflict.kind, ConflictType::Precedence);
        pretty_assert_eq!(conflict.severity, ConflictSeverity::Low);

        let same_severity = Rule {
            severity: Severity::Error,
            ..b
        };
        assert!(classify(&a, &same_severity).is_none());
    }

    #[test]
    fn test_scope_conflict() {
        let universal = rule(
            "universal-interrupts",
            &[Category::Universal],
            Severity::Error,
            "Interrupt handlers touch volatile static state.",
        );
        let specific = rule(
            "embedded-registers",
            &[Category::Embedded],
            Severity::Error,
            "Volatile static registers are shared with an interrupt.",
        );

        let conflict = classify(&specific, &universal).unwrap();
        pretty_assert_eq!(conflict.kind, ConflictType::Scope);
        pretty_assert_eq!(conflict.reason, "shared keywords: volatile, static, interrupt");

        let both_specific = Rule {
            category: vec![Category::Drivers],
            ..universal
        };
        assert!(classify(&specific, &both_specific).is_none());
    }

    #[test]
    fn test_detection_is_deterministic_and_unique_per_pair() {
        let rules = vec![
            rule("universal-memory_safety", &[Category::Universal], Severity::Error, "Allow dynamic allocation."),
            rule("embedded-no-dynamic-memory", &[Category::Embedded], Severity::Error, "Forbid dynamic allocation."),
            rule("embedded-heap-memory", &[Category::Embedded], Severity::Warning, "Forbid malloc in embedded code."),
            rule("realtime-memory", &[Category::Realtime], Severity::Info, "Deterministic memory only."),
        ];

        let first = detect_in(&rules);
        let second = detect_in(&rules);
        pretty_assert_eq!(first, second);
        assert!(!first.is_empty());

        let pairs = first
            .iter()
            .map(|c| {
                let mut pair = [c.rule1.id.clone(), c.rule2.id.clone()];
                pair.sort();
                pair
            })
            .collect::<HashSet<_>>();
        pretty_assert_eq!(pairs.len(), first.len());
    }

    fn conflict_between(a: Rule, b: Rule) -> Conflict {
        Conflict {
            kind: ConflictType::Precedence,
            severity: ConflictSeverity::Low,
            rule1: a,
            rule2: b,
            description: String::new(),
            reason: String::new(),
            suggestion: String::new(),
        }
    }

    #[test]
    fn test_resolve_prefers_rule_enabled_in_config() {
        let config: Configuration = serde_json::from_value(json!({
            "universal_rules": { "naming": "disabled" }
        }))
        .unwrap();
        let conflict = conflict_between(
            rule("kernel-naming", &[Category::Kernel], Severity::Info, ""),
            rule("universal-naming", &[Category::Universal], Severity::Error, ""),
        );

        let resolution = resolve_conflict(&conflict, &config, &[Category::Kernel]);
        pretty_assert_eq!(resolution.resolution, ResolutionKind::UseRule1);
        pretty_assert_eq!(resolution.applied_rule.as_deref(), Some("kernel-naming"));
    }

    #[test]
    fn test_resolve_prefers_category_specific_rule() {
        let conflict = conflict_between(
            rule("universal-naming", &[Category::Universal], Severity::Error, ""),
            rule("kernel-naming", &[Category::Kernel], Severity::Info, ""),
        );

        let resolution = resolve_conflict(&conflict, &Configuration::default(), &[]);
        pretty_assert_eq!(resolution.resolution, ResolutionKind::UseRule2);
    }

    #[test]
    fn test_resolve_prefers_higher_severity() {
        let conflict = conflict_between(
            rule("kernel-naming", &[Category::Kernel], Severity::Warning, ""),
            rule("drivers-naming", &[Category::Drivers], Severity::Error, ""),
        );

        let resolution = resolve_conflict(&conflict, &Configuration::default(), &[]);
        pretty_assert_eq!(resolution.resolution, ResolutionKind::UseRule2);
        pretty_assert_eq!(resolution.rationale, "ERROR outranks WARNING");
    }

    #[test]
    fn test_resolve_falls_back_to_user_decision() {
        let conflict = conflict_between(
            rule("kernel-naming", &[Category::Kernel], Severity::Error, ""),
            rule("drivers-naming", &[Category::Drivers], Severity::Error, ""),
        );

        let resolution = resolve_conflict(&conflict, &Configuration::default(), &[]);
        pretty_assert_eq!(resolution.resolution, ResolutionKind::UserDecision);
        assert!(resolution.applied_rule.is_none());
    }

    #[test]
    fn test_summary_counts() {
        let registry = scenario_a();
        let config = Configuration::default();
        let report = ConflictDetector::builder()
            .registry(&registry)
            .config(&config)
            .build()
            .detect_conflicts(Some(&[Category::Embedded]));

        pretty_assert_eq!(
            report.summary,
            Summary {
                total: 1,
                by_severity: BTreeMap::from([(ConflictSeverity::High, 1)]),
                by_type: BTreeMap::from([(ConflictType::Direct, 1)]),
                resolved: 1,
                unresolved: 0,
            }
        );
    }

    #[test]
    fn test_report_rendering() {
        let registry = scenario_a();
        let config = Configuration::default();
        let detector = ConflictDetector::builder()
            .registry(&registry)
            .config(&config)
            .build();

        let empty = generate_report(&detector.detect_conflicts(None));
        assert!(empty.contains("No conflicts detected."));

        let report = generate_report(&detector.detect_conflicts(Some(&[Category::Embedded])));
        assert!(report.contains("Total conflicts: 1 (1 resolved, 0 unresolved)"));
        assert!(report.contains(
            "### 1. direct conflict (high): `universal-memory_safety` vs `embedded-no-dynamic-memory`"
        ));
        assert!(report.contains("- **Resolution**: use_rule2 (`embedded-no-dynamic-memory`)"));
    }
}
