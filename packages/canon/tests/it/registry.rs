//! Rule document loading from the fixture directory.

use canon::rules::{Category, RuleQuery, RuleRegistry, Severity};
use pretty_assertions::assert_eq as pretty_assert_eq;

use crate::rules_dir;

#[test]
fn test_load_skips_broken_documents() {
    let registry = RuleRegistry::load(&rules_dir()).expect("load rules");

    pretty_assert_eq!(
        registry.rules().iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec![
            "embedded-no-dynamic-memory",
            "embedded-volatile",
            "kernel-types",
            "universal-memory_safety",
            "universal-naming",
        ]
    );

    let errors = registry.load_errors();
    pretty_assert_eq!(errors.len(), 1);
    assert!(errors[0].path.ends_with("broken.md"));
    pretty_assert_eq!(errors[0].message, "missing required metadata field `severity`");
}

#[test]
fn test_yaml_metadata_document() {
    let registry = RuleRegistry::load(&rules_dir()).expect("load rules");
    let rule = registry.get_rule("kernel-types").expect("kernel-types loaded");

    pretty_assert_eq!(rule.name, "Kernel Types");
    pretty_assert_eq!(rule.category, vec![Category::Kernel, Category::Drivers]);
    pretty_assert_eq!(rule.severity, Severity::Error);
    pretty_assert_eq!(rule.standard.as_deref(), Some("gnu11"));
    pretty_assert_eq!(rule.examples.good.len(), 1);
    pretty_assert_eq!(rule.examples.good[0].code, "u32 flags;");
    assert!(rule.source.as_ref().is_some_and(|p| p.ends_with("kernel/types.md")));
}

#[test]
fn test_examples_and_explanations() {
    let registry = RuleRegistry::load(&rules_dir()).expect("load rules");
    let rule = registry
        .get_rule("embedded-no-dynamic-memory")
        .expect("rule loaded");

    pretty_assert_eq!(rule.examples.good[0].explanation.as_deref(), Some("static pool"));
    pretty_assert_eq!(rule.examples.good[0].language.as_deref(), Some("c"));
    pretty_assert_eq!(
        rule.examples.bad[0].explanation.as_deref(),
        Some("allocation in the main loop")
    );
    pretty_assert_eq!(rule.standard.as_deref(), Some("C99"));
}

#[test]
fn test_query_and_toggle() {
    let mut registry = RuleRegistry::load(&rules_dir()).expect("load rules");
    let query = RuleQuery {
        categories: vec![Category::Drivers, Category::Universal],
        enabled: Some(true),
    };

    let ids = |registry: &RuleRegistry| {
        registry
            .query_rules(&query)
            .iter()
            .map(|r| r.id.clone())
            .collect::<Vec<_>>()
    };
    pretty_assert_eq!(
        ids(&registry),
        vec!["kernel-types", "universal-memory_safety", "universal-naming"]
    );

    assert!(registry.set_rule_enabled("universal-naming", false));
    assert!(!registry.set_rule_enabled("universal-unknown", false));
    pretty_assert_eq!(ids(&registry), vec!["kernel-types", "universal-memory_safety"]);
}

#[test]
fn test_load_custom_glob() {
    let mut registry = RuleRegistry::new();
    let pattern = format!("{}/universal/*.md", rules_dir().display());

    pretty_assert_eq!(registry.load_custom(&pattern).expect("load custom"), 2);
    assert!(registry.get_rule("universal-naming").is_some());
    assert!(registry.get_rule("kernel-types").is_none());
}

#[test]
fn test_missing_directory_is_empty() {
    let registry = RuleRegistry::load(&rules_dir().join("nonexistent")).expect("load rules");
    assert!(registry.is_empty());
    assert!(registry.load_errors().is_empty());
}

#[test]
fn test_unreadable_document_does_not_block_load() {
    let dir = tempfile::tempdir().expect("create temp dir");
    for (name, fixture) in [("a.md", "universal/naming.md"), ("c.md", "kernel/types.md")] {
        std::fs::copy(rules_dir().join(fixture), dir.path().join(name)).expect("copy fixture");
    }
    std::fs::write(dir.path().join("b.md"), b"\xff\xfe# Rule: Corrupt\n").expect("write corrupt");

    let registry = RuleRegistry::load(dir.path()).expect("load rules");

    pretty_assert_eq!(
        registry.rules().iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["universal-naming", "kernel-types"]
    );
    let errors = registry.load_errors();
    pretty_assert_eq!(errors.len(), 1);
    assert!(errors[0].path.ends_with("b.md"));
    assert!(errors[0].message.starts_with("read rule document:"), "got: {}", errors[0].message);
}
