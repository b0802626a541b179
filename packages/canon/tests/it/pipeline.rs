//! End-to-end resolution: configuration, overrides, conflicts, and prompts.

use canon::{
    config::RuleState,
    conflicts::{ConflictDetector, ConflictType, ResolutionKind, generate_report},
    overrides::{OverrideAction, RuleOverrideSystem},
    prompt::{PromptContext, PromptGenerator},
    rules::{Category, RuleRegistry, Severity},
};
use indoc::indoc;
use pretty_assertions::assert_eq as pretty_assert_eq;

use crate::{fixture_config, rules_dir, templates_dir};

#[test]
fn test_fixture_configuration() {
    let config = fixture_config();

    pretty_assert_eq!(config.categories, vec![Category::Embedded]);
    pretty_assert_eq!(config.c_standard, "c99");
    pretty_assert_eq!(config.universal_rule_state("naming"), RuleState::Disabled);
    pretty_assert_eq!(config.universal_rule_state("memory_safety"), RuleState::Enabled);
}

#[test]
fn test_overrides_leave_registry_untouched() {
    let config = fixture_config();
    let registry = RuleRegistry::load(&rules_dir()).expect("load rules");
    let overrides = RuleOverrideSystem::new(&config);

    let naming = registry.get_rule("universal-naming").expect("naming loaded");
    let resolved = overrides.apply_overrides(naming, Category::Universal);
    assert!(!resolved.enabled);

    let naming = registry.get_rule("universal-naming").expect("naming loaded");
    assert!(naming.enabled);
    pretty_assert_eq!(naming.severity, Severity::Warning);

    let validation = overrides.validate_overrides(&registry);
    assert!(validation.valid);
    assert!(validation.warnings.is_empty());
}

#[test]
fn test_override_report_and_export() {
    let overrides = RuleOverrideSystem::new(&fixture_config());

    let report = overrides.generate_formatted_report();
    assert!(report.contains("Total overrides: 2"));
    assert!(report.contains("| embedded-volatile | change_severity | ERROR |"));

    let fragment = overrides.export_to_config();
    pretty_assert_eq!(
        fragment.universal_rules.get("naming"),
        Some(&RuleState::Disabled)
    );
    let entry = &fragment.category_overrides[&Category::Embedded].rules["embedded-volatile"];
    pretty_assert_eq!(entry.action, OverrideAction::ChangeSeverity);
    pretty_assert_eq!(entry.severity, Some(Severity::Error));
}

#[test]
fn test_conflicts_in_configured_categories() {
    let config = fixture_config();
    let registry = RuleRegistry::load(&rules_dir()).expect("load rules");
    let overrides = RuleOverrideSystem::new(&config);
    let detector = ConflictDetector::builder()
        .registry(&registry)
        .config(&config)
        .overrides(&overrides)
        .build();

    let report = detector.detect_conflicts(None);
    pretty_assert_eq!(report.conflicts.len(), 1);

    let entry = &report.conflicts[0];
    pretty_assert_eq!(entry.conflict.kind, ConflictType::Direct);
    pretty_assert_eq!(entry.conflict.rule1.id, "embedded-no-dynamic-memory");
    pretty_assert_eq!(entry.conflict.rule2.id, "universal-memory_safety");
    pretty_assert_eq!(entry.resolution.resolution, ResolutionKind::UseRule1);

    pretty_assert_eq!(detector.detect_conflicts(None), report);

    let kernel = detector.detect_conflicts(Some(&[Category::Kernel]));
    assert!(kernel.conflicts.is_empty());
    assert!(generate_report(&kernel).contains("No conflicts detected."));
}

#[test]
fn test_embedded_prompt() {
    let config = fixture_config();
    let registry = RuleRegistry::load(&rules_dir()).expect("load rules");
    let mut generator = PromptGenerator::new(registry, config, &templates_dir());

    let context = PromptContext::builder()
        .file_path("src/firmware/uart.c")
        .function_name("uart_init")
        .build();
    let generated = generator.generate_prompt(&context).expect("generate prompt");

    pretty_assert_eq!(generated.category, Category::Embedded);
    pretty_assert_eq!(generated.template_used, templates_dir().join("embedded.md"));
    pretty_assert_eq!(
        generated.prompt,
        indoc! {"
            # Embedded C guidelines (c99)

            Target file: src/firmware/uart.c
            Follow these 3 rules:
            0. [ERROR] No Dynamic Memory: Forbid dynamic allocation after system initialization.
            1. [ERROR] Volatile Registers: Access hardware registers through volatile pointers.
            2. [ERROR] Memory Safety: Allow dynamic allocation only through checked wrappers.

            Examples:
            - embedded-no-dynamic-memory: static pool
            - universal-memory_safety: checked allocation

        "}
    );
}

#[test]
fn test_kernel_prompt_from_code_context() {
    let config = fixture_config();
    let registry = RuleRegistry::load(&rules_dir()).expect("load rules");
    let mut generator = PromptGenerator::new(registry, config, &templates_dir());

    let context = PromptContext::builder()
        .code_context("module_init(driver_setup);")
        .build();
    let generated = generator.generate_prompt(&context).expect("generate prompt");

    pretty_assert_eq!(generated.category, Category::Kernel);
    pretty_assert_eq!(
        generated.prompt,
        indoc! {"
            Kernel guidelines for kernel.
            - kernel-types (ERROR)
            - universal-memory_safety (ERROR)

        "}
    );
}

#[test]
fn test_missing_template_category() {
    let config = fixture_config();
    let registry = RuleRegistry::load(&rules_dir()).expect("load rules");
    let mut generator = PromptGenerator::new(registry, config, &templates_dir());

    let context = PromptContext::builder().category(Category::Legacy).build();
    assert!(generator.generate_prompt(&context).is_err());
}
