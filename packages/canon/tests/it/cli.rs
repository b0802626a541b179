//! CLI Subcommand Smoke Tests

use crate::run_canon;
use pretty_assertions::assert_eq as pretty_assert_eq;

#[test]
fn test_rules_lists_resolved_rules() {
    let (exit_code, stdout, stderr) = run_canon(&["rules", "--no-user-config"]);

    pretty_assert_eq!(exit_code, 0, "rules should exit 0, stderr: {stderr}");
    assert!(
        stdout.contains("universal-naming") && stdout.contains("(disabled)"),
        "rules should show the disabled naming rule, got: {stdout}"
    );
    assert!(
        stderr.contains("broken.md"),
        "rules should warn about the broken document, got: {stderr}"
    );
}

#[test]
fn test_rules_json_by_category() {
    let (exit_code, stdout, _stderr) = run_canon(&[
        "rules",
        "--no-user-config",
        "--category",
        "kernel",
        "--format",
        "json",
    ]);

    pretty_assert_eq!(exit_code, 0);
    let rules: serde_json::Value = serde_json::from_str(&stdout).expect("parse JSON output");
    let ids = rules
        .as_array()
        .expect("array of rules")
        .iter()
        .filter_map(|rule| rule["id"].as_str())
        .collect::<Vec<_>>();
    pretty_assert_eq!(ids, vec!["kernel-types"]);
}

#[test]
fn test_conflicts_report() {
    let (exit_code, stdout, _stderr) = run_canon(&["conflicts", "--no-user-config"]);

    pretty_assert_eq!(exit_code, 0);
    assert!(
        stdout.contains(
            "### 1. direct conflict (high): `embedded-no-dynamic-memory` vs `universal-memory_safety`"
        ),
        "conflicts should report the direct conflict, got: {stdout}"
    );
}

#[test]
fn test_conflicts_none_for_kernel() {
    let (exit_code, stdout, _stderr) =
        run_canon(&["conflicts", "--no-user-config", "--category", "kernel"]);

    pretty_assert_eq!(exit_code, 0);
    assert!(stdout.contains("No conflicts detected."), "got: {stdout}");
}

#[test]
fn test_overrides_export() {
    let (exit_code, stdout, _stderr) = run_canon(&["overrides", "--no-user-config", "--export"]);

    pretty_assert_eq!(exit_code, 0);
    assert!(stdout.contains("naming: disabled"), "got: {stdout}");
    assert!(stdout.contains("action: change_severity"), "got: {stdout}");
}

#[test]
fn test_prompt_for_file() {
    let (exit_code, stdout, stderr) = run_canon(&[
        "prompt",
        "--no-user-config",
        "--file",
        "src/firmware/uart.c",
    ]);

    pretty_assert_eq!(exit_code, 0, "prompt should exit 0, stderr: {stderr}");
    assert!(stdout.contains("Target file: src/firmware/uart.c"), "got: {stdout}");
    assert!(stdout.contains("Follow these 3 rules:"), "got: {stdout}");
}

#[test]
fn test_validate_reports_broken_rule() {
    let (exit_code, stdout, stderr) = run_canon(&["validate"]);

    assert_ne!(exit_code, 0, "validate should fail on the broken document");
    assert!(stdout.contains("ok: "), "templates should validate, got: {stdout}");
    assert!(stderr.contains("broken.md"), "got: {stderr}");
}

#[test]
fn test_validate_invalid_template() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("kernel.md");
    std::fs::write(&path, "{#if rules}\n{#each rules}{name}{/if}\n").expect("write template");

    let path = path.to_string_lossy();
    let (exit_code, _stdout, stderr) = run_canon(&["validate", &path]);

    assert_ne!(exit_code, 0, "validate should fail on an invalid template");
    assert!(stderr.contains("unbalanced blocks"), "got: {stderr}");
}
