//! Integration tests for the rule resolution pipeline.
//!
//! These tests run against the fixture workspace in `tests/fixtures`:
//! - Rule documents are loaded from `rules/`, including one broken document
//! - Configuration comes from `canon.yaml`, with the user layer disabled
//! - Prompts are rendered from `templates/`

mod cli;
mod pipeline;
mod registry;

use std::path::PathBuf;

use canon::config::{Configuration, ConfigurationResolver};
use xshell::{Shell, cmd};

/// The fixture workspace root.
pub fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn rules_dir() -> PathBuf {
    fixtures().join("rules")
}

pub fn templates_dir() -> PathBuf {
    fixtures().join("templates")
}

/// The fixture configuration, without the user layer.
pub fn fixture_config() -> Configuration {
    ConfigurationResolver::from_file(&fixtures().join("canon.yaml"))
        .and_then(ConfigurationResolver::without_user_layer)
        .expect("resolve fixture configuration")
        .get_configuration()
        .clone()
}

/// Run the canon binary against the fixture workspace and return
/// (exit_code, stdout, stderr).
pub fn run_canon(args: &[&str]) -> (i32, String, String) {
    let sh = Shell::new().expect("create shell");
    sh.change_dir(env!("CARGO_MANIFEST_DIR"));

    let output = cmd!(sh, "cargo run --quiet -p canon -- {args...}")
        .env("CANON_RULES_DIR", rules_dir())
        .env("CANON_TEMPLATES_DIR", templates_dir())
        .env("CANON_CONFIG", fixtures().join("canon.yaml"))
        .env_remove("CANON_LOG")
        .ignore_status()
        .output()
        .expect("run canon");

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    (exit_code, stdout, stderr)
}
