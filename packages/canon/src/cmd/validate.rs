//! Validate templates and rule documents.

use std::ffi::OsStr;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use clap::Args;
use color_eyre::eyre::{Context, Result, bail};
use walkdir::WalkDir;

use canon::{rules::RuleRegistry, template};

use super::Workspace;

#[derive(Args, Clone, Debug)]
pub struct Config {
    #[command(flatten)]
    pub workspace: Workspace,

    /// Template files to validate.
    /// If not specified, validates every template in the templates directory
    /// and every rule document in the rules directory.
    pub paths: Vec<PathBuf>,
}

pub fn main(config: Config) -> Result<()> {
    let mut failures = 0;

    let templates = if config.paths.is_empty() {
        markdown_files(&config.workspace.templates_dir)
    } else {
        config.paths.clone()
    };
    for path in &templates {
        if !validate_template(path)? {
            failures += 1;
        }
    }

    if config.paths.is_empty() {
        let registry = RuleRegistry::load(&config.workspace.rules_dir)?;
        for error in registry.load_errors() {
            eprintln!("error: {}: {}", error.path.display(), error.message);
            failures += 1;
        }
        println!("{} rule(s) loaded", registry.len());
    }

    if failures > 0 {
        bail!("{failures} file(s) failed validation");
    }
    Ok(())
}

/// Validate one template, printing diagnostics. Returns whether it is valid.
fn validate_template(path: &Path) -> Result<bool> {
    let content = read_to_string(path).with_context(|| format!("read template: {path:?}"))?;
    let validation = template::validate(&content);

    if validation.valid {
        let variables = template::extract_variables(&content);
        println!("ok: {} ({})", path.display(), variables.join(", "));
    } else {
        let title = format!("invalid template: {}", path.display());
        eprintln!("{}", validation.diagnostics(&title, &content));
    }
    Ok(validation.valid)
}

fn markdown_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(?error, ?dir, "walking templates directory");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension() == Some(OsStr::new("md")))
        .collect()
}
