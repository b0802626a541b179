//! CLI subcommands and the options they share.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use canon::{
    config::{Configuration, ConfigurationResolver},
    rules::RuleRegistry,
};

pub mod conflicts;
pub mod overrides;
pub mod prompt;
pub mod rules;
pub mod validate;

/// Where rules, templates, and configuration come from.
#[derive(Args, Clone, Debug)]
pub struct Workspace {
    /// Directory of rule documents.
    #[arg(long, env = "CANON_RULES_DIR", default_value = "rules")]
    pub rules_dir: PathBuf,

    /// Directory of category templates (`<category>.md`).
    #[arg(long, env = "CANON_TEMPLATES_DIR", default_value = "templates")]
    pub templates_dir: PathBuf,

    /// Project configuration file.
    /// If not specified, `canon.{yaml,yml,json}` in the current directory.
    #[arg(long, env = "CANON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Ignore the user-level configuration file.
    #[arg(long)]
    pub no_user_config: bool,
}

impl Workspace {
    /// Resolve the layered configuration.
    #[tracing::instrument(skip(self))]
    pub fn configuration(&self) -> Result<Configuration> {
        let resolver = match &self.config {
            Some(path) => ConfigurationResolver::from_file(path),
            None => std::env::current_dir()
                .context("get current directory")
                .and_then(|dir| ConfigurationResolver::new(&dir)),
        }
        .context("resolve configuration")?;

        let resolver = if self.no_user_config {
            resolver.without_user_layer()?
        } else {
            resolver
        };
        Ok(resolver.get_configuration().clone())
    }

    /// Load the rule registry, including any custom rules the configuration
    /// points at. Documents that fail to parse are reported on stderr.
    #[tracing::instrument(skip(self, config))]
    pub fn registry(&self, config: &Configuration) -> Result<RuleRegistry> {
        let mut registry = RuleRegistry::load(&self.rules_dir)
            .with_context(|| format!("load rules from {:?}", self.rules_dir))?;
        if let Some(pattern) = &config.custom_rules {
            registry
                .load_custom(pattern)
                .with_context(|| format!("load custom rules from {pattern:?}"))?;
        }

        for error in registry.load_errors() {
            eprintln!("warning: skipped {}: {}", error.path.display(), error.message);
        }
        Ok(registry)
    }
}

/// Output format for commands that print structured data.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Human-readable text or Markdown.
    #[default]
    Text,
    Json,
    Yaml,
}

impl Format {
    /// Print `value` as JSON or YAML, or run `text` to produce the text form.
    pub fn print<T: Serialize>(self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        let out = match self {
            Format::Text => text(),
            Format::Json => serde_json::to_string_pretty(value).context("serialize as JSON")?,
            Format::Yaml => serde_yaml::to_string(value).context("serialize as YAML")?,
        };
        println!("{}", out.trim_end());
        Ok(())
    }
}
