//! Render the prompt for a file or category.

use std::fs::read_to_string;
use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::{Context, Result};

use canon::{
    prompt::{PromptContext, PromptGenerator},
    rules::Category,
};

use super::{Format, Workspace};

#[derive(Args, Clone, Debug)]
pub struct Config {
    #[command(flatten)]
    pub workspace: Workspace,

    /// Category to render; detected from `--file` and the code context if
    /// not specified.
    #[arg(long, short)]
    pub category: Option<Category>,

    /// Path of the file code is being generated for.
    #[arg(long)]
    pub file: Option<String>,

    /// Function being generated.
    #[arg(long)]
    pub function: Option<String>,

    /// Kind of file (e.g. `header`, `source`).
    #[arg(long)]
    pub file_type: Option<String>,

    /// Surrounding code, used for category detection and exposed to templates.
    #[arg(long, conflicts_with = "code_file")]
    pub code: Option<String>,

    /// Read the surrounding code from a file.
    #[arg(long, conflicts_with = "code")]
    pub code_file: Option<PathBuf>,

    /// Expose detected conflicts to the template as `conflicts`.
    #[arg(long)]
    pub annotate_conflicts: bool,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

pub fn main(config: Config) -> Result<()> {
    let configuration = config.workspace.configuration()?;
    let registry = config.workspace.registry(&configuration)?;

    let code_context = match &config.code_file {
        Some(path) => Some(read_to_string(path).with_context(|| format!("read {path:?}"))?),
        None => config.code.clone(),
    };
    let context = PromptContext::builder()
        .maybe_category(config.category)
        .maybe_file_path(config.file.clone())
        .maybe_function_name(config.function.clone())
        .maybe_file_type(config.file_type.clone())
        .maybe_code_context(code_context)
        .build();

    let mut generator =
        PromptGenerator::new(registry, configuration, &config.workspace.templates_dir)
            .with_conflict_annotation(config.annotate_conflicts);
    let generated = generator
        .generate_prompt(&context)
        .context("generate prompt")?;

    config
        .format
        .print(&generated, || generated.prompt.clone())
}
