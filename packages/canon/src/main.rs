//! Canon resolves coding-standard rules and renders them into prompts.

use color_eyre::{Result, Section};
use tracing::{instrument, level_filters::LevelFilter};

mod cmd;

use clap::{Parser, Subcommand};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Canon resolves coding-standard rules and renders them into prompts.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List rules with configuration overrides applied.
    Rules(cmd::rules::Config),

    /// Detect and resolve conflicts between active rules.
    Conflicts(cmd::conflicts::Config),

    /// Report or export the overrides implied by configuration.
    Overrides(cmd::overrides::Config),

    /// Render the prompt for a file or category.
    Prompt(cmd::prompt::Config),

    /// Validate templates and rule documents.
    Validate(cmd::validate::Config),
}

#[instrument]
fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Output is meant to be piped into other tools, so only warnings and
    // errors are logged by default.
    //
    // Examples:
    // - `CANON_LOG=debug` to see cache hits and derived overrides
    // - `CANON_LOG=canon::rules=trace` to trace rule loading
    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .pretty(),
        )
        .with(
            EnvFilter::builder()
                .with_env_var("CANON_LOG")
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    match cli.command {
        Commands::Rules(config) => cmd::rules::main(config),
        Commands::Conflicts(config) => cmd::conflicts::main(config),
        Commands::Overrides(config) => cmd::overrides::main(config),
        Commands::Prompt(config) => cmd::prompt::main(config),
        Commands::Validate(config) => cmd::validate::main(config),
    }
    .suggestion("Run `canon validate` to check templates and rule documents, or set `CANON_LOG=debug`.")
}
