//! Show, validate, and export the overrides implied by configuration.

use clap::Args;
use color_eyre::{
    Section, SectionExt,
    eyre::{Context, Result, eyre},
};

use canon::overrides::RuleOverrideSystem;

use super::Workspace;

#[derive(Args, Clone, Debug)]
pub struct Config {
    #[command(flatten)]
    pub workspace: Workspace,

    /// Print the overrides as a configuration fragment (YAML) instead of a report.
    #[arg(long)]
    pub export: bool,
}

pub fn main(config: Config) -> Result<()> {
    let configuration = config.workspace.configuration()?;
    let registry = config.workspace.registry(&configuration)?;
    let overrides = RuleOverrideSystem::new(&configuration);

    if config.export {
        let fragment = overrides.export_to_config();
        let yaml = serde_yaml::to_string(&fragment).context("serialize overrides")?;
        print!("{yaml}");
        return Ok(());
    }

    println!("{}", overrides.generate_formatted_report().trim_end());

    let validation = overrides.validate_overrides(&registry);
    for warning in &validation.warnings {
        eprintln!("warning: {warning}");
    }
    if !validation.valid {
        let errors = validation.errors.join("\n");
        return Err(eyre!(
            "{} conflicting override(s)",
            validation.errors.len()
        ))
        .with_section(|| errors.header("Errors:"))
        .suggestion("Keep a single enable, disable, or severity entry per rule and category.");
    }

    Ok(())
}
