//! Detect conflicts among the project's active rules.

use clap::Args;
use color_eyre::eyre::Result;

use canon::{
    conflicts::{ConflictDetector, generate_report},
    overrides::RuleOverrideSystem,
    rules::Category,
};

use super::{Format, Workspace};

#[derive(Args, Clone, Debug)]
pub struct Config {
    #[command(flatten)]
    pub workspace: Workspace,

    /// Categories to scan; universal rules are always included.
    /// If not specified, uses the categories from configuration.
    #[arg(long = "category", short)]
    pub categories: Vec<Category>,

    /// Compare rules as stored, without applying configuration overrides.
    #[arg(long)]
    pub raw: bool,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

pub fn main(config: Config) -> Result<()> {
    let configuration = config.workspace.configuration()?;
    let registry = config.workspace.registry(&configuration)?;
    let overrides = RuleOverrideSystem::new(&configuration);

    let detector = ConflictDetector::builder()
        .registry(&registry)
        .config(&configuration)
        .maybe_overrides((!config.raw).then_some(&overrides))
        .build();

    let categories = (!config.categories.is_empty()).then_some(config.categories.as_slice());
    let report = detector.detect_conflicts(categories);

    config.format.print(&report, || generate_report(&report))
}
