//! List loaded rules as they resolve for the project.

use clap::Args;
use color_eyre::eyre::Result;
use itertools::Itertools;

use canon::{
    overrides::RuleOverrideSystem,
    rules::{Category, Rule, RuleQuery},
};

use super::{Format, Workspace};

#[derive(Args, Clone, Debug)]
pub struct Config {
    #[command(flatten)]
    pub workspace: Workspace,

    /// Only list rules in these categories.
    /// If not specified, lists every loaded rule.
    #[arg(long = "category", short)]
    pub categories: Vec<Category>,

    /// Show rules as stored, without applying configuration overrides.
    #[arg(long)]
    pub raw: bool,

    /// Hide disabled rules.
    #[arg(long)]
    pub enabled_only: bool,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

pub fn main(config: Config) -> Result<()> {
    let configuration = config.workspace.configuration()?;
    let registry = config.workspace.registry(&configuration)?;
    let overrides = RuleOverrideSystem::new(&configuration);

    let categories = if config.categories.is_empty() {
        Category::ALL.to_vec()
    } else {
        config.categories.clone()
    };
    let query = RuleQuery {
        categories: categories.clone(),
        enabled: None,
    };

    let rules = registry
        .query_rules(&query)
        .into_iter()
        .map(|rule| {
            if config.raw {
                rule.clone()
            } else {
                overrides.apply_layered(rule, &categories)
            }
        })
        .filter(|rule| !config.enabled_only || rule.enabled)
        .collect::<Vec<_>>();

    config.format.print(&rules, || table(&rules))
}

fn table(rules: &[Rule]) -> String {
    if rules.is_empty() {
        return "No rules found.".to_string();
    }

    let width = rules.iter().map(|rule| rule.id.len()).max().unwrap_or_default();
    rules
        .iter()
        .map(|rule| {
            let state = if rule.enabled { "" } else { " (disabled)" };
            format!(
                "{:<width$}  {:<7}  [{}]  {}{state}",
                rule.id,
                rule.severity.to_string(),
                rule.category.iter().join(", "),
                rule.name,
            )
        })
        .join("\n")
}
