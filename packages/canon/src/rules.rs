//! Rule data types, document loading, and the in-memory registry.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use tap::Pipe;
use walkdir::WalkDir;

pub use parse::parse_document;
pub use schema::*;

mod parse;
mod schema;

/// A rule document that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    /// The document that failed.
    pub path: PathBuf,

    /// Why it failed.
    pub message: String,
}

/// Filter for [`RuleRegistry::query_rules`].
#[derive(Debug, Clone, Default)]
pub struct RuleQuery {
    /// Match rules tagged with any of these categories.
    pub categories: Vec<Category>,

    /// When set, only rules whose `enabled` flag equals this value.
    pub enabled: Option<bool>,
}

/// Owned store of parsed rules, indexed by id.
///
/// Rules keep their insertion order, which is the order documents were
/// discovered in; everything downstream that iterates rules relies on it for
/// deterministic output. Clone the registry to take an independent snapshot.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    errors: Vec<LoadError>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry populated from a rules directory.
    #[tracing::instrument]
    pub fn load(dir: &Path) -> Result<Self> {
        let mut registry = Self::new();
        registry.load_rules(dir)?;
        Ok(registry)
    }

    /// Walk `dir` recursively and load every `*.md` rule document.
    ///
    /// Documents that fail to read or parse are recorded in [`RuleRegistry::load_errors`]
    /// and skipped; they never abort the load. Returns the number of rules added.
    #[tracing::instrument(skip(self))]
    pub fn load_rules(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            tracing::warn!(?dir, "rules directory does not exist");
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in WalkDir::new(dir).sort_by_file_name().into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!(?error, ?dir, "walking directory");
                    continue;
                }
            };

            if entry.file_type().is_file() && self.load_document(entry.path()) {
                loaded += 1;
            }
        }

        tracing::debug!(loaded, total = self.rules.len(), "loaded rules");
        Ok(loaded)
    }

    /// Load additional documents matching a path or glob pattern.
    ///
    /// Directories matched by the pattern are walked like [`RuleRegistry::load_rules`].
    #[tracing::instrument(skip(self))]
    pub fn load_custom(&mut self, pattern: &str) -> Result<usize> {
        let paths = glob::glob(pattern)
            .with_context(|| format!("invalid custom rules pattern: {pattern:?}"))?;

        let mut loaded = 0;
        for path in paths {
            let path = match path {
                Ok(path) => path,
                Err(error) => {
                    tracing::warn!(?error, pattern, "reading custom rules path");
                    continue;
                }
            };

            if path.is_dir() {
                loaded += self.load_rules(&path)?;
            } else if self.load_document(&path) {
                loaded += 1;
            }
        }

        Ok(loaded)
    }

    /// Load one document, returning whether a rule was added.
    ///
    /// Unreadable and unparseable documents are recorded as load errors.
    fn load_document(&mut self, path: &Path) -> bool {
        if path.extension() != Some(OsStr::new("md")) {
            tracing::debug!(?path, "skipping non-markdown file");
            return false;
        }

        let content = match read_to_string(path) {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(?path, %error, "skipping unreadable rule document");
                self.errors.push(LoadError {
                    path: path.to_path_buf(),
                    message: format!("read rule document: {error}"),
                });
                return false;
            }
        };

        let parsed = parse_document(&content).and_then(|rule| {
            Rule {
                source: Some(path.to_path_buf()),
                ..rule
            }
            .pipe(|rule| self.insert(rule))
        });

        match parsed {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(?path, %error, "skipping rule document");
                self.errors.push(LoadError {
                    path: path.to_path_buf(),
                    message: error.to_string(),
                });
                false
            }
        }
    }

    /// Add a rule. Ids are unique; the first rule with a given id wins.
    pub fn insert(&mut self, rule: Rule) -> Result<(), ParseError> {
        if self.index.contains_key(&rule.id) {
            return Err(ParseError::DuplicateId(rule.id));
        }
        if rule.category.is_empty() {
            return Err(ParseError::EmptyCategory);
        }

        self.index.insert(rule.id.clone(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// Look up a rule by id.
    pub fn get_rule(&self, id: &str) -> Option<&Rule> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    /// All rules tagged with `category`, in insertion order.
    pub fn rules_by_category(&self, category: Category) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.has_category(category))
            .collect()
    }

    /// Rules matching any of the requested categories, optionally filtered by
    /// their enabled flag. Each rule appears at most once.
    pub fn query_rules(&self, query: &RuleQuery) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| query.categories.iter().any(|c| rule.has_category(*c)))
            .filter(|rule| query.enabled.is_none_or(|enabled| rule.enabled == enabled))
            .collect()
    }

    /// Enable or disable a rule in place. Returns `false` for an unknown id.
    pub fn set_rule_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.rules[i].enabled = enabled;
                true
            }
            None => {
                tracing::debug!(id, "set_rule_enabled: unknown rule");
                false
            }
        }
    }

    /// All rules in insertion order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Documents skipped during loading.
    pub fn load_errors(&self) -> &[LoadError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<Rule> for RuleRegistry {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        let mut registry = Self::new();
        for rule in iter {
            if let Err(error) = registry.insert(rule) {
                tracing::warn!(%error, "skipping rule");
            }
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq as pretty_assert_eq;

    use super::*;

    fn rule(id: &str, categories: &[Category]) -> Rule {
        Rule::builder()
            .id(id)
            .name(id)
            .category(categories.to_vec())
            .severity(Severity::Warning)
            .build()
    }

    fn registry() -> RuleRegistry {
        RuleRegistry::from_iter([
            rule("universal-naming", &[Category::Universal]),
            rule("embedded-volatile", &[Category::Embedded]),
            rule("kernel-types", &[Category::Kernel, Category::Drivers]),
            rule("drivers-dma", &[Category::Drivers]),
        ])
    }

    fn ids(rules: Vec<&Rule>) -> Vec<&str> {
        rules.into_iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_load_nonexistent_dir() {
        let registry = RuleRegistry::load(Path::new("nonexistent-rules-dir")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = registry();
        pretty_assert_eq!(
            registry.insert(rule("universal-naming", &[Category::Systems])),
            Err(ParseError::DuplicateId("universal-naming".to_string()))
        );
        pretty_assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_rules_by_category() {
        let registry = registry();
        pretty_assert_eq!(
            ids(registry.rules_by_category(Category::Drivers)),
            vec!["kernel-types", "drivers-dma"]
        );
        pretty_assert_eq!(
            ids(registry.rules_by_category(Category::Universal)),
            vec!["universal-naming"]
        );
        assert!(registry.rules_by_category(Category::Legacy).is_empty());
    }

    #[test]
    fn test_query_union_without_duplicates() {
        let registry = registry();
        let query = RuleQuery {
            categories: vec![Category::Kernel, Category::Drivers, Category::Universal],
            enabled: None,
        };
        pretty_assert_eq!(
            ids(registry.query_rules(&query)),
            vec!["universal-naming", "kernel-types", "drivers-dma"]
        );
    }

    #[test]
    fn test_query_filters_enabled() {
        let mut registry = registry();
        assert!(registry.set_rule_enabled("drivers-dma", false));

        let enabled = RuleQuery {
            categories: vec![Category::Drivers],
            enabled: Some(true),
        };
        pretty_assert_eq!(ids(registry.query_rules(&enabled)), vec!["kernel-types"]);

        let disabled = RuleQuery {
            categories: vec![Category::Drivers],
            enabled: Some(false),
        };
        pretty_assert_eq!(ids(registry.query_rules(&disabled)), vec!["drivers-dma"]);
    }

    #[test]
    fn test_set_unknown_rule() {
        let mut registry = registry();
        assert!(!registry.set_rule_enabled("universal-missing", false));
    }
}
