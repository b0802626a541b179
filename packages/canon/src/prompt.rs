//! Prompt generation: pick a category, resolve its active rules, and render
//! the category template.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use bon::Builder;
use color_eyre::{
    Section, SectionExt,
    eyre::{Context, Result, eyre},
};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::{
    config::Configuration,
    conflicts::detect_in,
    overrides::RuleOverrideSystem,
    rules::{Category, Rule, RuleQuery, RuleRegistry},
    template::{self, TemplateContext},
};

/// How many good examples are embedded in a prompt.
pub const MAX_EXAMPLES: usize = 5;

/// Path fragments that suggest a category. The longest match wins.
const PATH_HINTS: &[(&str, Category)] = &[
    ("kernel", Category::Kernel),
    ("module", Category::Kernel),
    ("driver", Category::Drivers),
    ("embedded", Category::Embedded),
    ("firmware", Category::Embedded),
    ("rtos", Category::Realtime),
    ("realtime", Category::Realtime),
    ("network", Category::Networking),
    ("socket", Category::Networking),
    ("legacy", Category::Legacy),
    ("compat", Category::Legacy),
];

/// What a prompt is being generated for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
pub struct PromptContext {
    /// Explicit category; skips detection.
    pub category: Option<Category>,

    #[builder(into)]
    pub file_path: Option<String>,

    #[builder(into)]
    pub function_name: Option<String>,

    #[builder(into)]
    pub file_type: Option<String>,

    /// Source surrounding the generation site, used for detection.
    #[builder(into)]
    pub code_context: Option<String>,
}

impl PromptContext {
    fn cache_key(&self, category: Category) -> String {
        format!(
            "{category}:{}:{}:{}",
            self.file_path.as_deref().unwrap_or_default(),
            self.function_name.as_deref().unwrap_or_default(),
            self.file_type.as_deref().unwrap_or_default(),
        )
    }
}

/// A rendered prompt and what went into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedPrompt {
    pub prompt: String,
    pub category: Category,
    pub active_rules: Vec<Rule>,
    pub template_used: PathBuf,
}

/// Choose the category for a prompt.
///
/// An explicit category wins; then the longest matching hint in the file
/// path; then markers in the code context; otherwise `systems`.
pub fn detect_category(context: &PromptContext) -> Category {
    if let Some(category) = context.category {
        return category;
    }

    if let Some(path) = &context.file_path {
        let path = path.to_lowercase();
        if let Some((_, category)) = PATH_HINTS
            .iter()
            .filter(|(needle, _)| path.contains(needle))
            .min_by_key(|(needle, _)| Reverse(needle.len()))
        {
            return *category;
        }
    }

    if let Some(code) = &context.code_context {
        let code = code.to_lowercase();
        if code.contains("module_init") || code.contains("module_exit") {
            return Category::Kernel;
        }
        if code.contains("volatile") && code.contains("isr") {
            return Category::Embedded;
        }
        if code.contains("socket") || code.contains("htons") {
            return Category::Networking;
        }
        if code.contains("rtos") || code.contains("freertos") {
            return Category::Realtime;
        }
    }

    Category::Systems
}

/// Renders category prompts from a rule registry and a templates directory.
#[derive(Debug, Clone)]
pub struct PromptGenerator {
    registry: RuleRegistry,
    config: Configuration,
    overrides: RuleOverrideSystem,
    templates_dir: PathBuf,
    template_cache: HashMap<Category, (PathBuf, String)>,
    prompt_cache: HashMap<String, GeneratedPrompt>,
    cache_enabled: bool,
    annotate_conflicts: bool,
}

impl PromptGenerator {
    /// Create a generator; overrides are derived from `config`.
    pub fn new(registry: RuleRegistry, config: Configuration, templates_dir: &Path) -> Self {
        Self {
            overrides: RuleOverrideSystem::new(&config),
            registry,
            config,
            templates_dir: templates_dir.to_path_buf(),
            template_cache: HashMap::new(),
            prompt_cache: HashMap::new(),
            cache_enabled: true,
            annotate_conflicts: false,
        }
    }

    /// Expose `conflicts` and `has_conflicts` to templates.
    pub fn with_conflict_annotation(mut self, enabled: bool) -> Self {
        self.annotate_conflicts = enabled;
        self
    }

    /// Turn prompt memoization on or off. Turning it off clears the caches.
    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
        if !enabled {
            self.clear_cache();
        }
    }

    /// Drop cached prompts and templates.
    pub fn clear_cache(&mut self) {
        self.prompt_cache.clear();
        self.template_cache.clear();
    }

    /// Render the prompt for `context`.
    #[tracing::instrument(skip(self))]
    pub fn generate_prompt(&mut self, context: &PromptContext) -> Result<GeneratedPrompt> {
        let category = detect_category(context);
        let key = context.cache_key(category);

        if self.cache_enabled
            && let Some(cached) = self.prompt_cache.get(&key)
        {
            tracing::debug!(%key, "prompt cache hit");
            return Ok(cached.clone());
        }

        let (template_path, template) = self.load_template(category)?;
        let active_rules = self.active_rules(category);
        let data = self.template_context(category, context, &active_rules);

        let generated = GeneratedPrompt {
            prompt: template::render(&template, &data),
            category,
            active_rules,
            template_used: template_path,
        };
        tracing::debug!(%category, rules = generated.active_rules.len(), "generated prompt");

        if self.cache_enabled {
            self.prompt_cache.insert(key, generated.clone());
        }
        Ok(generated)
    }

    /// Category and universal rules after overrides, restricted to enabled.
    pub fn active_rules(&self, category: Category) -> Vec<Rule> {
        let query = RuleQuery {
            categories: vec![category, Category::Universal],
            enabled: None,
        };
        self.registry
            .query_rules(&query)
            .into_iter()
            .map(|rule| self.overrides.apply_layered(rule, &[category]))
            .filter(|rule| rule.enabled)
            .collect()
    }

    /// Read, validate, and cache the template for a category.
    fn load_template(&mut self, category: Category) -> Result<(PathBuf, String)> {
        if let Some(cached) = self.template_cache.get(&category) {
            return Ok(cached.clone());
        }

        let path = self.templates_dir.join(format!("{category}.md"));
        let content =
            read_to_string(&path).with_context(|| format!("read template: {path:?}"))?;

        let validation = template::validate(&content);
        if !validation.valid {
            let diagnostics =
                validation.diagnostics(&format!("invalid template: {}", path.display()), &content);
            return Err(eyre!("template for {category} is invalid: {path:?}"))
                .with_section(|| diagnostics.header("Diagnostics:"));
        }

        self.template_cache
            .insert(category, (path.clone(), content.clone()));
        Ok((path, content))
    }

    fn template_context(
        &self,
        category: Category,
        context: &PromptContext,
        active: &[Rule],
    ) -> TemplateContext {
        let rules = active
            .iter()
            .map(|rule| {
                json!({
                    "id": rule.id,
                    "name": rule.name,
                    "description": rule.description,
                    "severity": rule.severity.to_string(),
                })
            })
            .collect::<Vec<_>>();

        let examples = active
            .iter()
            .flat_map(|rule| rule.examples.good.iter().map(move |example| (rule, example)))
            .take(MAX_EXAMPLES)
            .map(|(rule, example)| {
                json!({
                    "rule_id": rule.id,
                    "language": example.language,
                    "code": example.code,
                    "explanation": example.explanation,
                })
            })
            .collect::<Vec<_>>();

        let mut data = Map::new();
        data.insert("category".into(), category.to_string().into());
        data.insert("c_standard".into(), self.config.c_standard.clone().into());
        data.insert("rule_count".into(), active.len().into());
        data.insert("rules".into(), Value::Array(rules));
        data.insert("examples".into(), Value::Array(examples));

        let optional = [
            ("file_path", &context.file_path),
            ("function_name", &context.function_name),
            ("file_type", &context.file_type),
            ("code_context", &context.code_context),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                data.insert(name.into(), value.clone().into());
            }
        }

        if self.annotate_conflicts {
            let conflicts = detect_in(active)
                .into_iter()
                .map(|conflict| {
                    json!({
                        "type": conflict.kind.to_string(),
                        "severity": conflict.severity.to_string(),
                        "rule1": conflict.rule1.id,
                        "rule2": conflict.rule2.id,
                        "description": conflict.description,
                        "suggestion": conflict.suggestion,
                    })
                })
                .collect::<Vec<_>>();
            data.insert("has_conflicts".into(), (!conflicts.is_empty()).into());
            data.insert("conflicts".into(), Value::Array(conflicts));
        }

        Value::Object(data)
    }
}
