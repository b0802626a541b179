//! Markdown rule document parsing.
//!
//! A rule document is ordinary Markdown with a handful of well-known sections:
//!
//! ```markdown
//! # Rule: Memory Safety
//!
//! ## Metadata
//! - **ID**: universal-memory_safety
//! - **Category**: universal, embedded
//! - **Severity**: ERROR
//! - **Standard**: C11
//!
//! ## Description
//! Free text.
//!
//! ## Rationale
//! Free text.
//!
//! ## Examples
//!
//! ### Good Example: bounded copy
//! (fenced code block)
//!
//! ### Bad Example
//! (fenced code block)
//! ```
//!
//! The metadata section may instead hold a fenced YAML block with the same keys.

use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;

use super::schema::{Category, Example, Examples, ParseError, Rule, Severity, validate_id};

/// A heading and the lines underneath it, up to the next heading.
#[derive(Debug)]
struct Section<'a> {
    level: usize,
    heading: &'a str,
    body: Vec<&'a str>,
}

impl Section<'_> {
    fn text(&self) -> String {
        self.body.join("\n").trim().to_string()
    }

    fn is(&self, level: usize, name: &str) -> bool {
        self.level == level && self.heading.eq_ignore_ascii_case(name)
    }
}

/// A fenced code block found inside a section body.
#[derive(Debug)]
struct Fence {
    language: Option<String>,
    code: String,
}

/// Parse a rule document into a [`Rule`].
pub fn parse_document(content: &str) -> Result<Rule, ParseError> {
    let sections = split_sections(content);

    let metadata = sections
        .iter()
        .find(|s| s.is(2, "metadata"))
        .ok_or(ParseError::MissingSection("Metadata"))
        .and_then(parse_metadata)?;

    let id = metadata
        .get("id")
        .cloned()
        .ok_or(ParseError::MissingField("id"))?;
    validate_id(&id)?;

    let category = metadata
        .get("category")
        .ok_or(ParseError::MissingField("category"))
        .and_then(|raw| parse_categories(raw))?;

    let severity = metadata
        .get("severity")
        .ok_or(ParseError::MissingField("severity"))?
        .parse::<Severity>()?;

    let enabled = match metadata.get("enabled") {
        Some(raw) => parse_bool("enabled", raw)?,
        None => true,
    };

    let name = sections
        .iter()
        .find(|s| s.level == 1)
        .map(|s| strip_rule_prefix(s.heading).to_string())
        .filter(|name| !name.is_empty())
        .or_else(|| metadata.get("name").cloned())
        .unwrap_or_else(|| id.clone());

    let description = section_text(&sections, "description")
        .or_else(|| metadata.get("description").cloned())
        .unwrap_or_default();
    let rationale = section_text(&sections, "rationale")
        .or_else(|| metadata.get("rationale").cloned())
        .unwrap_or_default();

    Ok(Rule {
        id,
        name,
        description,
        rationale,
        category,
        severity,
        enabled,
        examples: parse_examples(&sections),
        standard: metadata.get("standard").cloned(),
        source: None,
    })
}

fn section_text(sections: &[Section<'_>], name: &str) -> Option<String> {
    sections
        .iter()
        .find(|s| s.is(2, name))
        .map(Section::text)
        .filter(|text| !text.is_empty())
}

/// Split a document on ATX headings, ignoring `#` lines inside code fences.
fn split_sections(content: &str) -> Vec<Section<'_>> {
    let mut sections = Vec::new();
    let mut current = Section {
        level: 0,
        heading: "",
        body: Vec::new(),
    };
    let mut in_fence = false;

    for line in content.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
        }

        let heading = (!in_fence).then(|| parse_heading(line)).flatten();
        match heading {
            Some((level, heading)) => {
                let finished = std::mem::replace(
                    &mut current,
                    Section {
                        level,
                        heading,
                        body: Vec::new(),
                    },
                );
                sections.push(finished);
            }
            None => current.body.push(line),
        }
    }

    sections.push(current);
    sections
}

fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }

    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }

    Some((level, rest.trim()))
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

fn strip_rule_prefix(heading: &str) -> &str {
    heading
        .strip_prefix("Rule:")
        .or_else(|| heading.strip_prefix("rule:"))
        .unwrap_or(heading)
        .trim()
}

/// Parse the metadata section into a lower-cased key/value map.
fn parse_metadata(section: &Section<'_>) -> Result<HashMap<String, String>, ParseError> {
    match fences(&section.body).into_iter().next() {
        Some(fence) => parse_yaml_metadata(&fence.code),
        None => Ok(parse_bullet_metadata(&section.body)),
    }
}

fn parse_bullet_metadata(lines: &[&str]) -> HashMap<String, String> {
    static BULLET: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*[-*]\s+\*\*\s*([^*:]+?)\s*:?\s*\*\*\s*:?\s*(.*?)\s*$")
            .expect("compile metadata bullet regex")
    });

    lines
        .iter()
        .filter_map(|line| BULLET.captures(line))
        .map(|caps| (caps[1].to_ascii_lowercase(), caps[2].trim_matches('`').to_string()))
        .collect()
}

fn parse_yaml_metadata(source: &str) -> Result<HashMap<String, String>, ParseError> {
    let mapping = serde_yaml::from_str::<serde_yaml::Mapping>(source)
        .map_err(|e| ParseError::InvalidMetadata(e.to_string()))?;

    mapping
        .into_iter()
        .map(|(key, value)| {
            let key = yaml_scalar(&key)
                .ok_or_else(|| ParseError::InvalidMetadata(format!("non-scalar key: {key:?}")))?;
            let value = match value {
                serde_yaml::Value::Sequence(items) => {
                    items.iter().filter_map(yaml_scalar).collect::<Vec<_>>().join(", ")
                }
                other => yaml_scalar(&other).unwrap_or_default(),
            };
            Ok((key.to_ascii_lowercase(), value))
        })
        .collect()
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_categories(raw: &str) -> Result<Vec<Category>, ParseError> {
    let mut categories = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let category = part.parse::<Category>()?;
        if !categories.contains(&category) {
            categories.push(category);
        }
    }

    if categories.is_empty() {
        return Err(ParseError::EmptyCategory);
    }
    Ok(categories)
}

fn parse_bool(field: &'static str, raw: &str) -> Result<bool, ParseError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        _ => Err(ParseError::InvalidValue {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Collect `### Good Example` / `### Bad Example` blocks.
fn parse_examples(sections: &[Section<'_>]) -> Examples {
    let mut examples = Examples::default();

    for section in sections.iter().filter(|s| s.level == 3) {
        // Headings are often decorated (e.g. with a check mark); only the words matter.
        let heading = section
            .heading
            .trim_start_matches(|c: char| !c.is_ascii_alphabetic());
        let lower = heading.to_ascii_lowercase();

        let target = if lower.starts_with("good example") {
            &mut examples.good
        } else if lower.starts_with("bad example") {
            &mut examples.bad
        } else {
            continue;
        };

        let explanation = heading
            .split_once(':')
            .map(|(_, rest)| rest.trim().to_string())
            .filter(|rest| !rest.is_empty());

        target.extend(fences(&section.body).into_iter().map(|fence| Example {
            language: fence.language,
            code: fence.code,
            explanation: explanation.clone(),
        }));
    }

    examples
}

fn fences(lines: &[&str]) -> Vec<Fence> {
    let mut fences = Vec::new();
    let mut open: Option<(Option<String>, Vec<&str>)> = None;

    for line in lines {
        if !is_fence(line) {
            if let Some((_, body)) = open.as_mut() {
                body.push(line);
            }
            continue;
        }

        match open.take() {
            Some((language, body)) => fences.push(Fence {
                language,
                code: body.join("\n"),
            }),
            None => {
                let language = line
                    .trim_start()
                    .trim_start_matches(['`', '~'])
                    .trim()
                    .to_string();
                open = Some(((!language.is_empty()).then_some(language), Vec::new()));
            }
        }
    }

    fences
}
