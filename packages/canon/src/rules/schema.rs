//! Schema types for coding-standard rules.

use std::{path::PathBuf, str::FromStr, sync::LazyLock};

use bon::Builder;
use derive_more::{Display, Error};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The applicability domain of a rule.
///
/// A rule may belong to several categories; `Universal` rules apply to every
/// project regardless of its configured categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[display("systems")]
    Systems,
    #[display("embedded")]
    Embedded,
    #[display("kernel")]
    Kernel,
    #[display("drivers")]
    Drivers,
    #[display("realtime")]
    Realtime,
    #[display("networking")]
    Networking,
    #[display("legacy")]
    Legacy,
    #[display("universal")]
    Universal,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 8] = [
        Category::Systems,
        Category::Embedded,
        Category::Kernel,
        Category::Drivers,
        Category::Realtime,
        Category::Networking,
        Category::Legacy,
        Category::Universal,
    ];
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.to_string() == needle)
            .ok_or_else(|| ParseError::UnknownCategory(s.trim().to_string()))
    }
}

/// How strongly a rule is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[display("ERROR")]
    Error,
    #[display("WARNING")]
    Warning,
    #[display("INFO")]
    Info,
}

impl Severity {
    /// Fixed ordering used when two rules compete: higher wins.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Error => 3,
            Severity::Warning => 2,
            Severity::Info => 1,
        }
    }
}

impl FromStr for Severity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Severity::Error),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "INFO" => Ok(Severity::Info),
            _ => Err(ParseError::UnknownSeverity(s.trim().to_string())),
        }
    }
}

/// A code sample attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Builder)]
pub struct Example {
    /// The fence language tag, if the block declared one.
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// The code inside the fence.
    #[builder(into)]
    pub code: String,

    /// Free text following `Good Example:` / `Bad Example:` in the heading.
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Good and bad samples for a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Examples {
    #[serde(default)]
    pub good: Vec<Example>,

    #[serde(default)]
    pub bad: Vec<Example>,
}

/// A single coding-standard directive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Builder)]
pub struct Rule {
    /// Stable identifier of the form `<scope>-<topic>`.
    #[builder(into)]
    pub id: String,

    /// Human-readable title.
    #[builder(into)]
    pub name: String,

    #[builder(into, default)]
    #[serde(default)]
    pub description: String,

    #[builder(into, default)]
    #[serde(default)]
    pub rationale: String,

    /// Categories this rule applies to; never empty.
    #[builder(into)]
    pub category: Vec<Category>,

    pub severity: Severity,

    #[builder(default = true)]
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    #[builder(default)]
    #[serde(default)]
    pub examples: Examples,

    /// The language standard the rule was written against (e.g. `C11`).
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,

    /// The document this rule was parsed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl Rule {
    /// Whether the rule applies to every category.
    pub fn is_universal(&self) -> bool {
        self.category.contains(&Category::Universal)
    }

    /// Whether the rule is tagged with the given category.
    pub fn has_category(&self, category: Category) -> bool {
        self.category.contains(&category)
    }

    /// The trailing `-`-delimited segment of the id.
    ///
    /// ```
    /// # use canon::rules::Rule;
    /// # use canon::rules::{Category, Severity};
    /// let rule = Rule::builder()
    ///     .id("embedded-no-dynamic-memory")
    ///     .name("No dynamic memory")
    ///     .category(vec![Category::Embedded])
    ///     .severity(Severity::Error)
    ///     .build();
    /// assert_eq!(rule.topic(), "memory");
    /// ```
    pub fn topic(&self) -> &str {
        self.id.rsplit('-').next().unwrap_or(&self.id)
    }
}

fn enabled_by_default() -> bool {
    true
}

/// Check an id against the `<scope>-<topic>` format.
pub fn validate_id(id: &str) -> Result<(), ParseError> {
    static ID: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[a-z0-9_]+(-[a-z0-9_]+)+$").expect("compile rule id regex")
    });

    if ID.is_match(id) {
        Ok(())
    } else {
        Err(ParseError::InvalidId(id.to_string()))
    }
}

/// Errors produced while parsing a single rule document.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ParseError {
    #[display("missing `## {_0}` section")]
    MissingSection(#[error(not(source))] &'static str),

    #[display("missing required metadata field `{_0}`")]
    MissingField(#[error(not(source))] &'static str),

    #[display("rule id `{_0}` is not of the form `<scope>-<topic>`")]
    InvalidId(#[error(not(source))] String),

    #[display("unknown category `{_0}`")]
    UnknownCategory(#[error(not(source))] String),

    #[display("unknown severity `{_0}`")]
    UnknownSeverity(#[error(not(source))] String),

    #[display("rule declares no categories")]
    EmptyCategory,

    #[display("invalid value for `{field}`: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[display("invalid metadata block: {_0}")]
    InvalidMetadata(#[error(not(source))] String),

    #[display("duplicate rule id `{_0}`")]
    DuplicateId(#[error(not(source))] String),
}
