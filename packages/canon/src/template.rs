//! Template rendering for category prompts.
//!
//! Supports:
//! - `{path.to.value}` - Variables, resolved by dot-path against the context
//! - `{#if condition}...{/if}` - Conditional blocks
//! - `{#each path}...{/each}` - Iteration over arrays
//!
//! Conditions are one of `name`, `!condition`, `name == "literal"`,
//! `name != other.name`. Rendering runs three passes in order: conditionals,
//! then iteration, then variables. Missing or null variables render as an
//! empty string.

use std::sync::LazyLock;

use derive_more::{Display, Error};
use itertools::Itertools;
use regex::Regex;
use serde_json::{Map, Value};
use tap::Pipe;

use crate::snippet::{Source, Span};

/// Dot-path-addressable data a template is rendered against.
pub type TemplateContext = Value;

/// Stands in for `{` in rendered values so later passes never re-scan them.
const ESCAPED_OPEN: char = '\u{E000}';

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(?:#(if|each)\s+([^{}]*?)\s*|/(if|each))\}").expect("compile directive regex")
});

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(@?[A-Za-z_][A-Za-z0-9_.]*)\}").expect("compile variable regex")
});

/// Render `template` against `context`.
///
/// # Examples
///
/// ```
/// use canon::template::render;
/// use serde_json::json;
///
/// let context = json!({ "name": "John", "place": "C Programming" });
/// let result = render("Hello {name}, welcome to {place}!", &context);
/// assert_eq!(result, "Hello John, welcome to C Programming!");
/// ```
pub fn render(template: &str, context: &TemplateContext) -> String {
    render_scoped(template, context).replace(ESCAPED_OPEN, "{")
}

fn render_scoped(template: &str, context: &TemplateContext) -> String {
    let rendered = render_conditionals(template, context);
    let rendered = render_loops(&rendered, context);
    render_variables(&rendered, context)
}

/// The opening or closing half of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag<'a> {
    If(&'a str),
    EndIf,
    Each(&'a str),
    EndEach,
}

impl Tag<'_> {
    fn closes(&self, open: &Tag<'_>) -> bool {
        matches!(
            (open, self),
            (Tag::If(_), Tag::EndIf) | (Tag::Each(_), Tag::EndEach)
        )
    }

    fn is_open(&self) -> bool {
        matches!(self, Tag::If(_) | Tag::Each(_))
    }

    fn describe(&self) -> &'static str {
        match self {
            Tag::If(_) => "{#if}",
            Tag::EndIf => "{/if}",
            Tag::Each(_) => "{#each}",
            Tag::EndEach => "{/each}",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    tag: Tag<'a>,
    span: Span,
}

fn tokenize(template: &str) -> Vec<Token<'_>> {
    DIRECTIVE
        .captures_iter(template)
        .filter_map(|caps| {
            let span = Span::from(caps.get(0)?.range());
            let tag = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(kind), Some(arg), _) if kind.as_str() == "if" => Tag::If(arg.as_str()),
                (Some(_), Some(arg), _) => Tag::Each(arg.as_str()),
                (_, _, Some(kind)) if kind.as_str() == "if" => Tag::EndIf,
                (_, _, Some(_)) => Tag::EndEach,
                _ => return None,
            };
            Some(Token { tag, span })
        })
        .collect()
}

/// A matched `open ... close` pair.
#[derive(Debug, Clone, Copy)]
struct Block<'a> {
    tag: Tag<'a>,
    open: Span,
    close: Span,
}

impl Block<'_> {
    fn outer(&self) -> Span {
        Span::from(self.open.start..self.close.end)
    }

    fn body<'t>(&self, template: &'t str) -> &'t str {
        &template[self.open.end..self.close.start]
    }
}

/// Find every matched `open ... close` pair, with its nesting depth.
/// Unmatched or crossing tags are left out and end up rendered as literal text.
fn matched_blocks<'a>(tokens: &[Token<'a>]) -> Vec<(usize, Block<'a>)> {
    let mut stack = Vec::<Token<'a>>::new();
    let mut blocks = Vec::new();

    for token in tokens {
        if token.tag.is_open() {
            stack.push(*token);
            continue;
        }

        if let Some(open) = stack.last().copied()
            && token.tag.closes(&open.tag)
        {
            stack.pop();
            let block = Block {
                tag: open.tag,
                open: open.span,
                close: token.span,
            };
            blocks.push((stack.len(), block));
        }
    }

    blocks.sort_by_key(|(_, block)| block.open.start);
    blocks
}

fn outer_blocks<'a>(tokens: &[Token<'a>]) -> Vec<Block<'a>> {
    matched_blocks(tokens)
        .into_iter()
        .filter(|(depth, _)| *depth == 0)
        .map(|(_, block)| block)
        .collect()
}

/// Replace outermost blocks using `expand`, keeping all other text as-is.
fn splice<'a>(
    template: &'a str,
    expand: impl Fn(&Block<'a>) -> Option<String>,
) -> String {
    let tokens = tokenize(template);
    let mut output = String::with_capacity(template.len());
    let mut cursor = 0;

    for block in outer_blocks(&tokens) {
        let Some(replacement) = expand(&block) else {
            continue;
        };
        output.push_str(&template[cursor..block.open.start]);
        output.push_str(&replacement);
        cursor = block.close.end;
    }

    output.push_str(&template[cursor..]);
    output
}

/// Evaluate conditionals outside of loop bodies.
///
/// Conditionals inside a loop body are evaluated when the body is rendered for
/// each item, so they can see the item's fields.
fn render_conditionals(template: &str, context: &TemplateContext) -> String {
    splice(template, |block| match block.tag {
        Tag::If(condition) if evaluate(condition, context) => {
            Some(render_conditionals(block.body(template), context))
        }
        Tag::If(_) => Some(String::new()),
        _ => None,
    })
}

fn render_loops(template: &str, context: &TemplateContext) -> String {
    splice(template, |block| match block.tag {
        Tag::Each(path) => {
            let body = block.body(template);
            let items = match resolve(context, path) {
                Some(Value::Array(items)) => items.as_slice(),
                _ => &[],
            };
            let name = path.rsplit('.').next().unwrap_or(path);

            items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let scoped = item_context(context, name, item, index, items.len());
                    render_scoped(body, &scoped)
                })
                .collect::<String>()
                .pipe(Some)
        }
        _ => None,
    })
}

/// Build the context a loop body sees for one item.
fn item_context(
    parent: &TemplateContext,
    name: &str,
    item: &Value,
    index: usize,
    len: usize,
) -> TemplateContext {
    let mut scoped = match parent {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    scoped.insert(name.to_string(), item.clone());
    scoped.insert("this".to_string(), item.clone());
    if let Value::Object(fields) = item {
        scoped.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    scoped.insert("@index".to_string(), Value::from(index));
    scoped.insert("@first".to_string(), Value::from(index == 0));
    scoped.insert("@last".to_string(), Value::from(index + 1 == len));

    Value::Object(scoped)
}

fn render_variables(template: &str, context: &TemplateContext) -> String {
    VARIABLE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            display(resolve_owned(context, &caps[1])).replace('{', &ESCAPED_OPEN.to_string())
        })
        .into_owned()
}

/// Resolve a dot path. Numeric segments index arrays; `length` on an array is
/// its size.
pub fn resolve<'a>(context: &'a TemplateContext, path: &str) -> Option<&'a Value> {
    path.trim().split('.').try_fold(context, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn resolve_owned(context: &TemplateContext, path: &str) -> Option<Value> {
    let path = path.trim();
    match path.rsplit_once('.') {
        Some((parent, "length")) => match resolve(context, parent) {
            Some(Value::Array(items)) => Some(Value::from(items.len())),
            other => other.and_then(|v| v.get("length")).cloned(),
        },
        _ => resolve(context, path).cloned(),
    }
}

/// Render a value as text.
fn display(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(Value::Array(items)) => items.into_iter().map(|v| display(Some(v))).join(", "),
        Some(other) => other.to_string(),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(_)) => true,
    }
}

/// Evaluate a condition against the context.
fn evaluate(condition: &str, context: &TemplateContext) -> bool {
    let condition = condition.trim();

    if let Some(rest) = condition.strip_prefix('!')
        && !rest.starts_with('=')
    {
        return !evaluate(rest, context);
    }

    if let Some((left, op, right)) = split_comparison(condition) {
        let equal = operand(left, context) == operand(right, context);
        return if op == "==" { equal } else { !equal };
    }

    let value = resolve_owned(context, condition);
    truthy(value.as_ref())
}

/// Split at the first `==` or `!=` that is not inside a quoted literal.
fn split_comparison(condition: &str) -> Option<(&str, &str, &str)> {
    let mut quote = None;
    for (i, c) in condition.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '=' | '!') if condition[i + 1..].starts_with('=') => {
                return Some((&condition[..i], &condition[i..i + 2], &condition[i + 2..]));
            }
            (None, _) => {}
        }
    }
    None
}

/// One side of a comparison, as text.
fn operand(raw: &str, context: &TemplateContext) -> String {
    let raw = raw.trim();
    if let Some(literal) = quoted(raw) {
        return literal.to_string();
    }

    match resolve_owned(context, raw) {
        Some(value) => display(Some(value)),
        // Bare numbers and booleans compare as themselves.
        None if is_bare_literal(raw) => raw.to_string(),
        None => String::new(),
    }
}

fn quoted(raw: &str) -> Option<&str> {
    ['"', '\'']
        .into_iter()
        .find_map(|q| raw.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)))
}

fn is_bare_literal(raw: &str) -> bool {
    matches!(raw, "true" | "false" | "null") || raw.parse::<f64>().is_ok()
}

/// A structural problem found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("{message}")]
pub struct TemplateError {
    /// What is wrong.
    pub message: String,

    /// Where, when the problem has a single location.
    pub span: Option<Span>,
}

impl TemplateError {
    fn at(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }

    fn global(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }
}

/// Result of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<TemplateError>,
}

impl Validation {
    /// Render the errors against the template source, compiler style.
    ///
    /// Errors with a span are drawn as annotations on the source; the rest
    /// are listed after it.
    pub fn diagnostics(&self, title: &str, template: &str) -> String {
        let (spanned, global) = self
            .errors
            .iter()
            .partition::<Vec<_>, _>(|error| error.span.is_some());

        let mut out = if spanned.is_empty() {
            format!("error: {title}\n")
        } else {
            Source::from(template).annotate(
                title,
                spanned
                    .iter()
                    .filter_map(|error| error.span.map(|span| (span, error.message.clone()))),
            )
        };
        for error in global {
            out.push_str(&format!("\nerror: {error}"));
        }
        out
    }
}

/// Lint a template's block structure.
///
/// Reports unbalanced `{#if}`/`{/if}` and `{#each}`/`{/each}` counts, blocks
/// that close out of order, and `{#X` directives whose letter is none of
/// `i`, `e`, `f`, `l`.
pub fn validate(template: &str) -> Validation {
    static OPEN_IF: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\{#if\b").expect("compile if regex"));
    static OPEN_EACH: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\{#each\b").expect("compile each regex"));
    static HASH_DIRECTIVE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\{#([A-Za-z])[^{}]*\}?").expect("compile directive regex"));

    let mut errors = Vec::new();

    for caps in HASH_DIRECTIVE.captures_iter(template) {
        let letter = &caps[1];
        if !matches!(letter, "i" | "e" | "f" | "l") {
            let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
            errors.push(TemplateError::at(
                format!("malformed directive `{{#{letter}...`"),
                Span::from(whole),
            ));
        }
    }

    let counts = [
        ("{#if}", OPEN_IF.find_iter(template).count(), "{/if}", template.matches("{/if}").count()),
        (
            "{#each}",
            OPEN_EACH.find_iter(template).count(),
            "{/each}",
            template.matches("{/each}").count(),
        ),
    ];
    let mut balanced = true;
    for (open, opened, close, closed) in counts {
        if opened != closed {
            balanced = false;
            errors.push(TemplateError::global(format!(
                "unbalanced blocks: {opened} `{open}` but {closed} `{close}`"
            )));
        }
    }

    // Ordering problems are only meaningful once the counts line up.
    if balanced {
        let mut stack = Vec::<Token<'_>>::new();
        for token in tokenize(template) {
            if token.tag.is_open() {
                stack.push(token);
                continue;
            }
            match stack.pop() {
                Some(open) if token.tag.closes(&open.tag) => {}
                Some(open) => errors.push(TemplateError::at(
                    format!(
                        "`{}` closes `{}` opened at byte {}",
                        token.tag.describe(),
                        open.tag.describe(),
                        open.span.start
                    ),
                    token.span,
                )),
                None => errors.push(TemplateError::at(
                    format!("`{}` without a matching opener", token.tag.describe()),
                    token.span,
                )),
            }
        }
    }

    Validation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Root variable names a template needs from its context.
///
/// Names referenced only inside loop bodies are scoped to the loop item and
/// are not reported; `@`-prefixed loop metadata never is.
pub fn extract_variables(template: &str) -> Vec<String> {
    let tokens = tokenize(template);
    let loops = matched_blocks(&tokens)
        .into_iter()
        .filter(|(_, block)| matches!(block.tag, Tag::Each(_)))
        .map(|(_, block)| block.outer())
        .collect_vec();
    let in_loop_body = |span: Span| {
        loops
            .iter()
            .any(|outer| outer.contains(&span) && outer.start != span.start)
    };

    let directives = tokens
        .iter()
        .filter(|token| !in_loop_body(token.span))
        .flat_map(|token| match token.tag {
            Tag::If(condition) => condition_operands(condition)
                .into_iter()
                .map(|operand| (token.span.start, operand))
                .collect_vec(),
            Tag::Each(path) => vec![(token.span.start, path)],
            Tag::EndIf | Tag::EndEach => Vec::new(),
        });
    let variables = VARIABLE
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).zip(caps.get(0)))
        .filter(|(_, whole)| !in_loop_body(Span::from(whole.range())))
        .map(|(path, whole)| (whole.start(), path.as_str()));

    directives
        .chain(variables)
        .sorted_by_key(|(position, _)| *position)
        .map(|(_, path)| path)
        .filter(|path| !path.starts_with('@'))
        .filter_map(|path| path.split('.').next())
        .map(str::trim)
        .filter(|root| !root.is_empty())
        .unique()
        .map(String::from)
        .collect()
}

fn condition_operands(condition: &str) -> Vec<&str> {
    let condition = condition.trim().trim_start_matches('!').trim();
    let sides = match condition
        .split_once("!=")
        .or_else(|| condition.split_once("=="))
    {
        Some((left, right)) => vec![left.trim(), right.trim()],
        None => vec![condition],
    };

    sides
        .into_iter()
        .filter(|side| quoted(side).is_none() && !is_bare_literal(side))
        .collect()
}

/// Root variables a template references that `context` does not provide.
pub fn missing_variables(template: &str, context: &TemplateContext) -> Vec<String> {
    extract_variables(template)
        .into_iter()
        .filter(|root| context.get(root).is_none())
        .collect()
}
