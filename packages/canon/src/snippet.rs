//! Source snippet rendering for template diagnostics.
//!
//! Uses `annotate-snippets` to render compiler-like output pointing at the
//! offending directive inside a template.

use std::ops::Range;

use annotate_snippets::{Level, Renderer, Snippet};
use derive_more::AsRef;

/// Template text to be annotated.
#[derive(Debug, Clone, PartialEq, Eq, AsRef)]
pub struct Source(String);

impl Source {
    /// Annotate the source with the given annotations under a title.
    ///
    /// # Examples
    ///
    /// Produces output similar to Rust compiler diagnostics:
    ///
    /// ```text
    /// error: Invalid template: kernel.md
    ///   |
    /// 3 | {#iff rules}
    ///   | ^^^^^ malformed directive `{#i...`
    ///   |
    /// ```
    pub fn annotate(
        &self,
        title: &str,
        annotations: impl IntoIterator<Item = impl Into<Annotation>>,
    ) -> String {
        // `annotate_snippets` borrows labels, so they must outlive the renderer.
        let annotations = annotations.into_iter().map(Into::into).collect::<Vec<_>>();
        let annotations = annotations
            .iter()
            .map(|Annotation { span, label }| Level::Error.span(span.range()).label(label));

        let snippet = Snippet::source(self.0.as_ref())
            .fold(true)
            .annotations(annotations);
        let message = Level::Error.title(title).snippet(snippet);
        Renderer::plain().render(message).to_string()
    }
}

impl<S: Into<String>> From<S> for Source {
    fn from(source: S) -> Self {
        Self(source.into())
    }
}

/// A labelled span on a source snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub span: Span,
    pub label: String,
}

impl From<(Span, String)> for Annotation {
    fn from((span, label): (Span, String)) -> Self {
        Self { span, label }
    }
}

/// A byte range in source content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset.
    pub start: usize,

    /// End byte offset.
    pub end: usize,
}

impl Span {
    /// View the span as a `Range<usize>`.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Whether `other` lies entirely within this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_snippet_single_span() {
        let source = "Rules:\n{#iff rules}\n";
        let span = Span::from(7..19);
        let result = Source::from(source)
            .annotate("Invalid template", [(span, "malformed directive".to_string())]);

        assert!(result.contains("Invalid template"));
        assert!(result.contains("{#iff rules}"));
        assert!(result.contains("malformed directive"));
        assert!(result.contains("^"));
    }

    #[test]
    fn test_render_snippet_multiple_spans() {
        let source = "{#if a}\n{#each b}\n";
        let result = Source::from(source).annotate(
            "Invalid template",
            [
                (Span::from(0..7), "unclosed `{#if}`".to_string()),
                (Span::from(8..17), "unclosed `{#each}`".to_string()),
            ],
        );
        assert!(result.contains("unclosed `{#if}`"));
        assert!(result.contains("unclosed `{#each}`"));
    }

    #[test]
    fn test_span_contains() {
        let outer = Span::from(0..10);
        assert!(outer.contains(&Span::from(2..5)));
        assert!(!outer.contains(&Span::from(8..12)));
    }
}
