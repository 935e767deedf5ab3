//! Error types for every stage of the YAML pipeline.
//!
//! Each stage reports through its own [`YamlError`] variant so callers can
//! tell "invalid document" (scanner, parser, composer) from "valid document of
//! an unknown shape" (constructor, representer). All stage variants carry a
//! [`MarkedError`], which pairs an optional context position ("while scanning
//! a quoted scalar, started here") with the position of the actual problem.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Result type for YAML pipeline operations.
pub type Result<T> = std::result::Result<T, YamlError>;

/// A position in an input stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Mark {
    /// Name of the originating stream, e.g. a file name or `<unicode string>`.
    pub name: Arc<str>,
    /// Zero-based character index.
    pub index: usize,
    /// Zero-based line number.
    pub line: usize,
    /// Zero-based column.
    pub column: usize,
}

impl Mark {
    pub fn new(name: Arc<str>, index: usize, line: usize, column: usize) -> Self {
        Self {
            name,
            index,
            line,
            column,
        }
    }

    /// A mark for values that were not read from any stream.
    pub fn synthetic() -> Self {
        Self::new(Arc::from("<synthetic>"), 0, 0, 0)
    }

    fn same_position(&self, other: &Mark) -> bool {
        self.name == other.name && self.line == other.line && self.column == other.column
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  in \"{}\", line {}, column {}",
            self.name,
            self.line + 1,
            self.column + 1
        )
    }
}

/// A problem description with up to two source positions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkedError {
    pub context: Option<String>,
    pub context_mark: Option<Mark>,
    pub problem: String,
    pub problem_mark: Option<Mark>,
    pub note: Option<String>,
    /// The offending source line with a caret under the problem column.
    pub snippet: Option<String>,
}

impl MarkedError {
    pub fn new(problem: impl Into<String>, mark: Option<Mark>) -> Self {
        Self {
            problem: problem.into(),
            problem_mark: mark,
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>, mark: Option<Mark>) -> Self {
        let context = context.into();
        if !context.is_empty() {
            self.context = Some(context);
        }
        self.context_mark = mark;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_snippet(mut self, snippet: Option<String>) -> Self {
        self.snippet = snippet;
        self
    }
}

impl fmt::Display for MarkedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<String> = Vec::new();
        if let Some(context) = &self.context {
            lines.push(context.clone());
        }
        if let Some(context_mark) = &self.context_mark {
            let shown_below = self
                .problem_mark
                .as_ref()
                .is_some_and(|m| m.same_position(context_mark));
            if !shown_below {
                lines.push(context_mark.to_string());
            }
        }
        if !self.problem.is_empty() {
            lines.push(self.problem.clone());
        }
        if let Some(problem_mark) = &self.problem_mark {
            lines.push(problem_mark.to_string());
            if let Some(snippet) = &self.snippet {
                lines.push(snippet.clone());
            }
        }
        if let Some(note) = &self.note {
            lines.push(note.clone());
        }
        write!(f, "{}", lines.join("\n"))
    }
}

/// Error type for the YAML pipeline, one variant per stage.
#[derive(Error, Debug)]
pub enum YamlError {
    /// Undecodable bytes or a non-printable character in the input.
    #[error("{0}")]
    Reader(MarkedError),

    /// Lexical error (unterminated scalar, bad escape, tab indentation...).
    #[error("{0}")]
    Scanner(MarkedError),

    /// Grammar error (unexpected token for the current parser state).
    #[error("{0}")]
    Parser(MarkedError),

    /// Node-tree error (undefined or recursive alias).
    #[error("{0}")]
    Composer(MarkedError),

    /// No constructor for a tag, or a node that cannot become a value.
    #[error("{0}")]
    Constructor(MarkedError),

    /// No representer for a value.
    #[error("{0}")]
    Representer(MarkedError),

    /// The event stream cannot be rendered as text.
    #[error("{0}")]
    Emitter(MarkedError),

    /// Failure of the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl YamlError {
    pub fn scanner(context: &str, context_mark: Option<Mark>, problem: &str, mark: Mark) -> Self {
        YamlError::Scanner(
            MarkedError::new(problem, Some(mark)).with_context(context, context_mark),
        )
    }

    pub fn parser(context: &str, context_mark: Option<Mark>, problem: &str, mark: Mark) -> Self {
        YamlError::Parser(
            MarkedError::new(problem, Some(mark)).with_context(context, context_mark),
        )
    }

    pub fn composer(context: &str, context_mark: Option<Mark>, problem: &str, mark: Mark) -> Self {
        YamlError::Composer(
            MarkedError::new(problem, Some(mark)).with_context(context, context_mark),
        )
    }

    pub fn constructor(problem: impl Into<String>, mark: Option<Mark>) -> Self {
        YamlError::Constructor(MarkedError::new(problem, mark))
    }

    pub fn representer(problem: impl Into<String>) -> Self {
        YamlError::Representer(MarkedError::new(problem, None))
    }

    pub fn emitter(problem: impl Into<String>) -> Self {
        YamlError::Emitter(MarkedError::new(problem, None))
    }

    /// The structured error, if this is a stage error.
    pub fn marked(&self) -> Option<&MarkedError> {
        match self {
            YamlError::Reader(e)
            | YamlError::Scanner(e)
            | YamlError::Parser(e)
            | YamlError::Composer(e)
            | YamlError::Constructor(e)
            | YamlError::Representer(e)
            | YamlError::Emitter(e) => Some(e),
            YamlError::Io(_) => None,
        }
    }

    /// Position of the problem, when known.
    pub fn mark(&self) -> Option<&Mark> {
        self.marked().and_then(|e| e.problem_mark.as_ref())
    }

    /// Whether only the current document is lost. Construction errors leave
    /// the token stream in sync, so a caller may continue with the next
    /// document; everything below the constructor is stream-fatal.
    pub fn is_document_scoped(&self) -> bool {
        matches!(self, YamlError::Constructor(_))
    }

    /// Attach the offending source line to a stage error.
    pub(crate) fn with_snippet(mut self, snippet: Option<String>) -> Self {
        match &mut self {
            YamlError::Reader(e)
            | YamlError::Scanner(e)
            | YamlError::Parser(e)
            | YamlError::Composer(e)
            | YamlError::Constructor(e)
            | YamlError::Representer(e)
            | YamlError::Emitter(e) => e.snippet = snippet,
            YamlError::Io(_) => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(line: usize, column: usize) -> Mark {
        Mark::new(Arc::from("<unicode string>"), 0, line, column)
    }

    #[test]
    fn test_display_with_context() {
        let err = YamlError::scanner(
            "while scanning a quoted scalar",
            Some(mark(0, 3)),
            "found unexpected end of stream",
            mark(2, 0),
        );
        assert_eq!(
            err.to_string(),
            "while scanning a quoted scalar\n  in \"<unicode string>\", line 1, column 4\n\
             found unexpected end of stream\n  in \"<unicode string>\", line 3, column 1"
        );
    }

    #[test]
    fn test_context_mark_not_repeated() {
        let err = YamlError::parser("while parsing", Some(mark(1, 1)), "boom", mark(1, 1));
        assert_eq!(
            err.to_string(),
            "while parsing\nboom\n  in \"<unicode string>\", line 2, column 2"
        );
    }

    #[test]
    fn test_document_scoped() {
        assert!(YamlError::constructor("unknown tag", None).is_document_scoped());
        assert!(!YamlError::scanner("", None, "x", mark(0, 0)).is_document_scoped());
    }
}
