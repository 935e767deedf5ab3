//! Lexical tokens and the trivia (comments, blank lines) attached to them.

use std::fmt;

use crate::error::Mark;

/// Presentation style of a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl ScalarStyle {
    /// The indicator character used in the source (`'`, `"`, `|`, `>`).
    pub fn indicator(self) -> Option<char> {
        match self {
            ScalarStyle::Plain => None,
            ScalarStyle::SingleQuoted => Some('\''),
            ScalarStyle::DoubleQuoted => Some('"'),
            ScalarStyle::Literal => Some('|'),
            ScalarStyle::Folded => Some('>'),
        }
    }

    pub fn is_block(self) -> bool {
        matches!(self, ScalarStyle::Literal | ScalarStyle::Folded)
    }
}

/// Block scalar chomping indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Chomping {
    /// `-`: discard all trailing line breaks.
    Strip,
    /// no indicator: keep exactly one trailing line break.
    #[default]
    Clip,
    /// `+`: keep every trailing line break.
    Keep,
}

impl Chomping {
    pub fn indicator(self) -> &'static str {
        match self {
            Chomping::Strip => "-",
            Chomping::Clip => "",
            Chomping::Keep => "+",
        }
    }

    /// Whether a block scalar with this indicator can reproduce `value`.
    pub fn fits(self, value: &str) -> bool {
        let trailing = value.chars().rev().take_while(|&c| c == '\n').count();
        match self {
            Chomping::Strip => trailing == 0,
            Chomping::Clip => trailing == 1,
            Chomping::Keep => trailing >= 1,
        }
    }
}

/// A comment as it appeared in the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comment {
    /// Text starting at `#`, without the line break.
    pub text: String,
    /// Column of the `#` in the source.
    pub column: usize,
}

impl Comment {
    pub fn new(text: impl Into<String>, column: usize) -> Self {
        Self {
            text: text.into(),
            column,
        }
    }
}

/// Non-semantic content between tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trivia {
    /// A comment on the same line as the preceding token.
    Eol(Comment),
    /// A comment on a line of its own.
    Line(Comment),
    /// An empty line.
    Blank,
}

impl Trivia {
    pub fn is_eol(&self) -> bool {
        matches!(self, Trivia::Eol(_))
    }
}

/// Split a leading end-of-line comment off a trivia list.
pub fn split_eol(trivia: &mut Vec<Trivia>) -> Option<Comment> {
    match trivia.first() {
        Some(Trivia::Eol(_)) => match trivia.remove(0) {
            Trivia::Eol(comment) => Some(comment),
            _ => None,
        },
        _ => None,
    }
}

/// Token type produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    StreamStart,
    StreamEnd,
    VersionDirective { major: u32, minor: u32 },
    TagDirective { handle: String, prefix: String },
    DocumentStart,
    DocumentEnd,
    BlockSequenceStart,
    BlockMappingStart,
    BlockEnd,
    FlowSequenceStart,
    FlowSequenceEnd,
    FlowMappingStart,
    FlowMappingEnd,
    BlockEntry,
    FlowEntry,
    Key,
    Value,
    Alias(String),
    Anchor(String),
    Tag { handle: String, suffix: String },
    Scalar(ScalarToken),
}

/// Payload of a scalar token.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarToken {
    /// Decoded text.
    pub value: String,
    pub plain: bool,
    pub style: ScalarStyle,
    /// Chomping indicator of a block scalar.
    pub chomping: Option<Chomping>,
    /// Explicit indentation indicator of a block scalar.
    pub indent_indicator: Option<usize>,
    /// Original source text, for scalars written on a single line and for
    /// folded block bodies (lines relative to the block indentation).
    pub source: Option<String>,
    /// Comment following a block scalar header (`key: |  # note`).
    pub header_comment: Option<Comment>,
}

impl ScalarToken {
    pub fn new(value: impl Into<String>, style: ScalarStyle) -> Self {
        Self {
            value: value.into(),
            plain: style == ScalarStyle::Plain,
            style,
            chomping: None,
            indent_indicator: None,
            source: None,
            header_comment: None,
        }
    }
}

impl TokenKind {
    /// Short name used in diagnostics, e.g. `'<block end>'`.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::StreamStart => "<stream start>",
            TokenKind::StreamEnd => "<stream end>",
            TokenKind::VersionDirective { .. } | TokenKind::TagDirective { .. } => "<directive>",
            TokenKind::DocumentStart => "<document start>",
            TokenKind::DocumentEnd => "<document end>",
            TokenKind::BlockSequenceStart => "<block sequence start>",
            TokenKind::BlockMappingStart => "<block mapping start>",
            TokenKind::BlockEnd => "<block end>",
            TokenKind::FlowSequenceStart => "'['",
            TokenKind::FlowSequenceEnd => "']'",
            TokenKind::FlowMappingStart => "'{'",
            TokenKind::FlowMappingEnd => "'}'",
            TokenKind::BlockEntry => "'-'",
            TokenKind::FlowEntry => "','",
            TokenKind::Key => "'?'",
            TokenKind::Value => "':'",
            TokenKind::Alias(_) => "<alias>",
            TokenKind::Anchor(_) => "<anchor>",
            TokenKind::Tag { .. } => "<tag>",
            TokenKind::Scalar(_) => "<scalar>",
        }
    }
}

/// A lexical unit with its source span and the trivia preceding it.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start_mark: Mark,
    pub end_mark: Mark,
    pub trivia: Vec<Trivia>,
}

impl Token {
    pub fn new(kind: TokenKind, start_mark: Mark, end_mark: Mark) -> Self {
        Self {
            kind,
            start_mark,
            end_mark,
            trivia: Vec::new(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Scalar(s) => write!(f, "Scalar({:?}, {:?})", s.value, s.style),
            TokenKind::Alias(name) => write!(f, "Alias({})", name),
            TokenKind::Anchor(name) => write!(f, "Anchor({})", name),
            TokenKind::Tag { handle, suffix } => write!(f, "Tag({}{})", handle, suffix),
            TokenKind::VersionDirective { major, minor } => {
                write!(f, "VersionDirective({}.{})", major, minor)
            }
            TokenKind::TagDirective { handle, prefix } => {
                write!(f, "TagDirective({} {})", handle, prefix)
            }
            other => write!(f, "{}", other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chomping_fits() {
        assert!(Chomping::Strip.fits("a"));
        assert!(!Chomping::Strip.fits("a\n"));
        assert!(Chomping::Clip.fits("a\n"));
        assert!(!Chomping::Clip.fits("a\n\n"));
        assert!(Chomping::Keep.fits("a\n"));
        assert!(Chomping::Keep.fits("a\n\n\n"));
        assert!(!Chomping::Keep.fits("a"));
    }

    #[test]
    fn test_split_eol() {
        let mut trivia = vec![Trivia::Eol(Comment::new("# a", 5)), Trivia::Blank];
        assert_eq!(split_eol(&mut trivia), Some(Comment::new("# a", 5)));
        assert_eq!(trivia, vec![Trivia::Blank]);
        assert_eq!(split_eol(&mut trivia), None);
    }
}
