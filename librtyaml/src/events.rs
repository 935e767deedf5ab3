//! Parsing events, the unit exchanged between the parser and the composer
//! on the way in and between the serializer and the emitter on the way out.

use std::fmt;

use crate::error::Mark;
use crate::reader::Encoding;
use crate::tokens::{Chomping, Comment, ScalarStyle, ScalarToken, Trivia};

/// A `%TAG` directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagDirective {
    pub handle: String,
    pub prefix: String,
}

impl TagDirective {
    pub fn new(handle: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            prefix: prefix.into(),
        }
    }
}

/// Handles that are always defined.
pub fn default_tag_directives() -> Vec<TagDirective> {
    vec![
        TagDirective::new("!", "!"),
        TagDirective::new("!!", "tag:yaml.org,2002:"),
    ]
}

/// Scalar payload of an event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScalarEvent {
    pub anchor: Option<String>,
    pub tag: Option<String>,
    /// Whether the tag may be omitted when the scalar is written plain, and
    /// when it is written in any other style.
    pub implicit: (bool, bool),
    pub value: String,
    /// Requested style; the emitter chooses one when `None`.
    pub style: Option<ScalarStyle>,
    pub chomping: Option<Chomping>,
    pub indent_indicator: Option<usize>,
    /// Original text, see [`ScalarToken::source`].
    pub source: Option<String>,
    pub header_comment: Option<Comment>,
}

impl ScalarEvent {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub(crate) fn from_token(
        anchor: Option<String>,
        tag: Option<String>,
        implicit: (bool, bool),
        token: ScalarToken,
    ) -> Self {
        Self {
            anchor,
            tag,
            implicit,
            value: token.value,
            style: Some(token.style),
            chomping: token.chomping,
            indent_indicator: token.indent_indicator,
            source: token.source,
            header_comment: token.header_comment,
        }
    }
}

/// Start of a sequence or mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionEvent {
    pub anchor: Option<String>,
    pub tag: Option<String>,
    /// Whether the tag may be omitted.
    pub implicit: bool,
    pub flow: bool,
    /// Requested offset of a block collection from its parent's indentation.
    pub indent: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    StreamStart {
        encoding: Option<Encoding>,
    },
    StreamEnd,
    DocumentStart {
        explicit: bool,
        version: Option<(u32, u32)>,
        tags: Vec<TagDirective>,
    },
    DocumentEnd {
        explicit: bool,
    },
    Alias {
        anchor: String,
    },
    Scalar(ScalarEvent),
    SequenceStart(CollectionEvent),
    SequenceEnd,
    MappingStart(CollectionEvent),
    MappingEnd,
}

/// A parsing event with its span and the trivia read before it.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub start_mark: Mark,
    pub end_mark: Mark,
    pub trivia: Vec<Trivia>,
}

impl Event {
    pub fn new(kind: EventKind, start_mark: Mark, end_mark: Mark) -> Self {
        Self {
            kind,
            start_mark,
            end_mark,
            trivia: Vec::new(),
        }
    }

    /// An event that was not read from any stream.
    pub fn synthetic(kind: EventKind) -> Self {
        Self::new(kind, Mark::synthetic(), Mark::synthetic())
    }

    pub fn with_trivia(mut self, trivia: Vec<Trivia>) -> Self {
        self.trivia = trivia;
        self
    }

    /// The anchor of a node event.
    pub fn anchor(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Scalar(s) => s.anchor.as_deref(),
            EventKind::SequenceStart(c) | EventKind::MappingStart(c) => c.anchor.as_deref(),
            EventKind::Alias { anchor } => Some(anchor),
            _ => None,
        }
    }

    pub fn is_collection_end(&self) -> bool {
        matches!(self.kind, EventKind::SequenceEnd | EventKind::MappingEnd)
    }
}

fn escape_test_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\x08' => out.push_str("\\b"),
            _ => out.push(ch),
        }
    }
    out
}

fn write_properties(f: &mut fmt::Formatter<'_>, anchor: &Option<String>, tag: &Option<String>) -> fmt::Result {
    if let Some(anchor) = anchor {
        write!(f, " &{}", anchor)?;
    }
    if let Some(tag) = tag {
        write!(f, " <{}>", tag)?;
    }
    Ok(())
}

/// One line per event, in the notation of the YAML test suite
/// (`+MAP`, `=VAL :text`, `-DOC ...`).
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::StreamStart { .. } => write!(f, "+STR"),
            EventKind::StreamEnd => write!(f, "-STR"),
            EventKind::DocumentStart { explicit, .. } => {
                write!(f, "+DOC{}", if *explicit { " ---" } else { "" })
            }
            EventKind::DocumentEnd { explicit } => {
                write!(f, "-DOC{}", if *explicit { " ..." } else { "" })
            }
            EventKind::Alias { anchor } => write!(f, "=ALI *{}", anchor),
            EventKind::Scalar(s) => {
                write!(f, "=VAL")?;
                write_properties(f, &s.anchor, &s.tag)?;
                let indicator = s.style.and_then(ScalarStyle::indicator).unwrap_or(':');
                write!(f, " {}{}", indicator, escape_test_value(&s.value))
            }
            EventKind::SequenceStart(c) => {
                write!(f, "+SEQ{}", if c.flow { " []" } else { "" })?;
                write_properties(f, &c.anchor, &c.tag)
            }
            EventKind::SequenceEnd => write!(f, "-SEQ"),
            EventKind::MappingStart(c) => {
                write!(f, "+MAP{}", if c.flow { " {}" } else { "" })?;
                write_properties(f, &c.anchor, &c.tag)
            }
            EventKind::MappingEnd => write!(f, "-MAP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_scalar() {
        let mut scalar = ScalarEvent::new("a\nb");
        scalar.anchor = Some("x".into());
        scalar.tag = Some("tag:yaml.org,2002:str".into());
        scalar.style = Some(ScalarStyle::Literal);
        let event = Event::synthetic(EventKind::Scalar(scalar));
        assert_eq!(event.to_string(), "=VAL &x <tag:yaml.org,2002:str> |a\\nb");
    }

    #[test]
    fn test_display_collections() {
        let flow = CollectionEvent {
            flow: true,
            ..CollectionEvent::default()
        };
        assert_eq!(
            Event::synthetic(EventKind::SequenceStart(flow)).to_string(),
            "+SEQ []"
        );
        assert_eq!(
            Event::synthetic(EventKind::MappingStart(CollectionEvent::default())).to_string(),
            "+MAP"
        );
        assert_eq!(
            Event::synthetic(EventKind::DocumentEnd { explicit: true }).to_string(),
            "-DOC ..."
        );
    }
}
