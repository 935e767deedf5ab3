//! Phase 2: Parser
//!
//! The parser turns tokens into events. It is an explicit pushdown
//! automaton: `state` says what the grammar expects next and `states` holds
//! the states to resume once a nested node is complete. Each step consumes
//! zero or more tokens and yields exactly one event.
//!
//! Grammar (block and flow productions share the node rule):
//!
//! ```text
//! stream    ::= STREAM-START implicit_document? explicit_document* STREAM-END
//! document  ::= DIRECTIVE* DOCUMENT-START block_node? DOCUMENT-END*
//! block_node ::= ALIAS | properties? (block_content | indentless_sequence)
//! properties ::= TAG ANCHOR? | ANCHOR TAG?
//! ```
//!
//! Trivia of every consumed token is carried forward onto the next event.

use std::collections::HashMap;
use std::mem;

use crate::error::{Mark, Result, YamlError};
use crate::events::{default_tag_directives, CollectionEvent, Event, EventKind, ScalarEvent, TagDirective};
use crate::reader::Reader;
use crate::scanner::Scanner;
use crate::tokens::{Token, TokenKind, Trivia};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StreamStart,
    ImplicitDocumentStart,
    DocumentStart,
    DocumentContent,
    DocumentEnd,
    BlockNode,
    BlockSequenceFirstEntry,
    BlockSequenceEntry,
    IndentlessSequenceEntry,
    BlockMappingFirstKey,
    BlockMappingKey,
    BlockMappingValue,
    FlowSequenceFirstEntry,
    FlowSequenceEntry,
    FlowSequenceEntryMappingKey,
    FlowSequenceEntryMappingValue,
    FlowSequenceEntryMappingEnd,
    FlowMappingFirstKey,
    FlowMappingKey,
    FlowMappingValue,
    FlowMappingEmptyValue,
    End,
}

/// Converts a token stream into parsing events.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Option<Event>,
    state: State,
    states: Vec<State>,
    marks: Vec<Mark>,
    tag_handles: HashMap<String, String>,
    /// Trivia of consumed tokens not yet attached to an event.
    trivia: Vec<Trivia>,
    /// Whether the previous document was closed with `...`.
    closed_explicitly: bool,
}

impl<'a> Parser<'a> {
    pub fn new(reader: Reader<'a>) -> Self {
        Self::from_scanner(Scanner::new(reader))
    }

    pub fn from_scanner(scanner: Scanner<'a>) -> Self {
        Self {
            scanner,
            current: None,
            state: State::StreamStart,
            states: Vec::new(),
            marks: Vec::new(),
            tag_handles: HashMap::new(),
            trivia: Vec::new(),
            closed_explicitly: false,
        }
    }

    pub fn scanner(&mut self) -> &mut Scanner<'a> {
        &mut self.scanner
    }

    /// Whether another event is available.
    pub fn has_next_event(&mut self) -> Result<bool> {
        Ok(self.peek_event()?.is_some())
    }

    /// The next event without consuming it.
    pub fn peek_event(&mut self) -> Result<Option<&Event>> {
        if self.current.is_none() && self.state != State::End {
            let event = self.step()?;
            tracing::trace!(%event, "parsed event");
            self.current = Some(event);
        }
        Ok(self.current.as_ref())
    }

    /// Consume and return the next event.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        self.peek_event()?;
        Ok(self.current.take())
    }

    fn step(&mut self) -> Result<Event> {
        match self.state {
            State::StreamStart => self.parse_stream_start(),
            State::ImplicitDocumentStart => self.parse_implicit_document_start(),
            State::DocumentStart => self.parse_document_start(),
            State::DocumentContent => self.parse_document_content(),
            State::DocumentEnd => self.parse_document_end(),
            State::BlockNode => self.parse_node(true, false),
            State::BlockSequenceFirstEntry => self.parse_block_sequence_first_entry(),
            State::BlockSequenceEntry => self.parse_block_sequence_entry(),
            State::IndentlessSequenceEntry => self.parse_indentless_sequence_entry(),
            State::BlockMappingFirstKey => self.parse_block_mapping_first_key(),
            State::BlockMappingKey => self.parse_block_mapping_key(),
            State::BlockMappingValue => self.parse_block_mapping_value(),
            State::FlowSequenceFirstEntry => self.parse_flow_sequence_first_entry(),
            State::FlowSequenceEntry => self.parse_flow_sequence_entry(false),
            State::FlowSequenceEntryMappingKey => self.parse_flow_sequence_entry_mapping_key(),
            State::FlowSequenceEntryMappingValue => self.parse_flow_sequence_entry_mapping_value(),
            State::FlowSequenceEntryMappingEnd => self.parse_flow_sequence_entry_mapping_end(),
            State::FlowMappingFirstKey => self.parse_flow_mapping_first_key(),
            State::FlowMappingKey => self.parse_flow_mapping_key(false),
            State::FlowMappingValue => self.parse_flow_mapping_value(),
            State::FlowMappingEmptyValue => self.parse_flow_mapping_empty_value(),
            State::End => Err(YamlError::parser(
                "",
                None,
                "no more events",
                self.scanner.reader().mark(),
            )),
        }
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&mut self) -> Result<&Token> {
        let mark = self.scanner.reader().mark();
        self.scanner
            .peek_token()?
            .ok_or_else(|| YamlError::parser("", None, "unexpected end of the token stream", mark))
    }

    fn check(&mut self, predicate: impl Fn(&TokenKind) -> bool) -> Result<bool> {
        Ok(predicate(&self.peek()?.kind))
    }

    fn peek_start(&mut self) -> Result<Mark> {
        Ok(self.peek()?.start_mark.clone())
    }

    /// Consume the next token, keeping its trivia for the next event.
    fn take(&mut self) -> Result<Token> {
        self.peek()?;
        let Some(mut token) = self.scanner.next_token()? else {
            let mark = self.scanner.reader().mark();
            return Err(YamlError::parser("", None, "unexpected end of the token stream", mark));
        };
        self.trivia.append(&mut token.trivia);
        Ok(token)
    }

    fn event(&mut self, kind: EventKind, start_mark: Mark, end_mark: Mark) -> Event {
        Event::new(kind, start_mark, end_mark).with_trivia(mem::take(&mut self.trivia))
    }

    fn error(&self, context: &str, context_mark: Option<Mark>, problem: &str, mark: Mark) -> YamlError {
        let snippet = self.scanner.reader().snippet(&mark);
        YamlError::parser(context, context_mark, problem, mark).with_snippet(snippet)
    }

    fn unexpected(&mut self, context: &str, expected: &str) -> YamlError {
        let context_mark = self.marks.last().cloned();
        let (problem, mark) = match self.peek() {
            Ok(token) => (
                format!("expected {}, but found {}", expected, token.kind.name()),
                token.start_mark.clone(),
            ),
            Err(err) => return err,
        };
        self.error(context, context_mark, &problem, mark)
    }

    fn pop_state(&mut self) {
        self.state = self.states.pop().unwrap_or(State::End);
    }

    fn empty_scalar(&mut self, mark: Mark) -> Event {
        let scalar = ScalarEvent {
            implicit: (true, false),
            ..ScalarEvent::default()
        };
        self.event(EventKind::Scalar(scalar), mark.clone(), mark)
    }

    // ========================================================================
    // Stream and documents
    // ========================================================================

    fn parse_stream_start(&mut self) -> Result<Event> {
        let token = self.take()?;
        self.state = State::ImplicitDocumentStart;
        let encoding = self.scanner.reader().encoding();
        Ok(self.event(
            EventKind::StreamStart { encoding },
            token.start_mark,
            token.end_mark,
        ))
    }

    fn parse_implicit_document_start(&mut self) -> Result<Event> {
        let explicit = self.check(|k| {
            matches!(
                k,
                TokenKind::VersionDirective { .. }
                    | TokenKind::TagDirective { .. }
                    | TokenKind::DocumentStart
                    | TokenKind::StreamEnd
            )
        })?;
        if explicit {
            return self.parse_document_start();
        }
        self.open_implicit_document()
    }

    fn open_implicit_document(&mut self) -> Result<Event> {
        self.tag_handles = default_tag_directives()
            .into_iter()
            .map(|d| (d.handle, d.prefix))
            .collect();
        let mark = self.peek_start()?;
        self.states.push(State::DocumentEnd);
        self.state = State::BlockNode;
        tracing::debug!(line = mark.line, "implicit document start");
        Ok(self.event(
            EventKind::DocumentStart {
                explicit: false,
                version: None,
                tags: Vec::new(),
            },
            mark.clone(),
            mark,
        ))
    }

    fn parse_document_start(&mut self) -> Result<Event> {
        // Extra document end markers are allowed.
        while self.check(|k| matches!(k, TokenKind::DocumentEnd))? {
            self.take()?;
            self.closed_explicitly = true;
        }
        if self.check(|k| matches!(k, TokenKind::StreamEnd))? {
            let token = self.take()?;
            self.state = State::End;
            return Ok(self.event(EventKind::StreamEnd, token.start_mark, token.end_mark));
        }
        let bare = !self.check(|k| {
            matches!(
                k,
                TokenKind::VersionDirective { .. } | TokenKind::TagDirective { .. } | TokenKind::DocumentStart
            )
        })?;
        if bare && self.closed_explicitly {
            // A bare document may follow one closed with `...`.
            self.closed_explicitly = false;
            return self.open_implicit_document();
        }
        let start_mark = self.peek_start()?;
        let (version, tags) = self.process_directives()?;
        if !self.check(|k| matches!(k, TokenKind::DocumentStart))? {
            return Err(self.unexpected("", "<document start>"));
        }
        let token = self.take()?;
        self.states.push(State::DocumentEnd);
        self.state = State::DocumentContent;
        self.closed_explicitly = false;
        tracing::debug!(line = start_mark.line, ?version, "explicit document start");
        Ok(self.event(
            EventKind::DocumentStart {
                explicit: true,
                version,
                tags,
            },
            start_mark,
            token.end_mark,
        ))
    }

    fn parse_document_end(&mut self) -> Result<Event> {
        let start_mark = self.peek_start()?;
        let mut end_mark = start_mark.clone();
        let explicit = self.check(|k| matches!(k, TokenKind::DocumentEnd))?;
        if explicit {
            end_mark = self.take()?.end_mark;
        } else if self.check(|k| matches!(k, TokenKind::StreamEnd))? {
            // Comments after the last node belong to this document.
            let mut trailing = self.scanner.take_next_trivia()?;
            self.trivia.append(&mut trailing);
        }
        self.closed_explicitly = explicit;
        self.state = State::DocumentStart;
        Ok(self.event(EventKind::DocumentEnd { explicit }, start_mark, end_mark))
    }

    fn parse_document_content(&mut self) -> Result<Event> {
        let empty = self.check(|k| {
            matches!(
                k,
                TokenKind::VersionDirective { .. }
                    | TokenKind::TagDirective { .. }
                    | TokenKind::DocumentStart
                    | TokenKind::DocumentEnd
                    | TokenKind::StreamEnd
            )
        })?;
        if empty {
            let mark = self.peek_start()?;
            self.pop_state();
            Ok(self.empty_scalar(mark))
        } else {
            self.parse_node(true, false)
        }
    }

    fn process_directives(&mut self) -> Result<(Option<(u32, u32)>, Vec<TagDirective>)> {
        let mut version = None;
        let mut tags: Vec<TagDirective> = Vec::new();
        self.tag_handles.clear();
        loop {
            let is_directive = self.check(|k| {
                matches!(k, TokenKind::VersionDirective { .. } | TokenKind::TagDirective { .. })
            })?;
            if !is_directive {
                break;
            }
            let token = self.take()?;
            match token.kind {
                TokenKind::VersionDirective { major, minor } => {
                    if version.is_some() {
                        return Err(self.error("", None, "found duplicate YAML directive", token.start_mark));
                    }
                    if major != 1 {
                        return Err(self.error(
                            "",
                            None,
                            "found incompatible YAML document (version 1.* is required)",
                            token.start_mark,
                        ));
                    }
                    version = Some((major, minor));
                }
                TokenKind::TagDirective { handle, prefix } => {
                    if self.tag_handles.contains_key(&handle) {
                        return Err(self.error(
                            "",
                            None,
                            &format!("duplicate tag handle {:?}", handle),
                            token.start_mark,
                        ));
                    }
                    self.tag_handles.insert(handle.clone(), prefix.clone());
                    tags.push(TagDirective { handle, prefix });
                }
                _ => {}
            }
        }
        for default in default_tag_directives() {
            self.tag_handles.entry(default.handle).or_insert(default.prefix);
        }
        Ok((version, tags))
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn parse_node(&mut self, block: bool, indentless_sequence: bool) -> Result<Event> {
        if self.check(|k| matches!(k, TokenKind::Alias(_)))? {
            let token = self.take()?;
            self.pop_state();
            if let TokenKind::Alias(anchor) = token.kind {
                return Ok(self.event(EventKind::Alias { anchor }, token.start_mark, token.end_mark));
            }
            return Err(self.error("while parsing a node", None, "expected an alias", token.start_mark));
        }

        let mut anchor: Option<String> = None;
        let mut tag_parts: Option<(String, String)> = None;
        let mut start_mark: Option<Mark> = None;
        let mut tag_mark: Option<Mark> = None;
        let mut end_mark: Option<Mark> = None;
        loop {
            let next = self.peek()?;
            let is_anchor = matches!(next.kind, TokenKind::Anchor(_));
            let is_tag = matches!(next.kind, TokenKind::Tag { .. });
            let mark = next.start_mark.clone();
            if !is_anchor && !is_tag {
                break;
            }
            if is_anchor && anchor.is_some() {
                return Err(self.error("while parsing a node", start_mark, "found duplicate anchor", mark));
            }
            if is_tag && tag_parts.is_some() {
                return Err(self.error("while parsing a node", start_mark, "found duplicate tag", mark));
            }
            let token = self.take()?;
            if start_mark.is_none() {
                start_mark = Some(token.start_mark.clone());
            }
            end_mark = Some(token.end_mark.clone());
            match token.kind {
                TokenKind::Anchor(name) => anchor = Some(name),
                TokenKind::Tag { handle, suffix } => {
                    tag_mark = Some(token.start_mark);
                    tag_parts = Some((handle, suffix));
                }
                _ => {}
            }
        }

        let tag = match tag_parts {
            None => None,
            Some((handle, suffix)) if handle.is_empty() => Some(suffix),
            Some((handle, suffix)) => match self.tag_handles.get(&handle) {
                Some(prefix) => Some(format!("{}{}", prefix, suffix)),
                None => {
                    let mark = tag_mark.unwrap_or_else(Mark::synthetic);
                    return Err(self.error(
                        "while parsing a node",
                        start_mark,
                        &format!("found undefined tag handle {:?}", handle),
                        mark,
                    ));
                }
            },
        };

        let start_mark = match start_mark {
            Some(mark) => mark,
            None => self.peek_start()?,
        };
        let end_mark = end_mark.unwrap_or_else(|| start_mark.clone());
        let non_specific = tag.as_deref() == Some("!");
        let implicit = tag.is_none() || non_specific;

        let next = self.peek()?;
        let next_end = next.end_mark.clone();
        let next_start = next.start_mark.clone();
        let next_name = next.kind.name();
        let content = match next.kind {
            TokenKind::BlockEntry if indentless_sequence => Some((State::IndentlessSequenceEntry, false, false)),
            TokenKind::FlowSequenceStart => Some((State::FlowSequenceFirstEntry, false, true)),
            TokenKind::FlowMappingStart => Some((State::FlowMappingFirstKey, true, true)),
            TokenKind::BlockSequenceStart if block => Some((State::BlockSequenceFirstEntry, false, false)),
            TokenKind::BlockMappingStart if block => Some((State::BlockMappingFirstKey, true, false)),
            _ => None,
        };
        let is_scalar = matches!(next.kind, TokenKind::Scalar(_));

        if let Some((state, mapping, flow)) = content {
            // Comments before the opening token belong to the collection.
            let mut leading = self.scanner.take_next_trivia()?;
            self.trivia.append(&mut leading);
            self.state = state;
            let collection = CollectionEvent {
                anchor,
                tag,
                implicit,
                flow,
                indent: None,
            };
            let kind = if mapping {
                EventKind::MappingStart(collection)
            } else {
                EventKind::SequenceStart(collection)
            };
            // Block collections end their start event at the column of
            // their first entry.
            let end = if flow { next_end } else { next_start };
            return Ok(self.event(kind, start_mark, end));
        }

        if is_scalar {
            let token = self.take()?;
            self.pop_state();
            let TokenKind::Scalar(scalar) = token.kind else {
                return Err(self.error("while parsing a node", Some(start_mark), "expected a scalar", token.start_mark));
            };
            let implicit = if (scalar.plain && tag.is_none()) || non_specific {
                (true, false)
            } else if tag.is_none() {
                (false, true)
            } else {
                (false, false)
            };
            let event = ScalarEvent::from_token(anchor, tag, implicit, scalar);
            return Ok(self.event(EventKind::Scalar(event), start_mark, token.end_mark));
        }

        if anchor.is_some() || tag.is_some() {
            // Properties without content: an empty scalar.
            self.pop_state();
            let scalar = ScalarEvent {
                anchor,
                tag,
                implicit: (implicit, false),
                ..ScalarEvent::default()
            };
            return Ok(self.event(EventKind::Scalar(scalar), start_mark, end_mark));
        }

        let context = if block {
            "while parsing a block node"
        } else {
            "while parsing a flow node"
        };
        let problem = format!("expected the node content, but found {}", next_name);
        Err(self.error(context, Some(start_mark), &problem, next_start))
    }

    // ========================================================================
    // Block collections
    // ========================================================================

    fn parse_block_sequence_first_entry(&mut self) -> Result<Event> {
        let token = self.take()?;
        self.marks.push(token.start_mark);
        self.parse_block_sequence_entry()
    }

    fn parse_block_sequence_entry(&mut self) -> Result<Event> {
        if self.check(|k| matches!(k, TokenKind::BlockEntry))? {
            let token = self.take()?;
            if !self.check(|k| matches!(k, TokenKind::BlockEntry | TokenKind::BlockEnd))? {
                self.states.push(State::BlockSequenceEntry);
                return self.parse_node(true, false);
            }
            self.state = State::BlockSequenceEntry;
            return Ok(self.empty_scalar(token.end_mark));
        }
        if !self.check(|k| matches!(k, TokenKind::BlockEnd))? {
            return Err(self.unexpected("while parsing a block collection", "<block end>"));
        }
        let token = self.take()?;
        self.pop_state();
        self.marks.pop();
        Ok(self.event(EventKind::SequenceEnd, token.start_mark, token.end_mark))
    }

    fn parse_indentless_sequence_entry(&mut self) -> Result<Event> {
        if self.check(|k| matches!(k, TokenKind::BlockEntry))? {
            let token = self.take()?;
            let empty = self.check(|k| {
                matches!(
                    k,
                    TokenKind::BlockEntry | TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd
                )
            })?;
            if !empty {
                self.states.push(State::IndentlessSequenceEntry);
                return self.parse_node(true, false);
            }
            self.state = State::IndentlessSequenceEntry;
            return Ok(self.empty_scalar(token.end_mark));
        }
        let mark = self.peek_start()?;
        self.pop_state();
        Ok(self.event(EventKind::SequenceEnd, mark.clone(), mark))
    }

    fn parse_block_mapping_first_key(&mut self) -> Result<Event> {
        let token = self.take()?;
        self.marks.push(token.start_mark);
        self.parse_block_mapping_key()
    }

    fn parse_block_mapping_key(&mut self) -> Result<Event> {
        if self.check(|k| matches!(k, TokenKind::Key))? {
            let token = self.take()?;
            if !self.check(|k| matches!(k, TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd))? {
                self.states.push(State::BlockMappingValue);
                return self.parse_node(true, true);
            }
            self.state = State::BlockMappingValue;
            return Ok(self.empty_scalar(token.end_mark));
        }
        if !self.check(|k| matches!(k, TokenKind::BlockEnd))? {
            return Err(self.unexpected("while parsing a block mapping", "<block end>"));
        }
        let token = self.take()?;
        self.pop_state();
        self.marks.pop();
        Ok(self.event(EventKind::MappingEnd, token.start_mark, token.end_mark))
    }

    fn parse_block_mapping_value(&mut self) -> Result<Event> {
        if self.check(|k| matches!(k, TokenKind::Value))? {
            let token = self.take()?;
            if !self.check(|k| matches!(k, TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd))? {
                self.states.push(State::BlockMappingKey);
                return self.parse_node(true, true);
            }
            self.state = State::BlockMappingKey;
            return Ok(self.empty_scalar(token.end_mark));
        }
        self.state = State::BlockMappingKey;
        let mark = self.peek_start()?;
        Ok(self.empty_scalar(mark))
    }

    // ========================================================================
    // Flow collections
    // ========================================================================

    fn parse_flow_sequence_first_entry(&mut self) -> Result<Event> {
        let token = self.take()?;
        self.marks.push(token.start_mark);
        self.parse_flow_sequence_entry(true)
    }

    fn parse_flow_sequence_entry(&mut self, first: bool) -> Result<Event> {
        if !self.check(|k| matches!(k, TokenKind::FlowSequenceEnd))? {
            if !first {
                if self.check(|k| matches!(k, TokenKind::FlowEntry))? {
                    self.take()?;
                } else {
                    return Err(self.unexpected("while parsing a flow sequence", "',' or ']'"));
                }
            }
            if self.check(|k| matches!(k, TokenKind::Key))? {
                let token = self.peek()?;
                let (start, end) = (token.start_mark.clone(), token.end_mark.clone());
                self.state = State::FlowSequenceEntryMappingKey;
                let kind = EventKind::MappingStart(CollectionEvent {
                    implicit: true,
                    flow: true,
                    ..CollectionEvent::default()
                });
                return Ok(self.event(kind, start, end));
            }
            if !self.check(|k| matches!(k, TokenKind::FlowSequenceEnd))? {
                self.states.push(State::FlowSequenceEntry);
                return self.parse_node(false, false);
            }
        }
        let token = self.take()?;
        self.pop_state();
        self.marks.pop();
        Ok(self.event(EventKind::SequenceEnd, token.start_mark, token.end_mark))
    }

    fn parse_flow_sequence_entry_mapping_key(&mut self) -> Result<Event> {
        let token = self.take()?;
        let empty = self.check(|k| {
            matches!(k, TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowSequenceEnd)
        })?;
        if !empty {
            self.states.push(State::FlowSequenceEntryMappingValue);
            return self.parse_node(false, false);
        }
        self.state = State::FlowSequenceEntryMappingValue;
        Ok(self.empty_scalar(token.end_mark))
    }

    fn parse_flow_sequence_entry_mapping_value(&mut self) -> Result<Event> {
        if self.check(|k| matches!(k, TokenKind::Value))? {
            let token = self.take()?;
            if !self.check(|k| matches!(k, TokenKind::FlowEntry | TokenKind::FlowSequenceEnd))? {
                self.states.push(State::FlowSequenceEntryMappingEnd);
                return self.parse_node(false, false);
            }
            self.state = State::FlowSequenceEntryMappingEnd;
            return Ok(self.empty_scalar(token.end_mark));
        }
        self.state = State::FlowSequenceEntryMappingEnd;
        let mark = self.peek_start()?;
        Ok(self.empty_scalar(mark))
    }

    fn parse_flow_sequence_entry_mapping_end(&mut self) -> Result<Event> {
        self.state = State::FlowSequenceEntry;
        let mark = self.peek_start()?;
        Ok(self.event(EventKind::MappingEnd, mark.clone(), mark))
    }

    fn parse_flow_mapping_first_key(&mut self) -> Result<Event> {
        let token = self.take()?;
        self.marks.push(token.start_mark);
        self.parse_flow_mapping_key(true)
    }

    fn parse_flow_mapping_key(&mut self, first: bool) -> Result<Event> {
        if !self.check(|k| matches!(k, TokenKind::FlowMappingEnd))? {
            if !first {
                if self.check(|k| matches!(k, TokenKind::FlowEntry))? {
                    self.take()?;
                } else {
                    return Err(self.unexpected("while parsing a flow mapping", "',' or '}'"));
                }
            }
            if self.check(|k| matches!(k, TokenKind::Key))? {
                let token = self.take()?;
                let empty = self.check(|k| {
                    matches!(k, TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowMappingEnd)
                })?;
                if !empty {
                    self.states.push(State::FlowMappingValue);
                    return self.parse_node(false, false);
                }
                self.state = State::FlowMappingValue;
                return Ok(self.empty_scalar(token.end_mark));
            }
            if !self.check(|k| matches!(k, TokenKind::FlowMappingEnd))? {
                self.states.push(State::FlowMappingEmptyValue);
                return self.parse_node(false, false);
            }
        }
        let token = self.take()?;
        self.pop_state();
        self.marks.pop();
        Ok(self.event(EventKind::MappingEnd, token.start_mark, token.end_mark))
    }

    fn parse_flow_mapping_value(&mut self) -> Result<Event> {
        if self.check(|k| matches!(k, TokenKind::Value))? {
            let token = self.take()?;
            if !self.check(|k| matches!(k, TokenKind::FlowEntry | TokenKind::FlowMappingEnd))? {
                self.states.push(State::FlowMappingKey);
                return self.parse_node(false, false);
            }
            self.state = State::FlowMappingKey;
            return Ok(self.empty_scalar(token.end_mark));
        }
        self.state = State::FlowMappingKey;
        let mark = self.peek_start()?;
        Ok(self.empty_scalar(mark))
    }

    fn parse_flow_mapping_empty_value(&mut self) -> Result<Event> {
        self.state = State::FlowMappingKey;
        let mark = self.peek_start()?;
        Ok(self.empty_scalar(mark))
    }
}

/// Parse a whole string into events.
pub fn parse_str(input: &str) -> Result<Vec<Event>> {
    let mut parser = Parser::new(Reader::from_str(input, "<unicode string>")?);
    let mut events = Vec::new();
    while let Some(event) = parser.next_event()? {
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{Comment, ScalarStyle};
    use rstest::rstest;

    fn render(input: &str) -> String {
        parse_str(input)
            .unwrap()
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_block_mapping_events() {
        assert_eq!(
            render("a: 1\nb: [x, y]\n"),
            "+STR\n+DOC\n+MAP\n=VAL :a\n=VAL :1\n=VAL :b\n+SEQ []\n=VAL :x\n=VAL :y\n-SEQ\n-MAP\n-DOC\n-STR"
        );
    }

    #[test]
    fn test_indentless_sequence_and_empty_values() {
        assert_eq!(
            render("k:\n- a\n-\nv:\n"),
            "+STR\n+DOC\n+MAP\n=VAL :k\n+SEQ\n=VAL :a\n=VAL :\n-SEQ\n=VAL :v\n=VAL :\n-MAP\n-DOC\n-STR"
        );
    }

    #[test]
    fn test_properties_and_alias() {
        assert_eq!(
            render("--- !!map &m\nx: &a 1\ny: *a\n..."),
            "+STR\n+DOC ---\n+MAP &m <tag:yaml.org,2002:map>\n=VAL :x\n=VAL &a :1\n=VAL :y\n=ALI *a\n-MAP\n-DOC ...\n-STR"
        );
    }

    #[test]
    fn test_tag_directive_expansion() {
        let events = parse_str("%TAG !e! tag:example.com,2000:\n--- !e!foo bar\n").unwrap();
        let EventKind::Scalar(scalar) = &events[2].kind else {
            panic!("expected scalar, got {:?}", events[2]);
        };
        assert_eq!(scalar.tag.as_deref(), Some("tag:example.com,2000:foo"));
        assert_eq!(scalar.implicit, (false, false));
        let EventKind::DocumentStart { tags, .. } = &events[1].kind else {
            panic!("expected document start");
        };
        assert_eq!(tags, &vec![TagDirective::new("!e!", "tag:example.com,2000:")]);
    }

    #[test]
    fn test_scalar_implicit_flags() {
        let events = parse_str("- plain\n- 'quoted'\n- ! bare\n").unwrap();
        let flags: Vec<(bool, bool)> = events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Scalar(s) => Some(s.implicit),
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![(true, false), (false, true), (true, false)]);
    }

    #[test]
    fn test_multiple_documents() {
        assert_eq!(
            render("a\n--- b\n...\nc\n"),
            "+STR\n+DOC\n=VAL :a\n-DOC\n+DOC ---\n=VAL :b\n-DOC ...\n+DOC\n=VAL :c\n-DOC\n-STR"
        );
    }

    #[test]
    fn test_flow_pairs_in_sequence() {
        assert_eq!(
            render("[a: 1, b]"),
            "+STR\n+DOC\n+SEQ []\n+MAP {}\n=VAL :a\n=VAL :1\n-MAP\n=VAL :b\n-SEQ\n-DOC\n-STR"
        );
    }

    #[test]
    fn test_trivia_reaches_events() {
        let events = parse_str("# head\na: 1\n# tail\n").unwrap();
        let map_start = events
            .iter()
            .find(|e| matches!(e.kind, EventKind::MappingStart(_)))
            .unwrap();
        assert_eq!(map_start.trivia, vec![Trivia::Line(Comment::new("# head", 0))]);
        let map_end = events
            .iter()
            .find(|e| matches!(e.kind, EventKind::MappingEnd))
            .unwrap();
        assert_eq!(map_end.trivia, vec![Trivia::Line(Comment::new("# tail", 0))]);
    }

    #[test]
    fn test_trailing_trivia_of_scalar_document() {
        let events = parse_str("hello\n\n# bye\n").unwrap();
        let doc_end = events
            .iter()
            .find(|e| matches!(e.kind, EventKind::DocumentEnd { .. }))
            .unwrap();
        assert_eq!(
            doc_end.trivia,
            vec![Trivia::Blank, Trivia::Line(Comment::new("# bye", 0))]
        );
    }

    #[test]
    fn test_block_scalar_style_survives() {
        let events = parse_str("k: |-\n  text\n").unwrap();
        let style = events.iter().find_map(|e| match &e.kind {
            EventKind::Scalar(s) if s.value == "text" => s.style,
            _ => None,
        });
        assert_eq!(style, Some(ScalarStyle::Literal));
    }

    #[rstest]
    #[case("[a, b}", "expected ',' or ']', but found '}'")]
    #[case("{a: 1]", "expected ',' or '}', but found ']'")]
    #[case("- a\nb: 1\n", "expected <block end>, but found '?'")]
    #[case("&a &b x", "found duplicate anchor")]
    #[case("!x!y z", "found undefined tag handle \"!x!\"")]
    #[case("%YAML 2.0\n--- x", "found incompatible YAML document (version 1.* is required)")]
    #[case("%YAML 1.2\n%YAML 1.2\n--- x", "found duplicate YAML directive")]
    #[case("a\n--- b\nc: d\n", "mapping values are not allowed here")]
    fn test_parser_errors(#[case] input: &str, #[case] problem: &str) {
        let err = parse_str(input).unwrap_err();
        assert_eq!(err.marked().unwrap().problem, problem, "{}", err);
    }
}
