//! Phase 1, reversed: Emitter
//!
//! A state machine that turns events into YAML text. Each state handles one
//! event and pushes the state to return to when a nested node finishes.
//! Collection starts are held back until enough of the following events
//! are buffered to decide between block and flow style and whether a key
//! fits on one line.
//!
//! Trivia carried by events is written back as comments and blank lines:
//! before `---`, before block entries, before a collection closes, and
//! before a node. Comments inside flow collections are dropped.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::dumper::DumperOptions;
use crate::error::{Result, YamlError};
use crate::events::{CollectionEvent, Event, EventKind, ScalarEvent, TagDirective};
use crate::resolver::SET;
use crate::serializer::EventSink;
use crate::tokens::{Chomping, Comment, ScalarStyle, Trivia};

const DEFAULT_TAG_PREFIXES: [(&str, &str); 2] = [("!", "!"), ("tag:yaml.org,2002:", "!!")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StreamStart,
    FirstDocumentStart,
    DocumentStart,
    DocumentContent,
    DocumentEnd,
    FirstFlowSequenceItem,
    FlowSequenceItem,
    FirstFlowMappingKey,
    FlowMappingKey,
    FlowMappingSimpleValue,
    FlowMappingValue,
    FirstBlockSequenceItem,
    BlockSequenceItem,
    FirstBlockMappingKey,
    BlockMappingKey,
    BlockMappingSimpleValue,
    BlockMappingValue,
    /// Drop the empty value of a set member written as `? key`.
    BlockSetValue,
    End,
}

/// What styles a scalar can be written in.
#[derive(Debug, Clone)]
struct ScalarAnalysis {
    scalar: String,
    empty: bool,
    multiline: bool,
    allow_flow_plain: bool,
    allow_block_plain: bool,
    allow_single_quoted: bool,
    allow_block: bool,
}

/// Where the node being written sits.
#[derive(Debug, Clone, Copy, Default)]
struct Context {
    root: bool,
    sequence: bool,
    mapping: bool,
    simple_key: bool,
}

fn is_break(ch: char) -> bool {
    matches!(ch, '\n' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

fn is_space_or_break(ch: Option<char>) -> bool {
    match ch {
        None => true,
        Some(ch) => matches!(ch, '\0' | ' ' | '\t' | '\r') || is_break(ch),
    }
}

fn escape_replacement(ch: char) -> Option<char> {
    Some(match ch {
        '\0' => '0',
        '\x07' => 'a',
        '\x08' => 'b',
        '\x09' => 't',
        '\x0A' => 'n',
        '\x0B' => 'v',
        '\x0C' => 'f',
        '\x0D' => 'r',
        '\x1B' => 'e',
        '"' => '"',
        '\\' => '\\',
        '\u{85}' => 'N',
        '\u{A0}' => '_',
        '\u{2028}' => 'L',
        '\u{2029}' => 'P',
        _ => return None,
    })
}

pub struct Emitter {
    out: String,
    events: VecDeque<Event>,
    state: State,
    states: Vec<State>,
    indents: Vec<Option<usize>>,
    indent: Option<usize>,
    flow_level: usize,
    context: Context,
    /// Whether each open block mapping is a `!!set`.
    sets: Vec<bool>,
    line: usize,
    column: usize,
    whitespace: bool,
    indention: bool,
    open_ended: bool,
    trivia_written: bool,

    canonical: bool,
    allow_unicode: bool,
    best_indent: usize,
    best_width: usize,
    best_line_break: &'static str,
    block_seq_indent: usize,
    top_level_colon_align: Option<usize>,
    prefix_colon: String,

    tag_prefixes: Vec<(String, String)>,
    anchors: HashSet<String>,
    analysis: Option<ScalarAnalysis>,
    style: Option<ScalarStyle>,
}

impl Emitter {
    pub fn new(options: &DumperOptions) -> Self {
        let best_indent = if (2..=9).contains(&options.indent) {
            options.indent
        } else {
            2
        };
        let best_width = if options.width > best_indent * 2 {
            options.width
        } else {
            80
        };
        Self {
            out: String::new(),
            events: VecDeque::new(),
            state: State::StreamStart,
            states: Vec::new(),
            indents: Vec::new(),
            indent: None,
            flow_level: 0,
            context: Context::default(),
            sets: Vec::new(),
            line: 0,
            column: 0,
            whitespace: true,
            indention: true,
            open_ended: false,
            trivia_written: false,
            canonical: options.canonical,
            allow_unicode: options.allow_unicode,
            best_indent,
            best_width,
            best_line_break: options.line_break.as_str(),
            block_seq_indent: options.block_seq_indent,
            top_level_colon_align: options.top_level_colon_align,
            prefix_colon: options.prefix_colon.clone().unwrap_or_default(),
            tag_prefixes: Vec::new(),
            anchors: HashSet::new(),
            analysis: None,
            style: None,
        }
    }

    /// Text produced so far and not yet taken.
    pub fn output(&self) -> &str {
        &self.out
    }

    /// Take the text produced so far.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.out)
    }

    /// Whether the stream has ended.
    pub fn is_finished(&self) -> bool {
        self.state == State::End
    }

    fn need_more_events(&self) -> bool {
        let Some(first) = self.events.front() else {
            return true;
        };
        match first.kind {
            EventKind::DocumentStart { .. } => self.need_events(1),
            EventKind::SequenceStart(_) => self.need_events(2),
            EventKind::MappingStart(_) => self.need_events(3),
            EventKind::Scalar(_) | EventKind::Alias { .. }
                if self.sets.last() == Some(&true)
                    && matches!(self.state, State::FirstBlockMappingKey | State::BlockMappingKey) =>
            {
                self.need_events(1)
            }
            _ => false,
        }
    }

    fn need_events(&self, count: usize) -> bool {
        let mut level: i64 = 0;
        for event in self.events.iter().skip(1) {
            match event.kind {
                EventKind::DocumentStart { .. } | EventKind::SequenceStart(_) | EventKind::MappingStart(_) => {
                    level += 1
                }
                EventKind::DocumentEnd { .. } | EventKind::SequenceEnd | EventKind::MappingEnd => level -= 1,
                EventKind::StreamEnd => level = -1,
                _ => {}
            }
            if level < 0 {
                return false;
            }
        }
        self.events.len() < count + 1
    }

    fn dispatch(&mut self, event: &Event) -> Result<()> {
        self.trivia_written = false;
        match self.state {
            State::StreamStart => self.expect_stream_start(event),
            State::FirstDocumentStart => self.expect_document_start(event, true),
            State::DocumentStart => self.expect_document_start(event, false),
            State::DocumentContent => self.expect_document_root(event),
            State::DocumentEnd => self.expect_document_end(event),
            State::FirstFlowSequenceItem => self.expect_flow_sequence_item(event, true),
            State::FlowSequenceItem => self.expect_flow_sequence_item(event, false),
            State::FirstFlowMappingKey => self.expect_flow_mapping_key(event, true),
            State::FlowMappingKey => self.expect_flow_mapping_key(event, false),
            State::FlowMappingSimpleValue => self.expect_flow_mapping_simple_value(event),
            State::FlowMappingValue => self.expect_flow_mapping_value(event),
            State::FirstBlockSequenceItem => self.expect_block_sequence_item(event, true),
            State::BlockSequenceItem => self.expect_block_sequence_item(event, false),
            State::FirstBlockMappingKey => self.expect_block_mapping_key(event, true),
            State::BlockMappingKey => self.expect_block_mapping_key(event, false),
            State::BlockMappingSimpleValue => self.expect_block_mapping_simple_value(event),
            State::BlockMappingValue => self.expect_block_mapping_value(event),
            State::BlockSetValue => {
                self.state = State::BlockMappingKey;
                Ok(())
            }
            State::End => Err(YamlError::emitter(format!("expected nothing, but got {}", event))),
        }
    }

    fn pop_state(&mut self) -> Result<State> {
        self.states
            .pop()
            .ok_or_else(|| YamlError::emitter("unbalanced collection events"))
    }

    fn pop_indent(&mut self) {
        self.indent = self.indents.pop().flatten();
    }

    fn increase_indent(&mut self, flow: bool, indentless: bool) {
        self.indents.push(self.indent);
        self.indent = match self.indent {
            None if flow => Some(self.best_indent),
            None => Some(0),
            Some(indent) if indentless => Some(indent),
            Some(indent) => Some(indent + self.best_indent),
        };
    }

    /// Indent a block collection by a layout hint from the source, when the
    /// hint still yields valid YAML in the current position.
    fn increase_block_indent(&mut self, hint: Option<usize>, sequence: bool, indentless: bool) {
        let minimum = if self.context.root {
            0
        } else if self.context.sequence {
            2
        } else if sequence {
            0
        } else {
            1
        };
        match hint.filter(|&d| d >= minimum) {
            Some(offset) => {
                self.indents.push(self.indent);
                self.indent = Some(self.indent.unwrap_or(0) + offset);
            }
            None if sequence && indentless && self.block_seq_indent > 0 => {
                self.indents.push(self.indent);
                self.indent = Some(self.indent.unwrap_or(0) + self.block_seq_indent);
            }
            None => self.increase_indent(false, indentless),
        }
    }

    // Stream and document states.

    fn expect_stream_start(&mut self, event: &Event) -> Result<()> {
        match event.kind {
            EventKind::StreamStart { .. } => {
                self.state = State::FirstDocumentStart;
                Ok(())
            }
            _ => Err(YamlError::emitter(format!("expected StreamStart, but got {}", event))),
        }
    }

    fn expect_document_start(&mut self, event: &Event, first: bool) -> Result<()> {
        match &event.kind {
            EventKind::DocumentStart { explicit, version, tags } => {
                self.write_event_trivia(event);
                let has_tags = !tags.is_empty();
                if (version.is_some() || has_tags) && self.open_ended {
                    self.write_indicator("...", true, false, false);
                    self.write_indent();
                }
                if let Some(version) = version {
                    let text = self.prepare_version(*version)?;
                    self.write_version_directive(&text);
                }
                self.tag_prefixes = DEFAULT_TAG_PREFIXES
                    .iter()
                    .map(|(p, h)| (p.to_string(), h.to_string()))
                    .collect();
                let mut tags: Vec<&TagDirective> = tags.iter().collect();
                tags.sort_by(|a, b| a.handle.cmp(&b.handle));
                for directive in tags {
                    let handle = prepare_tag_handle(&directive.handle)?;
                    let prefix = prepare_tag_prefix(&directive.prefix)?;
                    self.tag_prefixes.retain(|(p, _)| p != &directive.prefix);
                    self.tag_prefixes.push((directive.prefix.clone(), directive.handle.clone()));
                    self.write_tag_directive(&handle, &prefix);
                }
                self.anchors.clear();
                let implicit = first
                    && !explicit
                    && !self.canonical
                    && version.is_none()
                    && !has_tags
                    && !self.check_empty_document();
                if !implicit {
                    self.write_indent();
                    self.write_indicator("---", true, false, false);
                    if self.canonical {
                        self.write_indent();
                    }
                }
                self.state = State::DocumentContent;
                Ok(())
            }
            EventKind::StreamEnd => {
                self.write_event_trivia(event);
                if self.open_ended {
                    self.write_indicator("...", true, false, false);
                    self.write_indent();
                }
                self.state = State::End;
                Ok(())
            }
            _ => Err(YamlError::emitter(format!("expected DocumentStart, but got {}", event))),
        }
    }

    fn expect_document_end(&mut self, event: &Event) -> Result<()> {
        match event.kind {
            EventKind::DocumentEnd { explicit } => {
                self.write_event_trivia(event);
                self.write_indent();
                if explicit {
                    self.write_indicator("...", true, false, false);
                    self.write_indent();
                }
                self.state = State::DocumentStart;
                Ok(())
            }
            _ => Err(YamlError::emitter(format!("expected DocumentEnd, but got {}", event))),
        }
    }

    fn expect_document_root(&mut self, event: &Event) -> Result<()> {
        self.states.push(State::DocumentEnd);
        self.expect_node(
            event,
            Context {
                root: true,
                ..Context::default()
            },
        )
    }

    // Nodes.

    fn expect_node(&mut self, event: &Event, context: Context) -> Result<()> {
        self.context = context;
        match &event.kind {
            EventKind::Alias { .. } => {
                self.write_node_trivia(event, true);
                self.expect_alias(event)
            }
            EventKind::Scalar(scalar) => {
                self.write_node_trivia(event, true);
                self.process_anchor(event, "&")?;
                self.process_tag(event)?;
                self.expect_scalar(scalar)
            }
            EventKind::SequenceStart(collection) => {
                if context.root {
                    self.write_node_trivia(event, false);
                }
                self.process_anchor(event, "&")?;
                self.process_tag(event)?;
                self.write_node_trivia(event, false);
                if self.flow_level > 0 || self.canonical || collection.flow || self.check_empty_sequence(event) {
                    self.expect_flow_sequence();
                } else {
                    self.expect_block_sequence(collection);
                }
                Ok(())
            }
            EventKind::MappingStart(collection) => {
                if context.root {
                    self.write_node_trivia(event, false);
                }
                self.process_anchor(event, "&")?;
                self.process_tag(event)?;
                self.write_node_trivia(event, false);
                if self.flow_level > 0 || self.canonical || collection.flow || self.check_empty_mapping(event) {
                    self.expect_flow_mapping();
                } else {
                    self.expect_block_mapping(collection);
                }
                Ok(())
            }
            _ => Err(YamlError::emitter(format!("expected a node event, but got {}", event))),
        }
    }

    fn expect_alias(&mut self, event: &Event) -> Result<()> {
        if let EventKind::Alias { anchor } = &event.kind {
            if !self.anchors.contains(anchor) {
                return Err(YamlError::emitter(format!(
                    "alias *{} refers to an anchor that was not emitted",
                    anchor
                )));
            }
        }
        self.process_anchor(event, "*")?;
        self.state = self.pop_state()?;
        Ok(())
    }

    fn expect_scalar(&mut self, scalar: &ScalarEvent) -> Result<()> {
        self.increase_indent(true, false);
        if let (Some(style), Some(digit)) = (self.style, scalar.indent_indicator) {
            if style.is_block() && (1..=9).contains(&digit) {
                let parent = self.indents.last().copied().flatten().unwrap_or(0);
                self.indent = Some(parent + digit);
            }
        }
        self.process_scalar(scalar)?;
        self.pop_indent();
        self.state = self.pop_state()?;
        Ok(())
    }

    // Flow sequences and mappings.

    fn expect_flow_sequence(&mut self) {
        self.write_indicator("[", true, true, false);
        self.flow_level += 1;
        self.increase_indent(true, false);
        self.state = State::FirstFlowSequenceItem;
    }

    fn expect_flow_sequence_item(&mut self, event: &Event, first: bool) -> Result<()> {
        if let EventKind::SequenceEnd = event.kind {
            self.pop_indent();
            self.flow_level -= 1;
            if self.canonical && !first {
                self.write_indicator(",", false, false, false);
                self.write_indent();
            }
            self.write_indicator("]", false, false, false);
            self.state = self.pop_state()?;
            return Ok(());
        }
        if !first {
            self.write_indicator(",", false, false, false);
        }
        if self.canonical || self.column > self.best_width {
            self.write_indent();
        }
        self.states.push(State::FlowSequenceItem);
        self.expect_node(
            event,
            Context {
                sequence: true,
                ..Context::default()
            },
        )
    }

    fn expect_flow_mapping(&mut self) {
        self.write_indicator("{", true, true, false);
        self.flow_level += 1;
        self.increase_indent(true, false);
        self.state = State::FirstFlowMappingKey;
    }

    fn expect_flow_mapping_key(&mut self, event: &Event, first: bool) -> Result<()> {
        if let EventKind::MappingEnd = event.kind {
            self.pop_indent();
            self.flow_level -= 1;
            if self.canonical && !first {
                self.write_indicator(",", false, false, false);
                self.write_indent();
            }
            self.write_indicator("}", false, false, false);
            self.state = self.pop_state()?;
            return Ok(());
        }
        if !first {
            self.write_indicator(",", false, false, false);
        }
        if self.canonical || self.column > self.best_width {
            self.write_indent();
        }
        let mapping = Context {
            mapping: true,
            ..Context::default()
        };
        if !self.canonical && self.check_simple_key(event)? {
            self.states.push(State::FlowMappingSimpleValue);
            self.expect_node(
                event,
                Context {
                    simple_key: true,
                    ..mapping
                },
            )
        } else {
            self.write_indicator("?", true, false, false);
            self.states.push(State::FlowMappingValue);
            self.expect_node(event, mapping)
        }
    }

    fn expect_flow_mapping_simple_value(&mut self, event: &Event) -> Result<()> {
        self.write_indicator(":", false, false, false);
        self.states.push(State::FlowMappingKey);
        self.expect_node(
            event,
            Context {
                mapping: true,
                ..Context::default()
            },
        )
    }

    fn expect_flow_mapping_value(&mut self, event: &Event) -> Result<()> {
        if self.canonical || self.column > self.best_width {
            self.write_indent();
        }
        self.write_indicator(":", true, false, false);
        self.states.push(State::FlowMappingKey);
        self.expect_node(
            event,
            Context {
                mapping: true,
                ..Context::default()
            },
        )
    }

    // Block sequences and mappings.

    fn expect_block_sequence(&mut self, collection: &CollectionEvent) {
        let indentless = self.context.mapping && !self.indention;
        self.increase_block_indent(collection.indent, true, indentless);
        self.state = State::FirstBlockSequenceItem;
    }

    fn expect_block_sequence_item(&mut self, event: &Event, first: bool) -> Result<()> {
        if !first && matches!(event.kind, EventKind::SequenceEnd) {
            self.write_event_trivia(event);
            self.pop_indent();
            self.state = self.pop_state()?;
            return Ok(());
        }
        self.write_event_trivia(event);
        self.write_indent();
        self.write_indicator("-", true, false, true);
        self.states.push(State::BlockSequenceItem);
        self.expect_node(
            event,
            Context {
                sequence: true,
                ..Context::default()
            },
        )
    }

    fn expect_block_mapping(&mut self, collection: &CollectionEvent) {
        self.increase_block_indent(collection.indent, false, false);
        self.sets.push(!collection.implicit && collection.tag.as_deref() == Some(SET));
        self.state = State::FirstBlockMappingKey;
    }

    fn expect_block_mapping_key(&mut self, event: &Event, first: bool) -> Result<()> {
        if !first && matches!(event.kind, EventKind::MappingEnd) {
            self.write_event_trivia(event);
            self.pop_indent();
            self.sets.pop();
            self.state = self.pop_state()?;
            return Ok(());
        }
        self.write_event_trivia(event);
        self.write_indent();
        let mapping = Context {
            mapping: true,
            ..Context::default()
        };
        if self.check_set_member(event) {
            self.write_indicator("?", true, false, true);
            self.states.push(State::BlockSetValue);
            self.expect_node(event, mapping)
        } else if self.check_simple_key(event)? {
            self.states.push(State::BlockMappingSimpleValue);
            self.expect_node(
                event,
                Context {
                    simple_key: true,
                    ..mapping
                },
            )
        } else {
            self.write_indicator("?", true, false, true);
            self.states.push(State::BlockMappingValue);
            self.expect_node(event, mapping)
        }
    }

    fn expect_block_mapping_simple_value(&mut self, event: &Event) -> Result<()> {
        if let Some(align) = self.top_level_colon_align {
            if self.indents.len() == 1 && self.column < align {
                let padding = " ".repeat(align - self.column);
                self.write_raw(&padding);
            }
        }
        if !self.prefix_colon.is_empty() {
            let prefix = self.prefix_colon.clone();
            self.write_raw(&prefix);
        }
        self.write_indicator(":", false, false, false);
        self.states.push(State::BlockMappingKey);
        self.expect_node(
            event,
            Context {
                mapping: true,
                ..Context::default()
            },
        )
    }

    fn expect_block_mapping_value(&mut self, event: &Event) -> Result<()> {
        self.write_indent();
        self.write_indicator(":", true, false, true);
        self.states.push(State::BlockMappingKey);
        self.expect_node(
            event,
            Context {
                mapping: true,
                ..Context::default()
            },
        )
    }

    // Checkers.

    fn check_empty_sequence(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::SequenceStart(_))
            && matches!(self.events.front().map(|e| &e.kind), Some(EventKind::SequenceEnd))
    }

    fn check_empty_mapping(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::MappingStart(_))
            && matches!(self.events.front().map(|e| &e.kind), Some(EventKind::MappingEnd))
    }

    fn check_empty_document(&self) -> bool {
        match self.events.front().map(|e| &e.kind) {
            Some(EventKind::Scalar(s)) => s.anchor.is_none() && s.implicit.0 && s.value.is_empty(),
            _ => false,
        }
    }

    /// A scalar or alias key of a `!!set` whose value is the empty plain
    /// scalar, written as `? key`.
    fn check_set_member(&self, event: &Event) -> bool {
        if self.sets.last() != Some(&true) {
            return false;
        }
        if !matches!(event.kind, EventKind::Scalar(_) | EventKind::Alias { .. }) {
            return false;
        }
        match self.events.front().map(|e| &e.kind) {
            Some(EventKind::Scalar(value)) => {
                value.value.is_empty()
                    && value.anchor.is_none()
                    && value.implicit.0
                    && matches!(value.style, None | Some(ScalarStyle::Plain))
            }
            _ => false,
        }
    }

    fn check_simple_key(&mut self, event: &Event) -> Result<bool> {
        let mut length = 0;
        if let Some(anchor) = event.anchor() {
            length += prepare_anchor(anchor)?.chars().count();
        }
        let tag = match &event.kind {
            EventKind::Scalar(s) => s.tag.as_deref(),
            EventKind::SequenceStart(c) | EventKind::MappingStart(c) => c.tag.as_deref(),
            _ => None,
        };
        if let Some(tag) = tag {
            length += self.prepare_tag(tag)?.chars().count();
        }
        let mut single_line_scalar = false;
        if let EventKind::Scalar(scalar) = &event.kind {
            let analysis = self.analyze(scalar);
            length += analysis.scalar.chars().count();
            single_line_scalar = !analysis.empty && !analysis.multiline;
        }
        Ok(length < 128
            && (matches!(event.kind, EventKind::Alias { .. })
                || single_line_scalar
                || self.check_empty_sequence(event)
                || self.check_empty_mapping(event)))
    }

    // Anchors, tags and scalars.

    fn process_anchor(&mut self, event: &Event, indicator: &str) -> Result<()> {
        let Some(anchor) = event.anchor() else {
            return Ok(());
        };
        let anchor = prepare_anchor(anchor)?;
        if indicator == "&" {
            self.anchors.insert(anchor.clone());
        }
        self.write_indicator(&format!("{}{}", indicator, anchor), true, false, false);
        Ok(())
    }

    fn process_tag(&mut self, event: &Event) -> Result<()> {
        let tag = match &event.kind {
            EventKind::Scalar(scalar) => {
                let style = match self.style {
                    Some(style) => style,
                    None => self.choose_scalar_style(scalar),
                };
                self.style = Some(style);
                let plain = style == ScalarStyle::Plain;
                if (!self.canonical || scalar.tag.is_none())
                    && ((plain && scalar.implicit.0) || (!plain && scalar.implicit.1))
                {
                    return Ok(());
                }
                match &scalar.tag {
                    Some(tag) => tag.clone(),
                    None if scalar.implicit.0 => "!".to_string(),
                    None => return Err(YamlError::emitter("tag is not specified")),
                }
            }
            EventKind::SequenceStart(c) | EventKind::MappingStart(c) => {
                if (!self.canonical || c.tag.is_none()) && c.implicit {
                    return Ok(());
                }
                match &c.tag {
                    Some(tag) => tag.clone(),
                    None => return Err(YamlError::emitter("tag is not specified")),
                }
            }
            _ => return Ok(()),
        };
        let prepared = self.prepare_tag(&tag)?;
        if !prepared.is_empty() {
            self.write_indicator(&prepared, true, false, false);
        }
        Ok(())
    }

    fn analyze(&mut self, scalar: &ScalarEvent) -> ScalarAnalysis {
        match &self.analysis {
            Some(analysis) if analysis.scalar == scalar.value => analysis.clone(),
            _ => {
                let analysis = analyze_scalar(&scalar.value, self.allow_unicode);
                self.analysis = Some(analysis.clone());
                analysis
            }
        }
    }

    fn choose_scalar_style(&mut self, scalar: &ScalarEvent) -> ScalarStyle {
        let analysis = self.analyze(scalar);
        let requested = scalar.style;
        if requested == Some(ScalarStyle::DoubleQuoted) || self.canonical {
            return ScalarStyle::DoubleQuoted;
        }
        let in_flow = self.flow_level > 0;
        // A plain scalar whose text resolves to another tag can still be
        // written plain when the tag is written out.
        let plain_tag_ok = scalar.implicit.0 || (requested.is_some() && !scalar.implicit.1);
        if matches!(requested, None | Some(ScalarStyle::Plain)) && plain_tag_ok {
            let key_problem = self.context.simple_key && (analysis.empty || analysis.multiline);
            let allowed = if in_flow {
                analysis.allow_flow_plain
            } else {
                analysis.allow_block_plain
            };
            if !key_problem && allowed {
                return ScalarStyle::Plain;
            }
            if requested.is_some() && self.plain_source(scalar).is_some() && !key_problem {
                return ScalarStyle::Plain;
            }
        }
        if let Some(style) = requested.filter(|s| s.is_block()) {
            if !in_flow && !self.context.simple_key && analysis.allow_block {
                return style;
            }
        }
        if matches!(requested, None | Some(ScalarStyle::Plain) | Some(ScalarStyle::SingleQuoted))
            && analysis.allow_single_quoted
            && !(self.context.simple_key && analysis.multiline)
        {
            return ScalarStyle::SingleQuoted;
        }
        ScalarStyle::DoubleQuoted
    }

    /// Original text of an unchanged single-line plain scalar.
    fn plain_source<'s>(&self, scalar: &'s ScalarEvent) -> Option<&'s str> {
        let source = scalar.source.as_deref()?;
        let usable = source == scalar.value
            && !source.chars().any(is_break)
            && (self.flow_level == 0 || !source.contains([',', '[', ']', '{', '}']));
        usable.then_some(source)
    }

    /// Original text of an unchanged single-line quoted scalar.
    fn quoted_source<'s>(&self, scalar: &'s ScalarEvent, quote: char) -> Option<&'s str> {
        let source = scalar.source.as_deref()?;
        let usable = source.len() >= 2
            && source.starts_with(quote)
            && source.ends_with(quote)
            && !source.chars().any(is_break);
        usable.then_some(source)
    }

    fn process_scalar(&mut self, scalar: &ScalarEvent) -> Result<()> {
        let style = match self.style {
            Some(style) => style,
            None => self.choose_scalar_style(scalar),
        };
        let split = !self.context.simple_key;
        let requested = scalar.style == Some(style);
        match style {
            ScalarStyle::Plain => match self.plain_source(scalar).filter(|_| requested) {
                Some(source) => self.write_plain(source, false),
                None => self.write_plain(&scalar.value, split),
            },
            ScalarStyle::SingleQuoted => match self.quoted_source(scalar, '\'').filter(|_| requested) {
                Some(source) => self.write_quoted_source(source),
                None => self.write_single_quoted(&scalar.value, split),
            },
            ScalarStyle::DoubleQuoted => match self.quoted_source(scalar, '"').filter(|_| requested) {
                Some(source) => self.write_quoted_source(source),
                None => self.write_double_quoted(&scalar.value, split),
            },
            ScalarStyle::Literal => self.write_literal(scalar),
            ScalarStyle::Folded => self.write_folded(scalar),
        }
        self.analysis = None;
        self.style = None;
        Ok(())
    }

    // Trivia.

    fn write_event_trivia(&mut self, event: &Event) -> bool {
        if self.trivia_written {
            return false;
        }
        self.trivia_written = true;
        self.write_trivia(&event.trivia)
    }

    /// Write the trivia before a node. A scalar value of a block mapping
    /// that was pushed to its own line is indented past its key.
    fn write_node_trivia(&mut self, event: &Event, leaf: bool) {
        if !self.write_event_trivia(event) {
            return;
        }
        if leaf && !self.context.root && self.context.mapping && !self.context.simple_key && self.flow_level == 0 {
            let indent = self.indent.unwrap_or(0) + self.best_indent;
            if self.column < indent {
                let padding = " ".repeat(indent - self.column);
                self.write_raw(&padding);
            }
            self.whitespace = true;
        }
    }

    /// Write comments and blank lines. Returns whether anything was written.
    fn write_trivia(&mut self, trivia: &[Trivia]) -> bool {
        if trivia.is_empty() {
            return false;
        }
        if self.flow_level > 0 {
            debug!(count = trivia.len(), "dropping comments inside a flow collection");
            return false;
        }
        for item in trivia {
            match item {
                Trivia::Eol(comment) => {
                    let padding = if self.column < comment.column {
                        comment.column - self.column
                    } else if self.column > 0 {
                        1
                    } else {
                        0
                    };
                    self.write_comment(comment, padding);
                }
                Trivia::Line(comment) => {
                    if self.column > 0 {
                        self.write_line_break(None);
                    }
                    self.write_comment(comment, comment.column);
                }
                Trivia::Blank => {
                    if self.column > 0 {
                        self.write_line_break(None);
                    }
                    self.write_line_break(None);
                }
            }
        }
        true
    }

    fn write_comment(&mut self, comment: &Comment, padding: usize) {
        let padding = " ".repeat(padding);
        self.write_raw(&padding);
        self.write_raw(&comment.text);
        self.write_line_break(None);
    }

    // Writers.

    fn write_raw(&mut self, data: &str) {
        self.column += data.chars().count();
        self.out.push_str(data);
    }

    fn write_indicator(&mut self, indicator: &str, need_whitespace: bool, whitespace: bool, indention: bool) {
        if !self.whitespace && need_whitespace {
            self.write_raw(" ");
        }
        self.write_raw(indicator);
        self.whitespace = whitespace;
        self.indention = self.indention && indention;
        self.open_ended = false;
    }

    fn write_indent(&mut self) {
        let indent = self.indent.unwrap_or(0);
        if !self.indention || self.column > indent || (self.column == indent && !self.whitespace) {
            self.write_line_break(None);
        }
        if self.column < indent {
            self.whitespace = true;
            let padding = " ".repeat(indent - self.column);
            self.write_raw(&padding);
        }
    }

    fn write_line_break(&mut self, data: Option<char>) {
        match data {
            Some(ch) => self.out.push(ch),
            None => self.out.push_str(self.best_line_break),
        }
        self.whitespace = true;
        self.indention = true;
        self.line += 1;
        self.column = 0;
    }

    fn write_breaks(&mut self, breaks: &[char]) {
        for &br in breaks {
            if br == '\n' {
                self.write_line_break(None);
            } else {
                self.write_line_break(Some(br));
            }
        }
    }

    fn write_version_directive(&mut self, version: &str) {
        self.write_raw(&format!("%YAML {}", version));
        self.write_line_break(None);
    }

    fn write_tag_directive(&mut self, handle: &str, prefix: &str) {
        self.write_raw(&format!("%TAG {} {}", handle, prefix));
        self.write_line_break(None);
    }

    fn write_quoted_source(&mut self, source: &str) {
        self.write_indicator(source, true, false, false);
    }

    fn write_single_quoted(&mut self, text: &str, split: bool) {
        self.write_indicator("'", true, false, false);
        let chars: Vec<char> = text.chars().collect();
        let (mut spaces, mut breaks) = (false, false);
        let (mut start, mut end) = (0, 0);
        while end <= chars.len() {
            let ch = chars.get(end).copied();
            if spaces {
                if ch != Some(' ') {
                    if start + 1 == end && self.column > self.best_width && split && start != 0 && end != chars.len() {
                        self.write_indent();
                    } else {
                        let data: String = chars[start..end].iter().collect();
                        self.write_raw(&data);
                    }
                    start = end;
                }
            } else if breaks {
                if !ch.is_some_and(is_break) {
                    if chars[start] == '\n' {
                        self.write_line_break(None);
                    }
                    self.write_breaks(&chars[start..end]);
                    self.write_indent();
                    start = end;
                }
            } else if (ch.is_none() || ch == Some(' ') || ch == Some('\'') || ch.is_some_and(is_break)) && start < end {
                let data: String = chars[start..end].iter().collect();
                self.write_raw(&data);
                start = end;
            }
            if ch == Some('\'') {
                self.write_raw("''");
                start = end + 1;
            }
            if let Some(ch) = ch {
                spaces = ch == ' ';
                breaks = is_break(ch);
            }
            end += 1;
        }
        self.write_indicator("'", false, false, false);
    }

    fn write_double_quoted(&mut self, text: &str, split: bool) {
        self.write_indicator("\"", true, false, false);
        let chars: Vec<char> = text.chars().collect();
        let (mut start, mut end) = (0, 0);
        while end <= chars.len() {
            let ch = chars.get(end).copied();
            let needs_escape = match ch {
                None => true,
                Some(ch) => {
                    matches!(ch, '"' | '\\' | '\u{85}' | '\u{2028}' | '\u{2029}' | '\u{FEFF}')
                        || !(('\x20'..='\x7E').contains(&ch)
                            || (self.allow_unicode
                                && (('\u{A0}'..='\u{D7FF}').contains(&ch) || ('\u{E000}'..='\u{FFFD}').contains(&ch))))
                }
            };
            if needs_escape {
                if start < end {
                    let data: String = chars[start..end].iter().collect();
                    self.write_raw(&data);
                    start = end;
                }
                if let Some(ch) = ch {
                    let data = match escape_replacement(ch) {
                        Some(replacement) => format!("\\{}", replacement),
                        None if (ch as u32) <= 0xFF => format!("\\x{:02X}", ch as u32),
                        None if (ch as u32) <= 0xFFFF => format!("\\u{:04X}", ch as u32),
                        None => format!("\\U{:08X}", ch as u32),
                    };
                    self.write_raw(&data);
                    start = end + 1;
                }
            }
            if 0 < end
                && end + 1 < chars.len()
                && (ch == Some(' ') || start >= end)
                && self.column + end.saturating_sub(start) > self.best_width
                && split
            {
                // Right after an escape `start` is one past `end`.
                let mut data: String = chars.get(start..end).map(|c| c.iter().collect()).unwrap_or_default();
                data.push('\\');
                if start < end {
                    start = end;
                }
                self.write_raw(&data);
                self.write_indent();
                self.whitespace = false;
                self.indention = false;
                if chars.get(start) == Some(&' ') {
                    self.write_raw("\\");
                }
            }
            end += 1;
        }
        self.write_indicator("\"", false, false, false);
    }

    /// The chomping and indentation indicators for a block scalar.
    fn block_hints(&self, scalar: &ScalarEvent) -> (String, Chomping) {
        let text = &scalar.value;
        let mut hints = String::new();
        let needs_digit = text.starts_with(|c: char| c == ' ' || is_break(c));
        if scalar.indent_indicator.is_some() || needs_digit {
            let parent = self.indents.last().copied().flatten().unwrap_or(0);
            let digit = self.indent.unwrap_or(self.best_indent).saturating_sub(parent);
            hints.push_str(&digit.to_string());
        }
        let natural = if !text.ends_with(is_break) {
            Chomping::Strip
        } else {
            let mut tail = text.chars().rev();
            tail.next();
            match tail.next() {
                None => Chomping::Keep,
                Some(ch) if is_break(ch) => Chomping::Keep,
                Some(_) => Chomping::Clip,
            }
        };
        let chomping = scalar.chomping.filter(|c| c.fits(text)).unwrap_or(natural);
        hints.push_str(chomping.indicator());
        (hints, chomping)
    }

    fn write_block_header(&mut self, indicator: char, scalar: &ScalarEvent) {
        let (hints, chomping) = self.block_hints(scalar);
        self.write_indicator(&format!("{}{}", indicator, hints), true, false, false);
        if chomping == Chomping::Keep {
            self.open_ended = true;
        }
        if let Some(comment) = &scalar.header_comment {
            let padding = if self.column < comment.column {
                comment.column - self.column
            } else {
                1
            };
            let padding = " ".repeat(padding);
            self.write_raw(&padding);
            self.write_raw(&comment.text);
        }
        self.write_line_break(None);
    }

    fn write_folded(&mut self, scalar: &ScalarEvent) {
        self.write_block_header('>', scalar);
        if let Some(source) = &scalar.source {
            self.write_folded_source(source, &scalar.value);
            return;
        }
        let chars: Vec<char> = scalar.value.chars().collect();
        let (mut leading_space, mut spaces, mut breaks) = (true, false, true);
        let (mut start, mut end) = (0, 0);
        while end <= chars.len() {
            let ch = chars.get(end).copied();
            if breaks {
                if !ch.is_some_and(is_break) {
                    if !leading_space && ch.is_some_and(|c| c != ' ') && chars.get(start) == Some(&'\n') {
                        self.write_line_break(None);
                    }
                    leading_space = ch == Some(' ');
                    self.write_breaks(&chars[start..end]);
                    if ch.is_some() {
                        self.write_indent();
                    }
                    start = end;
                }
            } else if spaces {
                if ch != Some(' ') {
                    if start + 1 == end && self.column > self.best_width {
                        self.write_indent();
                    } else {
                        let data: String = chars[start..end].iter().collect();
                        self.write_raw(&data);
                    }
                    start = end;
                }
            } else if ch.is_none() || ch == Some(' ') || ch.is_some_and(is_break) {
                let data: String = chars[start..end].iter().collect();
                self.write_raw(&data);
                if ch.is_none() {
                    self.write_line_break(None);
                }
                start = end;
            }
            if let Some(ch) = ch {
                breaks = is_break(ch);
                spaces = ch == ' ';
            }
            end += 1;
        }
    }

    /// Write a folded scalar line by line as it was read, then the kept
    /// trailing line breaks.
    fn write_folded_source(&mut self, source: &str, value: &str) {
        for line in source.split('\n') {
            if !line.is_empty() {
                self.write_indent();
                self.write_raw(line);
            }
            self.write_line_break(None);
        }
        let trailing = value.chars().rev().take_while(|&c| c == '\n').count();
        for _ in 1..trailing {
            self.write_line_break(None);
        }
    }

    fn write_literal(&mut self, scalar: &ScalarEvent) {
        self.write_block_header('|', scalar);
        let chars: Vec<char> = scalar.value.chars().collect();
        let mut breaks = true;
        let (mut start, mut end) = (0, 0);
        while end <= chars.len() {
            let ch = chars.get(end).copied();
            if breaks {
                if !ch.is_some_and(is_break) {
                    self.write_breaks(&chars[start..end]);
                    if ch.is_some() {
                        self.write_indent();
                    }
                    start = end;
                }
            } else if ch.is_none() || ch.is_some_and(is_break) {
                let data: String = chars[start..end].iter().collect();
                self.write_raw(&data);
                if ch.is_none() {
                    self.write_line_break(None);
                }
                start = end;
            }
            if let Some(ch) = ch {
                breaks = is_break(ch);
            }
            end += 1;
        }
    }

    fn write_plain(&mut self, text: &str, split: bool) {
        if self.context.root {
            self.open_ended = true;
        }
        if text.is_empty() {
            return;
        }
        if !self.whitespace {
            self.write_raw(" ");
        }
        self.whitespace = false;
        self.indention = false;
        let chars: Vec<char> = text.chars().collect();
        let (mut spaces, mut breaks) = (false, false);
        let (mut start, mut end) = (0, 0);
        while end <= chars.len() {
            let ch = chars.get(end).copied();
            if spaces {
                if ch != Some(' ') {
                    if start + 1 == end && self.column > self.best_width && split {
                        self.write_indent();
                        self.whitespace = false;
                        self.indention = false;
                    } else {
                        let data: String = chars[start..end].iter().collect();
                        self.write_raw(&data);
                    }
                    start = end;
                }
            } else if breaks {
                if !ch.is_some_and(is_break) {
                    if chars[start] == '\n' {
                        self.write_line_break(None);
                    }
                    self.write_breaks(&chars[start..end]);
                    self.write_indent();
                    self.whitespace = false;
                    self.indention = false;
                    start = end;
                }
            } else if ch.is_none() || ch == Some(' ') || ch.is_some_and(is_break) {
                let data: String = chars[start..end].iter().collect();
                self.write_raw(&data);
                start = end;
            }
            if let Some(ch) = ch {
                spaces = ch == ' ';
                breaks = is_break(ch);
            }
            end += 1;
        }
    }

    // Preparers.

    fn prepare_version(&self, (major, minor): (u32, u32)) -> Result<String> {
        if major != 1 {
            return Err(YamlError::emitter(format!("unsupported YAML version: {}.{}", major, minor)));
        }
        Ok(format!("{}.{}", major, minor))
    }

    fn prepare_tag(&self, tag: &str) -> Result<String> {
        if tag.is_empty() {
            return Err(YamlError::emitter("tag must not be empty"));
        }
        if tag == "!" {
            return Ok(tag.to_string());
        }
        let mut handle: Option<&str> = None;
        let mut suffix = tag;
        let mut prefixes: Vec<&(String, String)> = self.tag_prefixes.iter().collect();
        prefixes.sort();
        for (prefix, prefix_handle) in prefixes {
            if tag.starts_with(prefix.as_str()) && (prefix == "!" || prefix.len() < tag.len()) {
                handle = Some(prefix_handle);
                suffix = &tag[prefix.len()..];
            }
        }
        let mut text = String::new();
        for ch in suffix.chars() {
            if ch.is_ascii_alphanumeric() || "-;/?:@&=+$,_.~*'()[]".contains(ch) || (ch == '!' && handle != Some("!"))
            {
                text.push(ch);
            } else {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    text.push_str(&format!("%{:02X}", byte));
                }
            }
        }
        Ok(match handle {
            Some(handle) => format!("{}{}", handle, text),
            None => format!("!<{}>", text),
        })
    }
}

impl EventSink for Emitter {
    fn emit(&mut self, event: Event) -> Result<()> {
        self.events.push_back(event);
        while !self.need_more_events() {
            let Some(event) = self.events.pop_front() else {
                break;
            };
            self.dispatch(&event)?;
        }
        Ok(())
    }
}

fn prepare_tag_handle(handle: &str) -> Result<String> {
    if handle.is_empty() {
        return Err(YamlError::emitter("tag handle must not be empty"));
    }
    if !handle.starts_with('!') || !handle.ends_with('!') {
        return Err(YamlError::emitter(format!(
            "tag handle must start and end with '!': {:?}",
            handle
        )));
    }
    let inner = &handle[1..handle.len().saturating_sub(1).max(1)];
    if let Some(ch) = inner.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
        return Err(YamlError::emitter(format!(
            "invalid character {:?} in the tag handle: {:?}",
            ch, handle
        )));
    }
    Ok(handle.to_string())
}

fn prepare_tag_prefix(prefix: &str) -> Result<String> {
    if prefix.is_empty() {
        return Err(YamlError::emitter("tag prefix must not be empty"));
    }
    let mut text = String::new();
    for (index, ch) in prefix.chars().enumerate() {
        if ch.is_ascii_alphanumeric() || "-;/?!:@&=+$,_.~*'()[]".contains(ch) || (index == 0 && ch == '!') {
            text.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                text.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    Ok(text)
}

fn prepare_anchor(anchor: &str) -> Result<String> {
    if anchor.is_empty() {
        return Err(YamlError::emitter("anchor must not be empty"));
    }
    if let Some(ch) = anchor
        .chars()
        .find(|&c| is_space_or_break(Some(c)) || matches!(c, ',' | '[' | ']' | '{' | '}'))
    {
        return Err(YamlError::emitter(format!(
            "invalid character {:?} in the anchor: {:?}",
            ch, anchor
        )));
    }
    Ok(anchor.to_string())
}

fn analyze_scalar(scalar: &str, allow_unicode: bool) -> ScalarAnalysis {
    if scalar.is_empty() {
        return ScalarAnalysis {
            scalar: String::new(),
            empty: true,
            multiline: false,
            allow_flow_plain: false,
            allow_block_plain: true,
            allow_single_quoted: true,
            allow_block: false,
        };
    }
    let chars: Vec<char> = scalar.chars().collect();
    let mut block_indicators = false;
    let mut flow_indicators = false;
    let mut line_breaks = false;
    let mut special_characters = false;
    let mut leading_space = false;
    let mut leading_break = false;
    let mut trailing_space = false;
    let mut trailing_break = false;
    let mut break_space = false;
    let mut space_break = false;

    if scalar.starts_with("---") || scalar.starts_with("...") {
        block_indicators = true;
        flow_indicators = true;
    }
    let mut preceded_by_whitespace = true;
    let mut followed_by_whitespace = is_space_or_break(chars.get(1).copied());
    let mut previous_space = false;
    let mut previous_break = false;

    for (index, &ch) in chars.iter().enumerate() {
        if index == 0 {
            if "#,[]{}&*!|>'\"%@`".contains(ch) {
                flow_indicators = true;
                block_indicators = true;
            }
            if ch == '?' || ch == ':' {
                flow_indicators = true;
                if followed_by_whitespace {
                    block_indicators = true;
                }
            }
            if ch == '-' && followed_by_whitespace {
                flow_indicators = true;
                block_indicators = true;
            }
        } else {
            if ",?[]{}".contains(ch) {
                flow_indicators = true;
            }
            if ch == ':' {
                flow_indicators = true;
                if followed_by_whitespace {
                    block_indicators = true;
                }
            }
            if ch == '#' && preceded_by_whitespace {
                flow_indicators = true;
                block_indicators = true;
            }
        }
        if is_break(ch) {
            line_breaks = true;
        }
        if !(ch == '\n' || ('\x20'..='\x7E').contains(&ch)) {
            let unicode = (ch == '\u{85}'
                || ('\u{A0}'..='\u{D7FF}').contains(&ch)
                || ('\u{E000}'..='\u{FFFD}').contains(&ch)
                || ('\u{10000}'..'\u{10FFFF}').contains(&ch))
                && ch != '\u{FEFF}';
            if !unicode || !allow_unicode {
                special_characters = true;
            }
        }
        if ch == ' ' {
            if index == 0 {
                leading_space = true;
            }
            if index == chars.len() - 1 {
                trailing_space = true;
            }
            if previous_break {
                break_space = true;
            }
            previous_space = true;
            previous_break = false;
        } else if is_break(ch) {
            if index == 0 {
                leading_break = true;
            }
            if index == chars.len() - 1 {
                trailing_break = true;
            }
            if previous_space {
                space_break = true;
            }
            previous_space = false;
            previous_break = true;
        } else {
            previous_space = false;
            previous_break = false;
        }
        preceded_by_whitespace = is_space_or_break(Some(ch));
        followed_by_whitespace = is_space_or_break(chars.get(index + 2).copied());
    }

    let mut allow_flow_plain = true;
    let mut allow_block_plain = true;
    let mut allow_single_quoted = true;
    let mut allow_block = true;
    if leading_space || leading_break || trailing_space || trailing_break {
        allow_flow_plain = false;
        allow_block_plain = false;
    }
    if trailing_space {
        allow_block = false;
    }
    if break_space {
        allow_flow_plain = false;
        allow_block_plain = false;
        allow_single_quoted = false;
    }
    if space_break || special_characters {
        allow_flow_plain = false;
        allow_block_plain = false;
        allow_single_quoted = false;
        allow_block = false;
    }
    if line_breaks {
        allow_flow_plain = false;
        allow_block_plain = false;
    }
    if flow_indicators {
        allow_flow_plain = false;
    }
    if block_indicators {
        allow_block_plain = false;
    }
    ScalarAnalysis {
        scalar: scalar.to_string(),
        empty: false,
        multiline: line_breaks,
        allow_flow_plain,
        allow_block_plain,
        allow_single_quoted,
        allow_block,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    fn emit(events: Vec<Event>, options: &DumperOptions) -> Result<String> {
        let mut emitter = Emitter::new(options);
        for event in events {
            emitter.emit(event)?;
        }
        Ok(emitter.take_output())
    }

    fn reemit(input: &str) -> String {
        emit(parse_str(input).unwrap(), &DumperOptions::default()).unwrap()
    }

    #[test]
    fn test_block_mapping() {
        assert_eq!(reemit("a: 1\nb:\n  c: 2\n"), "a: 1\nb:\n  c: 2\n");
    }

    #[test]
    fn test_sequences_keep_their_offset() {
        assert_eq!(reemit("a:\n- 1\n- 2\n"), "a:\n- 1\n- 2\n");
        assert_eq!(reemit("- - x\n  - y\n"), "- - x\n  - y\n");
    }

    #[test]
    fn test_indented_sequence_survives_round_trip() {
        let input = "a:\n  - 1\n  - 2\n";
        let value = crate::round_trip_load(input).unwrap();
        assert_eq!(crate::round_trip_dump(&value).unwrap(), input);
    }

    #[test]
    fn test_nested_set_members_stay_compact() {
        assert_eq!(reemit("a: !!set\n  ? x\n  ? y\n"), "a: !!set\n  ? x\n  ? y\n");
    }

    #[test]
    fn test_escaped_scalars_reload_equal() {
        for text in ["a\tb", "x\u{7}y and more", "line\0z"] {
            let dumped = crate::safe_dump(&crate::Value::from(text)).unwrap();
            assert!(dumped.starts_with('"'), "{:?}", dumped);
            assert_eq!(crate::safe_load(&dumped).unwrap(), crate::Value::from(text));
        }
        assert_eq!(crate::safe_dump(&crate::Value::from("a\tb")).unwrap(), "\"a\\tb\"\n");
    }

    #[test]
    fn test_long_double_quoted_line_wraps_after_escape() {
        let text = format!("{}\tb c", "a".repeat(100));
        let dumped = crate::safe_dump(&crate::Value::from(text.as_str())).unwrap();
        assert_eq!(crate::safe_load(&dumped).unwrap(), crate::Value::from(text));
    }

    #[test]
    fn test_flow_collections() {
        assert_eq!(reemit("a: [1, 2]\nb: {c: d}\n"), "a: [1, 2]\nb: {c: d}\n");
        assert_eq!(reemit("a: []\n"), "a: []\n");
    }

    #[test]
    fn test_comments() {
        let input = "# top\na: 1  # one\n\n# before b\nb:\n- x # item\n- y\n";
        assert_eq!(reemit(input), input);
    }

    #[test]
    fn test_comment_dropped_in_flow() {
        assert_eq!(reemit("a: [1, # c\n  2]\n"), "a: [1, 2]\n");
    }

    #[test]
    fn test_quoted_source_is_kept() {
        assert_eq!(reemit("a: 'it''s'\nb: \"\\x41\"\n"), "a: 'it''s'\nb: \"\\x41\"\n");
    }

    #[test]
    fn test_block_scalars() {
        assert_eq!(reemit("a: |\n  x\n  y\nb: 1\n"), "a: |\n  x\n  y\nb: 1\n");
        assert_eq!(reemit("a: |-\n  x\n"), "a: |-\n  x\n");
        assert_eq!(reemit("a: |4\n      x\n"), "a: |4\n      x\n");
        assert_eq!(reemit("a: >\n  folded\n  text\n\n  more\n"), "a: >\n  folded\n  text\n\n  more\n");
    }

    #[test]
    fn test_keep_chomping_ends_the_document() {
        assert_eq!(reemit("--- |+\n  x\n\n"), "--- |+\n  x\n\n...\n");
    }

    #[test]
    fn test_root_plain_scalar_is_open_ended() {
        assert_eq!(reemit("hello\n"), "hello\n...\n");
    }

    #[test]
    fn test_explicit_document_and_directives() {
        assert_eq!(reemit("%YAML 1.1\n---\na: 1\n"), "%YAML 1.1\n---\na: 1\n");
        assert_eq!(reemit("a: 1\n--- \nb: 2\n"), "a: 1\n---\nb: 2\n");
    }

    #[test]
    fn test_tags_and_anchors() {
        assert_eq!(reemit("a: &x !foo 1\nb: *x\n"), "a: &x !foo 1\nb: *x\n");
        assert_eq!(reemit("!!set\n? a\n? b\n"), "!!set\n? a\n? b\n");
    }

    #[test]
    fn test_alias_before_anchor_fails() {
        let events = vec![
            Event::synthetic(EventKind::StreamStart { encoding: None }),
            Event::synthetic(EventKind::DocumentStart {
                explicit: false,
                version: None,
                tags: Vec::new(),
            }),
            Event::synthetic(EventKind::Alias { anchor: "x".into() }),
            Event::synthetic(EventKind::DocumentEnd { explicit: false }),
            Event::synthetic(EventKind::StreamEnd),
        ];
        let err = emit(events, &DumperOptions::default()).unwrap_err();
        assert!(err.to_string().contains("not emitted"), "{}", err);
    }

    #[test]
    fn test_fresh_scalar_styles() {
        let mut events = parse_str("a: x\n").unwrap();
        for event in &mut events {
            if let EventKind::Scalar(s) = &mut event.kind {
                if s.value == "x" {
                    s.value = "line one\nline two".into();
                    s.style = None;
                    s.source = None;
                    s.implicit = (false, true);
                }
            }
        }
        let out = emit(events, &DumperOptions::default()).unwrap();
        assert_eq!(out, "a: 'line one\n\n  line two'\n");
    }

    #[test]
    fn test_double_quoted_escapes() {
        let mut events = parse_str("a: x\n").unwrap();
        for event in &mut events {
            if let EventKind::Scalar(s) = &mut event.kind {
                if s.value == "x" {
                    s.value = "tab\there\u{e9}".into();
                    s.style = None;
                    s.source = None;
                    s.implicit = (false, true);
                }
            }
        }
        let ascii = DumperOptions {
            allow_unicode: false,
            ..DumperOptions::default()
        };
        assert_eq!(emit(events.clone(), &ascii).unwrap(), "a: \"tab\\there\\xE9\"\n");
        let unicode = DumperOptions {
            allow_unicode: true,
            ..DumperOptions::default()
        };
        assert_eq!(emit(events, &unicode).unwrap(), "a: \"tab\\there\u{e9}\"\n");
    }

    #[test]
    fn test_analysis() {
        let a = analyze_scalar("- x", false);
        assert!(!a.allow_block_plain);
        let a = analyze_scalar("a: b", false);
        assert!(!a.allow_block_plain && !a.allow_flow_plain);
        let a = analyze_scalar("a,b", false);
        assert!(a.allow_block_plain && !a.allow_flow_plain);
        let a = analyze_scalar(" lead", false);
        assert!(!a.allow_block_plain && a.allow_single_quoted);
    }

    #[test]
    fn test_prepare_tag() {
        let emitter = {
            let mut e = Emitter::new(&DumperOptions::default());
            e.tag_prefixes = DEFAULT_TAG_PREFIXES
                .iter()
                .map(|(p, h)| (p.to_string(), h.to_string()))
                .collect();
            e
        };
        assert_eq!(emitter.prepare_tag("tag:yaml.org,2002:str").unwrap(), "!!str");
        assert_eq!(emitter.prepare_tag("!local").unwrap(), "!local");
        assert_eq!(emitter.prepare_tag("tag:example.com,2000:x").unwrap(), "!<tag:example.com,2000:x>");
        assert_eq!(emitter.prepare_tag("!with space").unwrap(), "!with%20space");
    }

    #[test]
    fn test_top_level_colon_align() {
        let options = DumperOptions {
            top_level_colon_align: Some(4),
            ..DumperOptions::default()
        };
        let out = emit(parse_str("a: 1\nbb: 2\n").unwrap(), &options).unwrap();
        assert_eq!(out, "a   : 1\nbb  : 2\n");
    }
}
