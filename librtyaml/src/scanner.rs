//! Phase 1: Scanner
//!
//! The scanner turns the character stream into tokens. It tracks:
//! - the block indentation stack (emitting `BlockSequenceStart`,
//!   `BlockMappingStart` and `BlockEnd`)
//! - the flow nesting level
//! - possible simple keys, so that a `Key` token can be inserted
//!   retroactively once the `:` indicator is found
//! - comments and blank lines, attached as trivia to the next token
//!
//! Tokens are produced lazily; `peek_token` scans only as far as needed to
//! decide whether an earlier simple key is complete.

use std::collections::{BTreeMap, VecDeque};
use std::mem;

use crate::error::{Mark, Result, YamlError};
use crate::reader::Reader;
use crate::tokens::{Chomping, Comment, ScalarStyle, ScalarToken, Token, TokenKind, Trivia};

/// Longest distance (in characters) between a simple key and its `:`.
const SIMPLE_KEY_LIMIT: usize = 1024;

fn is_break(ch: char) -> bool {
    matches!(ch, '\r' | '\n' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

fn is_break_or_nul(ch: char) -> bool {
    ch == '\0' || is_break(ch)
}

fn is_blank_or_nul(ch: char) -> bool {
    ch == ' ' || ch == '\t' || is_break_or_nul(ch)
}

fn is_flow_indicator(ch: char) -> bool {
    matches!(ch, ',' | '[' | ']' | '{' | '}')
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

fn is_uri_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || "-;/?:@&=+$,_.!~*'()[]%#".contains(ch)
}

/// Escapes of a double-quoted scalar that map to a single character.
fn escape_replacement(ch: char) -> Option<char> {
    Some(match ch {
        '0' => '\0',
        'a' => '\x07',
        'b' => '\x08',
        't' | '\t' => '\t',
        'n' => '\n',
        'v' => '\x0B',
        'f' => '\x0C',
        'r' => '\r',
        'e' => '\x1B',
        ' ' => ' ',
        '"' => '"',
        '/' => '/',
        '\\' => '\\',
        'N' => '\u{85}',
        '_' => '\u{A0}',
        'L' => '\u{2028}',
        'P' => '\u{2029}',
        _ => return None,
    })
}

/// Escapes of a double-quoted scalar followed by a fixed number of hex digits.
fn escape_code_length(ch: char) -> Option<usize> {
    match ch {
        'x' => Some(2),
        'u' => Some(4),
        'U' => Some(8),
        _ => None,
    }
}

/// A token that may turn out to be a mapping key.
#[derive(Debug, Clone)]
struct SimpleKey {
    token_number: usize,
    required: bool,
    mark: Mark,
}

/// Converts a character stream into YAML tokens.
pub struct Scanner<'a> {
    reader: Reader<'a>,
    done: bool,
    flow_level: usize,
    tokens: VecDeque<Token>,
    tokens_taken: usize,
    indent: isize,
    indents: Vec<isize>,
    allow_simple_key: bool,
    /// Keyed by flow level; at most one candidate per level.
    possible_simple_keys: BTreeMap<usize, SimpleKey>,
    /// Trivia scanned since the last token was pushed.
    trivia: Vec<Trivia>,
    /// Line on which the last pushed token ended, if a comment there would
    /// belong to it.
    last_token_line: Option<usize>,
}

impl<'a> Scanner<'a> {
    pub fn new(reader: Reader<'a>) -> Self {
        let mut scanner = Self {
            reader,
            done: false,
            flow_level: 0,
            tokens: VecDeque::new(),
            tokens_taken: 0,
            indent: -1,
            indents: Vec::new(),
            allow_simple_key: true,
            possible_simple_keys: BTreeMap::new(),
            trivia: Vec::new(),
            last_token_line: None,
        };
        let mark = scanner.reader.mark();
        scanner
            .tokens
            .push_back(Token::new(TokenKind::StreamStart, mark.clone(), mark));
        scanner
    }

    pub fn reader(&self) -> &Reader<'a> {
        &self.reader
    }

    /// Whether another token is available.
    pub fn has_next_token(&mut self) -> Result<bool> {
        self.fill()?;
        Ok(!self.tokens.is_empty())
    }

    /// The next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Option<&Token>> {
        self.fill()?;
        Ok(self.tokens.front())
    }

    /// Detach the trivia of the next token without consuming the token.
    pub fn take_next_trivia(&mut self) -> Result<Vec<Trivia>> {
        self.fill()?;
        Ok(self
            .tokens
            .front_mut()
            .map(|token| mem::take(&mut token.trivia))
            .unwrap_or_default())
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.fill()?;
        let token = self.tokens.pop_front();
        if token.is_some() {
            self.tokens_taken += 1;
        }
        Ok(token)
    }

    fn fill(&mut self) -> Result<()> {
        while self.need_more_tokens()? {
            self.fetch_more_tokens()?;
        }
        Ok(())
    }

    fn need_more_tokens(&mut self) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        if self.tokens.is_empty() {
            return Ok(true);
        }
        // The head token may still become a key.
        self.stale_possible_simple_keys()?;
        Ok(self.next_possible_simple_key() == Some(self.tokens_taken))
    }

    fn error(&self, context: &str, context_mark: Option<Mark>, problem: &str) -> YamlError {
        let mark = self.reader.mark();
        let snippet = self.reader.snippet(&mark);
        YamlError::scanner(context, context_mark, problem, mark).with_snippet(snippet)
    }

    // ========================================================================
    // Token queue
    // ========================================================================

    fn push_token(&mut self, mut token: Token) {
        token.trivia = mem::take(&mut self.trivia);
        self.last_token_line = match &token.kind {
            TokenKind::Scalar(s) if s.style.is_block() => None,
            _ => Some(token.end_mark.line),
        };
        tracing::trace!(%token, line = token.start_mark.line, "scanned token");
        self.tokens.push_back(token);
    }

    /// Insert a token before one already queued; it takes over the trivia
    /// that preceded the displaced token.
    fn insert_token(&mut self, position: usize, mut token: Token) {
        if let Some(displaced) = self.tokens.get_mut(position) {
            token.trivia = mem::take(&mut displaced.trivia);
        }
        tracing::trace!(%token, position, "inserted token");
        self.tokens.insert(position, token);
    }

    fn push_indicator(&mut self, kind: TokenKind, length: usize) -> Result<()> {
        let start = self.reader.mark();
        self.reader.forward(length)?;
        let end = self.reader.mark();
        self.push_token(Token::new(kind, start, end));
        Ok(())
    }

    fn fetch_more_tokens(&mut self) -> Result<()> {
        self.scan_to_next_token()?;
        self.stale_possible_simple_keys()?;
        self.unwind_indent(self.reader.column() as isize);

        let ch = self.reader.peek(0)?;
        match ch {
            '\0' => self.fetch_stream_end(),
            '%' if self.check_directive() => self.fetch_directive(),
            '-' if self.check_document_indicator("---")? => {
                self.fetch_document_indicator(TokenKind::DocumentStart)
            }
            '.' if self.check_document_indicator("...")? => {
                self.fetch_document_indicator(TokenKind::DocumentEnd)
            }
            '[' => self.fetch_flow_collection_start(TokenKind::FlowSequenceStart),
            '{' => self.fetch_flow_collection_start(TokenKind::FlowMappingStart),
            ']' => self.fetch_flow_collection_end(TokenKind::FlowSequenceEnd),
            '}' => self.fetch_flow_collection_end(TokenKind::FlowMappingEnd),
            ',' => self.fetch_flow_entry(),
            '-' if self.check_block_entry()? => self.fetch_block_entry(),
            '?' if self.check_key()? => self.fetch_key(),
            ':' if self.check_value()? => self.fetch_value(),
            '*' => self.fetch_anchor(true),
            '&' => self.fetch_anchor(false),
            '!' => self.fetch_tag(),
            '|' if self.flow_level == 0 => self.fetch_block_scalar(ScalarStyle::Literal),
            '>' if self.flow_level == 0 => self.fetch_block_scalar(ScalarStyle::Folded),
            '\'' => self.fetch_flow_scalar(ScalarStyle::SingleQuoted),
            '"' => self.fetch_flow_scalar(ScalarStyle::DoubleQuoted),
            _ if self.check_plain()? => self.fetch_plain(),
            '\t' => Err(self.error(
                "while scanning for the next token",
                None,
                "found a tab character where an indentation space is expected",
            )),
            _ => Err(self.error(
                "while scanning for the next token",
                None,
                &format!("found character {:?} that cannot start any token", ch),
            )),
        }
    }

    // ========================================================================
    // Simple keys
    // ========================================================================

    fn next_possible_simple_key(&self) -> Option<usize> {
        self.possible_simple_keys
            .values()
            .map(|key| key.token_number)
            .min()
    }

    /// Forget simple keys that can no longer be completed: a simple key is
    /// limited to one line and to `SIMPLE_KEY_LIMIT` characters.
    fn stale_possible_simple_keys(&mut self) -> Result<()> {
        let line = self.reader.line();
        let index = self.reader.mark().index;
        let mut stale = Vec::new();
        for (level, key) in &self.possible_simple_keys {
            if key.mark.line != line || index - key.mark.index > SIMPLE_KEY_LIMIT {
                if key.required {
                    return Err(self.error(
                        "while scanning a simple key",
                        Some(key.mark.clone()),
                        "could not find expected ':'",
                    ));
                }
                stale.push(*level);
            }
        }
        for level in stale {
            self.possible_simple_keys.remove(&level);
        }
        Ok(())
    }

    fn save_possible_simple_key(&mut self) -> Result<()> {
        // A key at the current block indentation must be a key.
        let required = self.flow_level == 0 && self.indent == self.reader.column() as isize;
        if self.allow_simple_key {
            self.remove_possible_simple_key()?;
            let key = SimpleKey {
                token_number: self.tokens_taken + self.tokens.len(),
                required,
                mark: self.reader.mark(),
            };
            self.possible_simple_keys.insert(self.flow_level, key);
        }
        Ok(())
    }

    fn remove_possible_simple_key(&mut self) -> Result<()> {
        if let Some(key) = self.possible_simple_keys.remove(&self.flow_level) {
            if key.required {
                return Err(self.error(
                    "while scanning a simple key",
                    Some(key.mark),
                    "could not find expected ':'",
                ));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Indentation
    // ========================================================================

    /// Close every block collection indented deeper than `column`.
    fn unwind_indent(&mut self, column: isize) {
        if self.flow_level > 0 {
            return;
        }
        while self.indent > column {
            let mark = self.reader.mark();
            self.indent = self.indents.pop().unwrap_or(-1);
            self.push_token(Token::new(TokenKind::BlockEnd, mark.clone(), mark));
        }
    }

    fn add_indent(&mut self, column: isize) -> bool {
        if self.indent < column {
            self.indents.push(self.indent);
            self.indent = column;
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Fetchers
    // ========================================================================

    fn fetch_stream_end(&mut self) -> Result<()> {
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        self.possible_simple_keys.clear();
        let mark = self.reader.mark();
        self.push_token(Token::new(TokenKind::StreamEnd, mark.clone(), mark));
        self.done = true;
        Ok(())
    }

    fn fetch_directive(&mut self) -> Result<()> {
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        if let Some(token) = self.scan_directive()? {
            self.push_token(token);
        }
        Ok(())
    }

    fn fetch_document_indicator(&mut self, kind: TokenKind) -> Result<()> {
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        self.push_indicator(kind, 3)
    }

    fn fetch_flow_collection_start(&mut self, kind: TokenKind) -> Result<()> {
        self.save_possible_simple_key()?;
        self.flow_level += 1;
        self.allow_simple_key = true;
        self.push_indicator(kind, 1)
    }

    fn fetch_flow_collection_end(&mut self, kind: TokenKind) -> Result<()> {
        self.remove_possible_simple_key()?;
        self.flow_level = self.flow_level.saturating_sub(1);
        self.allow_simple_key = false;
        self.push_indicator(kind, 1)
    }

    fn fetch_flow_entry(&mut self) -> Result<()> {
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        self.push_indicator(TokenKind::FlowEntry, 1)
    }

    fn fetch_block_entry(&mut self) -> Result<()> {
        if self.flow_level == 0 {
            if !self.allow_simple_key {
                return Err(self.error("", None, "sequence entries are not allowed here"));
            }
            if self.add_indent(self.reader.column() as isize) {
                let mark = self.reader.mark();
                self.push_token(Token::new(TokenKind::BlockSequenceStart, mark.clone(), mark));
            }
        }
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        self.push_indicator(TokenKind::BlockEntry, 1)
    }

    fn fetch_key(&mut self) -> Result<()> {
        if self.flow_level == 0 {
            if !self.allow_simple_key {
                return Err(self.error("", None, "mapping keys are not allowed here"));
            }
            if self.add_indent(self.reader.column() as isize) {
                let mark = self.reader.mark();
                self.push_token(Token::new(TokenKind::BlockMappingStart, mark.clone(), mark));
            }
        }
        self.allow_simple_key = self.flow_level == 0;
        self.remove_possible_simple_key()?;
        self.push_indicator(TokenKind::Key, 1)
    }

    fn fetch_value(&mut self) -> Result<()> {
        if let Some(key) = self.possible_simple_keys.remove(&self.flow_level) {
            let position = key.token_number - self.tokens_taken;
            self.insert_token(
                position,
                Token::new(TokenKind::Key, key.mark.clone(), key.mark.clone()),
            );
            if self.flow_level == 0 && self.add_indent(key.mark.column as isize) {
                self.insert_token(
                    position,
                    Token::new(TokenKind::BlockMappingStart, key.mark.clone(), key.mark),
                );
            }
            self.allow_simple_key = false;
        } else {
            if self.flow_level == 0 {
                if !self.allow_simple_key {
                    return Err(self.error("", None, "mapping values are not allowed here"));
                }
                if self.add_indent(self.reader.column() as isize) {
                    let mark = self.reader.mark();
                    self.push_token(Token::new(TokenKind::BlockMappingStart, mark.clone(), mark));
                }
            }
            self.allow_simple_key = self.flow_level == 0;
            self.remove_possible_simple_key()?;
        }
        self.push_indicator(TokenKind::Value, 1)
    }

    fn fetch_anchor(&mut self, alias: bool) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_anchor(alias)?;
        self.push_token(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_tag()?;
        self.push_token(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, style: ScalarStyle) -> Result<()> {
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        let (token, blank_lines) = self.scan_block_scalar(style)?;
        self.push_token(token);
        self.trivia.extend((0..blank_lines).map(|_| Trivia::Blank));
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, style: ScalarStyle) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_flow_scalar(style)?;
        self.push_token(token);
        Ok(())
    }

    fn fetch_plain(&mut self) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let (token, blank_lines) = self.scan_plain()?;
        self.push_token(token);
        self.trivia.extend((0..blank_lines).map(|_| Trivia::Blank));
        Ok(())
    }

    // ========================================================================
    // Checks
    // ========================================================================

    fn check_directive(&self) -> bool {
        self.reader.column() == 0
    }

    fn check_document_indicator(&mut self, indicator: &str) -> Result<bool> {
        Ok(self.reader.column() == 0
            && self.reader.prefix(3)? == indicator
            && is_blank_or_nul(self.reader.peek(3)?))
    }

    fn check_block_entry(&mut self) -> Result<bool> {
        Ok(is_blank_or_nul(self.reader.peek(1)?))
    }

    fn check_key(&mut self) -> Result<bool> {
        Ok(self.flow_level > 0 || is_blank_or_nul(self.reader.peek(1)?))
    }

    fn check_value(&mut self) -> Result<bool> {
        Ok(self.flow_level > 0 || is_blank_or_nul(self.reader.peek(1)?))
    }

    fn check_plain(&mut self) -> Result<bool> {
        let ch = self.reader.peek(0)?;
        if !is_blank_or_nul(ch) && !"-?:,[]{}#&*!|>'\"%@`".contains(ch) {
            return Ok(true);
        }
        let next = self.reader.peek(1)?;
        Ok(!is_blank_or_nul(next)
            && (ch == '-' || (self.flow_level == 0 && (ch == '?' || ch == ':'))))
    }

    // ========================================================================
    // Whitespace, comments and line breaks
    // ========================================================================

    /// Skip separation space, collecting comments and blank lines as trivia.
    fn scan_to_next_token(&mut self) -> Result<()> {
        loop {
            loop {
                let ch = self.reader.peek(0)?;
                let tab_allowed = self.flow_level > 0
                    || !self.allow_simple_key
                    || self.rest_of_line_is_blank()?;
                if ch == ' ' || (ch == '\t' && tab_allowed) {
                    self.reader.forward(1)?;
                } else {
                    break;
                }
            }
            let line = self.reader.line();
            let mut commented = false;
            if self.reader.peek(0)? == '#' {
                let comment = self.scan_comment()?;
                self.trivia.push(if self.last_token_line == Some(line) {
                    Trivia::Eol(comment)
                } else {
                    Trivia::Line(comment)
                });
                commented = true;
            }
            if self.scan_line_break()?.is_empty() {
                return Ok(());
            }
            if !commented && self.last_token_line != Some(line) {
                self.trivia.push(Trivia::Blank);
            }
            if self.flow_level == 0 {
                self.allow_simple_key = true;
            }
        }
    }

    /// Whether only spaces and tabs remain before the next line break.
    fn rest_of_line_is_blank(&mut self) -> Result<bool> {
        let mut n = 0;
        loop {
            match self.reader.peek(n)? {
                ' ' | '\t' => n += 1,
                ch => return Ok(is_break_or_nul(ch) || ch == '#'),
            }
        }
    }

    fn scan_comment(&mut self) -> Result<Comment> {
        let column = self.reader.column();
        let mut length = 0;
        while !is_break_or_nul(self.reader.peek(length)?) {
            length += 1;
        }
        let text = self.reader.prefix(length)?;
        self.reader.forward(length)?;
        Ok(Comment::new(text, column))
    }

    /// Consume one line break, normalizing `\r\n`, `\r` and NEL to `\n`.
    /// Returns the empty string when there is no line break.
    fn scan_line_break(&mut self) -> Result<String> {
        let ch = self.reader.peek(0)?;
        match ch {
            '\r' | '\n' | '\u{85}' => {
                if self.reader.prefix(2)? == "\r\n" {
                    self.reader.forward(2)?;
                } else {
                    self.reader.forward(1)?;
                }
                Ok("\n".to_string())
            }
            '\u{2028}' | '\u{2029}' => {
                self.reader.forward(1)?;
                Ok(ch.to_string())
            }
            _ => Ok(String::new()),
        }
    }

    fn skip_spaces(&mut self) -> Result<()> {
        while self.reader.peek(0)? == ' ' {
            self.reader.forward(1)?;
        }
        Ok(())
    }

    // ========================================================================
    // Directives
    // ========================================================================

    fn scan_directive(&mut self) -> Result<Option<Token>> {
        let start_mark = self.reader.mark();
        self.reader.forward(1)?;
        let name = self.scan_directive_name(&start_mark)?;
        let kind = match name.as_str() {
            "YAML" => {
                let (major, minor) = self.scan_yaml_directive_value(&start_mark)?;
                Some(TokenKind::VersionDirective { major, minor })
            }
            "TAG" => {
                let (handle, prefix) = self.scan_tag_directive_value(&start_mark)?;
                Some(TokenKind::TagDirective { handle, prefix })
            }
            _ => {
                tracing::debug!(directive = %name, "ignoring reserved directive");
                while !is_break_or_nul(self.reader.peek(0)?) {
                    self.reader.forward(1)?;
                }
                None
            }
        };
        let end_mark = self.reader.mark();
        self.scan_directive_ignored_line(&start_mark)?;
        Ok(kind.map(|kind| Token::new(kind, start_mark, end_mark)))
    }

    fn scan_directive_name(&mut self, start_mark: &Mark) -> Result<String> {
        let mut length = 0;
        while is_word_char(self.reader.peek(length)?) {
            length += 1;
        }
        if length == 0 {
            let ch = self.reader.peek(0)?;
            return Err(self.error(
                "while scanning a directive",
                Some(start_mark.clone()),
                &format!("expected alphabetic or numeric character, but found {:?}", ch),
            ));
        }
        let name = self.reader.prefix(length)?;
        self.reader.forward(length)?;
        let ch = self.reader.peek(0)?;
        if !is_blank_or_nul(ch) {
            return Err(self.error(
                "while scanning a directive",
                Some(start_mark.clone()),
                &format!("expected alphabetic or numeric character, but found {:?}", ch),
            ));
        }
        Ok(name)
    }

    fn scan_yaml_directive_value(&mut self, start_mark: &Mark) -> Result<(u32, u32)> {
        self.skip_spaces()?;
        let major = self.scan_yaml_directive_number(start_mark)?;
        if self.reader.peek(0)? != '.' {
            let ch = self.reader.peek(0)?;
            return Err(self.error(
                "while scanning a directive",
                Some(start_mark.clone()),
                &format!("expected a digit or '.', but found {:?}", ch),
            ));
        }
        self.reader.forward(1)?;
        let minor = self.scan_yaml_directive_number(start_mark)?;
        let ch = self.reader.peek(0)?;
        if !is_blank_or_nul(ch) {
            return Err(self.error(
                "while scanning a directive",
                Some(start_mark.clone()),
                &format!("expected a digit or ' ', but found {:?}", ch),
            ));
        }
        Ok((major, minor))
    }

    fn scan_yaml_directive_number(&mut self, start_mark: &Mark) -> Result<u32> {
        let mut length = 0;
        while self.reader.peek(length)?.is_ascii_digit() {
            length += 1;
        }
        if length == 0 {
            let ch = self.reader.peek(0)?;
            return Err(self.error(
                "while scanning a directive",
                Some(start_mark.clone()),
                &format!("expected a digit, but found {:?}", ch),
            ));
        }
        let digits = self.reader.prefix(length)?;
        self.reader.forward(length)?;
        digits.parse().map_err(|_| {
            self.error(
                "while scanning a directive",
                Some(start_mark.clone()),
                "version number is too large",
            )
        })
    }

    fn scan_tag_directive_value(&mut self, start_mark: &Mark) -> Result<(String, String)> {
        self.skip_spaces()?;
        let handle = self.scan_tag_handle("directive", start_mark)?;
        let ch = self.reader.peek(0)?;
        if ch != ' ' {
            return Err(self.error(
                "while scanning a directive",
                Some(start_mark.clone()),
                &format!("expected ' ', but found {:?}", ch),
            ));
        }
        self.skip_spaces()?;
        let prefix = self.scan_tag_uri("directive", start_mark)?;
        let ch = self.reader.peek(0)?;
        if !is_blank_or_nul(ch) {
            return Err(self.error(
                "while scanning a directive",
                Some(start_mark.clone()),
                &format!("expected ' ', but found {:?}", ch),
            ));
        }
        Ok((handle, prefix))
    }

    fn scan_directive_ignored_line(&mut self, start_mark: &Mark) -> Result<()> {
        self.skip_spaces()?;
        if self.reader.peek(0)? == '#' {
            let comment = self.scan_comment()?;
            self.trivia.push(Trivia::Line(comment));
        }
        let ch = self.reader.peek(0)?;
        if !is_break_or_nul(ch) {
            return Err(self.error(
                "while scanning a directive",
                Some(start_mark.clone()),
                &format!("expected a comment or a line break, but found {:?}", ch),
            ));
        }
        self.scan_line_break()?;
        Ok(())
    }

    // ========================================================================
    // Anchors, aliases and tags
    // ========================================================================

    fn scan_anchor(&mut self, alias: bool) -> Result<Token> {
        let start_mark = self.reader.mark();
        let (context, kind): (&str, fn(String) -> TokenKind) = if alias {
            ("while scanning an alias", TokenKind::Alias)
        } else {
            ("while scanning an anchor", TokenKind::Anchor)
        };
        self.reader.forward(1)?;
        let mut length = 0;
        loop {
            let ch = self.reader.peek(length)?;
            if is_blank_or_nul(ch) || is_flow_indicator(ch) {
                break;
            }
            length += 1;
        }
        if length == 0 {
            let ch = self.reader.peek(0)?;
            return Err(self.error(
                context,
                Some(start_mark),
                &format!("expected alphabetic or numeric character, but found {:?}", ch),
            ));
        }
        let name = self.reader.prefix(length)?;
        self.reader.forward(length)?;
        let end_mark = self.reader.mark();
        Ok(Token::new(kind(name), start_mark, end_mark))
    }

    fn scan_tag(&mut self) -> Result<Token> {
        let start_mark = self.reader.mark();
        let next = self.reader.peek(1)?;
        let (handle, suffix) = if next == '<' {
            self.reader.forward(2)?;
            let suffix = self.scan_tag_uri("tag", &start_mark)?;
            if self.reader.peek(0)? != '>' {
                let ch = self.reader.peek(0)?;
                return Err(self.error(
                    "while parsing a tag",
                    Some(start_mark),
                    &format!("expected '>', but found {:?}", ch),
                ));
            }
            self.reader.forward(1)?;
            (String::new(), suffix)
        } else if is_blank_or_nul(next) || (self.flow_level > 0 && is_flow_indicator(next)) {
            self.reader.forward(1)?;
            (String::new(), "!".to_string())
        } else {
            let mut length = 1;
            let mut use_handle = false;
            loop {
                let ch = self.reader.peek(length)?;
                if is_blank_or_nul(ch) {
                    break;
                }
                if ch == '!' {
                    use_handle = true;
                    break;
                }
                length += 1;
            }
            let handle = if use_handle {
                self.scan_tag_handle("tag", &start_mark)?
            } else {
                self.reader.forward(1)?;
                "!".to_string()
            };
            let suffix = self.scan_tag_uri("tag", &start_mark)?;
            (handle, suffix)
        };
        let ch = self.reader.peek(0)?;
        if !is_blank_or_nul(ch) && !(self.flow_level > 0 && is_flow_indicator(ch)) {
            return Err(self.error(
                "while scanning a tag",
                Some(start_mark),
                &format!("expected ' ', but found {:?}", ch),
            ));
        }
        let end_mark = self.reader.mark();
        Ok(Token::new(TokenKind::Tag { handle, suffix }, start_mark, end_mark))
    }

    /// Scan `!`, `!!` or `!name!`.
    fn scan_tag_handle(&mut self, name: &str, start_mark: &Mark) -> Result<String> {
        let context = format!("while scanning a {}", name);
        let ch = self.reader.peek(0)?;
        if ch != '!' {
            return Err(self.error(
                &context,
                Some(start_mark.clone()),
                &format!("expected '!', but found {:?}", ch),
            ));
        }
        let mut length = 1;
        let mut ch = self.reader.peek(length)?;
        if ch != ' ' {
            while is_word_char(ch) {
                length += 1;
                ch = self.reader.peek(length)?;
            }
            if ch != '!' {
                self.reader.forward(length)?;
                return Err(self.error(
                    &context,
                    Some(start_mark.clone()),
                    &format!("expected '!', but found {:?}", ch),
                ));
            }
            length += 1;
        }
        let handle = self.reader.prefix(length)?;
        self.reader.forward(length)?;
        Ok(handle)
    }

    fn scan_tag_uri(&mut self, name: &str, start_mark: &Mark) -> Result<String> {
        let mut bytes: Vec<u8> = Vec::new();
        loop {
            let ch = self.reader.peek(0)?;
            if !is_uri_char(ch) || (self.flow_level > 0 && is_flow_indicator(ch)) {
                break;
            }
            if ch == '%' {
                self.scan_uri_escape(name, start_mark, &mut bytes)?;
            } else {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                self.reader.forward(1)?;
            }
        }
        let uri = String::from_utf8(bytes).map_err(|_| {
            self.error(
                &format!("while scanning a {}", name),
                Some(start_mark.clone()),
                "URI escapes do not form valid UTF-8",
            )
        })?;
        if uri.is_empty() {
            let ch = self.reader.peek(0)?;
            return Err(self.error(
                &format!("while parsing a {}", name),
                Some(start_mark.clone()),
                &format!("expected URI, but found {:?}", ch),
            ));
        }
        Ok(uri)
    }

    fn scan_uri_escape(&mut self, name: &str, start_mark: &Mark, bytes: &mut Vec<u8>) -> Result<()> {
        let hex = self.reader.prefix(3)?;
        let digits = hex.get(1..).unwrap_or_default();
        match u8::from_str_radix(digits, 16) {
            Ok(byte) if digits.len() == 2 => {
                bytes.push(byte);
                self.reader.forward(3)?;
                Ok(())
            }
            _ => Err(self.error(
                &format!("while scanning a {}", name),
                Some(start_mark.clone()),
                &format!("expected URI escaped sequence of 2 hexadecimal digits, but found {:?}", hex),
            )),
        }
    }

    // ========================================================================
    // Block scalars
    // ========================================================================

    /// Scan a literal or folded scalar. Also returns the number of trailing
    /// empty lines that chomping excluded from the value.
    fn scan_block_scalar(&mut self, style: ScalarStyle) -> Result<(Token, usize)> {
        let folded = style == ScalarStyle::Folded;
        let start_mark = self.reader.mark();
        self.reader.forward(1)?;
        let (chomping, increment) = self.scan_block_scalar_indicators(&start_mark)?;
        let header_comment = self.scan_block_scalar_ignored_line(&start_mark)?;

        let min_indent = (self.indent + 1).max(1) as usize;
        let (mut breaks, indent, mut end_mark) = match increment {
            None => {
                let (breaks, max_indent, end_mark) = self.scan_block_scalar_indentation()?;
                (breaks, min_indent.max(max_indent), end_mark)
            }
            Some(increment) => {
                let indent = min_indent + increment - 1;
                let (breaks, end_mark) = self.scan_block_scalar_breaks(indent)?;
                (breaks, indent, end_mark)
            }
        };

        let mut value = String::new();
        let mut raw_lines: Vec<String> = Vec::new();
        let mut line_break = String::new();
        while self.reader.column() == indent && self.reader.peek(0)? != '\0' {
            for b in &breaks {
                value.push_str(b);
                raw_lines.push(String::new());
            }
            let leading_non_space = !matches!(self.reader.peek(0)?, ' ' | '\t');
            let mut length = 0;
            while !is_break_or_nul(self.reader.peek(length)?) {
                length += 1;
            }
            let line = self.reader.prefix(length)?;
            self.reader.forward(length)?;
            value.push_str(&line);
            raw_lines.push(line);
            line_break = self.scan_line_break()?;
            let (next_breaks, next_end) = self.scan_block_scalar_breaks(indent)?;
            breaks = next_breaks;
            end_mark = next_end;
            if self.reader.column() == indent && self.reader.peek(0)? != '\0' {
                let next = self.reader.peek(0)?;
                if folded && line_break == "\n" && leading_non_space && !matches!(next, ' ' | '\t') {
                    if breaks.is_empty() {
                        value.push(' ');
                    }
                } else {
                    value.push_str(&line_break);
                }
            } else {
                break;
            }
        }

        let chomping = chomping.unwrap_or_default();
        let blank_lines = match chomping {
            Chomping::Strip => breaks.len(),
            Chomping::Clip => {
                value.push_str(&line_break);
                breaks.len()
            }
            Chomping::Keep => {
                value.push_str(&line_break);
                for b in &breaks {
                    value.push_str(b);
                }
                0
            }
        };

        let mut scalar = ScalarToken::new(value, style);
        scalar.chomping = Some(chomping);
        scalar.indent_indicator = increment;
        scalar.header_comment = header_comment;
        if folded {
            scalar.source = Some(raw_lines.join("\n"));
        }
        Ok((
            Token::new(TokenKind::Scalar(scalar), start_mark, end_mark),
            blank_lines,
        ))
    }

    fn scan_block_scalar_indicators(
        &mut self,
        start_mark: &Mark,
    ) -> Result<(Option<Chomping>, Option<usize>)> {
        let mut chomping = None;
        let mut increment = None;
        let mut ch = self.reader.peek(0)?;
        if ch == '+' || ch == '-' {
            chomping = Some(if ch == '+' { Chomping::Keep } else { Chomping::Strip });
            self.reader.forward(1)?;
            ch = self.reader.peek(0)?;
            if let Some(digit) = ch.to_digit(10) {
                increment = Some(self.indentation_indicator(digit, start_mark)?);
                self.reader.forward(1)?;
            }
        } else if let Some(digit) = ch.to_digit(10) {
            increment = Some(self.indentation_indicator(digit, start_mark)?);
            self.reader.forward(1)?;
            ch = self.reader.peek(0)?;
            if ch == '+' || ch == '-' {
                chomping = Some(if ch == '+' { Chomping::Keep } else { Chomping::Strip });
                self.reader.forward(1)?;
            }
        }
        let ch = self.reader.peek(0)?;
        if !is_blank_or_nul(ch) {
            return Err(self.error(
                "while scanning a block scalar",
                Some(start_mark.clone()),
                &format!("expected chomping or indentation indicators, but found {:?}", ch),
            ));
        }
        Ok((chomping, increment))
    }

    fn indentation_indicator(&self, digit: u32, start_mark: &Mark) -> Result<usize> {
        if digit == 0 {
            return Err(self.error(
                "while scanning a block scalar",
                Some(start_mark.clone()),
                "expected indentation indicator in the range 1-9, but found 0",
            ));
        }
        Ok(digit as usize)
    }

    fn scan_block_scalar_ignored_line(&mut self, start_mark: &Mark) -> Result<Option<Comment>> {
        self.skip_spaces()?;
        let comment = if self.reader.peek(0)? == '#' {
            Some(self.scan_comment()?)
        } else {
            None
        };
        let ch = self.reader.peek(0)?;
        if !is_break_or_nul(ch) {
            return Err(self.error(
                "while scanning a block scalar",
                Some(start_mark.clone()),
                &format!("expected a comment or a line break, but found {:?}", ch),
            ));
        }
        self.scan_line_break()?;
        Ok(comment)
    }

    /// Skip leading empty lines, measuring the deepest indentation seen.
    fn scan_block_scalar_indentation(&mut self) -> Result<(Vec<String>, usize, Mark)> {
        let mut breaks = Vec::new();
        let mut max_indent = 0;
        let mut end_mark = self.reader.mark();
        loop {
            let ch = self.reader.peek(0)?;
            if ch == ' ' {
                self.reader.forward(1)?;
                max_indent = max_indent.max(self.reader.column());
            } else if is_break(ch) {
                breaks.push(self.scan_line_break()?);
                end_mark = self.reader.mark();
            } else {
                break;
            }
        }
        Ok((breaks, max_indent, end_mark))
    }

    fn scan_block_scalar_breaks(&mut self, indent: usize) -> Result<(Vec<String>, Mark)> {
        let mut breaks = Vec::new();
        let mut end_mark = self.reader.mark();
        while self.reader.column() < indent && self.reader.peek(0)? == ' ' {
            self.reader.forward(1)?;
        }
        while is_break(self.reader.peek(0)?) {
            breaks.push(self.scan_line_break()?);
            end_mark = self.reader.mark();
            while self.reader.column() < indent && self.reader.peek(0)? == ' ' {
                self.reader.forward(1)?;
            }
        }
        Ok((breaks, end_mark))
    }

    // ========================================================================
    // Flow scalars
    // ========================================================================

    fn scan_flow_scalar(&mut self, style: ScalarStyle) -> Result<Token> {
        let double = style == ScalarStyle::DoubleQuoted;
        let start_mark = self.reader.mark();
        let quote = self.reader.peek(0)?;
        self.reader.forward(1)?;
        let mut value = String::new();
        self.scan_flow_scalar_non_spaces(double, &start_mark, &mut value)?;
        while self.reader.peek(0)? != quote {
            self.scan_flow_scalar_spaces(&start_mark, &mut value)?;
            self.scan_flow_scalar_non_spaces(double, &start_mark, &mut value)?;
        }
        self.reader.forward(1)?;
        let end_mark = self.reader.mark();
        let mut scalar = ScalarToken::new(value, style);
        if start_mark.line == end_mark.line {
            scalar.source = self.reader.consumed_since(start_mark.index);
        }
        Ok(Token::new(TokenKind::Scalar(scalar), start_mark, end_mark))
    }

    fn scan_flow_scalar_non_spaces(
        &mut self,
        double: bool,
        start_mark: &Mark,
        value: &mut String,
    ) -> Result<()> {
        loop {
            let mut length = 0;
            loop {
                let ch = self.reader.peek(length)?;
                if matches!(ch, '\'' | '"' | '\\') || is_blank_or_nul(ch) {
                    break;
                }
                length += 1;
            }
            if length > 0 {
                value.push_str(&self.reader.prefix(length)?);
                self.reader.forward(length)?;
            }
            let ch = self.reader.peek(0)?;
            if !double && ch == '\'' && self.reader.peek(1)? == '\'' {
                value.push('\'');
                self.reader.forward(2)?;
            } else if (double && ch == '\'') || (!double && (ch == '"' || ch == '\\')) {
                value.push(ch);
                self.reader.forward(1)?;
            } else if double && ch == '\\' {
                self.reader.forward(1)?;
                let ch = self.reader.peek(0)?;
                if let Some(replacement) = escape_replacement(ch) {
                    value.push(replacement);
                    self.reader.forward(1)?;
                } else if let Some(length) = escape_code_length(ch) {
                    self.reader.forward(1)?;
                    value.push(self.scan_escape_code(length, start_mark)?);
                } else if is_break(ch) {
                    self.scan_line_break()?;
                    self.scan_flow_scalar_breaks(start_mark, value)?;
                } else {
                    return Err(self.error(
                        "while scanning a double-quoted scalar",
                        Some(start_mark.clone()),
                        &format!("found unknown escape character {:?}", ch),
                    ));
                }
            } else {
                return Ok(());
            }
        }
    }

    fn scan_escape_code(&mut self, length: usize, start_mark: &Mark) -> Result<char> {
        for k in 0..length {
            let ch = self.reader.peek(k)?;
            if !ch.is_ascii_hexdigit() {
                return Err(self.error(
                    "while scanning a double-quoted scalar",
                    Some(start_mark.clone()),
                    &format!(
                        "expected escape sequence of {} hexadecimal numbers, but found {:?}",
                        length, ch
                    ),
                ));
            }
        }
        let digits = self.reader.prefix(length)?;
        let code = u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32);
        match code {
            Some(ch) => {
                self.reader.forward(length)?;
                Ok(ch)
            }
            None => Err(self.error(
                "while scanning a double-quoted scalar",
                Some(start_mark.clone()),
                &format!("escape sequence {:?} is not a valid Unicode code point", digits),
            )),
        }
    }

    fn scan_flow_scalar_spaces(&mut self, start_mark: &Mark, value: &mut String) -> Result<()> {
        let mut length = 0;
        while matches!(self.reader.peek(length)?, ' ' | '\t') {
            length += 1;
        }
        let whitespace = self.reader.prefix(length)?;
        self.reader.forward(length)?;
        let ch = self.reader.peek(0)?;
        if ch == '\0' {
            return Err(self.error(
                "while scanning a quoted scalar",
                Some(start_mark.clone()),
                "found unexpected end of stream",
            ));
        }
        if is_break(ch) {
            let line_break = self.scan_line_break()?;
            let mut breaks = String::new();
            self.scan_flow_scalar_breaks(start_mark, &mut breaks)?;
            if line_break != "\n" {
                value.push_str(&line_break);
            } else if breaks.is_empty() {
                value.push(' ');
            }
            value.push_str(&breaks);
        } else {
            value.push_str(&whitespace);
        }
        Ok(())
    }

    fn scan_flow_scalar_breaks(&mut self, start_mark: &Mark, value: &mut String) -> Result<()> {
        loop {
            let prefix = self.reader.prefix(3)?;
            if (prefix == "---" || prefix == "...") && is_blank_or_nul(self.reader.peek(3)?) {
                return Err(self.error(
                    "while scanning a quoted scalar",
                    Some(start_mark.clone()),
                    "found unexpected document separator",
                ));
            }
            while matches!(self.reader.peek(0)?, ' ' | '\t') {
                self.reader.forward(1)?;
            }
            if is_break(self.reader.peek(0)?) {
                value.push_str(&self.scan_line_break()?);
            } else {
                return Ok(());
            }
        }
    }

    // ========================================================================
    // Plain scalars
    // ========================================================================

    /// Scan a plain scalar. Also returns the number of empty lines consumed
    /// while looking for a continuation line that never came.
    fn scan_plain(&mut self) -> Result<(Token, usize)> {
        let start_mark = self.reader.mark();
        let mut end_mark = start_mark.clone();
        let indent = self.indent + 1;
        let mut value = String::new();
        let mut spaces = String::new();
        let mut blank_lines = 0;
        loop {
            if self.reader.peek(0)? == '#' {
                break;
            }
            let mut length = 0;
            loop {
                let ch = self.reader.peek(length)?;
                if is_blank_or_nul(ch) || (self.flow_level > 0 && is_flow_indicator(ch)) {
                    break;
                }
                if ch == ':' {
                    let next = self.reader.peek(length + 1)?;
                    if is_blank_or_nul(next) || (self.flow_level > 0 && is_flow_indicator(next)) {
                        break;
                    }
                }
                length += 1;
            }
            if length == 0 {
                break;
            }
            self.allow_simple_key = false;
            value.push_str(&spaces);
            value.push_str(&self.reader.prefix(length)?);
            self.reader.forward(length)?;
            end_mark = self.reader.mark();
            let continuation = self.scan_plain_spaces()?;
            blank_lines = continuation.blank_lines;
            match continuation.spaces {
                Some(next) if !next.is_empty() => spaces = next,
                _ => break,
            }
            if self.reader.peek(0)? == '#'
                || (self.flow_level == 0 && (self.reader.column() as isize) < indent)
            {
                break;
            }
        }
        let mut scalar = ScalarToken::new(value, ScalarStyle::Plain);
        if start_mark.line == end_mark.line {
            scalar.source = Some(scalar.value.clone());
        }
        Ok((
            Token::new(TokenKind::Scalar(scalar), start_mark, end_mark),
            blank_lines,
        ))
    }

    fn scan_plain_spaces(&mut self) -> Result<PlainContinuation> {
        let mut length = 0;
        while self.reader.peek(length)? == ' ' {
            length += 1;
        }
        let whitespace = self.reader.prefix(length)?;
        self.reader.forward(length)?;
        let ch = self.reader.peek(0)?;
        if !is_break(ch) {
            return Ok(PlainContinuation {
                spaces: Some(whitespace),
                blank_lines: 0,
            });
        }
        let line_break = self.scan_line_break()?;
        self.allow_simple_key = true;
        let mut breaks: Vec<String> = Vec::new();
        loop {
            let prefix = self.reader.prefix(3)?;
            if (prefix == "---" || prefix == "...") && is_blank_or_nul(self.reader.peek(3)?) {
                return Ok(PlainContinuation {
                    spaces: None,
                    blank_lines: breaks.len(),
                });
            }
            let ch = self.reader.peek(0)?;
            if ch == ' ' {
                self.reader.forward(1)?;
            } else if is_break(ch) {
                breaks.push(self.scan_line_break()?);
            } else {
                break;
            }
        }
        let mut spaces = String::new();
        if line_break != "\n" {
            spaces.push_str(&line_break);
        } else if breaks.is_empty() {
            spaces.push(' ');
        }
        spaces.extend(breaks.iter().map(String::as_str));
        Ok(PlainContinuation {
            spaces: Some(spaces),
            blank_lines: breaks.len(),
        })
    }
}

/// Whitespace after a plain scalar chunk: the folded text to insert if the
/// scalar continues (`None` at a document marker).
struct PlainContinuation {
    spaces: Option<String>,
    blank_lines: usize,
}

/// Scan a whole string into tokens.
pub fn scan_str(input: &str) -> Result<Vec<Token>> {
    let mut scanner = Scanner::new(Reader::from_str(input, "<unicode string>")?);
    let mut tokens = Vec::new();
    while let Some(token) = scanner.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn kinds(input: &str) -> Vec<TokenKind> {
        scan_str(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn scalar(value: &str) -> TokenKind {
        let mut s = ScalarToken::new(value, ScalarStyle::Plain);
        s.source = Some(value.to_string());
        TokenKind::Scalar(s)
    }

    fn scalars(input: &str) -> Vec<String> {
        scan_str(input)
            .unwrap()
            .into_iter()
            .filter_map(|t| match t.kind {
                TokenKind::Scalar(s) => Some(s.value),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_block_mapping() {
        use TokenKind::*;
        assert_eq!(
            kinds("a: 1\nb: 2\n"),
            vec![
                StreamStart,
                BlockMappingStart,
                Key,
                scalar("a"),
                Value,
                scalar("1"),
                Key,
                scalar("b"),
                Value,
                scalar("2"),
                BlockEnd,
                StreamEnd,
            ]
        );
    }

    #[test]
    fn test_indentless_sequence_in_mapping() {
        use TokenKind::*;
        assert_eq!(
            kinds("k:\n- x\n"),
            vec![
                StreamStart,
                BlockMappingStart,
                Key,
                scalar("k"),
                Value,
                BlockEntry,
                scalar("x"),
                BlockEnd,
                StreamEnd,
            ]
        );
    }

    #[test]
    fn test_flow_collections() {
        use TokenKind::*;
        assert_eq!(
            kinds("{a: [1, 2]}"),
            vec![
                StreamStart,
                FlowMappingStart,
                Key,
                scalar("a"),
                Value,
                FlowSequenceStart,
                scalar("1"),
                FlowEntry,
                scalar("2"),
                FlowSequenceEnd,
                FlowMappingEnd,
                StreamEnd,
            ]
        );
    }

    #[test]
    fn test_anchor_alias_tag() {
        let tokens = kinds("- &x !!str a\n- *x\n- !<tag:example.com,2000:y> b\n");
        assert!(tokens.contains(&TokenKind::Anchor("x".into())));
        assert!(tokens.contains(&TokenKind::Alias("x".into())));
        assert!(tokens.contains(&TokenKind::Tag {
            handle: "!!".into(),
            suffix: "str".into()
        }));
        assert!(tokens.contains(&TokenKind::Tag {
            handle: String::new(),
            suffix: "tag:example.com,2000:y".into()
        }));
    }

    #[test]
    fn test_directives() {
        let tokens = kinds("%YAML 1.1\n%TAG !e! tag:example.com,2000:\n--- x\n");
        assert_eq!(tokens[1], TokenKind::VersionDirective { major: 1, minor: 1 });
        assert_eq!(
            tokens[2],
            TokenKind::TagDirective {
                handle: "!e!".into(),
                prefix: "tag:example.com,2000:".into()
            }
        );
        assert_eq!(tokens[3], TokenKind::DocumentStart);
    }

    #[rstest]
    #[case("k: |\n  a\n  b\n\n", "a\nb\n")]
    #[case("k: |-\n  a\n  b\n\n", "a\nb")]
    #[case("k: |+\n  a\n  b\n\n", "a\nb\n\n")]
    #[case("k: >\n  a\n  b\n\n  c\n", "a b\nc\n")]
    #[case("k: >\n  a\n    indented\n  b\n", "a\n  indented\nb\n")]
    #[case("k: |2\n   lead\n", " lead\n")]
    fn test_block_scalar_values(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(scalars(input)[1], expected);
    }

    #[rstest]
    #[case("'it''s'", "it's")]
    #[case("\"tab\\there\"", "tab\there")]
    #[case("\"\\x41\\u00e9\\U0001F600\"", "A\u{e9}\u{1F600}")]
    #[case("'a\n  b\n\n  c'", "a b\nc")]
    #[case("\"a \\\n  b\"", "a b")]
    #[case("plain\n  folded\n  text", "plain folded text")]
    #[case("applications/\\1/static/\\2", "applications/\\1/static/\\2")]
    fn test_flow_scalar_values(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(scalars(input), vec![expected.to_string()]);
    }

    #[test]
    fn test_plain_scalar_with_colons_in_flow() {
        assert_eq!(scalars("[a:b, c]"), vec!["a:b", "c"]);
        assert_eq!(scalars("url: http://x.y/z"), vec!["url", "http://x.y/z"]);
    }

    #[test]
    fn test_single_line_source_kept() {
        let tokens = scan_str("a: 'x''y'\n").unwrap();
        let source = tokens.iter().find_map(|t| match &t.kind {
            TokenKind::Scalar(s) if s.style == ScalarStyle::SingleQuoted => s.source.clone(),
            _ => None,
        });
        assert_eq!(source.as_deref(), Some("'x''y'"));
    }

    #[test]
    fn test_folded_source_kept() {
        let tokens = scan_str("k: >\n  a\n  b\n\n  c\n").unwrap();
        let source = tokens.iter().find_map(|t| match &t.kind {
            TokenKind::Scalar(s) if s.style == ScalarStyle::Folded => s.source.clone(),
            _ => None,
        });
        assert_eq!(source.as_deref(), Some("a\nb\n\nc"));
    }

    #[test]
    fn test_comment_trivia() {
        let tokens = scan_str("# top\n\na: 1  # eol\n# own\nb: 2\n").unwrap();
        // The top comment and blank line precede the mapping.
        assert_eq!(tokens[1].kind, TokenKind::BlockMappingStart);
        assert_eq!(
            tokens[1].trivia,
            vec![Trivia::Line(Comment::new("# top", 0)), Trivia::Blank]
        );
        let key_b = tokens
            .iter()
            .position(|t| t.kind == scalar("b"))
            .unwrap();
        // `Key` was inserted before `b` and took its trivia.
        assert_eq!(tokens[key_b - 1].kind, TokenKind::Key);
        assert_eq!(
            tokens[key_b - 1].trivia,
            vec![
                Trivia::Eol(Comment::new("# eol", 6)),
                Trivia::Line(Comment::new("# own", 0)),
            ]
        );
    }

    #[test]
    fn test_block_scalar_excluded_lines_become_blank_trivia() {
        let tokens = scan_str("- |\n  a\n\n\n- b\n").unwrap();
        let entry = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::BlockEntry)
            .nth(1)
            .unwrap();
        assert_eq!(entry.trivia, vec![Trivia::Blank, Trivia::Blank]);
    }

    #[test]
    fn test_block_scalar_header_comment() {
        let tokens = scan_str("k: |  # note\n  x\n").unwrap();
        let header = tokens.iter().find_map(|t| match &t.kind {
            TokenKind::Scalar(s) => s.header_comment.clone(),
            _ => None,
        });
        assert_eq!(header, Some(Comment::new("# note", 6)));
    }

    #[rstest]
    #[case("'unterminated", "found unexpected end of stream")]
    #[case("\"bad \\q escape\"", "found unknown escape character 'q'")]
    #[case("a:\n\tb: 1\n", "found a tab character where an indentation space is expected")]
    #[case("key: @foo", "found character '@' that cannot start any token")]
    #[case("a: b: c\n", "mapping values are not allowed here")]
    #[case("k: |0\n  x\n", "expected indentation indicator in the range 1-9, but found 0")]
    fn test_scanner_errors(#[case] input: &str, #[case] problem: &str) {
        let err = scan_str(input).unwrap_err();
        assert!(matches!(err, YamlError::Scanner(_)), "{:?}", err);
        assert_eq!(err.marked().unwrap().problem, problem);
    }

    #[test]
    fn test_error_carries_snippet() {
        let err = scan_str("key: @foo").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("line 1, column 6"), "{}", text);
        assert!(text.contains("    key: @foo\n         ^"), "{}", text);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut scanner = Scanner::new(Reader::from_str("a", "<test>").unwrap());
        assert_eq!(scanner.peek_token().unwrap().unwrap().kind, TokenKind::StreamStart);
        assert_eq!(scanner.next_token().unwrap().unwrap().kind, TokenKind::StreamStart);
        assert!(scanner.has_next_token().unwrap());
        while scanner.next_token().unwrap().is_some() {}
        assert!(!scanner.has_next_token().unwrap());
    }
}
