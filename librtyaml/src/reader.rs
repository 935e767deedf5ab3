//! Phase 0: Reader
//!
//! The reader turns a byte stream (or a string) into characters for the
//! scanner. It:
//! - Detects the encoding from a byte-order mark or the leading bytes
//! - Decodes UTF-8 and UTF-16 incrementally, chunk by chunk
//! - Strips the byte-order mark
//! - Rejects non-printable characters
//! - Tracks index, line and column for [`Mark`]s

use std::io::Read;
use std::sync::Arc;

use crate::error::{Mark, MarkedError, Result, YamlError};

const CHUNK_SIZE: usize = 8192;

/// Character encoding of a YAML byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    /// Encode text for output. UTF-16 output starts with a byte-order mark.
    pub fn encode(self, text: &str, at_stream_start: bool) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Utf16Le | Encoding::Utf16Be => {
                let mut out = Vec::with_capacity(text.len() * 2 + 2);
                let bom = at_stream_start.then_some(0xFEFFu16);
                for unit in bom.into_iter().chain(text.encode_utf16()) {
                    let bytes = if self == Encoding::Utf16Le {
                        unit.to_le_bytes()
                    } else {
                        unit.to_be_bytes()
                    };
                    out.extend_from_slice(&bytes);
                }
                out
            }
        }
    }
}

/// Check whether a code point may appear in a YAML stream.
fn is_printable(ch: char) -> bool {
    let cp = ch as u32;
    matches!(cp, 0x09 | 0x0A | 0x0D | 0x85)
        || (0x20..=0x7E).contains(&cp)
        || (0xA0..=0xD7FF).contains(&cp)
        || (0xE000..=0xFFFD).contains(&cp)
        || (0x10000..=0x10FFFF).contains(&cp)
}

/// Pull-based character source for the scanner.
pub struct Reader<'a> {
    name: Arc<str>,
    source: Option<Box<dyn Read + 'a>>,
    raw: Vec<u8>,
    encoding: Option<Encoding>,
    buffer: Vec<char>,
    pointer: usize,
    /// Global index of `buffer[0]`.
    base: usize,
    index: usize,
    line: usize,
    column: usize,
    eof: bool,
}

impl<'a> Reader<'a> {
    /// Read from an in-memory string.
    pub fn from_str(input: &str, name: &str) -> Result<Self> {
        let mut reader = Self::empty(name);
        reader.encoding = Some(Encoding::Utf8);
        reader.eof = true;
        let text = input.strip_prefix('\u{FEFF}').unwrap_or(input);
        reader.push_chars(text.chars())?;
        Ok(reader)
    }

    /// Read from a byte stream, detecting its encoding.
    pub fn from_read(source: impl Read + 'a, name: &str) -> Self {
        let mut reader = Self::empty(name);
        reader.source = Some(Box::new(source));
        reader
    }

    fn empty(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            source: None,
            raw: Vec::new(),
            encoding: None,
            buffer: Vec::new(),
            pointer: 0,
            base: 0,
            index: 0,
            line: 0,
            column: 0,
            eof: false,
        }
    }

    /// The detected (or assumed) input encoding.
    pub fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Look `n` characters ahead; `'\0'` past the end of the stream.
    pub fn peek(&mut self, n: usize) -> Result<char> {
        self.ensure(n + 1)?;
        Ok(self.buffer.get(self.pointer + n).copied().unwrap_or('\0'))
    }

    /// The next `n` characters (fewer at the end of the stream).
    pub fn prefix(&mut self, n: usize) -> Result<String> {
        self.ensure(n)?;
        let end = (self.pointer + n).min(self.buffer.len());
        Ok(self.buffer[self.pointer..end].iter().collect())
    }

    /// Consume `n` characters, updating the position.
    pub fn forward(&mut self, n: usize) -> Result<()> {
        self.ensure(n + 1)?;
        for _ in 0..n {
            let Some(&ch) = self.buffer.get(self.pointer) else {
                break;
            };
            self.pointer += 1;
            self.index += 1;
            let next = self.buffer.get(self.pointer).copied().unwrap_or('\0');
            if matches!(ch, '\n' | '\u{85}' | '\u{2028}' | '\u{2029}') || (ch == '\r' && next != '\n')
            {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.compact();
        Ok(())
    }

    pub fn mark(&self) -> Mark {
        Mark::new(self.name.clone(), self.index, self.line, self.column)
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// The characters consumed since global index `start`, if still buffered.
    pub fn consumed_since(&self, start: usize) -> Option<String> {
        if start < self.base || start > self.index {
            return None;
        }
        let from = start - self.base;
        Some(self.buffer[from..self.pointer].iter().collect())
    }

    /// The source line holding `mark`, with a caret under its column, if the
    /// line is still buffered.
    pub fn snippet(&self, mark: &Mark) -> Option<String> {
        if mark.index < self.base || mark.index > self.base + self.buffer.len() {
            return None;
        }
        let at = mark.index - self.base;
        let is_break = |c: &char| matches!(c, '\n' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}');
        let start = self.buffer[..at]
            .iter()
            .rposition(is_break)
            .map_or(0, |p| p + 1);
        let end = self.buffer[at..]
            .iter()
            .position(is_break)
            .map_or(self.buffer.len(), |p| at + p);
        let line: String = self.buffer[start..end].iter().collect();
        let caret = " ".repeat(at - start);
        Some(format!("    {}\n    {}^", line, caret))
    }

    /// Drop consumed characters, keeping the current line for snippets.
    fn compact(&mut self) {
        if self.pointer < CHUNK_SIZE * 4 {
            return;
        }
        let keep_from = self.buffer[..self.pointer]
            .iter()
            .rposition(|&c| c == '\n')
            .map_or(self.pointer, |p| p + 1);
        self.buffer.drain(..keep_from);
        self.base += keep_from;
        self.pointer -= keep_from;
    }

    fn ensure(&mut self, length: usize) -> Result<()> {
        while !self.eof && self.buffer.len() - self.pointer < length {
            self.update()?;
        }
        Ok(())
    }

    /// Read and decode one more chunk.
    fn update(&mut self) -> Result<()> {
        let Some(source) = self.source.as_mut() else {
            self.eof = true;
            return Ok(());
        };
        let mut chunk = [0u8; CHUNK_SIZE];
        let read = source.read(&mut chunk)?;
        if read == 0 {
            self.eof = true;
            self.source = None;
        } else {
            self.raw.extend_from_slice(&chunk[..read]);
        }
        if self.encoding.is_none() {
            if self.raw.len() < 4 && !self.eof {
                return Ok(());
            }
            self.determine_encoding();
        }
        self.decode()
    }

    fn determine_encoding(&mut self) {
        let (encoding, bom) = match self.raw.as_slice() {
            [0xFF, 0xFE, ..] => (Encoding::Utf16Le, 2),
            [0xFE, 0xFF, ..] => (Encoding::Utf16Be, 2),
            [0xEF, 0xBB, 0xBF, ..] => (Encoding::Utf8, 3),
            [0x00, b, ..] if *b != 0 => (Encoding::Utf16Be, 0),
            [b, 0x00, ..] if *b != 0 => (Encoding::Utf16Le, 0),
            _ => (Encoding::Utf8, 0),
        };
        tracing::debug!(?encoding, "detected input encoding");
        self.raw.drain(..bom);
        self.encoding = Some(encoding);
    }

    fn decode(&mut self) -> Result<()> {
        match self.encoding {
            Some(Encoding::Utf8) | None => self.decode_utf8(),
            Some(encoding) => self.decode_utf16(encoding),
        }
    }

    fn decode_utf8(&mut self) -> Result<()> {
        let (text, consumed) = match std::str::from_utf8(&self.raw) {
            Ok(text) => (text.to_string(), self.raw.len()),
            Err(e) if e.error_len().is_none() && !self.eof => {
                let valid = e.valid_up_to();
                // valid_up_to guarantees the prefix is well-formed
                let text = String::from_utf8_lossy(&self.raw[..valid]).into_owned();
                (text, valid)
            }
            Err(e) => {
                let position = self.base + self.buffer.len() + e.valid_up_to();
                return Err(YamlError::Reader(MarkedError::new(
                    format!(
                        "'utf-8' codec can't decode byte #x{:02x}: invalid start byte\n  in \"{}\", position {}",
                        self.raw[e.valid_up_to()],
                        self.name,
                        position
                    ),
                    None,
                )));
            }
        };
        self.raw.drain(..consumed);
        self.push_chars(text.chars())
    }

    fn decode_utf16(&mut self, encoding: Encoding) -> Result<()> {
        let mut units: Vec<u16> = self
            .raw
            .chunks_exact(2)
            .map(|pair| match encoding {
                Encoding::Utf16Le => u16::from_le_bytes([pair[0], pair[1]]),
                _ => u16::from_be_bytes([pair[0], pair[1]]),
            })
            .collect();
        let mut consumed = units.len() * 2;
        // Keep a dangling high surrogate for the next chunk.
        if !self.eof && units.last().is_some_and(|u| (0xD800..0xDC00).contains(u)) {
            units.pop();
            consumed -= 2;
        }
        let mut chars = Vec::with_capacity(units.len());
        for decoded in char::decode_utf16(units) {
            match decoded {
                Ok(ch) => chars.push(ch),
                Err(e) => {
                    return Err(YamlError::Reader(MarkedError::new(
                        format!(
                            "'utf-16' codec can't decode unpaired surrogate #x{:04x}\n  in \"{}\"",
                            e.unpaired_surrogate(),
                            self.name
                        ),
                        None,
                    )))
                }
            }
        }
        self.raw.drain(..consumed);
        if self.eof && !self.raw.is_empty() {
            return Err(YamlError::Reader(MarkedError::new(
                format!("'utf-16' codec can't decode a truncated code unit\n  in \"{}\"", self.name),
                None,
            )));
        }
        self.push_chars(chars)
    }

    fn push_chars(&mut self, chars: impl IntoIterator<Item = char>) -> Result<()> {
        for ch in chars {
            if !is_printable(ch) {
                let position = self.base + self.buffer.len();
                return Err(YamlError::Reader(MarkedError::new(
                    format!(
                        "unacceptable character #x{:04x}: special characters are not allowed\n  in \"{}\", position {}",
                        ch as u32, self.name, position
                    ),
                    None,
                )));
            }
            self.buffer.push(ch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_and_forward() {
        let mut reader = Reader::from_str("ab\ncd", "<test>").unwrap();
        assert_eq!(reader.peek(0).unwrap(), 'a');
        assert_eq!(reader.prefix(3).unwrap(), "ab\n");
        reader.forward(3).unwrap();
        let mark = reader.mark();
        assert_eq!((mark.line, mark.column, mark.index), (1, 0, 3));
        assert_eq!(reader.peek(5).unwrap(), '\0');
    }

    #[test]
    fn test_crlf_counts_one_line() {
        let mut reader = Reader::from_str("a\r\nb", "<test>").unwrap();
        reader.forward(3).unwrap();
        assert_eq!(reader.mark().line, 1);
        assert_eq!(reader.mark().column, 0);
    }

    #[test]
    fn test_utf16_detection() {
        let bytes = Encoding::Utf16Le.encode("key: värde", true);
        let mut reader = Reader::from_read(bytes.as_slice(), "<bytes>");
        assert_eq!(reader.prefix(10).unwrap(), "key: värde");
        assert_eq!(reader.encoding(), Some(Encoding::Utf16Le));
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let bytes = b"\xEF\xBB\xBFa: 1".to_vec();
        let mut reader = Reader::from_read(bytes.as_slice(), "<bytes>");
        assert_eq!(reader.peek(0).unwrap(), 'a');
    }

    #[test]
    fn test_non_printable_rejected() {
        let err = Reader::from_str("a\u{1}b", "<test>").err().unwrap();
        assert!(matches!(err, YamlError::Reader(_)));
        assert!(err.to_string().contains("#x0001"));
    }

    #[test]
    fn test_snippet() {
        let mut reader = Reader::from_str("first\nsecond line", "<test>").unwrap();
        reader.forward(9).unwrap();
        let mark = reader.mark();
        assert_eq!(
            reader.snippet(&mark).unwrap(),
            "    second line\n       ^"
        );
    }
}
