//! The loading pipeline: reader, scanner, parser, composer and constructor
//! bound to one input stream.

use std::io::{self, Read};
use std::rc::Rc;

use tracing::debug;

use crate::composer::Composer;
use crate::constructor::Constructor;
use crate::error::{Result, YamlError};
use crate::events::Event;
use crate::nodes::Node;
use crate::parser::Parser;
use crate::reader::Reader;
use crate::schema::Schema;
use crate::scanner::Scanner;
use crate::tokens::Token;
use crate::value::{Document, Value};

/// Name used in marks when the caller gives none.
pub const DEFAULT_STREAM_NAME: &str = "<unicode string>";

/// Options for loading.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Stream name shown in error positions.
    pub name: String,
    /// Resolve every document with this YAML version, ignoring `%YAML`.
    pub version: Option<(u32, u32)>,
    /// Keep the quoting style of string scalars in round-trip mode.
    pub preserve_quotes: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_STREAM_NAME.to_string(),
            version: None,
            preserve_quotes: true,
        }
    }
}

impl LoaderOptions {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_version(mut self, version: (u32, u32)) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_preserve_quotes(mut self, preserve_quotes: bool) -> Self {
        self.preserve_quotes = preserve_quotes;
        self
    }
}

/// A loading pipeline. Tokens, events, nodes or values can be pulled from
/// it one at a time; mixing levels on one loader is allowed but each unit is
/// consumed only once.
///
/// The input stream and all buffers are released by [`Loader::dispose`] or
/// when the loader is dropped, whichever comes first. A stream-fatal error
/// disposes the loader as well.
pub struct Loader<'a> {
    composer: Option<Composer<'a>>,
    constructor: Constructor,
}

impl<'a> Loader<'a> {
    pub fn new(reader: Reader<'a>, schema: Schema, options: &LoaderOptions) -> Self {
        let resolver = schema.resolver().clone();
        let composer = Composer::new(Parser::new(reader), resolver, options.version);
        let constructor = Constructor::new(schema).with_preserve_quotes(options.preserve_quotes);
        Self {
            composer: Some(composer),
            constructor,
        }
    }

    /// Load from a string.
    pub fn from_str(input: &str, schema: Schema, options: &LoaderOptions) -> Result<Self> {
        Ok(Self::new(Reader::from_str(input, &options.name)?, schema, options))
    }

    /// Load from a byte stream; the encoding is detected from its first bytes.
    pub fn from_read(source: impl Read + 'a, schema: Schema, options: &LoaderOptions) -> Self {
        Self::new(Reader::from_read(source, &options.name), schema, options)
    }

    pub fn is_disposed(&self) -> bool {
        self.composer.is_none()
    }

    /// Release the stream and buffers. Further pulls fail.
    pub fn dispose(&mut self) {
        if self.composer.take().is_some() {
            debug!("loader disposed");
        }
    }

    pub fn composer(&mut self) -> Result<&mut Composer<'a>> {
        self.composer.as_mut().ok_or_else(disposed)
    }

    pub fn parser(&mut self) -> Result<&mut Parser<'a>> {
        Ok(self.composer()?.parser())
    }

    pub fn scanner(&mut self) -> Result<&mut Scanner<'a>> {
        Ok(self.parser()?.scanner())
    }

    pub fn next_token(&mut self) -> Result<Option<Token>> {
        let result = self.scanner()?.next_token();
        self.guard(result)
    }

    pub fn next_event(&mut self) -> Result<Option<Event>> {
        let result = self.parser()?.next_event();
        self.guard(result)
    }

    pub fn next_node(&mut self) -> Result<Option<Rc<Node>>> {
        let result = self.composer()?.next_node();
        self.guard(result)
    }

    /// Whether another document follows.
    pub fn has_next_document(&mut self) -> Result<bool> {
        let result = self.composer()?.has_next_node();
        self.guard(result)
    }

    /// Load the next document with its metadata.
    pub fn next_document(&mut self) -> Result<Option<Document>> {
        let composed = self.composer()?.next_document();
        let Some(document) = self.guard(composed)? else {
            return Ok(None);
        };
        self.constructor.construct_document(&document).map(Some)
    }

    /// Load the only document of the stream. An empty stream gives `None`.
    pub fn single_document(&mut self) -> Result<Option<Document>> {
        let composed = self.composer()?.single_document();
        let Some(document) = self.guard(composed)? else {
            return Ok(None);
        };
        self.constructor.construct_document(&document).map(Some)
    }

    /// The value of the only document; an empty stream is null.
    pub fn single_value(&mut self) -> Result<Value> {
        Ok(self.single_document()?.map(|d| d.root).unwrap_or_default())
    }

    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if !err.is_document_scoped() {
                debug!(error = %err, "stream-fatal error, disposing loader");
                self.dispose();
            }
        }
        result
    }
}

impl Iterator for Loader<'_> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_disposed() {
            return None;
        }
        self.next_document().transpose()
    }
}

impl Drop for Loader<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn disposed() -> YamlError {
    YamlError::Io(io::Error::other("the loader has been disposed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Profile;

    fn loader(input: &str, profile: Profile) -> Loader<'static> {
        Loader::from_str(input, Schema::for_profile(profile), &LoaderOptions::default()).unwrap()
    }

    #[test]
    fn test_iterates_documents() {
        let docs: Vec<Value> = loader("a: 1\n---\n- x\n", Profile::Safe)
            .map(|d| d.map(|d| d.root))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["a"], Value::from(1));
        assert_eq!(docs[1][0], Value::from("x"));
    }

    #[test]
    fn test_constructor_error_is_document_scoped() {
        let mut loader = loader("--- !unknown x\n--- y\n", Profile::Safe);
        let first = loader.next_document();
        assert!(first.unwrap_err().is_document_scoped());
        let second = loader.next_document().unwrap().unwrap();
        assert_eq!(second.root, Value::from("y"));
    }

    #[test]
    fn test_scanner_error_disposes() {
        let mut loader = loader("a: 'unterminated\n", Profile::Safe);
        assert!(loader.next_document().is_err());
        assert!(loader.is_disposed());
        assert!(loader.next().is_none());
    }

    #[test]
    fn test_dispose_rejects_pulls() {
        let mut loader = loader("a: 1\n", Profile::Safe);
        assert!(loader.next_token().unwrap().is_some());
        loader.dispose();
        assert!(matches!(loader.next_event(), Err(YamlError::Io(_))));
    }

    #[test]
    fn test_forced_version() {
        let options = LoaderOptions::default().with_version((1, 1));
        let mut loader = Loader::from_str("yes", Schema::for_profile(Profile::Safe), &options).unwrap();
        assert_eq!(loader.single_value().unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_from_read_detects_utf16() {
        let bytes: Vec<u8> = [0xFF, 0xFE].into_iter().chain("a: b".encode_utf16().flat_map(u16::to_le_bytes)).collect();
        let mut loader = Loader::from_read(&bytes[..], Schema::for_profile(Profile::Safe), &LoaderOptions::default());
        assert_eq!(loader.single_value().unwrap()["a"], Value::from("b"));
    }
}
