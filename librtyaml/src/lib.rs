//! Round-trip YAML engine.
//!
//! rtyaml reads YAML into values and writes values back as YAML. In
//! round-trip mode it keeps comments, blank lines, key order, quoting,
//! block or flow layout and indentation, so that an unchanged document is
//! written back byte for byte and an edited one changes only where it was
//! edited.
//!
//! # Pipeline
//!
//! Loading runs five stages, each pulled one unit at a time:
//!
//! 1. **Reader**: bytes to characters, with encoding detection.
//! 2. **Scanner**: characters to tokens, with comments and blank lines
//!    attached to the token that follows them.
//! 3. **Parser**: tokens to events, by an explicit state machine.
//! 4. **Composer**: events to a node tree, resolving anchors and tags.
//! 5. **Constructor**: nodes to [`Value`]s, with round-trip metadata.
//!
//! Dumping runs the same stages in reverse: **Representer**, **Serializer**,
//! **Emitter**. A [`Schema`] picks the constructors, representers and tag
//! resolution for a [`Profile`].
//!
//! ```
//! let mut doc = librtyaml::round_trip_load("a: 1  # keep me\nb: 2\n").unwrap();
//! doc.as_mapping_mut().unwrap().insert("b", 3);
//! assert_eq!(librtyaml::round_trip_dump(&doc).unwrap(), "a: 1  # keep me\nb: 3\n");
//! ```

pub mod comments;
pub mod composer;
pub mod constructor;
pub mod dumper;
pub mod emitter;
pub mod error;
pub mod events;
pub mod loader;
pub mod nodes;
pub mod parser;
pub mod reader;
pub mod representer;
pub mod resolver;
pub mod scanner;
pub mod schema;
pub mod serializer;
pub mod tokens;
pub mod value;

use std::rc::Rc;

pub use comments::{CollectionMeta, DocumentMeta, EntryMeta, ScalarMeta};
pub use dumper::{Dumper, DumperOptions, LineBreak};
pub use error::{Mark, MarkedError, Result, YamlError};
pub use events::{Event, EventKind};
pub use loader::{Loader, LoaderOptions};
pub use nodes::Node;
pub use reader::Encoding;
pub use resolver::Resolver;
pub use schema::{Profile, Schema};
pub use serializer::EventSink;
pub use tokens::{Chomping, ScalarStyle, Token};
pub use value::{Document, Mapping, OrderedMap, Sequence, Set, Tagged, Value};

use emitter::Emitter;

/// Scan a string into tokens.
pub fn scan(input: &str) -> Result<Vec<Token>> {
    scanner::scan_str(input)
}

/// Parse a string into events.
pub fn parse(input: &str) -> Result<Vec<Event>> {
    parser::parse_str(input)
}

fn loader<'a>(input: &str, schema: &Schema) -> Result<Loader<'a>> {
    Loader::from_str(input, schema.clone(), &LoaderOptions::default())
}

/// Compose the only document of a string into a node tree.
pub fn compose(input: &str) -> Result<Option<Rc<Node>>> {
    let mut loader = loader(input, &Schema::default())?;
    Ok(loader.composer()?.single_document()?.map(|d| d.root))
}

/// Compose every document of a string.
pub fn compose_all(input: &str) -> Result<Vec<Rc<Node>>> {
    let mut loader = loader(input, &Schema::default())?;
    let mut nodes = Vec::new();
    while let Some(node) = loader.next_node()? {
        nodes.push(node);
    }
    Ok(nodes)
}

/// Load the only document of a string with a schema. An empty stream is
/// null.
pub fn load(input: &str, schema: &Schema) -> Result<Value> {
    loader(input, schema)?.single_value()
}

/// Load every document of a string with a schema.
pub fn load_all(input: &str, schema: &Schema) -> Result<Vec<Value>> {
    loader(input, schema)?.map(|doc| doc.map(|d| d.root)).collect()
}

/// Load with the safe profile: standard tags only, no metadata.
pub fn safe_load(input: &str) -> Result<Value> {
    load(input, &Schema::for_profile(Profile::Safe))
}

/// Load with round-trip metadata.
pub fn round_trip_load(input: &str) -> Result<Value> {
    load(input, &Schema::for_profile(Profile::RoundTrip))
}

/// Load the only document with its document-level metadata (directives,
/// markers, comments around the root).
pub fn round_trip_load_document(input: &str) -> Result<Document> {
    Ok(loader(input, &Schema::for_profile(Profile::RoundTrip))?
        .single_document()?
        .unwrap_or_default())
}

/// Write events as YAML text.
pub fn emit(events: impl IntoIterator<Item = Event>, options: &DumperOptions) -> Result<String> {
    let mut emitter = Emitter::new(options);
    for event in events {
        emitter.emit(event)?;
    }
    Ok(emitter.take_output())
}

/// Dump to text with a dumper that is closed before returning. The text
/// encoding option is ignored.
fn dump_with(
    schema: &Schema,
    options: &DumperOptions,
    write: impl FnOnce(&mut Dumper<Vec<u8>>) -> Result<()>,
) -> Result<String> {
    let options = DumperOptions {
        encoding: None,
        ..options.clone()
    };
    let mut dumper = Dumper::new(Vec::new(), schema.clone(), &options);
    write(&mut dumper)?;
    let bytes = dumper.into_inner()?;
    String::from_utf8(bytes).map_err(|e| YamlError::emitter(format!("emitted invalid UTF-8: {}", e)))
}

/// Serialize a node tree as one document.
pub fn serialize(node: &Node, options: &DumperOptions) -> Result<String> {
    dump_with(&Schema::default(), options, |d| d.serialize(node))
}

/// Dump a value as one document.
pub fn dump(value: &Value, schema: &Schema, options: &DumperOptions) -> Result<String> {
    dump_with(schema, options, |d| d.dump(value))
}

/// Dump values as consecutive documents.
pub fn dump_all<'v>(
    values: impl IntoIterator<Item = &'v Value>,
    schema: &Schema,
    options: &DumperOptions,
) -> Result<String> {
    dump_with(schema, options, |d| values.into_iter().try_for_each(|value| d.dump(value)))
}

/// Dump with the safe profile and default options.
pub fn safe_dump(value: &Value) -> Result<String> {
    dump(value, &Schema::for_profile(Profile::Safe), &DumperOptions::default())
}

/// Dump a value loaded by [`round_trip_load`], reusing its metadata.
pub fn round_trip_dump(value: &Value) -> Result<String> {
    dump(value, &Schema::for_profile(Profile::RoundTrip), &DumperOptions::default())
}

/// Dump a document loaded by [`round_trip_load_document`].
pub fn round_trip_dump_document(document: &Document) -> Result<String> {
    dump_with(&Schema::for_profile(Profile::RoundTrip), &DumperOptions::default(), |d| {
        d.dump_document(document)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_and_parse() {
        assert!(scan("a: 1").unwrap().len() > 4);
        let events: Vec<String> = parse("[a]").unwrap().iter().map(|e| e.to_string()).collect();
        assert_eq!(events, ["+STR", "+DOC", "+SEQ []", "=VAL :a", "-SEQ", "-DOC", "-STR"]);
    }

    #[test]
    fn test_compose_all() {
        let nodes = compose_all("a\n--- b\n").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].scalar_value(), Some("b"));
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(safe_load("").unwrap(), Value::Null);
        assert!(compose("# only a comment\n").unwrap().is_none());
    }

    #[test]
    fn test_safe_round() {
        let value = safe_load("a: [1, 2.5, true, null, text]\n").unwrap();
        assert_eq!(safe_dump(&value).unwrap(), "a:\n- 1\n- 2.5\n- true\n- null\n- text\n");
    }

    #[test]
    fn test_round_trip_document_keeps_markers() {
        let input = "%YAML 1.2\n---\n# lead\na: 1\n...\n";
        let doc = round_trip_load_document(input).unwrap();
        assert_eq!(round_trip_dump_document(&doc).unwrap(), input);
    }
}
