//! The dumping pipeline: representer, serializer and emitter bound to one
//! output stream.

use std::io::{self, Write};

use tracing::{debug, warn};

use crate::comments::DocumentMeta;
use crate::composer::DocumentInfo;
use crate::emitter::Emitter;
use crate::error::{Result, YamlError};
use crate::events::{Event, TagDirective};
use crate::nodes::Node;
use crate::reader::Encoding;
use crate::representer::Representer;
use crate::schema::Schema;
use crate::serializer::{EventSink, Framing, Serializer};
use crate::tokens::ScalarStyle;
use crate::value::{Document, Value};

/// Line break written by the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineBreak {
    #[default]
    Lf,
    Cr,
    CrLf,
}

impl LineBreak {
    pub fn as_str(self) -> &'static str {
        match self {
            LineBreak::Lf => "\n",
            LineBreak::Cr => "\r",
            LineBreak::CrLf => "\r\n",
        }
    }
}

/// Options for dumping.
#[derive(Debug, Clone)]
pub struct DumperOptions {
    /// Write every tag and quote every scalar.
    pub canonical: bool,
    /// Spaces per nesting level, 2 to 9.
    pub indent: usize,
    /// Dash offset of block sequences nested in block mappings.
    pub block_seq_indent: usize,
    /// Preferred line width for scalars; at most twice the indent means 80.
    pub width: usize,
    /// Write non-ASCII characters as they are instead of escaping them.
    pub allow_unicode: bool,
    pub line_break: LineBreak,
    pub explicit_start: bool,
    pub explicit_end: bool,
    /// `%YAML` directive to write.
    pub version: Option<(u32, u32)>,
    /// `%TAG` directives to write.
    pub tags: Vec<TagDirective>,
    /// Style for scalars that have none of their own.
    pub default_style: Option<ScalarStyle>,
    /// `Some(flow)` forces fresh collections into one style; `None` uses
    /// flow style for collections of scalars only.
    pub default_flow_style: Option<bool>,
    /// Pad top-level keys so their colons line up at this column.
    pub top_level_colon_align: Option<usize>,
    /// Text written between a simple key and its colon.
    pub prefix_colon: Option<String>,
    /// Output encoding; `None` writes UTF-8 text.
    pub encoding: Option<Encoding>,
}

impl Default for DumperOptions {
    fn default() -> Self {
        Self {
            canonical: false,
            indent: 2,
            block_seq_indent: 0,
            width: 80,
            allow_unicode: true,
            line_break: LineBreak::Lf,
            explicit_start: false,
            explicit_end: false,
            version: None,
            tags: Vec::new(),
            default_style: None,
            default_flow_style: Some(false),
            top_level_colon_align: None,
            prefix_colon: None,
            encoding: None,
        }
    }
}

impl DumperOptions {
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn with_explicit_start(mut self, explicit_start: bool) -> Self {
        self.explicit_start = explicit_start;
        self
    }

    pub fn with_default_flow_style(mut self, flow: Option<bool>) -> Self {
        self.default_flow_style = flow;
        self
    }

    pub fn with_canonical(mut self, canonical: bool) -> Self {
        self.canonical = canonical;
        self
    }

    fn framing(&self) -> Framing {
        Framing {
            explicit_start: self.explicit_start,
            explicit_end: self.explicit_end,
            version: self.version,
            tags: self.tags.clone(),
        }
    }
}

/// A dumping pipeline writing to `W`.
///
/// Text is written to the output after every document. The output is
/// flushed and released by [`Dumper::dispose`] or when the dumper is
/// dropped; [`Dumper::into_inner`] closes the stream and hands the output
/// back instead.
pub struct Dumper<W: Write> {
    output: Option<W>,
    serializer: Serializer<Emitter>,
    representer: Representer,
    schema: Schema,
    encoding: Option<Encoding>,
    at_stream_start: bool,
}

impl<W: Write> Dumper<W> {
    pub fn new(output: W, schema: Schema, options: &DumperOptions) -> Self {
        let serializer = Serializer::new(Emitter::new(options), schema.resolver().clone(), options.framing())
            .with_encoding(options.encoding);
        let representer = Representer::new(schema.clone())
            .with_default_style(options.default_style)
            .with_default_flow_style(options.default_flow_style);
        Self {
            output: Some(output),
            serializer,
            representer,
            schema,
            encoding: options.encoding,
            at_stream_start: true,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_disposed(&self) -> bool {
        self.output.is_none()
    }

    fn ensure_open(&mut self) -> Result<()> {
        if self.output.is_none() {
            return Err(YamlError::Io(io::Error::other("the dumper has been disposed")));
        }
        if !self.serializer.is_open() {
            self.serializer.open()?;
        }
        Ok(())
    }

    /// Dump one value as a document.
    pub fn dump(&mut self, value: &Value) -> Result<()> {
        self.ensure_open()?;
        let root = self.representer.represent_document(value, None)?;
        self.serializer.serialize(&root, &DocumentInfo::default())?;
        self.flush()
    }

    /// Dump a document together with its round-trip metadata.
    pub fn dump_document(&mut self, document: &Document) -> Result<()> {
        self.ensure_open()?;
        let root = self.representer.represent_document(&document.root, Some(&document.meta))?;
        let info = if self.schema.is_round_trip() {
            document_info(&document.meta)
        } else {
            DocumentInfo::default()
        };
        self.serializer.serialize(&root, &info)?;
        self.flush()
    }

    /// Serialize a node tree as a document.
    pub fn serialize(&mut self, root: &Node) -> Result<()> {
        self.ensure_open()?;
        self.serializer.serialize(root, &DocumentInfo::default())?;
        self.flush()
    }

    /// Pass one raw event to the emitter.
    pub fn emit(&mut self, event: Event) -> Result<()> {
        if self.output.is_none() {
            return Err(YamlError::Io(io::Error::other("the dumper has been disposed")));
        }
        self.serializer.sink().emit(event)?;
        self.flush()
    }

    /// End the stream.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.serializer.close()?;
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        let text = self.serializer.sink().take_output();
        let Some(output) = self.output.as_mut() else {
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }
        let bytes = match self.encoding {
            Some(encoding) => encoding.encode(&text, self.at_stream_start),
            None => text.into_bytes(),
        };
        self.at_stream_start = false;
        output.write_all(&bytes)?;
        Ok(())
    }

    /// Close the stream and return the output.
    pub fn into_inner(mut self) -> Result<W> {
        if self.serializer.is_open() {
            self.close()?;
        }
        let mut output = self
            .output
            .take()
            .ok_or_else(|| YamlError::Io(io::Error::other("the dumper has been disposed")))?;
        output.flush()?;
        Ok(output)
    }

    /// Close the stream if it is open, flush and release the output.
    pub fn dispose(&mut self) {
        if self.output.is_none() {
            return;
        }
        if self.serializer.is_open() {
            if let Err(err) = self.close() {
                warn!(error = %err, "could not close the stream while disposing");
            }
        }
        if let Some(mut output) = self.output.take() {
            if let Err(err) = output.flush() {
                warn!(error = %err, "could not flush the output while disposing");
            }
            debug!("dumper disposed");
        }
    }
}

impl<W: Write> Drop for Dumper<W> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Document framing kept by a round-trip load.
fn document_info(meta: &DocumentMeta) -> DocumentInfo {
    DocumentInfo {
        explicit_start: meta.explicit_start,
        explicit_end: meta.explicit_end,
        version: meta.version,
        tags: meta.tags.clone(),
        before: meta.before.clone(),
        end: meta.end.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Profile;
    use crate::value::Mapping;

    fn dump(value: &Value, options: &DumperOptions) -> String {
        let mut dumper = Dumper::new(Vec::new(), Schema::for_profile(Profile::Safe), options);
        dumper.dump(value).unwrap();
        String::from_utf8(dumper.into_inner().unwrap()).unwrap()
    }

    fn sample() -> Value {
        let mut mapping = Mapping::new();
        mapping.insert("name", "rtyaml");
        mapping.insert("tags", Value::from(vec![Value::from("a"), Value::from("b")]));
        Value::from(mapping)
    }

    #[test]
    fn test_block_output() {
        assert_eq!(dump(&sample(), &DumperOptions::default()), "name: rtyaml\ntags:\n- a\n- b\n");
    }

    #[test]
    fn test_flow_for_scalar_collections() {
        let options = DumperOptions::default().with_default_flow_style(None);
        assert_eq!(dump(&sample(), &options), "name: rtyaml\ntags: [a, b]\n");
    }

    #[test]
    fn test_explicit_markers() {
        let options = DumperOptions {
            explicit_start: true,
            explicit_end: true,
            ..DumperOptions::default()
        };
        assert_eq!(dump(&Value::from(1), &options), "--- 1\n...\n");
    }

    #[test]
    fn test_line_break_and_indent() {
        let mut inner = Mapping::new();
        inner.insert("b", 1);
        let mut outer = Mapping::new();
        outer.insert("a", Value::from(inner));
        let options = DumperOptions {
            indent: 4,
            line_break: LineBreak::CrLf,
            ..DumperOptions::default()
        };
        assert_eq!(dump(&Value::from(outer), &options), "a:\r\n    b: 1\r\n");
    }

    #[test]
    fn test_utf16_output_has_bom() {
        let options = DumperOptions {
            encoding: Some(Encoding::Utf16Le),
            ..DumperOptions::default()
        };
        let mut dumper = Dumper::new(Vec::new(), Schema::for_profile(Profile::Safe), &options);
        dumper.dump(&Value::from("x")).unwrap();
        let bytes = dumper.into_inner().unwrap();
        assert_eq!(&bytes[..4], &[0xFF, 0xFE, b'x', 0]);
    }

    #[test]
    fn test_drop_closes_stream() {
        let mut out = Vec::new();
        {
            let mut dumper = Dumper::new(&mut out, Schema::for_profile(Profile::Safe), &DumperOptions::default());
            dumper.dump(&Value::from("x")).unwrap();
        }
        assert_eq!(String::from_utf8(out).unwrap(), "x\n...\n");
    }

    #[test]
    fn test_multiple_documents() {
        let mut dumper = Dumper::new(Vec::new(), Schema::for_profile(Profile::Safe), &DumperOptions::default());
        dumper.dump(&sample()).unwrap();
        dumper.dump(&Value::from(vec![Value::from(1)])).unwrap();
        let text = String::from_utf8(dumper.into_inner().unwrap()).unwrap();
        assert_eq!(text, "name: rtyaml\ntags:\n- a\n- b\n---\n- 1\n");
    }
}
