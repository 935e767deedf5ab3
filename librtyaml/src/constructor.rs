//! Phase 4: Constructor
//!
//! Turns node trees into [`Value`]s by dispatching on the resolved tag:
//! exact constructors first, then multi-constructors by tag prefix, then the
//! profile's catch-all. In round-trip mode collections also collect their
//! comments and presentation into [`CollectionMeta`], with end-of-line
//! comments moved back to the entry whose line they end.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::Num;

use crate::comments::{CollectionMeta, DocumentMeta, EntryMeta, MergeMeta, ScalarMeta};
use crate::composer::NodeDocument;
use crate::error::{MarkedError, Result, YamlError};
use crate::nodes::{Node, NodeData, ScalarNode};
use crate::resolver::{
    BINARY, BOOL, FLOAT, INT, MAP, MERGE, NULL, OMAP, PAIRS, SEQ, SET, STR, TIMESTAMP, VALUE, VERSION_1_1, YAML,
};
use crate::schema::{ConstructFn, ConstructorRegistry, Lookup, Profile, Schema};
use crate::tokens::{split_eol, Comment, ScalarStyle, Trivia};
use crate::value::{Document, Mapping, OrderedMap, Sequence, Set, Tagged, Value};

/// Builds values from composed nodes.
pub struct Constructor {
    schema: Schema,
    round_trip: bool,
    preserve_quotes: bool,
    version: (u32, u32),
    /// Values of anchored nodes, by node address, for aliases.
    cache: HashMap<*const Node, Value>,
}

impl Constructor {
    pub fn new(schema: Schema) -> Self {
        let round_trip = schema.is_round_trip();
        let version = schema.resolver().default_version();
        Self {
            schema,
            round_trip,
            preserve_quotes: true,
            version,
            cache: HashMap::new(),
        }
    }

    /// Keep the quoting style of strings (round-trip only).
    pub fn with_preserve_quotes(mut self, preserve_quotes: bool) -> Self {
        self.preserve_quotes = preserve_quotes;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_round_trip(&self) -> bool {
        self.round_trip
    }

    /// YAML version of the document being constructed.
    pub fn version(&self) -> (u32, u32) {
        self.version
    }

    /// Construct a composed document.
    pub fn construct_document(&mut self, document: &NodeDocument) -> Result<Document> {
        self.version = document.resolved_version;
        self.cache.clear();
        let root_node = &document.root;
        let root = self.construct(root_node)?;
        let info = &document.info;
        let mut meta = DocumentMeta {
            before: info.before.clone(),
            explicit_start: info.explicit_start,
            explicit_end: info.explicit_end,
            version: info.version,
            tags: info.tags.clone(),
            end: info.end.clone(),
            ..DocumentMeta::default()
        };
        if self.round_trip && !is_collection(root_node) {
            meta.root_before = root_node.comments.before.clone();
            meta.root = self.scalar_meta(root_node, &root);
        }
        self.cache.clear();
        Ok(Document { root, meta })
    }

    /// Construct the value of a node, following aliases.
    pub fn construct(&mut self, node: &Node) -> Result<Value> {
        let aliased = matches!(node.data, NodeData::Alias { .. });
        let node = node.resolved();
        let key = node as *const Node;
        if let Some(value) = self.cache.get(&key) {
            let mut value = value.clone();
            if aliased {
                // The comments stay with the anchored occurrence.
                if let Some(meta) = value.meta_mut() {
                    meta.before.clear();
                }
            }
            return Ok(value);
        }
        let value = self.dispatch(node)?;
        if node.anchor.is_some() {
            self.cache.insert(key, value.clone());
        }
        Ok(value)
    }

    fn dispatch(&mut self, node: &Node) -> Result<Value> {
        let lookup = self.schema.constructors().lookup(&node.tag);
        match lookup {
            Some(Lookup::Exact(f)) => f(self, node),
            Some(Lookup::Multi(f, suffix)) => f(self, suffix, node),
            None => Err(self.error(
                node,
                &format!("could not determine a constructor for the tag {:?}", node.tag),
            )),
        }
    }

    /// Construct a node by its kind alone: string, sequence or mapping.
    pub fn construct_untagged(&mut self, node: &Node) -> Result<Value> {
        match &node.resolved().data {
            NodeData::Scalar(scalar) => Ok(Value::String(scalar.value.clone())),
            NodeData::Sequence { .. } => self.construct_sequence(node).map(Value::Sequence),
            _ => self.construct_mapping(node).map(Value::Mapping),
        }
    }

    pub(crate) fn error(&self, node: &Node, problem: &str) -> YamlError {
        YamlError::Constructor(
            MarkedError::new(problem, Some(node.start_mark.clone()))
                .with_context(format!("while constructing a {}", node_kind_name(node)), None),
        )
    }

    /// The scalar payload of a node, or an error naming what was found.
    pub fn expect_scalar<'n>(&self, node: &'n Node) -> Result<&'n ScalarNode> {
        match &node.resolved().data {
            NodeData::Scalar(scalar) => Ok(scalar),
            _ => Err(self.error(node, &format!("expected a scalar node, but found {}", node_kind_name(node)))),
        }
    }

    // ========================================================================
    // Collections
    // ========================================================================

    pub fn construct_sequence(&mut self, node: &Node) -> Result<Sequence> {
        let node = node.resolved();
        let NodeData::Sequence { items: children, .. } = &node.data else {
            return Err(self.error(node, &format!("expected a sequence node, but found {}", node_kind_name(node))));
        };
        let mut items = Vec::with_capacity(children.len());
        let mut entries: Vec<EntryMeta> = Vec::new();
        for child in children {
            let mut value = self.construct(child)?;
            if self.round_trip {
                let mut entry = EntryMeta::default();
                self.take_child_before(child, &mut value, &mut entry.before, !entries.is_empty(), |eol| {
                    if let Some(prev) = entries.last_mut() {
                        prev.eol = Some(eol);
                    }
                });
                entry.value = self.scalar_meta(child, &value);
                entry.alias = alias_name(child);
                entries.push(entry);
            }
            items.push(value);
        }
        let meta = self.round_trip.then(|| {
            let mut meta = collection_meta(node);
            meta.end = end_trivia(node, entries.last_mut());
            meta.items = entries;
            Box::new(meta)
        });
        Ok(Sequence { items, meta })
    }

    pub fn construct_mapping(&mut self, node: &Node) -> Result<Mapping> {
        let (entries, meta) = self.construct_entries(node)?;
        Ok(Mapping { entries, meta })
    }

    /// Construct the pairs of a mapping node, expanding merge keys.
    fn construct_entries(&mut self, node: &Node) -> Result<(IndexMap<Value, Value>, Option<Box<CollectionMeta>>)> {
        let node = node.resolved();
        let NodeData::Mapping { pairs, .. } = &node.data else {
            return Err(self.error(node, &format!("expected a mapping node, but found {}", node_kind_name(node))));
        };
        let mut entries: IndexMap<Value, Value> = IndexMap::with_capacity(pairs.len());
        let mut drafts: Vec<(Option<Value>, EntryMeta)> = Vec::new();
        let mut merges: Vec<(MergeMeta, Vec<IndexMap<Value, Value>>)> = Vec::new();

        for (key_node, value_node) in pairs {
            let mut entry = EntryMeta::default();
            if key_node.resolved().tag == MERGE {
                let value = self.construct(value_node)?;
                let sources = self.merge_sources(value_node, &value)?;
                if self.round_trip {
                    self.collect_key_trivia(key_node, &mut Value::Null, &mut entry, &mut drafts);
                    if !is_collection(value_node) {
                        entry.value_before = value_node.comments.before.clone();
                    }
                    entry.alias = alias_name(value_node);
                    drafts.push((None, entry.clone()));
                }
                merges.push((
                    MergeMeta {
                        position: entries.len(),
                        value,
                        entry,
                        merged: Vec::new(),
                    },
                    sources,
                ));
                continue;
            }

            let mut key = self.construct(key_node)?;
            let value = self.construct(value_node)?;
            if self.round_trip {
                self.collect_key_trivia(key_node, &mut key, &mut entry, &mut drafts);
                if !is_collection(value_node) || value.meta().is_none() {
                    entry.value_before = value_node.comments.before.clone();
                }
                entry.value = self.scalar_meta(value_node, &value);
                entry.alias = alias_name(value_node);
            }
            if entries.contains_key(&key) {
                tracing::warn!(
                    key = ?key,
                    line = key_node.start_mark.line + 1,
                    "duplicate mapping key, keeping the first definition"
                );
                continue;
            }
            if self.round_trip {
                drafts.push((Some(key.clone()), entry));
            }
            entries.insert(key, value);
        }

        let mut merge_metas = Vec::with_capacity(merges.len());
        let mut flattened: IndexMap<Value, Value> = IndexMap::new();
        for (mut merge, sources) in merges {
            for source in sources {
                for (key, value) in source {
                    if !self.round_trip && !flattened.contains_key(&key) {
                        flattened.insert(key.clone(), value.clone());
                    }
                    if !entries.contains_key(&key) {
                        merge.merged.push((key.clone(), value.clone()));
                        entries.insert(key, value);
                    }
                }
            }
            merge_metas.push(merge);
        }
        if !flattened.is_empty() {
            // Merged keys lead; explicit keys keep their own values.
            flattened.extend(std::mem::take(&mut entries));
            entries = flattened;
        }

        let meta = if self.round_trip {
            let mut meta = collection_meta(node);
            meta.end = end_trivia(node, drafts.last_mut().map(|(_, entry)| entry));
            let mut merge_entries = Vec::new();
            for (key, entry) in drafts {
                match key {
                    Some(key) => {
                        meta.keys.insert(key, entry);
                    }
                    None => merge_entries.push(entry),
                }
            }
            for (merge, entry) in merge_metas.iter_mut().zip(merge_entries) {
                merge.entry = entry;
            }
            meta.merges = merge_metas;
            Some(Box::new(meta))
        } else {
            None
        };
        Ok((entries, meta))
    }

    /// Record the trivia before a key, moving a leading end-of-line comment
    /// to the previous entry.
    fn collect_key_trivia(
        &self,
        key_node: &Node,
        key: &mut Value,
        entry: &mut EntryMeta,
        drafts: &mut [(Option<Value>, EntryMeta)],
    ) {
        let has_prev = !drafts.is_empty();
        self.take_child_before(key_node, key, &mut entry.before, has_prev, |eol| {
            if let Some((_, prev)) = drafts.last_mut() {
                prev.eol = Some(eol);
            }
        });
        entry.key = self.scalar_meta(key_node, key);
    }

    /// Move the trivia before a child into `before`, unless the child is a
    /// collection that keeps it in its own metadata. A leading end-of-line
    /// comment is handed to `rehome` when there is a previous entry.
    fn take_child_before(
        &self,
        child: &Node,
        value: &mut Value,
        before: &mut Vec<Trivia>,
        has_prev: bool,
        rehome: impl FnOnce(Comment),
    ) {
        if is_collection(child) {
            if let Some(meta) = value.meta_mut() {
                if has_prev {
                    if let Some(eol) = split_eol(&mut meta.before) {
                        rehome(eol);
                    }
                }
                return;
            }
        }
        *before = child.comments.before.clone();
        if has_prev {
            if let Some(eol) = split_eol(before) {
                rehome(eol);
            }
        }
    }

    fn merge_sources(&self, node: &Node, value: &Value) -> Result<Vec<IndexMap<Value, Value>>> {
        match value {
            Value::Mapping(mapping) => Ok(vec![mapping.entries.clone()]),
            Value::Sequence(sequence) => sequence
                .items
                .iter()
                .map(|item| match item {
                    Value::Mapping(mapping) => Ok(mapping.entries.clone()),
                    other => Err(self.error(
                        node,
                        &format!("expected a mapping for merging, but found {:?}", other.kind()),
                    )),
                })
                .collect(),
            other => Err(self.error(
                node,
                &format!(
                    "expected a mapping or list of mappings for merging, but found {:?}",
                    other.kind()
                ),
            )),
        }
    }

    /// Scalar metadata for a scalar child; `None` for collections and
    /// aliases, or outside round-trip mode.
    fn scalar_meta(&self, node: &Node, value: &Value) -> Option<ScalarMeta> {
        if !self.round_trip {
            return None;
        }
        let NodeData::Scalar(scalar) = &node.data else {
            return None;
        };
        let (style, source) = match scalar.style {
            None => (Some(ScalarStyle::Plain), Some(String::new())),
            Some(ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted)
                if !self.preserve_quotes && matches!(value, Value::String(_)) =>
            {
                (None, None)
            }
            style => (style, scalar.source.clone()),
        };
        Some(ScalarMeta {
            style,
            chomping: scalar.chomping,
            indent_indicator: scalar.indent_indicator,
            text: scalar.value.clone(),
            source,
            header_comment: scalar.header_comment.clone(),
            anchor: node.anchor.clone(),
            tag: node.explicit_tag.then(|| node.tag.clone()),
            loaded: value.clone(),
        })
    }
}

fn is_collection(node: &Node) -> bool {
    matches!(node.data, NodeData::Sequence { .. } | NodeData::Mapping { .. })
}

fn alias_name(node: &Node) -> Option<String> {
    match &node.data {
        NodeData::Alias { name, .. } => Some(name.clone()),
        _ => None,
    }
}

fn node_kind_name(node: &Node) -> &'static str {
    match node.resolved().data {
        NodeData::Scalar(_) => "scalar",
        NodeData::Sequence { .. } => "sequence",
        NodeData::Mapping { .. } => "mapping",
        NodeData::Alias { .. } => "alias",
    }
}

/// Presentation shared by every collection kind.
fn collection_meta(node: &Node) -> CollectionMeta {
    CollectionMeta {
        before: node.comments.before.clone(),
        flow: node.is_flow(),
        anchor: node.anchor.clone(),
        tag: node.explicit_tag.then(|| node.tag.clone()),
        indent: node.indent,
        ..CollectionMeta::default()
    }
}

/// Trivia at the end of a collection; a leading end-of-line comment belongs
/// to the last entry.
fn end_trivia(node: &Node, last: Option<&mut EntryMeta>) -> Vec<Trivia> {
    let mut end = node.comments.end.clone();
    if let Some(last) = last {
        if let Some(eol) = split_eol(&mut end) {
            last.eol = Some(eol);
        }
    }
    end
}

// ============================================================================
// Scalar parsing
// ============================================================================

fn strip_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

fn radix(digits: &str, radix: u32) -> Option<BigInt> {
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    BigInt::from_str_radix(digits, radix).ok()
}

/// Parse the text of an integer scalar.
pub fn parse_int(text: &str, version: (u32, u32)) -> Option<BigInt> {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    let (negative, digits) = strip_sign(&cleaned);
    let magnitude = if let Some(rest) = digits.strip_prefix("0b") {
        radix(rest, 2)?
    } else if let Some(rest) = digits.strip_prefix("0x") {
        radix(rest, 16)?
    } else if let Some(rest) = digits.strip_prefix("0o") {
        radix(rest, 8)?
    } else if version == VERSION_1_1 && digits.contains(':') {
        digits.split(':').try_fold(BigInt::from(0), |acc, part| {
            radix(part, 10).map(|n| acc * 60 + n)
        })?
    } else if version == VERSION_1_1 && digits.len() > 1 && digits.starts_with('0') {
        radix(&digits[1..], 8)?
    } else {
        radix(digits, 10)?
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse the text of a float scalar.
pub fn parse_float(text: &str, version: (u32, u32)) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|&c| c != '_')
        .collect::<String>()
        .to_ascii_lowercase();
    let (negative, body) = strip_sign(&cleaned);
    let magnitude = match body {
        ".inf" => f64::INFINITY,
        ".nan" => return Some(f64::NAN),
        _ if body.is_empty() || body.chars().any(|c| c.is_ascii_alphabetic() && c != 'e') => return None,
        _ if version == VERSION_1_1 && body.contains(':') => body
            .split(':')
            .try_fold(0.0, |acc: f64, part| part.parse::<f64>().ok().map(|n| acc * 60.0 + n))?,
        _ => body.parse::<f64>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse the text of a boolean scalar.
pub fn parse_bool(text: &str, version: (u32, u32)) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        "yes" | "on" | "y" if version == VERSION_1_1 => Some(true),
        "no" | "off" | "n" if version == VERSION_1_1 => Some(false),
        _ => None,
    }
}

// ============================================================================
// Default constructors
// ============================================================================

fn construct_null(c: &mut Constructor, node: &Node) -> Result<Value> {
    c.expect_scalar(node)?;
    Ok(Value::Null)
}

fn construct_bool(c: &mut Constructor, node: &Node) -> Result<Value> {
    let text = &c.expect_scalar(node)?.value;
    // An explicit !!bool accepts the 1.1 words whatever the version.
    parse_bool(text, c.version)
        .or_else(|| parse_bool(text, VERSION_1_1))
        .map(Value::Bool)
        .ok_or_else(|| c.error(node, &format!("invalid boolean {:?}", text)))
}

fn construct_int(c: &mut Constructor, node: &Node) -> Result<Value> {
    let text = &c.expect_scalar(node)?.value;
    parse_int(text, c.version)
        .map(Value::Int)
        .ok_or_else(|| c.error(node, &format!("invalid integer {:?}", text)))
}

fn construct_float(c: &mut Constructor, node: &Node) -> Result<Value> {
    let text = &c.expect_scalar(node)?.value;
    parse_float(text, c.version)
        .map(Value::Float)
        .ok_or_else(|| c.error(node, &format!("invalid float {:?}", text)))
}

fn construct_str(c: &mut Constructor, node: &Node) -> Result<Value> {
    Ok(Value::String(c.expect_scalar(node)?.value.clone()))
}

fn construct_binary(c: &mut Constructor, node: &Node) -> Result<Value> {
    let text: String = c
        .expect_scalar(node)?
        .value
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map(Value::Binary)
        .map_err(|err| c.error(node, &format!("failed to decode base64 data: {}", err)))
}

fn construct_timestamp(c: &mut Constructor, node: &Node) -> Result<Value> {
    Ok(Value::Timestamp(c.expect_scalar(node)?.value.clone()))
}

fn construct_seq(c: &mut Constructor, node: &Node) -> Result<Value> {
    c.construct_sequence(node).map(Value::Sequence)
}

fn construct_map(c: &mut Constructor, node: &Node) -> Result<Value> {
    c.construct_mapping(node).map(Value::Mapping)
}

fn construct_set(c: &mut Constructor, node: &Node) -> Result<Value> {
    let (entries, meta) = c.construct_entries(node)?;
    Ok(Value::Set(Set {
        members: entries.into_keys().collect(),
        meta,
    }))
}

/// `!!omap`: a sequence of one-pair mappings.
fn construct_omap(c: &mut Constructor, node: &Node) -> Result<Value> {
    let node = node.resolved();
    let NodeData::Sequence { items, .. } = &node.data else {
        return Err(c.error(node, &format!("expected a sequence, but found {}", node_kind_name(node))));
    };
    let mut entries = IndexMap::with_capacity(items.len());
    let mut drafts: Vec<(Value, EntryMeta)> = Vec::new();
    for item in items {
        let item_node = item.resolved();
        let pair = match &item_node.data {
            NodeData::Mapping { pairs, .. } if pairs.len() == 1 => &pairs[0],
            _ => {
                return Err(c.error(
                    item_node,
                    &format!(
                        "expected a mapping of length 1, but found {}",
                        node_kind_name(item_node)
                    ),
                ))
            }
        };
        let key = c.construct(&pair.0)?;
        let value = c.construct(&pair.1)?;
        if entries.contains_key(&key) {
            tracing::warn!(key = ?key, "duplicate ordered mapping key, keeping the first definition");
            continue;
        }
        if c.round_trip {
            let mut entry = EntryMeta::default();
            let mut before = item.comments.before.clone();
            before.extend(pair.0.comments.before.iter().cloned());
            if !drafts.is_empty() {
                if let Some(eol) = split_eol(&mut before) {
                    if let Some((_, prev)) = drafts.last_mut() {
                        prev.eol = Some(eol);
                    }
                }
            }
            entry.before = before;
            entry.key = c.scalar_meta(&pair.0, &key);
            if !is_collection(&pair.1) || value.meta().is_none() {
                entry.value_before = pair.1.comments.before.clone();
            }
            entry.value = c.scalar_meta(&pair.1, &value);
            entry.alias = alias_name(&pair.1);
            let mut item_end = item_node.comments.end.clone();
            if let Some(eol) = split_eol(&mut item_end) {
                entry.eol = Some(eol);
            }
            drafts.push((key.clone(), entry));
        }
        entries.insert(key, value);
    }
    let meta = c.round_trip.then(|| {
        let mut meta = collection_meta(node);
        meta.end = end_trivia(node, drafts.last_mut().map(|(_, entry)| entry));
        meta.keys = drafts.into_iter().collect();
        Box::new(meta)
    });
    Ok(Value::OrderedMap(OrderedMap { entries, meta }))
}

/// `!!pairs`: kept as a tagged sequence of one-pair mappings.
fn construct_pairs(c: &mut Constructor, node: &Node) -> Result<Value> {
    let sequence = c.construct_sequence(node)?;
    if let Some(bad) = sequence.items.iter().find(|item| item.as_mapping().map_or(true, |m| m.len() != 1)) {
        return Err(c.error(node, &format!("expected a mapping of length 1, but found {:?}", bad.kind())));
    }
    Ok(Value::from(Tagged {
        tag: PAIRS.to_string(),
        value: Value::Sequence(sequence),
    }))
}

fn construct_unknown(c: &mut Constructor, tag: &str, node: &Node) -> Result<Value> {
    tracing::debug!(tag, "constructing unknown tag as tagged value");
    let value = c.construct_untagged(node)?;
    Ok(Value::from(Tagged {
        tag: tag.to_string(),
        value,
    }))
}

fn add(registry: &mut ConstructorRegistry, tag: &str, f: fn(&mut Constructor, &Node) -> Result<Value>) {
    let f: ConstructFn = Arc::new(f);
    registry.add(tag, f);
}

/// Install the constructors of a profile.
pub(crate) fn register_defaults(registry: &mut ConstructorRegistry, profile: Profile) {
    add(registry, STR, construct_str);
    add(registry, SEQ, construct_seq);
    add(registry, MAP, construct_map);
    if profile == Profile::Base {
        return;
    }
    add(registry, NULL, construct_null);
    add(registry, BOOL, construct_bool);
    add(registry, INT, construct_int);
    add(registry, FLOAT, construct_float);
    add(registry, BINARY, construct_binary);
    add(registry, TIMESTAMP, construct_timestamp);
    add(registry, OMAP, construct_omap);
    add(registry, PAIRS, construct_pairs);
    add(registry, SET, construct_set);
    add(registry, MERGE, construct_str);
    add(registry, VALUE, construct_str);
    add(registry, YAML, construct_str);
    if matches!(profile, Profile::Unrestricted | Profile::RoundTrip) {
        registry.set_fallback(Arc::new(construct_unknown));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::Composer;
    use crate::parser::Parser;
    use crate::reader::Reader;
    use rstest::rstest;

    fn load(input: &str, profile: Profile) -> Result<Document> {
        let schema = Schema::for_profile(profile);
        let reader = Reader::from_str(input, "<unicode string>")?;
        let mut composer = Composer::new(Parser::new(reader), Arc::clone(schema.resolver()), None);
        let document = composer.single_document()?.unwrap();
        Constructor::new(schema).construct_document(&document)
    }

    fn safe(input: &str) -> Value {
        load(input, Profile::Safe).unwrap().root
    }

    #[rstest]
    #[case("0x1F", 31)]
    #[case("-0b101", -5)]
    #[case("0o17", 15)]
    #[case("1_000", 1000)]
    #[case("+12", 12)]
    fn test_ints(#[case] input: &str, #[case] expected: i64) {
        assert_eq!(safe(input).as_i64(), Some(expected));
    }

    #[rstest]
    #[case("017", 15)]
    #[case("190:20:30", 685230)]
    fn test_ints_1_1(#[case] input: &str, #[case] expected: i64) {
        assert_eq!(parse_int(input, VERSION_1_1), Some(BigInt::from(expected)));
    }

    #[test]
    fn test_big_int() {
        let value = safe("123456789012345678901234567890");
        assert_eq!(
            value.as_int().map(ToString::to_string).as_deref(),
            Some("123456789012345678901234567890")
        );
    }

    #[test]
    fn test_floats() {
        assert_eq!(safe("3.5").as_float(), Some(3.5));
        assert_eq!(safe("-.inf").as_float(), Some(f64::NEG_INFINITY));
        assert!(safe(".nan").as_float().is_some_and(f64::is_nan));
        assert_eq!(parse_float("1:30.5", VERSION_1_1), Some(90.5));
    }

    #[test]
    fn test_scalars() {
        assert_eq!(safe("~"), Value::Null);
        assert_eq!(safe("true"), Value::Bool(true));
        assert_eq!(safe("yes"), Value::from("yes"));
        assert_eq!(safe("%YAML 1.1\n--- yes"), Value::Bool(true));
        assert_eq!(safe("'42'"), Value::from("42"));
        assert_eq!(safe("!!binary aGVsbG8="), Value::Binary(b"hello".to_vec()));
        assert_eq!(safe("2001-12-14"), Value::Timestamp("2001-12-14".into()));
    }

    #[test]
    fn test_merge_precedence() {
        let value = safe("base: &b {x: 1, y: 2}\nderived:\n  <<: *b\n  x: 3\n");
        let derived = &value["derived"];
        assert_eq!(derived["x"].as_i64(), Some(3));
        assert_eq!(derived["y"].as_i64(), Some(2));
    }

    #[test]
    fn test_merge_sequence_order() {
        let value = safe("- &a {k: a, a: 1}\n- &b {k: b, b: 1}\n- <<: [*a, *b]\n");
        assert_eq!(value[2]["k"], Value::from("a"));
        assert_eq!(value[2]["b"].as_i64(), Some(1));
    }

    #[test]
    fn test_merged_keys_come_first() {
        let value = safe("base: &b {x: 1, y: 2}\nderived:\n  z: 0\n  <<: *b\n  x: 3\n");
        let keys: Vec<&Value> = value["derived"].as_mapping().unwrap().keys().collect();
        assert_eq!(keys, [&Value::from("x"), &Value::from("y"), &Value::from("z")]);
        assert_eq!(value["derived"]["x"].as_i64(), Some(3));
    }

    #[test]
    fn test_merge_rejects_scalars() {
        let err = load("a: &s x\nb:\n  <<: *s\n", Profile::Safe).unwrap_err();
        assert!(err.to_string().contains("for merging"), "{}", err);
        assert!(err.is_document_scoped());
    }

    #[test]
    fn test_duplicate_keys_first_wins() {
        assert_eq!(safe("a: 1\na: 2\n")["a"].as_i64(), Some(1));
    }

    #[test]
    fn test_omap_and_set() {
        let omap = safe("!!omap\n- b: 1\n- a: 2\n");
        let keys: Vec<&Value> = omap.as_ordered_map().unwrap().keys().collect();
        assert_eq!(keys, vec![&Value::from("b"), &Value::from("a")]);

        let compact = safe("!!set\n? a\n? b\n");
        let explicit = safe("!!set\na: null\nb: null\n");
        assert_eq!(compact, explicit);
        assert!(compact.as_set().unwrap().contains(&Value::from("a")));
    }

    #[test]
    fn test_omap_rejects_wide_items() {
        let err = load("!!omap\n- a: 1\n  b: 2\n", Profile::Safe).unwrap_err();
        assert!(err.to_string().contains("mapping of length 1"), "{}", err);
    }

    #[test]
    fn test_unknown_tags() {
        let err = load("!point 1", Profile::Safe).unwrap_err();
        assert!(err.to_string().contains("could not determine a constructor"), "{}", err);

        let value = load("!point {x: 1}", Profile::Unrestricted).unwrap().root;
        let tagged = value.as_tagged().unwrap();
        assert_eq!(tagged.tag, "!point");
        assert_eq!(tagged.value["x"].as_i64(), Some(1));
    }

    #[test]
    fn test_base_profile_is_stringly() {
        assert_eq!(load("a: 1", Profile::Base).unwrap().root["a"], Value::from("1"));
    }

    #[test]
    fn test_alias_shares_value() {
        let value = safe("a: &x [1, 2]\nb: *x\n");
        assert_eq!(value["a"], value["b"]);
    }

    #[test]
    fn test_round_trip_meta() {
        let doc = load("# top\na: 1 # one\nb: 'two'\n", Profile::RoundTrip).unwrap();
        let meta = doc.root.meta().unwrap();
        assert_eq!(meta.before, vec![Trivia::Line(Comment::new("# top", 0))]);
        let a = meta.key(&Value::from("a")).unwrap();
        assert_eq!(a.eol, Some(Comment::new("# one", 5)));
        let b = meta.key(&Value::from("b")).unwrap();
        assert_eq!(b.value.as_ref().and_then(|v| v.style), Some(ScalarStyle::SingleQuoted));
        assert!(b.before.is_empty());
    }

    #[test]
    fn test_round_trip_merge_meta() {
        let doc = load("b: &b {x: 1}\nd:\n  <<: *b\n  y: 2\n", Profile::RoundTrip).unwrap();
        let meta = doc.root["d"].meta().unwrap();
        assert_eq!(meta.merges.len(), 1);
        assert_eq!(meta.merges[0].position, 0);
        assert_eq!(meta.merges[0].entry.alias.as_deref(), Some("b"));
        assert!(meta.is_merged(&Value::from("x"), &Value::from(1)));
    }

    #[test]
    fn test_plain_load_has_no_meta() {
        let value = safe("# c\na: [1]\n");
        assert!(value.meta().is_none());
        assert!(value["a"].meta().is_none());
    }
}
