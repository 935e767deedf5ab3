//! Phase 4, reversed: Representer
//!
//! Turns [`Value`]s into node trees. Representers are looked up by value
//! kind (tagged values by tag first), then by capability, then the profile's
//! catch-all. In round-trip mode collection metadata is fed back into the
//! nodes: comments, flow style, anchors, explicit tags, indentation offsets
//! and the original text of scalars that were not changed since loading.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use base64::Engine as _;

use crate::comments::{with_eol, CollectionMeta, DocumentMeta, EntryMeta, MergeMeta, ScalarMeta};
use crate::error::{Result, YamlError};
use crate::nodes::{Node, NodeData, ScalarNode};
use crate::resolver::{BINARY, BOOL, FLOAT, INT, MAP, MERGE, NULL, OMAP, SEQ, SET, STR, TIMESTAMP};
use crate::schema::{Profile, RepresentFn, RepresenterRegistry, Schema};
use crate::tokens::{Comment, ScalarStyle, Trivia};
use crate::value::{Mapping, OrderedMap, Sequence, Set, Value, ValueKind};

/// Builds node trees from values.
pub struct Representer {
    schema: Schema,
    round_trip: bool,
    default_style: Option<ScalarStyle>,
    default_flow_style: Option<bool>,
    /// Anchored values represented so far in this document.
    anchors: HashMap<String, (Value, Rc<Node>)>,
}

impl Representer {
    pub fn new(schema: Schema) -> Self {
        let round_trip = schema.is_round_trip();
        Self {
            schema,
            round_trip,
            default_style: None,
            default_flow_style: Some(false),
            anchors: HashMap::new(),
        }
    }

    /// Style for scalars that have none of their own.
    pub fn with_default_style(mut self, style: Option<ScalarStyle>) -> Self {
        self.default_style = style;
        self
    }

    /// `Some(flow)` forces every fresh collection into one style; `None`
    /// uses flow style for collections of scalars only.
    pub fn with_default_flow_style(mut self, flow: Option<bool>) -> Self {
        self.default_flow_style = flow;
        self
    }

    pub fn is_round_trip(&self) -> bool {
        self.round_trip
    }

    /// Represent the root of a document.
    pub fn represent_document(&mut self, root: &Value, meta: Option<&DocumentMeta>) -> Result<Rc<Node>> {
        self.anchors.clear();
        let (scalar, before) = match meta.filter(|_| self.round_trip) {
            Some(meta) => (meta.root.as_ref(), meta.root_before.clone()),
            None => (None, Vec::new()),
        };
        let node = self.represent_child(root, scalar, None, before)?;
        self.anchors.clear();
        Ok(node)
    }

    /// Represent a value with the registered representers.
    pub fn represent(&mut self, value: &Value) -> Result<Node> {
        match self.schema.representers().lookup(value) {
            Some(f) => f(self, value),
            None => Err(YamlError::representer(format!("cannot represent an object: {:?}", value))),
        }
    }

    /// A scalar node in the default style.
    pub fn scalar(&self, tag: &str, text: impl Into<String>) -> Node {
        Node::scalar(tag, ScalarNode::new(text).with_style(self.default_style))
    }

    /// A sequence node without metadata.
    pub fn sequence<'v>(&mut self, tag: &str, items: impl IntoIterator<Item = &'v Value>) -> Result<Node> {
        let children = items
            .into_iter()
            .map(|item| self.represent_child(item, None, None, Vec::new()))
            .collect::<Result<Vec<_>>>()?;
        let flow = self.fresh_flow(children.iter());
        Ok(Node::sequence(tag, children, flow))
    }

    /// A mapping node without metadata.
    pub fn mapping<'v>(&mut self, tag: &str, pairs: impl IntoIterator<Item = (&'v Value, &'v Value)>) -> Result<Node> {
        let mut children = Vec::new();
        for (key, value) in pairs {
            let key = self.represent_child(key, None, None, Vec::new())?;
            let value = self.represent_child(value, None, None, Vec::new())?;
            children.push((key, value));
        }
        let flow = self.fresh_flow(children.iter().flat_map(|(k, v)| [k, v]));
        Ok(Node::mapping(tag, children, flow))
    }

    fn fresh_flow<'n>(&self, mut children: impl Iterator<Item = &'n Rc<Node>>) -> bool {
        match self.default_flow_style {
            Some(flow) => flow,
            None => children.all(|child| matches!(child.data, NodeData::Scalar(_))),
        }
    }

    /// Represent a value in a collection slot, reusing its scalar metadata,
    /// emitting an alias when the entry was one and its anchor is still
    /// valid, and putting `before` in front of it.
    fn represent_child(
        &mut self,
        value: &Value,
        scalar: Option<&ScalarMeta>,
        alias: Option<&str>,
        before: Vec<Trivia>,
    ) -> Result<Rc<Node>> {
        if let Some(name) = alias {
            if let Some((anchored, target)) = self.anchors.get(name) {
                if anchored == value {
                    let mut node = Node::alias(name, Rc::clone(target));
                    node.comments.before = before;
                    return Ok(Rc::new(node));
                }
            }
            tracing::debug!(alias = name, "aliased value changed, emitting it in full");
        }
        let mut node = self.represent(value)?;
        if let Some(meta) = scalar {
            apply_scalar_meta(&mut node, meta, value);
        }
        if !before.is_empty() {
            let mut comments = before;
            comments.append(&mut node.comments.before);
            node.comments.before = comments;
        }
        let node = Rc::new(node);
        if let Some(anchor) = &node.anchor {
            self.anchors.insert(anchor.clone(), (value.clone(), Rc::clone(&node)));
        }
        Ok(node)
    }

    fn meta<'m>(&self, meta: Option<&'m CollectionMeta>) -> Option<&'m CollectionMeta> {
        meta.filter(|_| self.round_trip)
    }

    /// Copy collection-level metadata onto a freshly built node.
    fn apply_collection_meta(&self, node: &mut Node, meta: &CollectionMeta) {
        match &mut node.data {
            NodeData::Sequence { flow, .. } | NodeData::Mapping { flow, .. } => *flow = meta.flow,
            _ => {}
        }
        node.anchor = meta.anchor.clone();
        if meta.tag.as_deref() == Some(node.tag.as_str()) {
            node.explicit_tag = true;
        }
        node.indent = meta.indent;
        node.comments.before = meta.before.clone();
    }

    fn represent_sequence_value(&mut self, sequence: &Sequence, tag: &str) -> Result<Node> {
        let Some(meta) = self.meta(sequence.meta.as_deref()) else {
            return self.sequence(tag, &sequence.items);
        };
        let mut children = Vec::with_capacity(sequence.items.len());
        let mut prev_eol: Option<&Comment> = None;
        for (index, item) in sequence.items.iter().enumerate() {
            let entry = meta.item(index);
            let before = with_eol(prev_eol, entry.map_or(&[][..], |e| &e.before[..]));
            let child = self.represent_child(
                item,
                entry.and_then(|e| e.value.as_ref()),
                entry.and_then(|e| e.alias.as_deref()),
                before,
            )?;
            children.push(child);
            prev_eol = entry.and_then(|e| e.eol.as_ref());
        }
        if meta.items.len() > sequence.items.len() {
            tracing::warn!(
                dropped = meta.items.len() - sequence.items.len(),
                "dropping metadata of removed sequence items"
            );
        }
        let mut node = Node::sequence(tag, children, meta.flow);
        self.apply_collection_meta(&mut node, meta);
        node.comments.end = with_eol(prev_eol, &meta.end);
        Ok(node)
    }

    fn represent_mapping_value(&mut self, mapping: &Mapping, tag: &str) -> Result<Node> {
        let Some(meta) = self.meta(mapping.meta.as_deref()) else {
            return self.mapping(tag, &mapping.entries);
        };
        warn_orphans(meta, |key| mapping.contains_key(key));
        let mut pairs = Vec::with_capacity(mapping.len());
        let mut prev_eol: Option<Comment> = None;
        let mut merges = meta.merges.iter().peekable();
        let mut own = 0;
        for (key, value) in &mapping.entries {
            if meta.is_merged(key, value) {
                continue;
            }
            while let Some(merge) = merges.next_if(|m| m.position <= own) {
                pairs.push(self.represent_merge(merge, prev_eol.as_ref())?);
                prev_eol = merge.entry.eol.clone();
            }
            let entry = meta.key(key);
            let (key_node, value_node) = self.represent_entry(key, value, entry, prev_eol.as_ref())?;
            pairs.push((key_node, value_node));
            prev_eol = entry.and_then(|e| e.eol.clone());
            own += 1;
        }
        for merge in merges {
            pairs.push(self.represent_merge(merge, prev_eol.as_ref())?);
            prev_eol = merge.entry.eol.clone();
        }
        let mut node = Node::mapping(tag, pairs, meta.flow);
        self.apply_collection_meta(&mut node, meta);
        node.comments.end = with_eol(prev_eol.as_ref(), &meta.end);
        Ok(node)
    }

    /// The `<<` entry of a merge, aliasing the merged value when possible.
    fn represent_merge(&mut self, merge: &MergeMeta, prev_eol: Option<&Comment>) -> Result<(Rc<Node>, Rc<Node>)> {
        let mut key = Node::scalar(MERGE, ScalarNode::new("<<").with_style(Some(ScalarStyle::Plain)));
        key.comments.before = with_eol(prev_eol, &merge.entry.before);
        let value = self.represent_child(
            &merge.value,
            None,
            merge.entry.alias.as_deref(),
            merge.entry.value_before.clone(),
        )?;
        Ok((Rc::new(key), value))
    }

    fn represent_entry(
        &mut self,
        key: &Value,
        value: &Value,
        entry: Option<&EntryMeta>,
        prev_eol: Option<&Comment>,
    ) -> Result<(Rc<Node>, Rc<Node>)> {
        let before = with_eol(prev_eol, entry.map_or(&[][..], |e| &e.before[..]));
        let key_node = self.represent_child(key, entry.and_then(|e| e.key.as_ref()), None, before)?;
        let value_node = self.represent_child(
            value,
            entry.and_then(|e| e.value.as_ref()),
            entry.and_then(|e| e.alias.as_deref()),
            entry.map(|e| e.value_before.clone()).unwrap_or_default(),
        )?;
        Ok((key_node, value_node))
    }

    fn represent_ordered_map(&mut self, map: &OrderedMap) -> Result<Node> {
        let meta = self.meta(map.meta.as_deref());
        let mut items = Vec::with_capacity(map.len());
        for (key, value) in &map.entries {
            let entry = meta.and_then(|m| m.key(key));
            let key_meta = entry.and_then(|e| e.key.as_ref());
            let key_node = self.represent_child(key, key_meta, None, Vec::new())?;
            let value_node = self.represent_child(
                value,
                entry.and_then(|e| e.value.as_ref()),
                entry.and_then(|e| e.alias.as_deref()),
                entry.map(|e| e.value_before.clone()).unwrap_or_default(),
            )?;
            let flow = match meta {
                Some(_) => false,
                None => self.fresh_flow([&key_node, &value_node].into_iter()),
            };
            let mut item = Node::mapping(MAP, vec![(key_node, value_node)], flow);
            if let Some(entry) = entry {
                item.comments.before = entry.before.clone();
                item.comments.end = with_eol(entry.eol.as_ref(), &[]);
            }
            items.push(Rc::new(item));
        }
        if let Some(meta) = meta {
            warn_orphans(meta, |key| map.contains_key(key));
            let mut node = Node::sequence(OMAP, items, meta.flow);
            self.apply_collection_meta(&mut node, meta);
            node.explicit_tag = true;
            node.comments.end = meta.end.clone();
            return Ok(node);
        }
        let flow = self.fresh_flow(items.iter());
        let mut node = Node::sequence(OMAP, items, flow);
        node.explicit_tag = true;
        Ok(node)
    }

    fn represent_set(&mut self, set: &Set) -> Result<Node> {
        let meta = self.meta(set.meta.as_deref());
        let mut pairs = Vec::with_capacity(set.len());
        let mut prev_eol: Option<&Comment> = None;
        for member in &set.members {
            let entry = meta.and_then(|m| m.key(member));
            let before = with_eol(prev_eol, entry.map_or(&[][..], |e| &e.before[..]));
            let key = self.represent_child(member, entry.and_then(|e| e.key.as_ref()), None, before)?;
            let null = if self.round_trip {
                // Compact `? member` form.
                ScalarNode {
                    style: Some(ScalarStyle::Plain),
                    source: Some(String::new()),
                    ..ScalarNode::default()
                }
            } else {
                ScalarNode::new("null")
            };
            pairs.push((key, Rc::new(Node::scalar(NULL, null))));
            prev_eol = entry.and_then(|e| e.eol.as_ref());
        }
        let mut node = Node::mapping(SET, pairs, false);
        if let Some(meta) = meta {
            warn_orphans(meta, |key| set.contains(key));
            self.apply_collection_meta(&mut node, meta);
            node.comments.end = with_eol(prev_eol, &meta.end);
        }
        node.explicit_tag = true;
        Ok(node)
    }
}

fn warn_orphans(meta: &CollectionMeta, present: impl Fn(&Value) -> bool) {
    let orphaned = meta.keys.keys().filter(|key| !present(key)).count();
    if orphaned > 0 {
        tracing::warn!(orphaned, "dropping metadata of removed keys");
    }
}

/// Reuse the loaded presentation of a scalar.
fn apply_scalar_meta(node: &mut Node, meta: &ScalarMeta, value: &Value) {
    let same_kind = meta.loaded.kind() == value.kind();
    let NodeData::Scalar(scalar) = &mut node.data else {
        return;
    };
    if meta.is_unchanged(value) {
        scalar.value = meta.text.clone();
        scalar.style = meta.style;
        scalar.chomping = meta.chomping;
        scalar.indent_indicator = meta.indent_indicator;
        scalar.source = meta.source.clone();
        scalar.header_comment = meta.header_comment.clone();
    } else if same_kind && matches!(value, Value::String(_)) {
        scalar.style = meta.style;
    }
    if same_kind {
        node.anchor = meta.anchor.clone();
        if meta.tag.as_deref() == Some(node.tag.as_str()) {
            node.explicit_tag = true;
        }
    }
}

/// Text of a float that reads back as a float in both YAML versions.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return ".nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { ".inf" } else { "-.inf" }.to_string();
    }
    let mut text = format!("{:?}", f);
    let exponent = text.find('e');
    if !text[..exponent.unwrap_or(text.len())].contains('.') {
        text.insert_str(exponent.unwrap_or(text.len()), ".0");
    }
    if let Some(e) = text.find('e') {
        if !matches!(text.as_bytes().get(e + 1), Some(b'-' | b'+')) {
            text.insert(e + 1, '+');
        }
    }
    text
}

/// Base64 text of binary data in lines of 76 characters.
pub fn format_binary(data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    let mut text = String::with_capacity(encoded.len() + encoded.len() / 76 + 1);
    for chunk in encoded.as_bytes().chunks(76) {
        text.push_str(&String::from_utf8_lossy(chunk));
        text.push('\n');
    }
    text
}

// ============================================================================
// Default representers
// ============================================================================

fn represent_null(r: &mut Representer, _: &Value) -> Result<Node> {
    Ok(r.scalar(NULL, "null"))
}

fn represent_bool(r: &mut Representer, value: &Value) -> Result<Node> {
    let text = if value.as_bool() == Some(true) { "true" } else { "false" };
    Ok(r.scalar(BOOL, text))
}

fn represent_int(r: &mut Representer, value: &Value) -> Result<Node> {
    let text = value.as_int().map(ToString::to_string).unwrap_or_default();
    Ok(r.scalar(INT, text))
}

fn represent_float(r: &mut Representer, value: &Value) -> Result<Node> {
    Ok(r.scalar(FLOAT, format_float(value.as_float().unwrap_or(f64::NAN))))
}

fn represent_str(r: &mut Representer, value: &Value) -> Result<Node> {
    Ok(r.scalar(STR, value.as_str().unwrap_or_default()))
}

fn represent_binary(_: &mut Representer, value: &Value) -> Result<Node> {
    let text = format_binary(value.as_bytes().unwrap_or_default());
    let mut node = Node::scalar(BINARY, ScalarNode::new(text).with_style(Some(ScalarStyle::Literal)));
    node.explicit_tag = true;
    Ok(node)
}

fn represent_timestamp(r: &mut Representer, value: &Value) -> Result<Node> {
    let text = match value {
        Value::Timestamp(text) => text.as_str(),
        _ => "",
    };
    Ok(r.scalar(TIMESTAMP, text))
}

fn represent_seq(r: &mut Representer, value: &Value) -> Result<Node> {
    match value {
        Value::Sequence(sequence) => r.represent_sequence_value(sequence, SEQ),
        other => Err(YamlError::representer(format!("expected a sequence, got {:?}", other.kind()))),
    }
}

fn represent_map(r: &mut Representer, value: &Value) -> Result<Node> {
    match value {
        Value::Mapping(mapping) => r.represent_mapping_value(mapping, MAP),
        other => Err(YamlError::representer(format!("expected a mapping, got {:?}", other.kind()))),
    }
}

fn represent_omap(r: &mut Representer, value: &Value) -> Result<Node> {
    match value {
        Value::OrderedMap(map) => r.represent_ordered_map(map),
        other => Err(YamlError::representer(format!("expected an ordered map, got {:?}", other.kind()))),
    }
}

fn represent_set_value(r: &mut Representer, value: &Value) -> Result<Node> {
    match value {
        Value::Set(set) => r.represent_set(set),
        other => Err(YamlError::representer(format!("expected a set, got {:?}", other.kind()))),
    }
}

/// Represent the inner value of a tagged value under its tag.
pub fn represent_tagged(r: &mut Representer, value: &Value) -> Result<Node> {
    let Some(tagged) = value.as_tagged() else {
        return Err(YamlError::representer(format!("expected a tagged value, got {:?}", value.kind())));
    };
    let mut node = r.represent(&tagged.value)?;
    node.tag = tagged.tag.clone();
    node.explicit_tag = true;
    Ok(node)
}

fn add(registry: &mut RepresenterRegistry, kind: ValueKind, f: fn(&mut Representer, &Value) -> Result<Node>) {
    let f: RepresentFn = Arc::new(f);
    registry.add(kind, f);
}

/// Install the representers of a profile.
pub(crate) fn register_defaults(registry: &mut RepresenterRegistry, profile: Profile) {
    add(registry, ValueKind::String, represent_str);
    add(registry, ValueKind::Sequence, represent_seq);
    add(registry, ValueKind::Mapping, represent_map);
    add(registry, ValueKind::Null, represent_null);
    add(registry, ValueKind::Bool, represent_bool);
    add(registry, ValueKind::Int, represent_int);
    add(registry, ValueKind::Float, represent_float);
    add(registry, ValueKind::Binary, represent_binary);
    add(registry, ValueKind::Timestamp, represent_timestamp);
    add(registry, ValueKind::OrderedMap, represent_omap);
    add(registry, ValueKind::Set, represent_set_value);
    if profile != Profile::Safe && profile != Profile::Base {
        add(registry, ValueKind::Tagged, represent_tagged);
    } else {
        // Only the core collection tags survive a safe dump.
        registry.add_tagged(crate::resolver::PAIRS, Arc::new(represent_tagged));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Tagged;
    use rstest::rstest;

    fn scalar_text(node: &Node) -> &str {
        node.scalar_value().unwrap_or_default()
    }

    #[rstest]
    #[case(1.0, "1.0")]
    #[case(0.5, "0.5")]
    #[case(-2.25, "-2.25")]
    #[case(1e20, "1.0e+20")]
    #[case(1.5e-7, "1.5e-7")]
    #[case(f64::INFINITY, ".inf")]
    #[case(f64::NEG_INFINITY, "-.inf")]
    fn test_format_float(#[case] input: f64, #[case] expected: &str) {
        assert_eq!(format_float(input), expected);
    }

    #[test]
    fn test_format_binary_wraps() {
        let text = format_binary(&[0u8; 60]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 76);
    }

    #[test]
    fn test_scalars() {
        let mut r = Representer::new(Schema::for_profile(Profile::Safe));
        let node = r.represent(&Value::from(42)).unwrap();
        assert_eq!((node.tag.as_str(), scalar_text(&node)), (INT, "42"));
        let node = r.represent(&Value::Null).unwrap();
        assert_eq!(scalar_text(&node), "null");
        let node = r.represent(&Value::Binary(b"hi".to_vec())).unwrap();
        assert!(node.explicit_tag);
        assert_eq!(scalar_text(&node), "aGk=\n");
    }

    #[test]
    fn test_safe_rejects_unknown_tags() {
        let mut r = Representer::new(Schema::for_profile(Profile::Safe));
        let value = Value::from(Tagged {
            tag: "!point".into(),
            value: Value::Null,
        });
        let err = r.represent(&value).unwrap_err();
        assert!(err.to_string().contains("cannot represent"), "{}", err);

        let mut r = Representer::new(Schema::for_profile(Profile::Unrestricted));
        let node = r.represent(&value).unwrap();
        assert_eq!(node.tag, "!point");
        assert!(node.explicit_tag);
    }

    #[test]
    fn test_plain_set_uses_null_values() {
        let mut r = Representer::new(Schema::for_profile(Profile::Safe));
        let set: Set = ["a"].into_iter().collect();
        let node = r.represent(&Value::from(set)).unwrap();
        let NodeData::Mapping { pairs, .. } = &node.data else {
            panic!("expected a mapping");
        };
        assert_eq!(node.tag, SET);
        assert_eq!(scalar_text(&pairs[0].1), "null");
    }

    #[test]
    fn test_flow_style_for_scalar_collections() {
        let mut r = Representer::new(Schema::for_profile(Profile::Safe)).with_default_flow_style(None);
        let value = Value::from(vec![Value::from(1), Value::from(vec![Value::from(2)])]);
        let node = r.represent(&value).unwrap();
        assert!(!node.is_flow());
        let NodeData::Sequence { items, .. } = &node.data else {
            panic!("expected a sequence");
        };
        assert!(items[1].is_flow());
    }

    #[test]
    fn test_changed_scalar_drops_source() {
        let meta = ScalarMeta {
            style: Some(ScalarStyle::Plain),
            chomping: None,
            indent_indicator: None,
            text: "0x1F".into(),
            source: Some("0x1F".into()),
            header_comment: None,
            anchor: Some("n".into()),
            tag: None,
            loaded: Value::from(31),
        };
        let mut r = Representer::new(Schema::default());
        let mut node = r.represent(&Value::from(31)).unwrap();
        apply_scalar_meta(&mut node, &meta, &Value::from(31));
        assert_eq!(scalar_text(&node), "0x1F");
        assert_eq!(node.anchor.as_deref(), Some("n"));

        let mut node = r.represent(&Value::from(32)).unwrap();
        apply_scalar_meta(&mut node, &meta, &Value::from(32));
        assert_eq!(scalar_text(&node), "32");
    }
}
