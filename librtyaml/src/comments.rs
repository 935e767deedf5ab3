//! Round-trip metadata: comments, blank lines and presentation details that
//! a round-trip load keeps next to the values so a dump can reproduce them.
//!
//! Metadata is attached to collections ([`CollectionMeta`]), to each entry of
//! a collection ([`EntryMeta`]), to scalars through their entry
//! ([`ScalarMeta`]) and to documents ([`DocumentMeta`]). Values built by
//! hand or by a plain load carry none of it.

use std::collections::HashMap;

use crate::events::TagDirective;
use crate::tokens::{Chomping, Comment, ScalarStyle, Trivia};
use crate::value::Value;

/// How a scalar was written.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarMeta {
    pub style: Option<ScalarStyle>,
    pub chomping: Option<Chomping>,
    pub indent_indicator: Option<usize>,
    /// Scalar content as read, before construction (`0x1F`, `True`...).
    pub text: String,
    /// Original source text of single-line and folded scalars.
    pub source: Option<String>,
    pub header_comment: Option<Comment>,
    pub anchor: Option<String>,
    /// Tag written in the source, if any.
    pub tag: Option<String>,
    /// The value constructed at load time.
    pub loaded: Value,
}

impl ScalarMeta {
    /// Whether `current` is still the value that was loaded, so the original
    /// text can be reused.
    pub fn is_unchanged(&self, current: &Value) -> bool {
        &self.loaded == current
    }
}

/// Metadata of one mapping entry, sequence item or set member.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntryMeta {
    /// Comments and blank lines before the key or item.
    pub before: Vec<Trivia>,
    /// Trivia between the key and a scalar value.
    pub value_before: Vec<Trivia>,
    /// Comment at the end of the entry's last line.
    pub eol: Option<Comment>,
    pub key: Option<ScalarMeta>,
    pub value: Option<ScalarMeta>,
    /// Anchor name the value was aliased from.
    pub alias: Option<String>,
}

impl EntryMeta {
    pub fn is_empty(&self) -> bool {
        self == &EntryMeta::default()
    }
}

/// A merge key (`<<`) of a round-trip mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeMeta {
    /// Number of own entries written before the merge key.
    pub position: usize,
    /// The merged mapping, or sequence of mappings, as written.
    pub value: Value,
    pub entry: EntryMeta,
    /// Keys contributed by the merge, with the value they were given.
    pub merged: Vec<(Value, Value)>,
}

/// Presentation of a sequence, mapping, ordered map or set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionMeta {
    /// Trivia before the collection; a leading end-of-line comment sits on
    /// the line that opens the collection.
    pub before: Vec<Trivia>,
    /// Trivia after the last entry.
    pub end: Vec<Trivia>,
    pub flow: bool,
    pub anchor: Option<String>,
    pub tag: Option<String>,
    /// Offset of a block collection from its parent's indentation.
    pub indent: Option<usize>,
    /// Per-item metadata of sequences, by index.
    pub items: Vec<EntryMeta>,
    /// Per-entry metadata of mappings, ordered maps and sets, by key.
    pub keys: HashMap<Value, EntryMeta>,
    pub merges: Vec<MergeMeta>,
}

impl CollectionMeta {
    pub fn item(&self, index: usize) -> Option<&EntryMeta> {
        self.items.get(index)
    }

    pub fn key(&self, key: &Value) -> Option<&EntryMeta> {
        self.keys.get(key)
    }

    /// Whether `key` was contributed by a merge and still has the merged
    /// value.
    pub fn is_merged(&self, key: &Value, value: &Value) -> bool {
        self.merges
            .iter()
            .flat_map(|m| m.merged.iter())
            .any(|(k, v)| k == key && v == value)
    }
}

/// Document-level round-trip metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentMeta {
    /// Trivia before the `---` marker.
    pub before: Vec<Trivia>,
    pub explicit_start: bool,
    pub explicit_end: bool,
    pub version: Option<(u32, u32)>,
    pub tags: Vec<TagDirective>,
    /// Trivia before a scalar or alias root.
    pub root_before: Vec<Trivia>,
    /// Presentation of a scalar root.
    pub root: Option<ScalarMeta>,
    /// Trivia after the root.
    pub end: Vec<Trivia>,
}

/// Prepend an end-of-line comment to a trivia list.
pub(crate) fn with_eol(eol: Option<&Comment>, trivia: &[Trivia]) -> Vec<Trivia> {
    eol.map(|c| Trivia::Eol(c.clone()))
        .into_iter()
        .chain(trivia.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_eol() {
        let eol = Comment::new("# x", 4);
        assert_eq!(
            with_eol(Some(&eol), &[Trivia::Blank]),
            vec![Trivia::Eol(eol.clone()), Trivia::Blank]
        );
        assert_eq!(with_eol(None, &[]), Vec::<Trivia>::new());
    }

    #[test]
    fn test_merged_lookup() {
        let mut meta = CollectionMeta::default();
        meta.merges.push(MergeMeta {
            position: 0,
            value: Value::Null,
            entry: EntryMeta::default(),
            merged: vec![(Value::from("x"), Value::from(1))],
        });
        assert!(meta.is_merged(&Value::from("x"), &Value::from(1)));
        assert!(!meta.is_merged(&Value::from("x"), &Value::from(2)));
    }
}
