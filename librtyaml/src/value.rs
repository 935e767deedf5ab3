//! Native values produced by construction and consumed by representation.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;

use indexmap::{IndexMap, IndexSet};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::comments::{CollectionMeta, DocumentMeta};

/// A YAML value.
#[derive(Clone)]
pub enum Value {
    /// `null`, `~` or empty.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Arbitrary-precision integer.
    Int(BigInt),
    /// 64-bit floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Decoded `!!binary` data.
    Binary(Vec<u8>),
    /// `!!timestamp`, kept as written.
    Timestamp(String),
    Sequence(Sequence),
    Mapping(Mapping),
    /// `!!omap`: a mapping whose order is part of its identity.
    OrderedMap(OrderedMap),
    /// `!!set`.
    Set(Set),
    /// A value under a tag with no dedicated variant.
    Tagged(Box<Tagged>),
}

/// The variant of a [`Value`], used to look up representers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    String,
    Binary,
    Timestamp,
    Sequence,
    Mapping,
    OrderedMap,
    Set,
    Tagged,
}

impl ValueKind {
    pub fn is_scalar(self) -> bool {
        !matches!(
            self,
            ValueKind::Sequence | ValueKind::Mapping | ValueKind::OrderedMap | ValueKind::Set | ValueKind::Tagged
        )
    }
}

#[derive(Clone, Default)]
pub struct Sequence {
    pub items: Vec<Value>,
    pub meta: Option<Box<CollectionMeta>>,
}

#[derive(Clone, Default)]
pub struct Mapping {
    pub entries: IndexMap<Value, Value>,
    pub meta: Option<Box<CollectionMeta>>,
}

#[derive(Clone, Default)]
pub struct OrderedMap {
    pub entries: IndexMap<Value, Value>,
    pub meta: Option<Box<CollectionMeta>>,
}

#[derive(Clone, Default)]
pub struct Set {
    pub members: IndexSet<Value>,
    pub meta: Option<Box<CollectionMeta>>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tagged {
    pub tag: String,
    pub value: Value,
}

/// A document loaded in round-trip mode.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pub root: Value,
    pub meta: DocumentMeta,
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.items.push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }
}

macro_rules! map_methods {
    ($name:ident) => {
        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn len(&self) -> usize {
                self.entries.len()
            }

            pub fn is_empty(&self) -> bool {
                self.entries.is_empty()
            }

            pub fn get(&self, key: &Value) -> Option<&Value> {
                self.entries.get(key)
            }

            pub fn get_mut(&mut self, key: &Value) -> Option<&mut Value> {
                self.entries.get_mut(key)
            }

            pub fn contains_key(&self, key: &Value) -> bool {
                self.entries.contains_key(key)
            }

            /// Insert or replace; a new key goes last.
            pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
                self.entries.insert(key.into(), value.into())
            }

            /// Remove an entry, keeping the order of the others.
            pub fn remove(&mut self, key: &Value) -> Option<Value> {
                self.entries.shift_remove(key)
            }

            pub fn iter(&self) -> indexmap::map::Iter<'_, Value, Value> {
                self.entries.iter()
            }

            pub fn keys(&self) -> indexmap::map::Keys<'_, Value, Value> {
                self.entries.keys()
            }
        }
    };
}

map_methods!(Mapping);
map_methods!(OrderedMap);

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, member: &Value) -> bool {
        self.members.contains(member)
    }

    pub fn insert(&mut self, member: impl Into<Value>) -> bool {
        self.members.insert(member.into())
    }

    pub fn remove(&mut self, member: &Value) -> bool {
        self.members.shift_remove(member)
    }

    pub fn iter(&self) -> indexmap::set::Iter<'_, Value> {
        self.members.iter()
    }
}

impl<V: Into<Value>> FromIterator<V> for Set {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().map(Into::into).collect(),
            meta: None,
        }
    }
}

impl<V: Into<Value>> FromIterator<V> for Sequence {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(Into::into).collect(),
            meta: None,
        }
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            meta: None,
        }
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for OrderedMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            meta: None,
        }
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Binary(_) => ValueKind::Binary,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Sequence(_) => ValueKind::Sequence,
            Value::Mapping(_) => ValueKind::Mapping,
            Value::OrderedMap(_) => ValueKind::OrderedMap,
            Value::Set(_) => ValueKind::Set,
            Value::Tagged(_) => ValueKind::Tagged,
        }
    }

    /// Returns `true` if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    /// The integer, if it fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(ToPrimitive::to_i64)
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_ordered_map(&self) -> Option<&OrderedMap> {
        match self {
            Value::OrderedMap(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&Set> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_set_mut(&mut self) -> Option<&mut Set> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tagged(&self) -> Option<&Tagged> {
        match self {
            Value::Tagged(t) => Some(t),
            _ => None,
        }
    }

    /// Look up a string key in a mapping or ordered map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let key = Value::from(key);
        match self {
            Value::Mapping(m) => m.get(&key),
            Value::OrderedMap(m) => m.get(&key),
            _ => None,
        }
    }

    /// Round-trip metadata of a collection.
    pub fn meta(&self) -> Option<&CollectionMeta> {
        match self {
            Value::Sequence(s) => s.meta.as_deref(),
            Value::Mapping(m) => m.meta.as_deref(),
            Value::OrderedMap(m) => m.meta.as_deref(),
            Value::Set(s) => s.meta.as_deref(),
            Value::Tagged(t) => t.value.meta(),
            _ => None,
        }
    }

    pub fn meta_mut(&mut self) -> Option<&mut CollectionMeta> {
        match self {
            Value::Sequence(s) => s.meta.as_deref_mut(),
            Value::Mapping(m) => m.meta.as_deref_mut(),
            Value::OrderedMap(m) => m.meta.as_deref_mut(),
            Value::Set(s) => s.meta.as_deref_mut(),
            Value::Tagged(t) => t.value.meta_mut(),
            _ => None,
        }
    }

    /// Drop all round-trip metadata, recursively.
    pub fn strip_meta(&mut self) {
        match self {
            Value::Sequence(s) => {
                s.meta = None;
                s.items.iter_mut().for_each(Value::strip_meta);
            }
            Value::Mapping(m) => {
                m.meta = None;
                m.entries.values_mut().for_each(Value::strip_meta);
            }
            Value::OrderedMap(m) => {
                m.meta = None;
                m.entries.values_mut().for_each(Value::strip_meta);
            }
            Value::Set(s) => s.meta = None,
            Value::Tagged(t) => t.value.strip_meta(),
            _ => {}
        }
    }
}

static NULL: Value = Value::Null;

impl Index<&str> for Value {
    type Output = Value;

    /// Missing keys and non-mappings index to `Null`.
    fn index(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        match self {
            Value::Sequence(s) => s.get(index).unwrap_or(&NULL),
            _ => &NULL,
        }
    }
}

// ============================================================================
// Equality and hashing
// ============================================================================

fn float_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn float_bits(f: f64) -> u64 {
    if f == 0.0 {
        0
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

fn hash_one<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_eq(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Mapping(a), Value::Mapping(b)) => a == b,
            (Value::OrderedMap(a), Value::OrderedMap(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Tagged(a), Value::Tagged(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => float_bits(*f).hash(state),
            Value::String(s) | Value::Timestamp(s) => s.hash(state),
            Value::Binary(b) => b.hash(state),
            Value::Sequence(s) => s.hash(state),
            Value::Mapping(m) => m.hash(state),
            Value::OrderedMap(m) => m.hash(state),
            Value::Set(s) => s.hash(state),
            Value::Tagged(t) => t.hash(state),
        }
    }
}

/// Metadata never takes part in equality.
impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for Sequence {}

impl Hash for Sequence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.items.hash(state);
    }
}

/// Mappings compare regardless of key order.
impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Mapping {}

impl Hash for Mapping {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let combined = self
            .entries
            .iter()
            .fold(0u64, |acc, entry| acc.wrapping_add(hash_one(&entry)));
        self.entries.len().hash(state);
        combined.hash(state);
    }
}

/// Ordered maps compare entry by entry.
impl PartialEq for OrderedMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

impl Eq for OrderedMap {}

impl Hash for OrderedMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entries.len().hash(state);
        for entry in &self.entries {
            entry.hash(state);
        }
    }
}

impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Eq for Set {}

impl Hash for Set {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let combined = self
            .members
            .iter()
            .fold(0u64, |acc, member| acc.wrapping_add(hash_one(member)));
        self.members.len().hash(state);
        combined.hash(state);
    }
}

// ============================================================================
// Formatting
// ============================================================================

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.is_nan() {
                    write!(f, ".nan")
                } else if n.is_infinite() {
                    write!(f, "{}", if *n > 0.0 { ".inf" } else { "-.inf" })
                } else {
                    write!(f, "{:?}", n)
                }
            }
            Value::String(s) => write!(f, "{:?}", s),
            Value::Binary(b) => {
                write!(f, "<")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, ">")
            }
            Value::Timestamp(t) => write!(f, "timestamp({})", t),
            Value::Sequence(s) => f.debug_list().entries(&s.items).finish(),
            Value::Mapping(m) => f.debug_map().entries(&m.entries).finish(),
            Value::OrderedMap(m) => {
                write!(f, "omap")?;
                f.debug_map().entries(&m.entries).finish()
            }
            Value::Set(s) => f.debug_set().entries(&s.members).finish(),
            Value::Tagged(t) => write!(f, "{} {:?}", t.tag, t.value),
        }
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(&self.entries).finish()
    }
}

impl fmt::Debug for OrderedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(&self.entries).finish()
    }
}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(&self.members).finish()
    }
}

impl fmt::Debug for Tagged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.tag, self.value)
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(Sequence { items, meta: None })
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<Sequence> for Value {
    fn from(s: Sequence) -> Self {
        Value::Sequence(s)
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

impl From<OrderedMap> for Value {
    fn from(m: OrderedMap) -> Self {
        Value::OrderedMap(m)
    }
}

impl From<Set> for Value {
    fn from(s: Set) -> Self {
        Value::Set(s)
    }
}

impl From<Tagged> for Value {
    fn from(t: Tagged) -> Self {
        Value::Tagged(Box::new(t))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_equality_ignores_order_and_meta() {
        let a: Mapping = vec![("x", 1), ("y", 2)].into_iter().collect();
        let mut b: Mapping = vec![("y", 2), ("x", 1)].into_iter().collect();
        b.meta = Some(Box::default());
        assert_eq!(Value::from(a.clone()), Value::from(b.clone()));
        assert_eq!(hash_one(&Value::from(a)), hash_one(&Value::from(b)));
    }

    #[test]
    fn test_ordered_map_equality_is_ordered() {
        let a: OrderedMap = vec![("x", 1), ("y", 2)].into_iter().collect();
        let b: OrderedMap = vec![("y", 2), ("x", 1)].into_iter().collect();
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn test_float_keys() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(hash_one(&Value::Float(0.0)), hash_one(&Value::Float(-0.0)));
    }

    #[test]
    fn test_set_mutation() {
        let mut set: Set = ["a", "b", "c"].into_iter().collect();
        set.remove(&Value::from("b"));
        set.insert("d");
        assert_eq!(set, ["a", "c", "d"].into_iter().collect::<Set>());
        set.insert("e");
        set.insert("f");
        set.remove(&Value::from("e"));
        assert_eq!(set, ["a", "c", "d", "f"].into_iter().collect::<Set>());
    }

    #[test]
    fn test_index() {
        let mut m = Mapping::new();
        m.insert("list", vec![Value::from(1), Value::from("two")]);
        let v = Value::from(m);
        assert_eq!(v["list"][1], Value::from("two"));
        assert!(v["missing"][0].is_null());
        assert_eq!(v["list"][0].as_i64(), Some(1));
    }

    #[test]
    fn test_complex_keys() {
        let key: Sequence = [1, 2].into_iter().collect();
        let mut m = Mapping::new();
        m.insert(key.clone(), "pair");
        assert_eq!(m.get(&Value::from(key)), Some(&Value::from("pair")));
    }
}
