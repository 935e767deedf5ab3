//! Profiles and their registries.
//!
//! A [`Schema`] bundles the resolver with the constructor and representer
//! registries of one profile. The process-wide defaults are built once; a
//! schema obtained from [`Schema::for_profile`] shares them until it is
//! extended, at which point it takes a private copy, so registrations never
//! leak into unrelated pipelines.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constructor::{self, Constructor};
use crate::error::Result;
use crate::nodes::{Node, NodeKind};
use crate::representer::{self, Representer};
use crate::resolver::{FirstChars, PathElement, Resolver};
use crate::value::{Value, ValueKind};

/// Builds a value from a node carrying one exact tag.
pub type ConstructFn = Arc<dyn Fn(&mut Constructor, &Node) -> Result<Value> + Send + Sync>;

/// Builds a value from a node whose tag starts with a registered prefix; the
/// second argument is the rest of the tag.
pub type MultiConstructFn = Arc<dyn Fn(&mut Constructor, &str, &Node) -> Result<Value> + Send + Sync>;

/// Builds a node from a value.
pub type RepresentFn = Arc<dyn Fn(&mut Representer, &Value) -> Result<Node> + Send + Sync>;

/// Which pipeline class a schema belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Profile {
    /// Strings, sequences and mappings only; no implicit typing.
    Base,
    /// Core tags; anything else is an error.
    Safe,
    /// Core tags; unknown tags become [`Value::Tagged`].
    Unrestricted,
    /// Like `Unrestricted`, and values keep comments and presentation.
    #[default]
    RoundTrip,
}

/// A capability a multi-representer can be registered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Tagged values whose tag starts with this prefix.
    TagPrefix(String),
    /// Any scalar value.
    Scalar,
    /// Any collection value.
    Collection,
}

impl Capability {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Capability::TagPrefix(prefix) => value.as_tagged().is_some_and(|t| t.tag.starts_with(prefix.as_str())),
            Capability::Scalar => value.kind().is_scalar(),
            Capability::Collection => !value.kind().is_scalar() && value.kind() != ValueKind::Tagged,
        }
    }
}

/// Constructors by exact tag, then by tag prefix, then a catch-all.
#[derive(Clone, Default)]
pub struct ConstructorRegistry {
    exact: HashMap<String, ConstructFn>,
    multi: Vec<(String, MultiConstructFn)>,
    fallback: Option<MultiConstructFn>,
}

impl ConstructorRegistry {
    pub fn add(&mut self, tag: &str, f: ConstructFn) {
        self.exact.insert(tag.to_string(), f);
    }

    pub fn add_multi(&mut self, prefix: &str, f: MultiConstructFn) {
        self.multi.retain(|(p, _)| p != prefix);
        self.multi.push((prefix.to_string(), f));
    }

    pub fn set_fallback(&mut self, f: MultiConstructFn) {
        self.fallback = Some(f);
    }

    /// The constructor for `tag`, with the suffix to pass to a
    /// multi-constructor.
    pub(crate) fn lookup<'t>(&self, tag: &'t str) -> Option<Lookup<'t>> {
        if let Some(f) = self.exact.get(tag) {
            return Some(Lookup::Exact(Arc::clone(f)));
        }
        self.multi
            .iter()
            .find(|(prefix, _)| tag.starts_with(prefix.as_str()))
            .map(|(prefix, f)| Lookup::Multi(Arc::clone(f), &tag[prefix.len()..]))
            .or_else(|| self.fallback.as_ref().map(|f| Lookup::Multi(Arc::clone(f), tag)))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.exact.contains_key(tag)
    }
}

pub(crate) enum Lookup<'t> {
    Exact(ConstructFn),
    Multi(MultiConstructFn, &'t str),
}

impl fmt::Debug for ConstructorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.exact.keys().collect();
        tags.sort();
        f.debug_struct("ConstructorRegistry")
            .field("exact", &tags)
            .field("multi", &self.multi.iter().map(|(p, _)| p).collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Representers by value kind or tag, then by capability, then a catch-all.
#[derive(Clone, Default)]
pub struct RepresenterRegistry {
    exact: HashMap<ValueKind, RepresentFn>,
    tagged: HashMap<String, RepresentFn>,
    multi: Vec<(Capability, RepresentFn)>,
    fallback: Option<RepresentFn>,
}

impl RepresenterRegistry {
    pub fn add(&mut self, kind: ValueKind, f: RepresentFn) {
        self.exact.insert(kind, f);
    }

    /// Register a representer for [`Value::Tagged`] values with this tag.
    pub fn add_tagged(&mut self, tag: &str, f: RepresentFn) {
        self.tagged.insert(tag.to_string(), f);
    }

    pub fn add_multi(&mut self, capability: Capability, f: RepresentFn) {
        self.multi.retain(|(c, _)| c != &capability);
        self.multi.push((capability, f));
    }

    pub fn set_fallback(&mut self, f: RepresentFn) {
        self.fallback = Some(f);
    }

    pub(crate) fn lookup(&self, value: &Value) -> Option<RepresentFn> {
        let tagged = value.as_tagged().and_then(|t| self.tagged.get(&t.tag));
        tagged
            .or_else(|| self.exact.get(&value.kind()))
            .or_else(|| self.multi.iter().find(|(c, _)| c.matches(value)).map(|(_, f)| f))
            .or(self.fallback.as_ref())
            .map(Arc::clone)
    }
}

impl fmt::Debug for RepresenterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepresenterRegistry")
            .field("exact", &self.exact.keys().collect::<Vec<_>>())
            .field("tagged", &self.tagged.keys().collect::<Vec<_>>())
            .field("multi", &self.multi.iter().map(|(c, _)| c).collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Resolver and registries of one profile.
#[derive(Clone, Debug)]
pub struct Schema {
    profile: Profile,
    resolver: Arc<Resolver>,
    constructors: Arc<ConstructorRegistry>,
    representers: Arc<RepresenterRegistry>,
}

static BASE: Lazy<Schema> = Lazy::new(|| Schema::build(Profile::Base));
static SAFE: Lazy<Schema> = Lazy::new(|| Schema::build(Profile::Safe));
static UNRESTRICTED: Lazy<Schema> = Lazy::new(|| Schema::build(Profile::Unrestricted));
static ROUND_TRIP: Lazy<Schema> = Lazy::new(|| Schema::build(Profile::RoundTrip));

impl Default for Schema {
    fn default() -> Self {
        Self::for_profile(Profile::RoundTrip)
    }
}

impl Schema {
    /// The default schema of a profile.
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Base => BASE.clone(),
            Profile::Safe => SAFE.clone(),
            Profile::Unrestricted => UNRESTRICTED.clone(),
            Profile::RoundTrip => ROUND_TRIP.clone(),
        }
    }

    fn build(profile: Profile) -> Self {
        tracing::debug!(?profile, "building default schema");
        let resolver = match profile {
            Profile::Base => Resolver::empty(),
            _ => Resolver::default(),
        };
        let mut constructors = ConstructorRegistry::default();
        let mut representers = RepresenterRegistry::default();
        constructor::register_defaults(&mut constructors, profile);
        representer::register_defaults(&mut representers, profile);
        Self {
            profile,
            resolver: Arc::new(resolver),
            constructors: Arc::new(constructors),
            representers: Arc::new(representers),
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn is_round_trip(&self) -> bool {
        self.profile == Profile::RoundTrip
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn constructors(&self) -> &ConstructorRegistry {
        &self.constructors
    }

    pub fn representers(&self) -> &RepresenterRegistry {
        &self.representers
    }

    pub fn add_constructor<F>(&mut self, tag: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Constructor, &Node) -> Result<Value> + Send + Sync + 'static,
    {
        tracing::debug!(tag, "adding constructor");
        Arc::make_mut(&mut self.constructors).add(tag, Arc::new(f));
        self
    }

    pub fn add_multi_constructor<F>(&mut self, prefix: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Constructor, &str, &Node) -> Result<Value> + Send + Sync + 'static,
    {
        tracing::debug!(prefix, "adding multi-constructor");
        Arc::make_mut(&mut self.constructors).add_multi(prefix, Arc::new(f));
        self
    }

    pub fn add_representer<F>(&mut self, kind: ValueKind, f: F) -> &mut Self
    where
        F: Fn(&mut Representer, &Value) -> Result<Node> + Send + Sync + 'static,
    {
        tracing::debug!(?kind, "adding representer");
        Arc::make_mut(&mut self.representers).add(kind, Arc::new(f));
        self
    }

    /// Register a representer for tagged values carrying `tag`.
    pub fn add_tagged_representer<F>(&mut self, tag: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Representer, &Value) -> Result<Node> + Send + Sync + 'static,
    {
        tracing::debug!(tag, "adding tagged representer");
        Arc::make_mut(&mut self.representers).add_tagged(tag, Arc::new(f));
        self
    }

    pub fn add_multi_representer<F>(&mut self, capability: Capability, f: F) -> &mut Self
    where
        F: Fn(&mut Representer, &Value) -> Result<Node> + Send + Sync + 'static,
    {
        tracing::debug!(?capability, "adding multi-representer");
        Arc::make_mut(&mut self.representers).add_multi(capability, Arc::new(f));
        self
    }

    pub fn add_implicit_resolver(&mut self, tag: &str, regex: Regex, first: FirstChars) -> &mut Self {
        Arc::make_mut(&mut self.resolver).add_implicit_resolver(tag, regex, first);
        self
    }

    pub fn add_path_resolver(&mut self, tag: &str, path: Vec<PathElement>, kind: Option<NodeKind>) -> &mut Self {
        Arc::make_mut(&mut self.resolver).add_path_resolver(tag, path, kind);
        self
    }

    /// Opt a tag into plain-text handling in both directions: nodes with
    /// `tag` load as `Value::Tagged`, and such values dump back under it.
    pub fn register_tag(&mut self, tag: &str) -> &mut Self {
        let owned = tag.to_string();
        self.add_constructor(tag, move |constructor, node| {
            let value = constructor.construct_untagged(node)?;
            Ok(Value::from(crate::value::Tagged {
                tag: owned.clone(),
                value,
            }))
        });
        self.add_tagged_representer(tag, representer::represent_tagged);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::ScalarNode;
    use crate::resolver::STR;

    #[test]
    fn test_extension_does_not_leak() {
        let mut schema = Schema::for_profile(Profile::Safe);
        schema.add_constructor("!point", |_, _| Ok(Value::from("point")));
        assert!(schema.constructors().contains("!point"));
        assert!(!Schema::for_profile(Profile::Safe).constructors().contains("!point"));
    }

    #[test]
    fn test_profiles() {
        assert!(Schema::default().is_round_trip());
        assert!(Schema::for_profile(Profile::Safe).constructors().lookup("!x").is_none());
        assert!(Schema::for_profile(Profile::Unrestricted).constructors().lookup("!x").is_some());
        assert!(Schema::for_profile(Profile::Base).constructors().contains(STR));
    }

    #[test]
    fn test_multi_lookup_strips_prefix() {
        let mut schema = Schema::for_profile(Profile::Safe);
        schema.add_multi_constructor("!shape:", |_, suffix, _| Ok(Value::from(suffix)));
        match schema.constructors().lookup("!shape:circle") {
            Some(Lookup::Multi(_, suffix)) => assert_eq!(suffix, "circle"),
            _ => panic!("expected a multi-constructor"),
        }
    }

    #[test]
    fn test_capability_representer() {
        let mut schema = Schema::for_profile(Profile::Safe);
        schema.add_multi_representer(Capability::TagPrefix("!my".into()), |_, _| {
            Ok(Node::scalar("!mine", ScalarNode::new("x")))
        });
        let value = Value::from(crate::value::Tagged {
            tag: "!mytype".into(),
            value: Value::Null,
        });
        assert!(schema.representers().lookup(&value).is_some());
    }

    #[test]
    fn test_registered_tag_loads_and_dumps() {
        let input = "p: !point {x: 1}\n";
        let mut schema = Schema::for_profile(Profile::Safe);
        assert!(crate::load(input, &schema).is_err());

        schema.register_tag("!point");
        let value = crate::load(input, &schema).unwrap();
        let point = value["p"].as_tagged().unwrap();
        assert_eq!(point.tag, "!point");
        assert_eq!(point.value["x"], Value::from(1));

        let options = crate::DumperOptions::default();
        let text = crate::dump(&value, &schema, &options).unwrap();
        assert_eq!(text, "p: !point\n  x: 1\n");
        assert_eq!(crate::load(&text, &schema).unwrap(), value);
    }
}
