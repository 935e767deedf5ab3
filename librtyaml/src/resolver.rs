//! Tag resolution.
//!
//! A plain scalar without an explicit tag gets its tag from the implicit
//! resolver table: candidate regexes are looked up by the first character of
//! the text (plus the resolvers registered for any character) and tried in
//! registration order. Path resolvers override the table by position in the
//! document. There is one table per YAML version; 1.1 knows `yes`/`no`
//! booleans, sexagesimal numbers and `0`-prefixed octals, 1.2 does not.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::nodes::NodeKind;

pub const STR: &str = "tag:yaml.org,2002:str";
pub const INT: &str = "tag:yaml.org,2002:int";
pub const FLOAT: &str = "tag:yaml.org,2002:float";
pub const BOOL: &str = "tag:yaml.org,2002:bool";
pub const NULL: &str = "tag:yaml.org,2002:null";
pub const BINARY: &str = "tag:yaml.org,2002:binary";
pub const TIMESTAMP: &str = "tag:yaml.org,2002:timestamp";
pub const MERGE: &str = "tag:yaml.org,2002:merge";
pub const VALUE: &str = "tag:yaml.org,2002:value";
pub const YAML: &str = "tag:yaml.org,2002:yaml";
pub const OMAP: &str = "tag:yaml.org,2002:omap";
pub const PAIRS: &str = "tag:yaml.org,2002:pairs";
pub const SET: &str = "tag:yaml.org,2002:set";
pub const SEQ: &str = "tag:yaml.org,2002:seq";
pub const MAP: &str = "tag:yaml.org,2002:map";

/// Prefix of the `!!` handle.
pub const CORE_PREFIX: &str = "tag:yaml.org,2002:";

pub const VERSION_1_1: (u32, u32) = (1, 1);
pub const VERSION_1_2: (u32, u32) = (1, 2);

/// Abbreviate a core-schema tag to its `!!` form.
pub fn short_tag(tag: &str) -> String {
    match tag.strip_prefix(CORE_PREFIX) {
        Some(suffix) => format!("!!{}", suffix),
        None => tag.to_string(),
    }
}

const BOOL_1_2: &str = r"^(?:true|True|TRUE|false|False|FALSE)$";
const BOOL_1_1: &str =
    r"^(?:y|Y|yes|Yes|YES|n|N|no|No|NO|true|True|TRUE|false|False|FALSE|on|On|ON|off|Off|OFF)$";
const FLOAT_1_2: &str = r"^(?:[-+]?(?:[0-9][0-9_]*)\.[0-9_]*(?:[eE][-+]?[0-9]+)?|[-+]?(?:[0-9][0-9_]*)(?:[eE][-+]?[0-9]+)|[-+]?\.[0-9_]+(?:[eE][-+]?[0-9]+)?|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$";
const FLOAT_1_1: &str = r"^(?:[-+]?(?:[0-9][0-9_]*)\.[0-9_]*(?:[eE][-+]?[0-9]+)?|\.[0-9_]+(?:[eE][-+][0-9]+)?|[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+\.[0-9_]*|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$";
const INT_1_2: &str = r"^(?:[-+]?0b[0-1_]+|[-+]?0o[0-7_]+|[-+]?[0-9_]+|[-+]?0x[0-9a-fA-F_]+)$";
const INT_1_1: &str = r"^(?:[-+]?0b[0-1_]+|[-+]?0[0-7_]+|[-+]?(?:0|[1-9][0-9_]*)|[-+]?0x[0-9a-fA-F_]+|[-+]?[1-9][0-9_]*(?::[0-5]?[0-9])+)$";
const MERGE_RE: &str = r"^(?:<<)$";
const NULL_RE: &str = r"^(?:~|null|Null|NULL|)$";
const TIMESTAMP_RE: &str = r"^(?:[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]|[0-9][0-9][0-9][0-9]-[0-9][0-9]?-[0-9][0-9]?(?:[Tt]|[ \t]+)[0-9][0-9]?:[0-9][0-9]:[0-9][0-9](?:\.[0-9]*)?(?:[ \t]*(?:Z|[-+][0-9][0-9]?(?::[0-9][0-9])?))?)$";
const VALUE_RE: &str = r"^(?:=)$";
const YAML_RE: &str = r"^(?:!|&|\*)$";

fn core_regex(pattern: &str) -> Regex {
    // The core patterns are constants covered by the tests below.
    Regex::new(pattern).expect("core resolver pattern compiles")
}

/// First characters a resolver applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstChars {
    /// Try the resolver for every scalar.
    Any,
    /// Try the resolver for scalars starting with one of these characters;
    /// `empty` also selects the empty scalar.
    Set { chars: String, empty: bool },
}

impl FirstChars {
    pub fn chars(chars: &str) -> Self {
        FirstChars::Set {
            chars: chars.to_string(),
            empty: false,
        }
    }
}

#[derive(Clone)]
struct ImplicitResolver {
    tag: String,
    regex: Regex,
}

impl fmt::Debug for ImplicitResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ /{}/", self.tag, self.regex.as_str())
    }
}

/// Implicit resolvers of one YAML version, indexed by first character.
#[derive(Debug, Clone, Default)]
struct ImplicitTable {
    by_first: HashMap<char, Vec<ImplicitResolver>>,
    empty: Vec<ImplicitResolver>,
    any: Vec<ImplicitResolver>,
}

impl ImplicitTable {
    fn add(&mut self, tag: &str, regex: Regex, first: &FirstChars) {
        let resolver = ImplicitResolver {
            tag: tag.to_string(),
            regex,
        };
        match first {
            FirstChars::Any => self.any.push(resolver),
            FirstChars::Set { chars, empty } => {
                for ch in chars.chars() {
                    self.by_first.entry(ch).or_default().push(resolver.clone());
                }
                if *empty {
                    self.empty.push(resolver);
                }
            }
        }
    }

    fn resolve(&self, value: &str) -> Option<&str> {
        let candidates = match value.chars().next() {
            None => self.empty.as_slice(),
            Some(ch) => self.by_first.get(&ch).map_or(&[][..], Vec::as_slice),
        };
        candidates
            .iter()
            .chain(self.any.iter())
            .find(|r| r.regex.is_match(value))
            .map(|r| r.tag.as_str())
    }
}

/// One step of a path resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    /// A mapping value under a scalar key with this text.
    Key(String),
    /// A sequence item at this index.
    Index(usize),
    /// Any mapping value or sequence item.
    Any,
}

/// Position of a node being composed, one segment per ancestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Value of the entry whose key is the scalar with this text.
    Key(String),
    /// Value of an entry with a non-scalar key, or a key itself.
    Other,
    Index(usize),
}

impl PathElement {
    fn matches(&self, segment: &PathSegment) -> bool {
        match (self, segment) {
            (PathElement::Any, PathSegment::Key(_) | PathSegment::Index(_)) => true,
            (PathElement::Key(k), PathSegment::Key(s)) => k == s,
            (PathElement::Index(i), PathSegment::Index(j)) => i == j,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
struct PathResolver {
    tag: String,
    path: Vec<PathElement>,
    kind: Option<NodeKind>,
}

/// Implicit and path resolvers for every supported YAML version.
#[derive(Debug, Clone)]
pub struct Resolver {
    tables: Vec<((u32, u32), ImplicitTable)>,
    path_resolvers: Vec<PathResolver>,
    default_version: (u32, u32),
}

static DEFAULT_RESOLVER: Lazy<Resolver> = Lazy::new(Resolver::build_default);

impl Default for Resolver {
    fn default() -> Self {
        DEFAULT_RESOLVER.clone()
    }
}

impl Resolver {
    /// A resolver with no implicit resolvers: every scalar is a string.
    pub fn empty() -> Self {
        Self {
            tables: vec![
                (VERSION_1_1, ImplicitTable::default()),
                (VERSION_1_2, ImplicitTable::default()),
            ],
            path_resolvers: Vec::new(),
            default_version: VERSION_1_2,
        }
    }

    fn build_default() -> Self {
        let mut resolver = Self::empty();
        let empty_too = |chars: &str| FirstChars::Set {
            chars: chars.to_string(),
            empty: true,
        };
        let shared: [(&str, &str, FirstChars); 5] = [
            (MERGE, MERGE_RE, FirstChars::chars("<")),
            (NULL, NULL_RE, empty_too("~nN")),
            (TIMESTAMP, TIMESTAMP_RE, FirstChars::chars("0123456789")),
            (VALUE, VALUE_RE, FirstChars::chars("=")),
            (YAML, YAML_RE, FirstChars::chars("!&*")),
        ];
        let v12 = [
            (BOOL, BOOL_1_2, FirstChars::chars("tTfF")),
            (FLOAT, FLOAT_1_2, FirstChars::chars("-+0123456789.")),
            (INT, INT_1_2, FirstChars::chars("-+0123456789")),
        ];
        let v11 = [
            (BOOL, BOOL_1_1, FirstChars::chars("yYnNtTfFoO")),
            (FLOAT, FLOAT_1_1, FirstChars::chars("-+0123456789.")),
            (INT, INT_1_1, FirstChars::chars("-+0123456789")),
        ];
        for (tag, pattern, first) in v12 {
            resolver.add_versioned_resolver(VERSION_1_2, tag, core_regex(pattern), first);
        }
        for (tag, pattern, first) in v11 {
            resolver.add_versioned_resolver(VERSION_1_1, tag, core_regex(pattern), first);
        }
        for (tag, pattern, first) in shared {
            resolver.add_implicit_resolver(tag, core_regex(pattern), first);
        }
        resolver
    }

    pub fn default_version(&self) -> (u32, u32) {
        self.default_version
    }

    pub fn set_default_version(&mut self, version: (u32, u32)) {
        self.default_version = version;
    }

    /// Register an implicit resolver for every YAML version.
    pub fn add_implicit_resolver(&mut self, tag: &str, regex: Regex, first: FirstChars) {
        tracing::debug!(tag, pattern = regex.as_str(), "adding implicit resolver");
        for (_, table) in &mut self.tables {
            table.add(tag, regex.clone(), &first);
        }
    }

    /// Register an implicit resolver for one YAML version.
    pub fn add_versioned_resolver(
        &mut self,
        version: (u32, u32),
        tag: &str,
        regex: Regex,
        first: FirstChars,
    ) {
        match self.tables.iter_mut().find(|(v, _)| *v == version) {
            Some((_, table)) => table.add(tag, regex, &first),
            None => {
                let mut table = ImplicitTable::default();
                table.add(tag, regex, &first);
                self.tables.push((version, table));
            }
        }
    }

    /// Force `tag` on nodes at `path` (optionally only of `kind`).
    pub fn add_path_resolver(&mut self, tag: &str, path: Vec<PathElement>, kind: Option<NodeKind>) {
        tracing::debug!(tag, ?path, "adding path resolver");
        self.path_resolvers.push(PathResolver {
            tag: tag.to_string(),
            path,
            kind,
        });
    }

    pub fn has_path_resolvers(&self) -> bool {
        !self.path_resolvers.is_empty()
    }

    fn table(&self, version: (u32, u32)) -> Option<&ImplicitTable> {
        self.tables
            .iter()
            .find(|(v, _)| *v == version)
            .or_else(|| self.tables.iter().find(|(v, _)| *v == self.default_version))
            .map(|(_, table)| table)
    }

    /// The tag a plain scalar with this text resolves to, if any implicit
    /// resolver matches.
    pub fn resolve_implicit(&self, value: &str, version: (u32, u32)) -> Option<&str> {
        self.table(version).and_then(|table| table.resolve(value))
    }

    /// Resolve the tag of an untagged node.
    ///
    /// `implicit` is `(plain, quoted)` as on scalar events: implicit
    /// resolvers only apply to plain scalars.
    pub fn resolve(
        &self,
        kind: NodeKind,
        value: Option<&str>,
        implicit: (bool, bool),
        version: (u32, u32),
        path: &[PathSegment],
    ) -> String {
        if let Some(tag) = self.resolve_path(kind, path) {
            return tag.to_string();
        }
        if kind == NodeKind::Scalar && implicit.0 {
            if let Some(tag) = value.and_then(|v| self.resolve_implicit(v, version)) {
                return tag.to_string();
            }
        }
        match kind {
            NodeKind::Scalar => STR,
            NodeKind::Sequence => SEQ,
            NodeKind::Mapping => MAP,
        }
        .to_string()
    }

    fn resolve_path(&self, kind: NodeKind, path: &[PathSegment]) -> Option<&str> {
        self.path_resolvers
            .iter()
            .find(|r| {
                r.kind.map_or(true, |k| k == kind)
                    && r.path.len() == path.len()
                    && r.path.iter().zip(path).all(|(e, s)| e.matches(s))
            })
            .map(|r| r.tag.as_str())
    }
}

/// Parse a `%YAML`-style version string such as `1.1`.
pub fn parse_version(text: &str) -> Option<(u32, u32)> {
    let (major, minor) = text.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn resolve(value: &str, version: (u32, u32)) -> String {
        Resolver::default().resolve(NodeKind::Scalar, Some(value), (true, false), version, &[])
    }

    #[rstest]
    #[case("", NULL)]
    #[case("~", NULL)]
    #[case("null", NULL)]
    #[case("true", BOOL)]
    #[case("False", BOOL)]
    #[case("yes", STR)]
    #[case("on", STR)]
    #[case("42", INT)]
    #[case("-0x1F", INT)]
    #[case("0o17", INT)]
    #[case("1_000", INT)]
    #[case("3.14", FLOAT)]
    #[case("1e3", FLOAT)]
    #[case(".inf", FLOAT)]
    #[case(".NaN", FLOAT)]
    #[case("2001-12-14", TIMESTAMP)]
    #[case("2001-12-14t21:59:43.10-05:00", TIMESTAMP)]
    #[case("<<", MERGE)]
    #[case("=", VALUE)]
    #[case("hello", STR)]
    #[case("1.2.3", STR)]
    #[case("applications/\\1/static/\\2", STR)]
    fn test_resolve_1_2(#[case] value: &str, #[case] tag: &str) {
        assert_eq!(resolve(value, VERSION_1_2), tag);
    }

    #[rstest]
    #[case("yes", BOOL)]
    #[case("Off", BOOL)]
    #[case("y", BOOL)]
    #[case("017", INT)]
    #[case("190:20:30", INT)]
    #[case("190:20:30.15", FLOAT)]
    #[case("0o17", STR)]
    fn test_resolve_1_1(#[case] value: &str, #[case] tag: &str) {
        assert_eq!(resolve(value, VERSION_1_1), tag);
    }

    #[test]
    fn test_quoted_scalars_are_strings() {
        let r = Resolver::default();
        assert_eq!(r.resolve(NodeKind::Scalar, Some("42"), (false, true), VERSION_1_2, &[]), STR);
        assert_eq!(r.resolve(NodeKind::Mapping, None, (false, false), VERSION_1_2, &[]), MAP);
    }

    #[test]
    fn test_path_resolver_overrides() {
        let mut r = Resolver::default();
        r.add_path_resolver(
            "!version",
            vec![PathElement::Key("meta".into()), PathElement::Any],
            Some(NodeKind::Scalar),
        );
        let path = [PathSegment::Key("meta".into()), PathSegment::Index(0)];
        assert_eq!(r.resolve(NodeKind::Scalar, Some("1.0"), (true, false), VERSION_1_2, &path), "!version");
        assert_eq!(r.resolve(NodeKind::Scalar, Some("1.0"), (true, false), VERSION_1_2, &path[..1]), FLOAT);
        assert_eq!(r.resolve(NodeKind::Mapping, None, (true, false), VERSION_1_2, &path), MAP);
    }

    #[test]
    fn test_extension_does_not_leak() {
        let mut extended = Resolver::default();
        extended.add_implicit_resolver("!semver", Regex::new(r"^\d+\.\d+\.\d+$").unwrap(), FirstChars::chars("0123456789"));
        assert_eq!(
            extended.resolve(NodeKind::Scalar, Some("1.2.3"), (true, false), VERSION_1_2, &[]),
            "!semver"
        );
        assert_eq!(resolve("1.2.3", VERSION_1_2), STR);
    }

    #[test]
    fn test_short_tag() {
        assert_eq!(short_tag(OMAP), "!!omap");
        assert_eq!(short_tag("!local"), "!local");
        assert_eq!(parse_version("1.1"), Some((1, 1)));
    }
}
