//! Phase 3: Composer
//!
//! Builds one node tree per document from the event stream. Anchors are
//! registered when their node starts and resolved by aliases once the node
//! is complete; the table is cleared at every document boundary. Untagged
//! nodes get their tag from the resolver, which sees the path from the root
//! so that path resolvers can override the implicit table.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{Mark, Result, YamlError};
use crate::events::{CollectionEvent, Event, EventKind, ScalarEvent, TagDirective};
use crate::nodes::{Node, NodeData, NodeKind, ScalarNode};
use crate::parser::Parser;
use crate::resolver::{PathSegment, Resolver};
use crate::tokens::Trivia;

/// Document-level information that is not part of the node tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentInfo {
    pub explicit_start: bool,
    pub explicit_end: bool,
    /// `%YAML` directive, if present.
    pub version: Option<(u32, u32)>,
    pub tags: Vec<TagDirective>,
    /// Trivia read before `---` (or before the root of a bare document).
    pub before: Vec<Trivia>,
    /// Trivia read after the root node.
    pub end: Vec<Trivia>,
}

/// A composed document.
#[derive(Debug, Clone)]
pub struct NodeDocument {
    pub root: Rc<Node>,
    pub info: DocumentInfo,
    /// YAML version the document was resolved with.
    pub resolved_version: (u32, u32),
}

enum Anchored {
    InProgress,
    Complete(Rc<Node>),
}

pub struct Composer<'a> {
    parser: Parser<'a>,
    resolver: Arc<Resolver>,
    forced_version: Option<(u32, u32)>,
    version: (u32, u32),
    anchors: HashMap<String, Anchored>,
    path: Vec<PathSegment>,
}

impl<'a> Composer<'a> {
    pub fn new(parser: Parser<'a>, resolver: Arc<Resolver>, forced_version: Option<(u32, u32)>) -> Self {
        let version = forced_version.unwrap_or_else(|| resolver.default_version());
        Self {
            parser,
            resolver,
            forced_version,
            version,
            anchors: HashMap::new(),
            path: Vec::new(),
        }
    }

    pub fn parser(&mut self) -> &mut Parser<'a> {
        &mut self.parser
    }

    /// Whether another document is available.
    pub fn has_next_node(&mut self) -> Result<bool> {
        self.skip_stream_start()?;
        Ok(!matches!(
            self.parser.peek_event()?.map(|e| &e.kind),
            None | Some(EventKind::StreamEnd)
        ))
    }

    /// Compose the next document's root node.
    pub fn next_node(&mut self) -> Result<Option<Rc<Node>>> {
        Ok(self.next_document()?.map(|doc| doc.root))
    }

    /// Compose the next document.
    pub fn next_document(&mut self) -> Result<Option<NodeDocument>> {
        if !self.has_next_node()? {
            // Drain the stream end so the parser reaches its final state.
            self.parser.next_event()?;
            return Ok(None);
        }
        self.compose_document().map(Some)
    }

    /// Compose the only document of the stream; `None` for an empty stream.
    pub fn single_document(&mut self) -> Result<Option<NodeDocument>> {
        let document = self.next_document()?;
        if let Some(event) = self.parser.next_event()? {
            if !matches!(event.kind, EventKind::StreamEnd) {
                let start = document.as_ref().map(|d| d.root.start_mark.clone());
                return Err(YamlError::composer(
                    "expected a single document in the stream",
                    start,
                    "but found another document",
                    event.start_mark,
                ));
            }
        }
        Ok(document)
    }

    fn skip_stream_start(&mut self) -> Result<()> {
        if let Some(EventKind::StreamStart { .. }) = self.parser.peek_event()?.map(|e| &e.kind) {
            self.parser.next_event()?;
        }
        Ok(())
    }

    fn take_event(&mut self) -> Result<Event> {
        match self.parser.next_event()? {
            Some(event) => Ok(event),
            None => Err(YamlError::composer(
                "",
                None,
                "unexpected end of the event stream",
                Mark::synthetic(),
            )),
        }
    }

    fn compose_document(&mut self) -> Result<NodeDocument> {
        let start = self.take_event()?;
        let mut info = DocumentInfo {
            before: start.trivia,
            ..DocumentInfo::default()
        };
        match start.kind {
            EventKind::DocumentStart {
                explicit,
                version,
                tags,
            } => {
                info.explicit_start = explicit;
                info.version = version;
                info.tags = tags;
            }
            other => {
                return Err(YamlError::composer(
                    "",
                    None,
                    &format!("expected a document start, but found {:?}", other),
                    start.start_mark,
                ))
            }
        }
        self.version = self
            .forced_version
            .or(info.version)
            .unwrap_or_else(|| self.resolver.default_version());
        tracing::debug!(line = start.start_mark.line, version = ?self.version, "composing document");

        self.path.clear();
        let root = self.compose_node(0)?;

        let end = self.take_event()?;
        if let EventKind::DocumentEnd { explicit } = end.kind {
            info.explicit_end = explicit;
        }
        info.end = end.trivia;
        self.anchors.clear();
        Ok(NodeDocument {
            root,
            info,
            resolved_version: self.version,
        })
    }

    /// Compose the node whose first event is next; `parent_column` is the
    /// indentation of the enclosing block collection.
    fn compose_node(&mut self, parent_column: usize) -> Result<Rc<Node>> {
        let event = self.take_event()?;
        let start_mark = event.start_mark.clone();
        match event.kind {
            EventKind::Alias { anchor } => self.compose_alias(anchor, event.start_mark, event.end_mark, event.trivia),
            EventKind::Scalar(scalar) => {
                Ok(self.compose_scalar(scalar, event.start_mark, event.end_mark, event.trivia))
            }
            EventKind::SequenceStart(collection) => {
                let column = (!collection.flow).then_some(event.end_mark.column);
                let anchor = self.begin_anchor(&collection);
                let mut node = self.compose_sequence(&collection, column.unwrap_or(parent_column))?;
                self.finish_collection(&mut node, collection, column, parent_column, start_mark, event.trivia)?;
                Ok(self.end_anchor(anchor, node))
            }
            EventKind::MappingStart(collection) => {
                let column = (!collection.flow).then_some(event.end_mark.column);
                let anchor = self.begin_anchor(&collection);
                let mut node = self.compose_mapping(&collection, column.unwrap_or(parent_column))?;
                self.finish_collection(&mut node, collection, column, parent_column, start_mark, event.trivia)?;
                Ok(self.end_anchor(anchor, node))
            }
            other => Err(YamlError::composer(
                "",
                None,
                &format!("expected a node, but found {:?}", other),
                start_mark,
            )),
        }
    }

    fn compose_alias(&mut self, name: String, start: Mark, end: Mark, trivia: Vec<Trivia>) -> Result<Rc<Node>> {
        match self.anchors.get(&name) {
            Some(Anchored::Complete(target)) => {
                let mut node = Node::alias(name, Rc::clone(target)).with_marks(start, end);
                node.comments.before = trivia;
                Ok(Rc::new(node))
            }
            Some(Anchored::InProgress) => Err(YamlError::composer(
                "",
                None,
                &format!("found recursive alias {:?}", name),
                start,
            )),
            None => Err(YamlError::composer(
                "",
                None,
                &format!("found undefined alias {:?}", name),
                start,
            )),
        }
    }

    fn resolve(&self, kind: NodeKind, tag: Option<String>, value: Option<&str>, implicit: (bool, bool)) -> (String, bool) {
        match tag {
            Some(tag) if tag != "!" => (tag, true),
            Some(_) => (
                self.resolver.resolve(kind, None, (false, false), self.version, &self.path),
                false,
            ),
            None => (
                self.resolver.resolve(kind, value, implicit, self.version, &self.path),
                false,
            ),
        }
    }

    fn compose_scalar(&mut self, event: ScalarEvent, start: Mark, end: Mark, trivia: Vec<Trivia>) -> Rc<Node> {
        let (tag, explicit_tag) = self.resolve(NodeKind::Scalar, event.tag, Some(&event.value), event.implicit);
        let scalar = ScalarNode {
            value: event.value,
            style: event.style,
            chomping: event.chomping,
            indent_indicator: event.indent_indicator,
            source: event.source,
            header_comment: event.header_comment,
        };
        let mut node = Node::scalar(tag, scalar)
            .with_marks(start, end)
            .with_anchor(event.anchor.clone());
        node.explicit_tag = explicit_tag;
        node.comments.before = trivia;
        let node = Rc::new(node);
        if let Some(anchor) = event.anchor {
            self.register_anchor(anchor, Rc::clone(&node));
        }
        node
    }

    fn compose_sequence(&mut self, collection: &CollectionEvent, column: usize) -> Result<Node> {
        let mut items = Vec::new();
        loop {
            if self.check_collection_end()? {
                break;
            }
            self.path.push(PathSegment::Index(items.len()));
            let item = self.compose_node(column);
            self.path.pop();
            items.push(item?);
        }
        Ok(Node::sequence(String::new(), items, collection.flow))
    }

    fn compose_mapping(&mut self, collection: &CollectionEvent, column: usize) -> Result<Node> {
        let mut pairs = Vec::new();
        loop {
            if self.check_collection_end()? {
                break;
            }
            self.path.push(PathSegment::Other);
            let key = self.compose_node(column);
            self.path.pop();
            let key = key?;
            let segment = match &key.data {
                NodeData::Scalar(s) => PathSegment::Key(s.value.clone()),
                _ => PathSegment::Other,
            };
            self.path.push(segment);
            let value = self.compose_node(column);
            self.path.pop();
            pairs.push((key, value?));
        }
        Ok(Node::mapping(String::new(), pairs, collection.flow))
    }

    fn check_collection_end(&mut self) -> Result<bool> {
        Ok(self.parser.peek_event()?.is_some_and(Event::is_collection_end))
    }

    /// Consume the collection end event and fill in tag, layout and trivia.
    fn finish_collection(
        &mut self,
        node: &mut Node,
        collection: CollectionEvent,
        column: Option<usize>,
        parent_column: usize,
        start_mark: Mark,
        trivia: Vec<Trivia>,
    ) -> Result<()> {
        let kind = node.kind();
        let (tag, explicit_tag) = self.resolve(kind, collection.tag, None, (collection.implicit, false));
        node.tag = tag;
        node.explicit_tag = explicit_tag;
        node.anchor = collection.anchor;
        node.indent = column.and_then(|c| c.checked_sub(parent_column));
        node.comments.before = trivia;
        let end = self.take_event()?;
        node.comments.end = end.trivia;
        node.start_mark = start_mark;
        node.end_mark = end.end_mark;
        Ok(())
    }

    fn begin_anchor(&mut self, collection: &CollectionEvent) -> Option<String> {
        let anchor = collection.anchor.clone()?;
        if self.anchors.insert(anchor.clone(), Anchored::InProgress).is_some() {
            tracing::debug!(anchor = %anchor, "anchor redefined");
        }
        Some(anchor)
    }

    fn end_anchor(&mut self, anchor: Option<String>, node: Node) -> Rc<Node> {
        let node = Rc::new(node);
        if let Some(anchor) = anchor {
            self.register_anchor(anchor, Rc::clone(&node));
        }
        node
    }

    fn register_anchor(&mut self, anchor: String, node: Rc<Node>) {
        tracing::debug!(anchor = %anchor, line = node.start_mark.line, "registered anchor");
        self.anchors.insert(anchor, Anchored::Complete(node));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;
    use crate::resolver::{PathElement, BOOL, INT, MAP, NULL, SEQ, STR};

    fn compose_with(input: &str, resolver: Resolver) -> Result<Vec<NodeDocument>> {
        let parser = Parser::new(Reader::from_str(input, "<test>")?);
        let mut composer = Composer::new(parser, Arc::new(resolver), None);
        let mut documents = Vec::new();
        while let Some(document) = composer.next_document()? {
            documents.push(document);
        }
        Ok(documents)
    }

    fn compose(input: &str) -> Rc<Node> {
        compose_with(input, Resolver::default()).unwrap().remove(0).root
    }

    fn pairs(node: &Node) -> &[(Rc<Node>, Rc<Node>)] {
        match &node.data {
            NodeData::Mapping { pairs, .. } => pairs,
            other => panic!("not a mapping: {:?}", other),
        }
    }

    #[test]
    fn test_implicit_tags() {
        let root = compose("a: 1\nb: true\nc: ~\nd: '1'\ne: [x]\n");
        assert_eq!(root.tag, MAP);
        let tags: Vec<&str> = pairs(&root).iter().map(|(_, v)| v.tag.as_str()).collect();
        assert_eq!(tags, vec![INT, BOOL, NULL, STR, SEQ]);
    }

    #[test]
    fn test_explicit_tag_kept() {
        let root = compose("a: !!str 1\nb: ! 2\n");
        let (_, a) = &pairs(&root)[0];
        assert_eq!(a.tag, STR);
        assert!(a.explicit_tag);
        let (_, b) = &pairs(&root)[1];
        assert_eq!(b.tag, STR);
        assert!(!b.explicit_tag);
    }

    #[test]
    fn test_alias_resolves_to_anchored_node() {
        let root = compose("a: &x [1, 2]\nb: *x\n");
        let (_, b) = &pairs(&root)[1];
        match &b.data {
            NodeData::Alias { name, target } => {
                assert_eq!(name, "x");
                assert_eq!(target.kind(), NodeKind::Sequence);
            }
            other => panic!("not an alias: {:?}", other),
        }
    }

    #[test]
    fn test_anchor_redefinition_supersedes() {
        let root = compose("- &a 1\n- *a\n- &a 2\n- *a\n");
        let NodeData::Sequence { items, .. } = &root.data else {
            panic!("not a sequence");
        };
        assert_eq!(items[1].scalar_value(), Some("1"));
        assert_eq!(items[3].scalar_value(), Some("2"));
    }

    #[test]
    fn test_undefined_alias() {
        let err = compose_with("a: *nope\n", Resolver::default()).unwrap_err();
        assert!(matches!(err, YamlError::Composer(_)));
        assert!(err.to_string().contains("found undefined alias \"nope\""));
    }

    #[test]
    fn test_recursive_alias() {
        let err = compose_with("&a [*a]\n", Resolver::default()).unwrap_err();
        assert!(err.to_string().contains("found recursive alias"));
    }

    #[test]
    fn test_anchors_cleared_between_documents() {
        let err = compose_with("--- &a 1\n--- *a\n", Resolver::default()).unwrap_err();
        assert!(err.to_string().contains("undefined alias"));
    }

    #[test]
    fn test_version_directive_selects_table() {
        let docs = compose_with("%YAML 1.1\n---\nyes\n---\nyes\n", Resolver::default()).unwrap();
        assert_eq!(docs[0].root.tag, BOOL);
        assert_eq!(docs[0].resolved_version, (1, 1));
        assert_eq!(docs[1].root.tag, STR);
    }

    #[test]
    fn test_path_resolver() {
        let mut resolver = Resolver::default();
        resolver.add_path_resolver("!port", vec![PathElement::Key("server".into()), PathElement::Key("port".into())], None);
        let docs = compose_with("server:\n  port: 80\nport: 81\n", resolver).unwrap();
        let root = &docs[0].root;
        let (_, server) = &pairs(root)[0];
        assert_eq!(pairs(server)[0].1.tag, "!port");
        assert_eq!(pairs(root)[1].1.tag, INT);
    }

    #[test]
    fn test_layout_offsets() {
        let root = compose("a:\n- x\nb:\n    - y\nc:\n   d: 1\n");
        let offsets: Vec<Option<usize>> = pairs(&root).iter().map(|(_, v)| v.indent).collect();
        assert_eq!(offsets, vec![Some(0), Some(4), Some(3)]);
        assert_eq!(root.indent, Some(0));
    }

    #[test]
    fn test_comments_on_nodes() {
        let docs = compose_with("# head\na: 1  # one\nb: 2\n# tail\n", Resolver::default()).unwrap();
        let root = &docs[0].root;
        assert_eq!(root.comments.before.len(), 1);
        let (b, _) = &pairs(root)[1];
        assert!(b.comments.before[0].is_eol());
        assert_eq!(root.comments.end.len(), 1);
    }

    #[test]
    fn test_single_document() {
        let parser = Parser::new(Reader::from_str("a\n--- b\n", "<test>").unwrap());
        let mut composer = Composer::new(parser, Arc::new(Resolver::default()), None);
        let err = composer.single_document().unwrap_err();
        assert!(err.to_string().contains("expected a single document"));
    }

    #[test]
    fn test_empty_stream() {
        assert!(compose_with("# only a comment\n", Resolver::default()).unwrap().is_empty());
    }
}
