//! Phase 3, reversed: Serializer
//!
//! Walks a node tree and produces the event stream for it. Tags that the
//! resolver would assign anyway are marked implicit so the emitter can leave
//! them out. Node trivia travels on the events so the emitter can write the
//! comments back.

use std::sync::Arc;

use crate::composer::DocumentInfo;
use crate::error::{Result, YamlError};
use crate::events::{CollectionEvent, Event, EventKind, ScalarEvent, TagDirective};
use crate::nodes::{Node, NodeData, NodeKind};
use crate::reader::Encoding;
use crate::resolver::{PathSegment, Resolver};

/// Anything that accepts events: the emitter, or a plain vector.
pub trait EventSink {
    fn emit(&mut self, event: Event) -> Result<()>;
}

impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) -> Result<()> {
        self.push(event);
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: Event) -> Result<()> {
        (**self).emit(event)
    }
}

/// Document framing requested by the caller, applied on top of what the
/// document itself carries.
#[derive(Debug, Clone, Default)]
pub struct Framing {
    pub explicit_start: bool,
    pub explicit_end: bool,
    pub version: Option<(u32, u32)>,
    pub tags: Vec<TagDirective>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Open,
    Closed,
}

pub struct Serializer<S> {
    sink: S,
    resolver: Arc<Resolver>,
    framing: Framing,
    encoding: Option<Encoding>,
    state: State,
    version: (u32, u32),
    path: Vec<PathSegment>,
}

impl<S: EventSink> Serializer<S> {
    pub fn new(sink: S, resolver: Arc<Resolver>, framing: Framing) -> Self {
        let version = framing.version.unwrap_or_else(|| resolver.default_version());
        Self {
            sink,
            resolver,
            framing,
            encoding: None,
            state: State::Fresh,
            version,
            path: Vec::new(),
        }
    }

    pub fn with_encoding(mut self, encoding: Option<Encoding>) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn sink(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// Emit the stream start.
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            State::Fresh => {
                self.sink.emit(Event::synthetic(EventKind::StreamStart {
                    encoding: self.encoding,
                }))?;
                self.state = State::Open;
                Ok(())
            }
            State::Open => Err(YamlError::emitter("serializer is already opened")),
            State::Closed => Err(YamlError::emitter("serializer is closed")),
        }
    }

    /// Emit the stream end. Closing twice is harmless.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            State::Fresh => Err(YamlError::emitter("serializer is not opened")),
            State::Open => {
                self.sink.emit(Event::synthetic(EventKind::StreamEnd))?;
                self.state = State::Closed;
                Ok(())
            }
            State::Closed => Ok(()),
        }
    }

    /// Serialize one document.
    pub fn serialize(&mut self, root: &Node, info: &DocumentInfo) -> Result<()> {
        match self.state {
            State::Fresh => return Err(YamlError::emitter("serializer is not opened")),
            State::Closed => return Err(YamlError::emitter("serializer is closed")),
            State::Open => {}
        }
        let version = self.framing.version.or(info.version);
        self.version = version.unwrap_or_else(|| self.resolver.default_version());
        let tags = if self.framing.tags.is_empty() {
            info.tags.clone()
        } else {
            self.framing.tags.clone()
        };
        let start = EventKind::DocumentStart {
            explicit: self.framing.explicit_start || info.explicit_start,
            version,
            tags,
        };
        self.sink.emit(Event::synthetic(start).with_trivia(info.before.clone()))?;
        self.path.clear();
        self.serialize_node(root)?;
        let end = EventKind::DocumentEnd {
            explicit: self.framing.explicit_end || info.explicit_end,
        };
        self.sink.emit(Event::synthetic(end).with_trivia(info.end.clone()))
    }

    fn serialize_node(&mut self, node: &Node) -> Result<()> {
        let trivia = node.comments.before.clone();
        let kind = match &node.data {
            NodeData::Alias { name, .. } => EventKind::Alias { anchor: name.clone() },
            NodeData::Scalar(scalar) => {
                let implicit = if node.explicit_tag {
                    (false, false)
                } else {
                    let value = Some(scalar.value.as_str());
                    let plain = self.resolver.resolve(NodeKind::Scalar, value, (true, false), self.version, &self.path);
                    let quoted = self.resolver.resolve(NodeKind::Scalar, value, (false, true), self.version, &self.path);
                    (node.tag == plain, node.tag == quoted)
                };
                EventKind::Scalar(ScalarEvent {
                    anchor: node.anchor.clone(),
                    tag: Some(node.tag.clone()),
                    implicit,
                    value: scalar.value.clone(),
                    style: scalar.style,
                    chomping: scalar.chomping,
                    indent_indicator: scalar.indent_indicator,
                    source: scalar.source.clone(),
                    header_comment: scalar.header_comment.clone(),
                })
            }
            NodeData::Sequence { items, flow } => {
                let start = self.collection_event(node, NodeKind::Sequence, *flow);
                self.sink.emit(Event::synthetic(EventKind::SequenceStart(start)).with_trivia(trivia))?;
                for (index, item) in items.iter().enumerate() {
                    self.path.push(PathSegment::Index(index));
                    let result = self.serialize_node(item);
                    self.path.pop();
                    result?;
                }
                let end = Event::synthetic(EventKind::SequenceEnd).with_trivia(node.comments.end.clone());
                return self.sink.emit(end);
            }
            NodeData::Mapping { pairs, flow } => {
                let start = self.collection_event(node, NodeKind::Mapping, *flow);
                self.sink.emit(Event::synthetic(EventKind::MappingStart(start)).with_trivia(trivia))?;
                for (key, value) in pairs {
                    self.path.push(PathSegment::Other);
                    let result = self.serialize_node(key);
                    self.path.pop();
                    result?;
                    let segment = match &key.data {
                        NodeData::Scalar(s) => PathSegment::Key(s.value.clone()),
                        _ => PathSegment::Other,
                    };
                    self.path.push(segment);
                    let result = self.serialize_node(value);
                    self.path.pop();
                    result?;
                }
                let end = Event::synthetic(EventKind::MappingEnd).with_trivia(node.comments.end.clone());
                return self.sink.emit(end);
            }
        };
        self.sink.emit(Event::synthetic(kind).with_trivia(trivia))
    }

    fn collection_event(&self, node: &Node, kind: NodeKind, flow: bool) -> CollectionEvent {
        let implicit =
            !node.explicit_tag && node.tag == self.resolver.resolve(kind, None, (true, true), self.version, &self.path);
        CollectionEvent {
            anchor: node.anchor.clone(),
            tag: Some(node.tag.clone()),
            implicit,
            flow,
            indent: node.indent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::ScalarNode;
    use crate::resolver::{INT, MAP, STR};
    use std::rc::Rc;

    fn events(root: &Node, framing: Framing) -> Vec<String> {
        let mut serializer = Serializer::new(Vec::new(), Arc::new(Resolver::default()), framing);
        serializer.open().unwrap();
        serializer.serialize(root, &DocumentInfo::default()).unwrap();
        serializer.close().unwrap();
        serializer.into_sink().iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_implicit_tags() {
        let root = Node::mapping(
            MAP,
            vec![
                (Rc::new(Node::scalar(STR, ScalarNode::new("a"))), Rc::new(Node::scalar(INT, ScalarNode::new("1")))),
                (Rc::new(Node::scalar(STR, ScalarNode::new("b"))), Rc::new(Node::scalar(STR, ScalarNode::new("2")))),
            ],
            false,
        );
        let mut serializer = Serializer::new(Vec::new(), Arc::new(Resolver::default()), Framing::default());
        serializer.open().unwrap();
        serializer.serialize(&root, &DocumentInfo::default()).unwrap();
        let sink = serializer.into_sink();
        let implicit: Vec<(bool, bool)> = sink
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Scalar(s) => Some(s.implicit),
                _ => None,
            })
            .collect();
        assert_eq!(implicit, vec![(true, true), (true, false), (true, true), (false, true)]);
    }

    #[test]
    fn test_explicit_start_framing() {
        let root = Node::scalar(STR, ScalarNode::new("x"));
        let framing = Framing {
            explicit_start: true,
            ..Framing::default()
        };
        let events = events(&root, framing);
        assert_eq!(events[1], "+DOC ---");
    }

    #[test]
    fn test_state_errors() {
        let mut serializer = Serializer::new(Vec::new(), Arc::new(Resolver::default()), Framing::default());
        let root = Node::scalar(STR, ScalarNode::new("x"));
        assert!(serializer.serialize(&root, &DocumentInfo::default()).is_err());
        assert!(serializer.close().is_err());
        serializer.open().unwrap();
        assert!(serializer.open().is_err());
        serializer.close().unwrap();
        serializer.close().unwrap();
        assert!(serializer.serialize(&root, &DocumentInfo::default()).is_err());
    }
}
