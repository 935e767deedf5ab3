//! Representation graph: tagged scalar, sequence and mapping nodes.

use std::rc::Rc;

use crate::error::Mark;
use crate::tokens::{Chomping, Comment, ScalarStyle, Trivia};

/// The three node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Scalar,
    Sequence,
    Mapping,
}

/// Text and presentation of a scalar node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScalarNode {
    pub value: String,
    /// `None` lets the emitter choose.
    pub style: Option<ScalarStyle>,
    pub chomping: Option<Chomping>,
    pub indent_indicator: Option<usize>,
    pub source: Option<String>,
    pub header_comment: Option<Comment>,
}

impl ScalarNode {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: Option<ScalarStyle>) -> Self {
        self.style = style;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Scalar(ScalarNode),
    Sequence {
        items: Vec<Rc<Node>>,
        flow: bool,
    },
    Mapping {
        pairs: Vec<(Rc<Node>, Rc<Node>)>,
        flow: bool,
    },
    /// A reference to a node anchored earlier in the same document.
    Alias {
        name: String,
        target: Rc<Node>,
    },
}

/// Trivia attached to a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeComments {
    /// Read before the node started.
    pub before: Vec<Trivia>,
    /// Read before a collection ended (after its last entry).
    pub end: Vec<Trivia>,
}

impl NodeComments {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.end.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Fully resolved tag, e.g. `tag:yaml.org,2002:int`.
    pub tag: String,
    /// Whether the tag must be written out even when it would resolve.
    pub explicit_tag: bool,
    pub data: NodeData,
    pub anchor: Option<String>,
    /// Column offset of a block collection from its parent's indentation,
    /// as read or as requested for output.
    pub indent: Option<usize>,
    pub start_mark: Mark,
    pub end_mark: Mark,
    pub comments: NodeComments,
}

impl Node {
    pub fn new(tag: impl Into<String>, data: NodeData) -> Self {
        Self {
            tag: tag.into(),
            explicit_tag: false,
            data,
            anchor: None,
            indent: None,
            start_mark: Mark::synthetic(),
            end_mark: Mark::synthetic(),
            comments: NodeComments::default(),
        }
    }

    pub fn scalar(tag: impl Into<String>, scalar: ScalarNode) -> Self {
        Self::new(tag, NodeData::Scalar(scalar))
    }

    pub fn sequence(tag: impl Into<String>, items: Vec<Rc<Node>>, flow: bool) -> Self {
        Self::new(tag, NodeData::Sequence { items, flow })
    }

    pub fn mapping(tag: impl Into<String>, pairs: Vec<(Rc<Node>, Rc<Node>)>, flow: bool) -> Self {
        Self::new(tag, NodeData::Mapping { pairs, flow })
    }

    pub fn alias(name: impl Into<String>, target: Rc<Node>) -> Self {
        let tag = target.tag.clone();
        Self::new(tag, NodeData::Alias {
            name: name.into(),
            target,
        })
    }

    /// Kind of the node, looking through aliases.
    pub fn kind(&self) -> NodeKind {
        match &self.data {
            NodeData::Scalar(_) => NodeKind::Scalar,
            NodeData::Sequence { .. } => NodeKind::Sequence,
            NodeData::Mapping { .. } => NodeKind::Mapping,
            NodeData::Alias { target, .. } => target.kind(),
        }
    }

    /// The node an alias refers to, or the node itself.
    pub fn resolved(&self) -> &Node {
        match &self.data {
            NodeData::Alias { target, .. } => target.resolved(),
            _ => self,
        }
    }

    pub fn scalar_value(&self) -> Option<&str> {
        match &self.resolved().data {
            NodeData::Scalar(s) => Some(&s.value),
            _ => None,
        }
    }

    pub fn is_flow(&self) -> bool {
        matches!(
            self.resolved().data,
            NodeData::Sequence { flow: true, .. } | NodeData::Mapping { flow: true, .. }
        )
    }

    pub fn with_marks(mut self, start_mark: Mark, end_mark: Mark) -> Self {
        self.start_mark = start_mark;
        self.end_mark = end_mark;
        self
    }

    pub fn with_anchor(mut self, anchor: Option<String>) -> Self {
        self.anchor = anchor;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_looks_through() {
        let target = Rc::new(Node::scalar("tag:yaml.org,2002:str", ScalarNode::new("x")));
        let alias = Node::alias("a", target);
        assert_eq!(alias.kind(), NodeKind::Scalar);
        assert_eq!(alias.scalar_value(), Some("x"));
        assert_eq!(alias.tag, "tag:yaml.org,2002:str");
    }

    #[test]
    fn test_flow_flag() {
        let seq = Node::sequence("tag:yaml.org,2002:seq", Vec::new(), true);
        assert!(seq.is_flow());
        assert_eq!(seq.kind(), NodeKind::Sequence);
    }
}
