//! The decoded document tree.
//!
//! This is the decoder's output and the transform's input. It is still "YAML
//! shaped": keys may be any node, aliases are references into the anchor table
//! and tags are retained so the transform can apply them.
//!
//! Scalar text and collection children are reference counted. Cloning a node
//! is shallow, so recording nested anchors never copies a subtree.

use std::collections::HashMap;
use std::rc::Rc;

use crate::location::Location;

/// Parser-assigned anchor identifier, unique within one document.
pub type AnchorId = usize;

#[derive(Clone, Debug, PartialEq)]
pub struct Scalar {
    pub value: Rc<str>,
    /// Plain (unquoted, non-block) scalars are subject to type resolution.
    pub plain: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Scalar(Scalar),
    Sequence(Rc<[Node]>),
    /// Ordered key/value pairs, duplicates included.
    Mapping(Rc<[(Node, Node)]>),
    Alias(AnchorId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Anchor defined on this node, if any.
    pub anchor: Option<AnchorId>,
    /// Tag as rendered by the parser, if any.
    pub tag: Option<String>,
    pub location: Location,
}

impl Node {
    pub(crate) fn null(location: Location) -> Self {
        Node {
            kind: NodeKind::Scalar(Scalar {
                value: Rc::from(""),
                plain: true,
            }),
            anchor: None,
            tag: None,
            location,
        }
    }

    /// Short human name of the node kind for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Scalar(_) => "scalar",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Mapping(_) => "mapping",
            NodeKind::Alias(_) => "alias",
        }
    }

    /// Number of nodes in this subtree, not following aliases.
    pub fn count_nodes(&self) -> usize {
        match &self.kind {
            NodeKind::Scalar(_) | NodeKind::Alias(_) => 1,
            NodeKind::Sequence(items) => 1 + items.iter().map(Node::count_nodes).sum::<usize>(),
            NodeKind::Mapping(entries) => {
                1 + entries
                    .iter()
                    .map(|(k, v)| k.count_nodes() + v.count_nodes())
                    .sum::<usize>()
            }
        }
    }
}

/// One decoded YAML document.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub root: Node,
    /// Every anchored node of the document, keyed by anchor id. Recorded once
    /// the node is complete, so a node's own aliases to itself stay unresolved
    /// references. Entries share their children with the tree under `root`.
    pub anchors: HashMap<AnchorId, Node>,
}

impl Document {
    pub fn anchor(&self, id: AnchorId) -> Option<&Node> {
        self.anchors.get(&id)
    }
}
