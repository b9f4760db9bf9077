//! YAML text to [`Document`].
//!
//! The decoder pulls events from `saphyr_parser::Parser`, meters them against the
//! [`Budget`](crate::Budget) and assembles the raw tree with an explicit stack, so
//! deep nesting never recurses here. Aliases stay references; the transform
//! expands them.

use std::collections::HashMap;
use std::rc::Rc;

use saphyr_parser::{Event, Parser, ScalarStyle, StrInput};

use crate::budget::{BudgetBreach, BudgetEnforcer, BudgetReport};
use crate::error::{Error, budget_error};
use crate::location::{Location, location_from_span};
use crate::options::{BudgetReportCallback, DocumentPolicy, Options};
use crate::tree::{AnchorId, Document, Node, NodeKind, Scalar};

const MERGE_KEY: &str = "<<";

/// Children of an open collection. Mappings hold the key until its value arrives.
enum Children {
    Sequence(Vec<Node>),
    Mapping {
        entries: Vec<(Node, Node)>,
        pending_key: Option<Node>,
    },
}

/// An open sequence or mapping.
struct Frame {
    anchor: Option<AnchorId>,
    tag: Option<String>,
    location: Location,
    children: Children,
}

impl Frame {
    /// The completed node. Children move into shared storage, so later clones
    /// of the node (anchor table entries) are shallow.
    fn close(self) -> Node {
        let kind = match self.children {
            Children::Sequence(items) => NodeKind::Sequence(Rc::from(items)),
            Children::Mapping { entries, .. } => NodeKind::Mapping(Rc::from(entries)),
        };
        Node {
            kind,
            anchor: self.anchor,
            tag: self.tag,
            location: self.location,
        }
    }
}

struct Decoder<'a> {
    parser: Parser<'a, StrInput<'a>>,
    budget: Option<BudgetEnforcer>,
    budget_sink: Option<BudgetReportCallback>,
    stack: Vec<Frame>,
    anchors: HashMap<AnchorId, Node>,
    last_location: Location,
}

/// Decode the first document of `input`.
///
/// Empty input, or a document without content, yields a null root.
pub fn decode(input: &str, options: &Options) -> Result<Document, Error> {
    let mut decoder = Decoder {
        parser: Parser::new_from_str(input),
        budget: options.budget.clone().map(BudgetEnforcer::new),
        budget_sink: options.budget_report.clone(),
        stack: Vec::new(),
        anchors: HashMap::new(),
        last_location: Location::UNKNOWN,
    };
    let root = decoder.run(options.documents)?;
    decoder.finish()?;

    tracing::debug!(
        nodes = root.count_nodes(),
        anchors = decoder.anchors.len(),
        "decoded YAML document"
    );
    Ok(Document {
        root,
        anchors: decoder.anchors,
    })
}

impl Decoder<'_> {
    fn run(&mut self, policy: DocumentPolicy) -> Result<Node, Error> {
        let mut root = None;
        let mut seen_document = false;

        while let Some(item) = self.parser.next() {
            let (event, span) = item.map_err(Error::from_scan_error)?;
            let location = location_from_span(&span);
            self.observe(&event, location)?;

            match event {
                Event::StreamEnd => break,
                Event::DocumentStart(_) => {
                    if seen_document {
                        match policy {
                            DocumentPolicy::Single => {
                                return Err(Error::MultipleDocuments { location });
                            }
                            DocumentPolicy::FirstOnly => {
                                tracing::warn!(
                                    line = location.line(),
                                    "ignoring YAML documents after the first"
                                );
                                break;
                            }
                        }
                    }
                    seen_document = true;
                }
                Event::Scalar(value, style, anchor_id, tag) => {
                    let plain = style == ScalarStyle::Plain;
                    if plain && tag.is_none() && value == MERGE_KEY && self.in_key_position() {
                        self.observe_merge_key(location)?;
                    }
                    let node = Node {
                        kind: NodeKind::Scalar(Scalar {
                            value: Rc::from(value.as_ref()),
                            plain,
                        }),
                        anchor: anchor(anchor_id),
                        tag: tag.map(|t| t.to_string()),
                        location,
                    };
                    if let Some(done) = self.attach(node) {
                        root = Some(done);
                    }
                }
                Event::SequenceStart(anchor_id, tag) => {
                    self.open(Children::Sequence(Vec::new()), anchor_id, tag, location);
                }
                Event::MappingStart(anchor_id, tag) => {
                    let children = Children::Mapping {
                        entries: Vec::new(),
                        pending_key: None,
                    };
                    self.open(children, anchor_id, tag, location);
                }
                Event::SequenceEnd | Event::MappingEnd => {
                    let frame = self
                        .stack
                        .pop()
                        .ok_or_else(|| budget_error(BudgetBreach::Unbalanced, location))?;
                    if let Some(done) = self.attach(frame.close()) {
                        root = Some(done);
                    }
                }
                Event::Alias(id) => {
                    if !self.anchors.contains_key(&id) && !self.is_open(id) {
                        return Err(Error::UnknownAnchor { id, location });
                    }
                    let node = Node {
                        kind: NodeKind::Alias(id),
                        anchor: None,
                        tag: None,
                        location,
                    };
                    if let Some(done) = self.attach(node) {
                        root = Some(done);
                    }
                }
                _ => {}
            }
            self.last_location = location;
        }

        Ok(root.unwrap_or_else(|| Node::null(self.last_location)))
    }

    fn open<T: ToString>(
        &mut self,
        children: Children,
        anchor_id: usize,
        tag: Option<T>,
        location: Location,
    ) {
        self.stack.push(Frame {
            anchor: anchor(anchor_id),
            tag: tag.map(|t| t.to_string()),
            location,
            children,
        });
    }

    /// Hand a completed node to its parent. Returns the node if it is the root.
    fn attach(&mut self, node: Node) -> Option<Node> {
        if let Some(id) = node.anchor {
            self.anchors.insert(id, node.clone());
        }
        let Some(parent) = self.stack.last_mut() else {
            return Some(node);
        };
        match &mut parent.children {
            Children::Sequence(items) => items.push(node),
            Children::Mapping {
                entries,
                pending_key,
            } => match pending_key.take() {
                Some(key) => entries.push((key, node)),
                None => *pending_key = Some(node),
            },
        }
        None
    }

    fn in_key_position(&self) -> bool {
        self.stack.last().is_some_and(|frame| {
            matches!(
                frame.children,
                Children::Mapping {
                    pending_key: None,
                    ..
                }
            )
        })
    }

    /// An anchor whose node is still being built; aliases to it are cycles.
    fn is_open(&self, id: AnchorId) -> bool {
        self.stack.iter().any(|frame| frame.anchor == Some(id))
    }

    fn observe(&mut self, event: &Event, location: Location) -> Result<(), Error> {
        let Some(enforcer) = self.budget.as_mut() else {
            return Ok(());
        };
        match enforcer.observe(event) {
            Ok(()) => Ok(()),
            Err(breach) => Err(self.breach(breach, location)),
        }
    }

    fn observe_merge_key(&mut self, location: Location) -> Result<(), Error> {
        let Some(enforcer) = self.budget.as_mut() else {
            return Ok(());
        };
        match enforcer.observe_merge_key() {
            Ok(()) => Ok(()),
            Err(breach) => Err(self.breach(breach, location)),
        }
    }

    fn breach(&mut self, breach: BudgetBreach, location: Location) -> Error {
        if let Some(enforcer) = self.budget.take() {
            self.deliver(enforcer.into_report(breach.clone()));
        }
        budget_error(breach, location)
    }

    fn finish(&mut self) -> Result<(), Error> {
        let Some(enforcer) = self.budget.take() else {
            return Ok(());
        };
        let report = enforcer.finalize();
        let breached = report.breached.clone();
        self.deliver(report);
        match breached {
            Some(breach) => Err(budget_error(breach, self.last_location)),
            None => Ok(()),
        }
    }

    fn deliver(&self, report: BudgetReport) {
        if let Some(sink) = &self.budget_sink {
            let mut callback = sink.borrow_mut();
            (&mut *callback)(report);
        }
    }
}

fn anchor(anchor_id: usize) -> Option<AnchorId> {
    (anchor_id != 0).then_some(anchor_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_default(input: &str) -> Document {
        decode(input, &Options::default()).expect("decodes")
    }

    #[test]
    fn empty_input_is_null() {
        let doc = decode_default("");
        assert!(matches!(
            doc.root.kind,
            NodeKind::Scalar(Scalar { ref value, plain: true }) if value.is_empty()
        ));
    }

    #[test]
    fn mapping_keeps_pairs_in_order_with_duplicates() {
        let doc = decode_default("b: 1\na: 2\nb: 3\n");
        let NodeKind::Mapping(entries) = &doc.root.kind else {
            panic!("expected mapping, got {:?}", doc.root.kind);
        };
        let keys: Vec<_> = entries
            .iter()
            .map(|(k, _)| match &k.kind {
                NodeKind::Scalar(s) => &*s.value,
                other => panic!("unexpected key {other:?}"),
            })
            .collect();
        assert_eq!(keys, ["b", "a", "b"]);
    }

    #[test]
    fn quoted_scalars_are_not_plain() {
        let doc = decode_default("- '1'\n- 1\n");
        let NodeKind::Sequence(items) = &doc.root.kind else {
            panic!("expected sequence");
        };
        assert!(matches!(&items[0].kind, NodeKind::Scalar(s) if !s.plain));
        assert!(matches!(&items[1].kind, NodeKind::Scalar(s) if s.plain));
    }

    #[test]
    fn aliases_stay_references() {
        let doc = decode_default("base: &b {x: 1}\nuse: *b\n");
        assert_eq!(doc.anchors.len(), 1);
        let NodeKind::Mapping(entries) = &doc.root.kind else {
            panic!("expected mapping");
        };
        assert!(matches!(entries[1].1.kind, NodeKind::Alias(_)));
    }

    #[test]
    fn self_reference_decodes() {
        let doc = decode_default("&a [*a]\n");
        assert!(doc.root.anchor.is_some());
    }

    #[test]
    fn nested_anchors_share_storage() {
        let depth = 100;
        let mut input = String::new();
        for level in 0..depth {
            input.push_str(&" ".repeat(level * 2));
            input.push_str(&format!("- &a{level}\n"));
        }
        input.push_str(&" ".repeat(depth * 2));
        input.push_str(&format!("- {}\n", "x".repeat(64 * 1024)));

        let doc = decode_default(&input);
        assert_eq!(doc.anchors.len(), depth);

        let innermost = |mut node: &Node| loop {
            match &node.kind {
                NodeKind::Sequence(items) => node = &items[0],
                NodeKind::Scalar(s) => return Rc::clone(&s.value),
                other => panic!("unexpected node {other:?}"),
            }
        };
        let in_root = innermost(&doc.root);
        for anchored in doc.anchors.values() {
            assert!(Rc::ptr_eq(&in_root, &innermost(anchored)));
        }
    }

    #[test]
    fn tags_are_retained() {
        let doc = decode_default("!!str 12\n");
        assert!(doc.root.tag.is_some());
    }

    #[test]
    fn first_document_only() {
        let doc = decode_default("a: 1\n---\nb: 2\n");
        let NodeKind::Mapping(entries) = &doc.root.kind else {
            panic!("expected mapping");
        };
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn single_document_policy_rejects_second() {
        let options = Options {
            documents: DocumentPolicy::Single,
            ..Options::default()
        };
        let err = decode("a: 1\n---\nb: 2\n", &options).unwrap_err();
        assert!(matches!(err, Error::MultipleDocuments { .. }), "{err:?}");
    }

    #[test]
    fn parse_errors_have_locations() {
        let err = decode("a: [1, 2\n", &Options::default()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "{err:?}");
        assert!(err.location().is_some());
    }

    #[test]
    fn merge_keys_count_against_budget() {
        let options = Options {
            budget: Some(crate::budget! { max_merge_keys: 1 }),
            ..Options::default()
        };
        let input = "a: &a {x: 1}\nb: {<<: *a}\nc: {<<: *a}\n";
        let err = decode(input, &options).unwrap_err();
        assert!(
            matches!(
                err,
                Error::Budget {
                    breach: BudgetBreach::MergeKeys { merge_keys: 2 },
                    ..
                }
            ),
            "{err:?}"
        );
    }
}
