//! [`Document`] to a JSON-only [`Value`].
//!
//! The walk resolves scalar types, stringifies keys, applies the duplicate key
//! policy, expands aliases (deep copies, never shared) and folds `<<` merge keys.
//! Errors carry the document path of the offending node.

use std::collections::{HashMap, HashSet};

use base64::Engine;
use serde_json::{Map, Number, Value};

use crate::converters::scalar_text;
use crate::error::Error;
use crate::options::{DuplicateKeyPolicy, LargeIntegerPolicy, Options, UnknownTagPolicy};
use crate::parse_scalars::{
    IntLiteral, Resolved, ScalarRules, parse_bool, parse_float, parse_int, resolve_plain,
};
use crate::path::DocPath;
use crate::tags::{CoreTag, classify};
use crate::tree::{AnchorId, Document, Node, NodeKind, Scalar};

const MERGE_KEY: &str = "<<";

/// Convert a decoded document into a tree of JSON values.
///
/// The input is not modified; aliased subtrees are copied at every use.
pub fn transform(doc: &Document, options: &Options) -> Result<Value, Error> {
    let mut walker = Transformer {
        doc,
        options,
        rules: ScalarRules {
            strict_booleans: options.strict_booleans,
            legacy_octal: options.legacy_octal_numbers,
        },
        path: DocPath::root(),
        active: HashSet::new(),
        alias_depth: 0,
        expanded_nodes: 0,
        expansions: HashMap::new(),
    };
    let value = walker.value(&doc.root)?;
    tracing::debug!(
        expanded_nodes = walker.expanded_nodes,
        "transformed document"
    );
    Ok(value)
}

struct Transformer<'a> {
    doc: &'a Document,
    options: &'a Options,
    rules: ScalarRules,
    path: DocPath,
    /// Anchors whose node is currently being converted.
    active: HashSet<AnchorId>,
    alias_depth: usize,
    /// Nodes converted while inside at least one alias.
    expanded_nodes: usize,
    expansions: HashMap<AnchorId, usize>,
}

impl<'a> Transformer<'a> {
    fn value(&mut self, node: &'a Node) -> Result<Value, Error> {
        if self.alias_depth > 0 {
            self.expanded_nodes += 1;
            let max = self.options.alias_limits.max_expanded_nodes;
            if self.expanded_nodes > max {
                return Err(self.alias_limit(
                    node,
                    format!("alias expansion produced more than {max} nodes"),
                ));
            }
        }

        let entered = node.anchor.filter(|id| self.active.insert(*id));
        let result = match &node.kind {
            NodeKind::Scalar(scalar) => self.scalar(node, scalar),
            NodeKind::Sequence(items) => self.sequence(node, items),
            NodeKind::Mapping(entries) => self.mapping(node, entries),
            NodeKind::Alias(id) => self.alias(node, *id),
        };
        if let Some(id) = entered {
            self.active.remove(&id);
        }
        result
    }

    fn alias(&mut self, node: &'a Node, id: AnchorId) -> Result<Value, Error> {
        if self.active.contains(&id) {
            return Err(Error::CyclicReference {
                anchor: id,
                path: self.path.clone(),
                location: node.location,
            });
        }
        let doc = self.doc;
        let target = doc.anchor(id).ok_or(Error::UnknownAnchor {
            id,
            location: node.location,
        })?;

        let limits = self.options.alias_limits;
        let count = self.expansions.entry(id).or_insert(0);
        *count += 1;
        if *count > limits.max_expansions_per_anchor {
            let msg = format!(
                "anchor id {id} expanded more than {} times",
                limits.max_expansions_per_anchor
            );
            return Err(self.alias_limit(node, msg));
        }
        if self.alias_depth >= limits.max_alias_depth {
            let msg = format!("aliases nested deeper than {}", limits.max_alias_depth);
            return Err(self.alias_limit(node, msg));
        }

        tracing::trace!(anchor = id, path = %self.path, "expanding alias");
        self.alias_depth += 1;
        let result = self.value(target);
        self.alias_depth -= 1;
        result
    }

    fn alias_limit(&self, node: &Node, msg: String) -> Error {
        Error::AliasLimit {
            msg,
            path: self.path.clone(),
            location: node.location,
        }
    }

    /// The core tag of `node`. Foreign tags fail or are dropped per policy.
    fn core_tag(&self, node: &Node) -> Result<Option<CoreTag>, Error> {
        let Some(tag) = node.tag.as_deref() else {
            return Ok(None);
        };
        match classify(tag) {
            Some(core) => Ok(Some(core)),
            None => match self.options.unknown_tags {
                UnknownTagPolicy::Ignore => Ok(None),
                UnknownTagPolicy::Reject => Err(self.unsupported_tag(node, tag)),
            },
        }
    }

    fn unsupported_tag(&self, node: &Node, tag: &str) -> Error {
        Error::UnsupportedTag {
            tag: tag.to_owned(),
            path: self.path.clone(),
            location: node.location,
        }
    }

    fn scalar(&mut self, node: &Node, scalar: &Scalar) -> Result<Value, Error> {
        let text: &str = &scalar.value;
        let Some(tag) = self.core_tag(node)? else {
            if !scalar.plain {
                return Ok(Value::String(text.to_owned()));
            }
            return self.resolved(node, text, resolve_plain(text, self.rules));
        };

        match tag {
            CoreTag::NonSpecific | CoreTag::Str | CoreTag::Timestamp => {
                Ok(Value::String(text.to_owned()))
            }
            CoreTag::Null => Ok(Value::Null),
            CoreTag::Bool => parse_bool(text, false)
                .map(Value::Bool)
                .ok_or_else(|| self.invalid(node, "bool", text)),
            CoreTag::Int => match parse_int(text, self.rules.legacy_octal) {
                Some(int) => self.integer(node, text, int),
                None => Err(self.invalid(node, "int", text)),
            },
            CoreTag::Float => match parse_float(text) {
                Some(f) => self.float(node, text, f),
                None => Err(self.invalid(node, "float", text)),
            },
            CoreTag::Binary => {
                let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                match base64::engine::general_purpose::STANDARD.decode(&cleaned) {
                    Ok(_) => Ok(Value::String(cleaned)),
                    Err(_) => Err(self.invalid(node, "binary", text)),
                }
            }
            CoreTag::Seq | CoreTag::Map | CoreTag::Set | CoreTag::Omap | CoreTag::Pairs => {
                let tag = node.tag.as_deref().unwrap_or_default();
                Err(self.unsupported_tag(node, tag))
            }
        }
    }

    fn invalid(&self, node: &Node, tag: &'static str, value: &str) -> Error {
        Error::InvalidScalar {
            tag,
            value: value.to_owned(),
            path: self.path.clone(),
            location: node.location,
        }
    }

    fn resolved(&self, node: &Node, text: &str, resolved: Resolved<'_>) -> Result<Value, Error> {
        match resolved {
            Resolved::Null => Ok(Value::Null),
            Resolved::Bool(b) => Ok(Value::Bool(b)),
            Resolved::Int(int) => self.integer(node, text, int),
            Resolved::Float(f) => self.float(node, text, f),
            Resolved::Str(s) => Ok(Value::String(s.to_owned())),
        }
    }

    fn integer(&self, node: &Node, literal: &str, int: IntLiteral) -> Result<Value, Error> {
        let text = match int {
            IntLiteral::Value(v) if self.options.integer_range.contains(v) => {
                if let Ok(u) = u64::try_from(v) {
                    return Ok(Value::from(u));
                }
                if let Ok(i) = i64::try_from(v) {
                    return Ok(Value::from(i));
                }
                v.to_string()
            }
            IntLiteral::Value(v) => v.to_string(),
            IntLiteral::TooLarge => literal
                .trim_start_matches('+')
                .chars()
                .filter(|c| *c != '_')
                .collect(),
        };
        match self.options.large_integers {
            LargeIntegerPolicy::String => Ok(Value::String(text)),
            LargeIntegerPolicy::Reject => Err(self.precision_loss(node, literal)),
        }
    }

    fn float(&self, node: &Node, literal: &str, f: f64) -> Result<Value, Error> {
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| self.precision_loss(node, literal))
    }

    fn precision_loss(&self, node: &Node, literal: &str) -> Error {
        Error::PrecisionLoss {
            literal: literal.to_owned(),
            path: self.path.clone(),
            location: node.location,
        }
    }

    fn sequence(&mut self, node: &'a Node, items: &'a [Node]) -> Result<Value, Error> {
        if let Some(tag) = self.core_tag(node)? {
            if !tag.applies_to_sequence() {
                return Err(self.unsupported_tag(node, node.tag.as_deref().unwrap_or_default()));
            }
        }
        let mut out = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            self.path.push(idx);
            let value = self.value(item);
            self.path.pop();
            out.push(value?);
        }
        Ok(Value::Array(out))
    }

    fn mapping(&mut self, node: &'a Node, entries: &'a [(Node, Node)]) -> Result<Value, Error> {
        if let Some(tag) = self.core_tag(node)? {
            if !tag.applies_to_mapping() {
                return Err(self.unsupported_tag(node, node.tag.as_deref().unwrap_or_default()));
            }
        }

        let mut merged = Map::new();
        let mut explicit = Map::new();
        for (key_node, value_node) in entries {
            if self.options.merge_keys && is_merge_key(key_node) {
                self.merge(value_node, &mut merged)?;
                continue;
            }

            let key = self.key(key_node)?;
            if explicit.contains_key(&key) {
                match self.options.duplicate_keys {
                    DuplicateKeyPolicy::FirstWins => continue,
                    DuplicateKeyPolicy::LastWins => {}
                    DuplicateKeyPolicy::Error => {
                        return Err(Error::DuplicateKey {
                            key,
                            path: self.path.clone(),
                            location: key_node.location,
                        });
                    }
                }
            }
            self.path.push(key.as_str());
            let value = self.value(value_node);
            self.path.pop();
            explicit.insert(key, value?);
        }

        if merged.is_empty() {
            return Ok(Value::Object(explicit));
        }
        // Merged keys lead; explicit keys override in place.
        for (key, value) in explicit {
            merged.insert(key, value);
        }
        Ok(Value::Object(merged))
    }

    /// Fold the sources of one `<<` entry into `merged`. Within a sequence of
    /// sources, earlier sources win.
    fn merge(&mut self, value_node: &'a Node, merged: &mut Map<String, Value>) -> Result<(), Error> {
        self.path.push(MERGE_KEY);
        let value = self.value(value_node);
        let invalid = Error::InvalidMerge {
            path: self.path.clone(),
            location: value_node.location,
        };
        self.path.pop();

        let sources = match value? {
            Value::Object(map) => vec![map],
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .ok_or(invalid)?,
            _ => return Err(invalid),
        };
        for source in sources.into_iter().rev() {
            for (key, value) in source {
                merged.insert(key, value);
            }
        }
        Ok(())
    }

    /// Stringify a mapping key the way the value would print as JSON.
    fn key(&mut self, node: &'a Node) -> Result<String, Error> {
        let value = self.value(node)?;
        scalar_text(&value).ok_or_else(|| Error::UnsupportedKey {
            kind: if value.is_array() { "sequence" } else { "mapping" },
            path: self.path.clone(),
            location: node.location,
        })
    }
}

fn is_merge_key(node: &Node) -> bool {
    node.tag.is_none()
        && matches!(&node.kind, NodeKind::Scalar(Scalar { value, plain: true }) if &**value == MERGE_KEY)
}
