//! Tag classification for safe decoding.
//!
//! Only the YAML core and YAML 1.1 type tags are understood. Anything else
//! (`!!python/object:...`, `!Ref`, `!include`) is foreign: it names a type the
//! converter will never construct.

const CANONICAL_PREFIX: &str = "tag:yaml.org,2002:";
const SECONDARY_PREFIX: &str = "!!";

/// Tags the converter knows how to honour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CoreTag {
    /// The non-specific `!` tag: the node is a string (or plain collection).
    NonSpecific,
    Str,
    Int,
    Float,
    Bool,
    Null,
    Binary,
    Timestamp,
    Seq,
    Map,
    Set,
    Omap,
    Pairs,
}

impl CoreTag {
    pub(crate) fn applies_to_sequence(self) -> bool {
        matches!(
            self,
            CoreTag::NonSpecific | CoreTag::Seq | CoreTag::Omap | CoreTag::Pairs
        )
    }

    pub(crate) fn applies_to_mapping(self) -> bool {
        matches!(self, CoreTag::NonSpecific | CoreTag::Map | CoreTag::Set)
    }
}

/// Classify a rendered tag. Returns `None` for foreign tags.
///
/// The parser resolves `!!int` to the handle `tag:yaml.org,2002:`; depending on the
/// parser version the rendered tag is `tag:yaml.org,2002:int` or
/// `tag:yaml.org,2002:!int`. Both, and the `!!int` shorthand, classify the same way.
pub(crate) fn classify(tag: &str) -> Option<CoreTag> {
    // The parser renders the non-specific `!` as the bare secondary handle.
    if tag == "!" || tag == SECONDARY_PREFIX {
        return Some(CoreTag::NonSpecific);
    }
    let name = tag
        .strip_prefix(CANONICAL_PREFIX)
        .map(|rest| rest.strip_prefix('!').unwrap_or(rest))
        .or_else(|| tag.strip_prefix(SECONDARY_PREFIX))?;
    let core = match name {
        "str" => CoreTag::Str,
        "int" => CoreTag::Int,
        "float" => CoreTag::Float,
        "bool" => CoreTag::Bool,
        "null" => CoreTag::Null,
        "binary" => CoreTag::Binary,
        "timestamp" => CoreTag::Timestamp,
        "seq" => CoreTag::Seq,
        "map" => CoreTag::Map,
        "set" => CoreTag::Set,
        "omap" => CoreTag::Omap,
        "pairs" => CoreTag::Pairs,
        _ => return None,
    };
    Some(core)
}
