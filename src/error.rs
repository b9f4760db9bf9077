//! Conversion error and its location.

use std::fmt;

use saphyr_parser::ScanError;

use crate::budget::BudgetBreach;
use crate::converters::ConversionError;
use crate::location::{Location, location_from_marker};
use crate::path::DocPath;
use crate::snippet;
use crate::tree::AnchorId;

/// Everything that can go wrong between YAML text and JSON text.
#[derive(Debug)]
pub enum Error {
    /// Malformed YAML.
    Parse { msg: String, location: Location },
    /// A tag outside the YAML core type set (safe mode), or a core tag on the
    /// wrong kind of node.
    UnsupportedTag {
        tag: String,
        path: DocPath,
        location: Location,
    },
    /// A scalar whose text does not match its explicit tag (`!!int abc`).
    InvalidScalar {
        tag: &'static str,
        value: String,
        path: DocPath,
        location: Location,
    },
    /// A mapping key with no lossless string form (sequence or mapping keys).
    UnsupportedKey {
        kind: &'static str,
        path: DocPath,
        location: Location,
    },
    /// A repeated key under [`crate::options::DuplicateKeyPolicy::Error`].
    DuplicateKey {
        key: String,
        path: DocPath,
        location: Location,
    },
    /// A number JSON cannot represent (non-finite floats, or large integers under
    /// [`crate::options::LargeIntegerPolicy::Reject`]).
    PrecisionLoss {
        literal: String,
        path: DocPath,
        location: Location,
    },
    /// An alias that refers to an anchor whose expansion is in progress.
    CyclicReference {
        anchor: AnchorId,
        path: DocPath,
        location: Location,
    },
    /// An alias to an anchor that is not defined in the document.
    UnknownAnchor { id: AnchorId, location: Location },
    /// A `<<` value that is not a mapping or a sequence of mappings.
    InvalidMerge { path: DocPath, location: Location },
    /// Alias expansion exceeded [`crate::options::AliasLimits`].
    AliasLimit {
        msg: String,
        path: DocPath,
        location: Location,
    },
    /// A [`crate::Budget`] limit was exceeded while decoding.
    Budget {
        breach: BudgetBreach,
        location: Location,
    },
    /// A second document under [`crate::options::DocumentPolicy::Single`].
    MultipleDocuments { location: Location },
    /// An App Engine field conversion failed.
    Conversion {
        cause: ConversionError,
        path: DocPath,
    },
    /// The JSON serializer failed.
    Encode { msg: String },
    /// Reading input or writing output failed.
    Io { cause: std::io::Error },
    /// Another error, with a pre-rendered source snippet.
    WithSnippet {
        /// Rendered output; the full input is not retained.
        text: String,
        crop_radius: usize,
        error: Box<Error>,
    },
}

impl Error {
    pub(crate) fn from_scan_error(err: ScanError) -> Self {
        Error::Parse {
            msg: err.info().to_owned(),
            location: location_from_marker(err.marker()),
        }
    }

    /// Wrap this error with a snippet of `text` around its location. Errors
    /// without a location are returned unchanged.
    pub(crate) fn with_snippet(self, text: &str, crop_radius: usize) -> Self {
        if crop_radius == 0 {
            return self;
        }
        let inner = match self {
            Error::WithSnippet { error, .. } => *error,
            other => other,
        };
        let Some(location) = inner.location() else {
            return inner;
        };
        let rendered = snippet::render(&inner.message(), &location, text, crop_radius);
        Error::WithSnippet {
            text: rendered,
            crop_radius,
            error: Box::new(inner),
        }
    }

    /// The source location, if known.
    pub fn location(&self) -> Option<Location> {
        let location = match self {
            Error::Parse { location, .. }
            | Error::UnsupportedTag { location, .. }
            | Error::InvalidScalar { location, .. }
            | Error::UnsupportedKey { location, .. }
            | Error::DuplicateKey { location, .. }
            | Error::PrecisionLoss { location, .. }
            | Error::CyclicReference { location, .. }
            | Error::UnknownAnchor { location, .. }
            | Error::InvalidMerge { location, .. }
            | Error::AliasLimit { location, .. }
            | Error::Budget { location, .. }
            | Error::MultipleDocuments { location } => *location,
            Error::WithSnippet { error, .. } => return error.location(),
            Error::Conversion { .. } | Error::Encode { .. } | Error::Io { .. } => return None,
        };
        location.is_known().then_some(location)
    }

    /// The document path of the offending node, for transform errors.
    pub fn path(&self) -> Option<&DocPath> {
        match self {
            Error::UnsupportedTag { path, .. }
            | Error::InvalidScalar { path, .. }
            | Error::UnsupportedKey { path, .. }
            | Error::DuplicateKey { path, .. }
            | Error::PrecisionLoss { path, .. }
            | Error::CyclicReference { path, .. }
            | Error::InvalidMerge { path, .. }
            | Error::AliasLimit { path, .. }
            | Error::Conversion { path, .. } => Some(path),
            Error::WithSnippet { error, .. } => error.path(),
            _ => None,
        }
    }

    /// The error without any snippet wrapper.
    pub fn without_snippet(&self) -> &Error {
        match self {
            Error::WithSnippet { error, .. } => error.without_snippet(),
            other => other,
        }
    }

    /// Message without location suffix; used as the snippet label.
    fn message(&self) -> String {
        match self {
            Error::Parse { msg, .. } => msg.clone(),
            Error::UnsupportedTag { tag, path, .. } => {
                format!("unsupported tag `{tag}` in {path}")
            }
            Error::InvalidScalar {
                tag, value, path, ..
            } => format!("invalid {tag} value `{value}` in {path}"),
            Error::UnsupportedKey { kind, path, .. } => {
                format!("{kind} cannot be used as a JSON object key in {path}")
            }
            Error::DuplicateKey { key, path, .. } => {
                format!("duplicate key `{key}` in {path}")
            }
            Error::PrecisionLoss { literal, path, .. } => {
                format!("number `{literal}` in {path} cannot be represented in JSON")
            }
            Error::CyclicReference { anchor, path, .. } => {
                format!("alias to anchor id {anchor} refers to itself in {path}")
            }
            Error::UnknownAnchor { id, .. } => format!("alias references unknown anchor id {id}"),
            Error::InvalidMerge { path, .. } => {
                format!("merge value must be a mapping or a sequence of mappings in {path}")
            }
            Error::AliasLimit { msg, path, .. } => format!("{msg} in {path}"),
            Error::Budget { breach, .. } => format!("YAML budget breached: {breach}"),
            Error::MultipleDocuments { .. } => {
                "expected a single document, found another".to_owned()
            }
            Error::Conversion { cause, path } => format!("{cause} in {path}"),
            Error::Encode { msg } => format!("JSON encoding failed: {msg}"),
            Error::Io { cause } => format!("IO error: {cause}"),
            Error::WithSnippet { error, .. } => error.message(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Error::WithSnippet { text, .. } = self {
            return f.write_str(text);
        }
        let msg = self.message();
        match self.location() {
            Some(location) => write!(f, "{msg} at {location}"),
            None => f.write_str(&msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { cause } => Some(cause),
            Error::Conversion { cause, .. } => Some(cause),
            Error::WithSnippet { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(cause: std::io::Error) -> Self {
        Error::Io { cause }
    }
}

pub(crate) fn budget_error(breach: BudgetBreach, location: Location) -> Error {
    Error::Budget { breach, location }
}
