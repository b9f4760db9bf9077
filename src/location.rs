//! Source location utilities.

use std::fmt;

use saphyr_parser::{Marker, Span};
use serde::{Deserialize, Serialize};

/// Row/column location within the source YAML document (1-indexed).
///
/// Columns count Unicode scalar values, not bytes, matching what editors show.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub(crate) line: u32,
    pub(crate) column: u32,
}

impl Location {
    /// Sentinel value meaning "location unknown".
    pub const UNKNOWN: Self = Self { line: 0, column: 0 };

    /// Create a new location record from 1-indexed coordinates.
    pub(crate) const fn new(line: usize, column: usize) -> Self {
        // Error reporting only; documents with more than 4G lines are not a concern.
        Self {
            line: line as u32,
            column: column as u32,
        }
    }

    /// 1-indexed line number.
    pub fn line(&self) -> u64 {
        self.line as u64
    }

    /// 1-indexed column number.
    pub fn column(&self) -> u64 {
        self.column as u64
    }

    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Start of a parser span as a 1-indexed location.
pub(crate) fn location_from_span(span: &Span) -> Location {
    location_from_marker(&span.start)
}

/// Parser markers carry a 1-based line and a 0-based column.
pub(crate) fn location_from_marker(mark: &Marker) -> Location {
    Location::new(mark.line(), mark.col() + 1)
}
