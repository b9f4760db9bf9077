//! App Engine style YAML configuration to JSON.
//!
//! Conversion runs in three stages, each usable on its own:
//!
//! - [`decode`]: YAML text to a raw [`Document`] tree, metered by a [`Budget`].
//! - [`transform`]: document to a JSON-only [`serde_json::Value`]. Scalars are
//!   typed, keys stringified, aliases expanded and merge keys folded.
//! - [`encode`]: value to JSON text.
//!
//! Decoding is safe: only the YAML core type tags are honoured.
//!
//! ```rust
//! let json = convert_yaml::convert_str("runtime: go\nthreadsafe: yes\n").unwrap();
//! assert_eq!(json, "{\n  \"runtime\": \"go\",\n  \"threadsafe\": true\n}");
//! ```

use std::io::Read;

use encoding_rs_io::DecodeReaderBytesBuilder;
use serde_json::Value;

pub use budget::{Budget, BudgetBreach, BudgetReport};
pub use decoder::decode;
pub use encoder::{encode, encode_to_writer};
pub use error::Error;
pub use location::Location;
pub use options::{JsonOptions, Options};
pub use path::{DocPath, PathSegment};
pub use transform::transform;
pub use tree::Document;

pub mod budget;
pub mod converters;
mod decoder;
mod encoder;
mod error;
mod location;
mod macros;
pub mod options;
mod parse_scalars;
mod path;
mod snippet;
mod tags;
mod transform;
pub mod tree;

/// Convert YAML text to pretty-printed JSON with default options.
pub fn convert_str(input: &str) -> Result<String, Error> {
    convert_str_with_options(input, &Options::default(), &JsonOptions::default())
}

/// Convert YAML text to JSON text.
pub fn convert_str_with_options(
    input: &str,
    options: &Options,
    json: &JsonOptions,
) -> Result<String, Error> {
    let value = to_value_with_options(input, options)?;
    encode(&value, json)
}

/// Convert UTF-8 bytes to JSON text. A leading byte order mark is ignored.
pub fn convert_slice_with_options(
    bytes: &[u8],
    options: &Options,
    json: &JsonOptions,
) -> Result<String, Error> {
    let text = std::str::from_utf8(bytes).map_err(|err| Error::Io {
        cause: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
    })?;
    convert_str_with_options(strip_bom(text), options, json)
}

/// Read all of `reader` and convert it. UTF-8 and UTF-16 input is recognized by
/// its byte order mark; input without one must be UTF-8.
pub fn convert_reader_with_options<R: Read>(
    reader: R,
    options: &Options,
    json: &JsonOptions,
) -> Result<String, Error> {
    let text = read_text(reader)?;
    convert_str_with_options(&text, options, json)
}

/// Read all of `reader` as text, transcoding UTF-16 input (recognized by its
/// byte order mark) to UTF-8. The byte order mark is not part of the result.
pub fn read_text<R: Read>(reader: R) -> Result<String, Error> {
    let mut decoder = DecodeReaderBytesBuilder::new()
        .encoding(None)
        .build(reader);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    if text.starts_with('\u{FEFF}') {
        text.remove(0);
    }
    Ok(text)
}

/// Decode and transform YAML text with default options.
pub fn to_value(input: &str) -> Result<Value, Error> {
    to_value_with_options(input, &Options::default())
}

/// Decode and transform YAML text.
///
/// Located errors are wrapped with a source snippet unless
/// [`Options::with_snippet`] is off.
pub fn to_value_with_options(input: &str, options: &Options) -> Result<Value, Error> {
    tracing::debug!(bytes = input.len(), "converting YAML");
    decode(input, options)
        .and_then(|doc| transform(&doc, options))
        .map_err(|err| {
            if options.with_snippet {
                err.with_snippet(input, options.crop_radius)
            } else {
                err
            }
        })
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}
