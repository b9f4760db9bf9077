//! JSON text output.

use std::io;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter, Serializer};

use crate::error::Error;
use crate::options::JsonOptions;

/// Render `value` as JSON text. Object members keep their insertion order.
pub fn encode(value: &Value, options: &JsonOptions) -> Result<String, Error> {
    let mut out = Vec::with_capacity(128);
    encode_to_writer(&mut out, value, options)?;
    String::from_utf8(out).map_err(|err| Error::Encode {
        msg: err.to_string(),
    })
}

/// Write `value` as JSON text to `writer`. No trailing newline is written.
pub fn encode_to_writer<W: io::Write>(
    writer: W,
    value: &Value,
    options: &JsonOptions,
) -> Result<(), Error> {
    let indent = options.indent.map(|width| vec![b' '; width]);
    match (&indent, options.ascii_only) {
        (Some(indent), false) => write_with(writer, PrettyFormatter::with_indent(indent), value),
        (Some(indent), true) => write_with(
            writer,
            AsciiFormatter(PrettyFormatter::with_indent(indent)),
            value,
        ),
        (None, false) => write_with(writer, CompactFormatter, value),
        (None, true) => write_with(writer, AsciiFormatter(CompactFormatter), value),
    }
}

fn write_with<W: io::Write, F: Formatter>(writer: W, formatter: F, value: &Value) -> Result<(), Error> {
    let mut ser = Serializer::with_formatter(writer, formatter);
    value.serialize(&mut ser).map_err(|err| {
        if err.is_io() {
            Error::Io { cause: err.into() }
        } else {
            Error::Encode {
                msg: err.to_string(),
            }
        }
    })
}

/// Escapes every non-ASCII character as `\uXXXX` (UTF-16 code units, so
/// astral characters become surrogate pairs). Layout is delegated to `F`.
struct AsciiFormatter<F>(F);

impl<F: Formatter> Formatter for AsciiFormatter<F> {
    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..idx])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_object_key(writer, first)
    }

    fn end_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_key(writer)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }
}
