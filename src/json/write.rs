//! Purpose: Serialize envelope trees to wire text.
//! Exports: `TextStyle`, `to_string`.
//! Role: Keeps new writes byte-compatible with rows produced by Python's `json.dumps`.
//! Invariants: `TextStyle::Python` uses `", "`/`": "` separators and `\uXXXX` escapes for non-ASCII.
//! Invariants: `TextStyle::Compact` is plain `serde_json::to_string` output.

use std::io;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{Formatter, Serializer};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TextStyle {
    #[default]
    Python,
    Compact,
}

pub fn to_string(value: &Value, style: TextStyle) -> Result<String, Error> {
    match style {
        TextStyle::Compact => serde_json::to_string(value).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("json encode failed")
                .with_source(err)
        }),
        TextStyle::Python => {
            let mut out = Vec::new();
            let mut ser = Serializer::with_formatter(&mut out, PythonFormatter);
            value.serialize(&mut ser).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("json encode failed")
                    .with_source(err)
            })?;
            String::from_utf8(out).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("json writer produced invalid utf-8")
                    .with_source(err)
            })
        }
    }
}

struct PythonFormatter;

impl Formatter for PythonFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    // Python's default `ensure_ascii=True` escapes everything outside ASCII.
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}
