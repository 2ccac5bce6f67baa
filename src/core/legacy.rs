//! Purpose: Read values persisted as Python pickles before the tagged-envelope format.
//! Exports: `LegacyPolicy`, `LegacyError`, `is_eligible`, `decode`, `preview`.
//! Role: Backward-compatible read path only; nothing in the crate writes pickles.
//! Invariants: `Strict` never routes JSON-looking input here, so corrupt JSON stays `Malformed`.
//! Invariants: Standard-library objects (`datetime`, `Decimal`, `UUID`, ...) rebuild as their
//! `Value` kinds; any other pickled class fails.

use std::fmt;

use bstr::ByteSlice;

use crate::core::unpickle;
use crate::core::value::Value;

/// Pickle `PROTO` opcode; every protocol 2+ pickle starts with it.
pub const PICKLE_PROTO: u8 = 0x80;

const PREVIEW_LEN: usize = 32;

/// When a payload that failed to parse as JSON is handed to the pickle reader.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LegacyPolicy {
    /// Only binary input, pickle headers, or text that cannot start a JSON value.
    #[default]
    Strict,
    /// Every JSON parse failure.
    Always,
    Disabled,
}

#[derive(Debug)]
pub enum LegacyError {
    Unsupported(&'static str),
    /// A class global outside the rebuildable set, as `module.name`.
    Global(String),
    Opcode(u8),
    Corrupt(&'static str),
    Truncated,
}

impl fmt::Display for LegacyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegacyError::Unsupported(what) => write!(f, "unsupported pickled {what}"),
            LegacyError::Global(name) => write!(f, "unsupported pickled class {name}"),
            LegacyError::Opcode(code) => write!(f, "unsupported pickle opcode 0x{code:02x}"),
            LegacyError::Corrupt(what) => write!(f, "corrupt pickle: {what}"),
            LegacyError::Truncated => write!(f, "pickle ends before STOP"),
        }
    }
}

impl std::error::Error for LegacyError {}

pub fn is_eligible(bytes: &[u8], policy: LegacyPolicy) -> bool {
    match policy {
        LegacyPolicy::Disabled => false,
        LegacyPolicy::Always => true,
        LegacyPolicy::Strict => looks_legacy(bytes),
    }
}

fn looks_legacy(bytes: &[u8]) -> bool {
    if bytes.first() == Some(&PICKLE_PROTO) {
        return true;
    }
    let Ok(text) = std::str::from_utf8(bytes) else {
        return true;
    };
    match text.trim_start().chars().next() {
        None => false,
        Some(first) => !matches!(first, '{' | '[' | '"' | '-' | '0'..='9' | 't' | 'f' | 'n'),
    }
}

pub fn decode(bytes: &[u8]) -> Result<Value, LegacyError> {
    unpickle::read(bytes)
}

/// Escaped prefix of a payload, safe to log.
pub fn preview(bytes: &[u8]) -> String {
    let end = bytes.len().min(PREVIEW_LEN);
    let mut out = format!("{:?}", bytes[..end].as_bstr());
    if bytes.len() > end {
        out.push_str("...");
    }
    out
}
