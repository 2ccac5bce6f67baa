//! Purpose: Provide the internal JSON decode entrypoint and parse-failure categories.
//! Exports: `from_slice`, `oversized_integer`, `ParseFailureCategory`, `categorize_error`,
//! `categorize_message`, `hint_for_error`.
//! Role: Parser boundary; categories let the codec tell corrupt JSON apart from legacy payloads.
//! Invariants: Self-contained (serde_json only) so integration tests can include it by path.
//! Notes: Error mapping is done by callsites so domain context stays explicit.

use serde_json::Value;
use serde_json::error::Category;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ParseFailureCategory {
    Syntax,
    Eof,
    Utf8,
    NumericRange,
    DepthLimit,
    Data,
    Io,
    Unknown,
}

impl ParseFailureCategory {
    pub(crate) fn label(self) -> &'static str {
        match self {
            ParseFailureCategory::Syntax => "syntax",
            ParseFailureCategory::Eof => "eof",
            ParseFailureCategory::Utf8 => "utf8",
            ParseFailureCategory::NumericRange => "numeric-range",
            ParseFailureCategory::DepthLimit => "depth-limit",
            ParseFailureCategory::Data => "data",
            ParseFailureCategory::Io => "io",
            ParseFailureCategory::Unknown => "unknown",
        }
    }
}

pub(crate) fn from_slice(input: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(input)
}

/// First integer literal outside strings that fits neither `i64` nor `u64`.
///
/// serde_json reads such literals as `f64`, so this runs over input that already parsed.
pub(crate) fn oversized_integer(input: &[u8]) -> Option<String> {
    let mut index = 0;
    while index < input.len() {
        match input[index] {
            b'"' => {
                index += 1;
                while index < input.len() {
                    match input[index] {
                        b'\\' => index += 2,
                        b'"' => {
                            index += 1;
                            break;
                        }
                        _ => index += 1,
                    }
                }
            }
            b'-' | b'0'..=b'9' => {
                let start = index;
                index += 1;
                while index < input.len()
                    && matches!(input[index], b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-')
                {
                    index += 1;
                }
                let token = std::str::from_utf8(&input[start..index]).ok()?;
                let integral = token.bytes().all(|byte| byte.is_ascii_digit() || byte == b'-');
                if integral && token.parse::<i64>().is_err() && token.parse::<u64>().is_err() {
                    return Some(token.to_string());
                }
            }
            _ => index += 1,
        }
    }
    None
}

pub(crate) fn categorize_error(err: &serde_json::Error) -> ParseFailureCategory {
    match categorize_message(&err.to_string()) {
        ParseFailureCategory::Unknown => match err.classify() {
            Category::Syntax => ParseFailureCategory::Syntax,
            Category::Eof => ParseFailureCategory::Eof,
            Category::Data => ParseFailureCategory::Data,
            Category::Io => ParseFailureCategory::Io,
        },
        category => category,
    }
}

pub(crate) fn categorize_message(message: &str) -> ParseFailureCategory {
    let message = message.to_ascii_lowercase();
    if message.contains("recursion limit") {
        ParseFailureCategory::DepthLimit
    } else if message.contains("number out of range") {
        ParseFailureCategory::NumericRange
    } else if message.contains("unicode") || message.contains("utf-8") || message.contains("utf8") {
        ParseFailureCategory::Utf8
    } else {
        ParseFailureCategory::Unknown
    }
}

pub(crate) fn hint_for_error(err: &serde_json::Error, context: &str) -> String {
    format!(
        "parse category: {}; context: {context}; line {}, column {}",
        categorize_error(err).label(),
        err.line(),
        err.column()
    )
}
