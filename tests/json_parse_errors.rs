//! Purpose: Regression coverage for parse-failure category mapping.
//! Exports: Integration tests only.
//! Role: Verify stable category labels used in `Malformed` error hints.
//! Invariants: Category mapping remains deterministic for representative errors.
//! Invariants: Tests avoid payload leakage; assertions target category/hint text only.
//! Notes: Uses source include to exercise internal helper logic without widening API surface.

#[path = "../src/json/parse.rs"]
#[allow(dead_code)]
mod parse;

use parse::ParseFailureCategory;

#[test]
fn category_mapping_handles_syntax_and_eof_errors() {
    let syntax_err = parse::from_slice(br#"{"a":}"#).unwrap_err();
    assert_eq!(
        parse::categorize_error(&syntax_err),
        ParseFailureCategory::Syntax
    );

    let eof_err = parse::from_slice(br#"{"__type__": "#).unwrap_err();
    assert_eq!(parse::categorize_error(&eof_err), ParseFailureCategory::Eof);
}

#[test]
fn category_mapping_handles_numeric_and_utf8_errors() {
    let number_err = parse::from_slice(b"1e400").unwrap_err();
    assert_eq!(
        parse::categorize_error(&number_err),
        ParseFailureCategory::NumericRange
    );

    let utf8_err = parse::from_slice(b"\"\xff\"").unwrap_err();
    assert_eq!(
        parse::categorize_error(&utf8_err),
        ParseFailureCategory::Utf8
    );
}

#[test]
fn category_mapping_handles_depth_limit() {
    let nested = "[".repeat(1000);
    let err = parse::from_slice(nested.as_bytes()).unwrap_err();
    assert_eq!(
        parse::categorize_error(&err),
        ParseFailureCategory::DepthLimit
    );
    assert_eq!(
        parse::categorize_message("recursion limit exceeded while parsing"),
        ParseFailureCategory::DepthLimit
    );
}

#[test]
fn hint_contains_category_and_context() {
    let err = parse::from_slice(b"1e400").unwrap_err();
    let hint = parse::hint_for_error(&err, "test.context");
    assert!(hint.contains("parse category: numeric-range"));
    assert!(hint.contains("context: test.context"));
    assert!(hint.contains("line 1"));
}

#[test]
fn unknown_category_fallback_is_stable() {
    assert_eq!(
        parse::categorize_message("opaque parser issue"),
        ParseFailureCategory::Unknown
    );
}

#[test]
fn oversized_integer_scan_skips_strings_and_floats() {
    assert_eq!(
        parse::oversized_integer(br#"{"a": "18446744073709551616", "b": 1.8446744073709551616e19}"#),
        None
    );
    assert_eq!(
        parse::oversized_integer(b"[18446744073709551615, -9223372036854775808]"),
        None
    );
    assert_eq!(
        parse::oversized_integer(br#"{"n": 18446744073709551616}"#).as_deref(),
        Some("18446744073709551616")
    );
    assert_eq!(
        parse::oversized_integer(br#"["a\"", -9223372036854775809]"#).as_deref(),
        Some("-9223372036854775809")
    );
}
