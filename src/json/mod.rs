//! Purpose: Internal JSON boundary shared by the codec and CLI.
//! Exports: `parse` (decode + failure categories) and `write` (wire text styles).
//! Role: Single seam for parser and writer details so callsites avoid ad hoc serde_json use.
//! Invariants: All JSON parsing (codec input and CLI literals via `codec::parse_json`) and
//! wire-text writing go through this module.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;
pub mod write;
