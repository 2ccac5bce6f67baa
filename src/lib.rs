//! Purpose: Shared library crate used by the `tagwire` CLI and tests.
//! Exports: `api` (public surface) and `core` (value model, registry, codec, errors).
//! Role: Typed value serialization into tagged JSON envelopes, plus legacy reads.
//! Invariants: `api` is the supported path for callers; `core` is exposed for tests.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
mod json;
mod store_paths;
