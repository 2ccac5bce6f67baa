//! Purpose: Define the stable public Rust API boundary for tagwire.
//! Exports: Values, the type registry, the codec, stores, and settings.
//! Role: Public, additive-only surface used by the CLI and embedding callers.
//! Invariants: Callers register custom types here before the first encode or decode.
//! Invariants: JSON parsing internals stay private; `parse_json` is the only parse entry point.

mod settings;
mod store;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::builtin::{
    format_date, format_datetime, format_time, parse_date, parse_datetime, parse_time,
};
pub use crate::core::codec::{
    Codec, CodecOptions, ROW_VALUE_FIELD, TYPE_FIELD, VALUE_FIELD, decode, encode, parse_json,
};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::legacy::LegacyPolicy;
pub use crate::core::registry::{DEFAULT_MARKER, Registry, TypeEntry};
pub use crate::core::value::{CustomType, CustomValue, DateTime, TypeKey, Value, ValueKind};
pub use crate::json::write::TextStyle;
pub use settings::Settings;
pub use store::{ApiResult, DirStore, MemoryStore, Store};
