//! Purpose: Encode values into tagged JSON envelopes and decode them back.
//! Exports: `Codec`, `CodecOptions`, `encode`, `decode`, `parse_json`, `TYPE_FIELD`, `VALUE_FIELD`.
//! Role: The only entry point between in-memory `Value`s and stored text.
//! Invariants: Top-level plain scalars are wrapped as `{"__type__": "default", ...}`.
//! Invariants: Lists and maps are written untagged; their elements are encoded recursively.
//! Invariants: Only objects whose key set is exactly `{__type__, __value__}` are envelopes.
//! Invariants: Every encode/decode seals the registry before consulting it.
//! Invariants: Legacy decoding runs only after a JSON parse failure and per `LegacyPolicy`.
//! Invariants: Integers are decoded exactly or rejected; none are rounded through `f64`.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use bigdecimal::BigDecimal;
use serde_json::{Map, Number, Value as JsonValue};

use crate::core::error::{Error, ErrorKind};
use crate::core::legacy::{self, LegacyPolicy};
use crate::core::registry::{DEFAULT_MARKER, Registry};
use crate::core::value::Value;
use crate::json::parse;
use crate::json::write::{self, TextStyle};

pub const TYPE_FIELD: &str = "__type__";
pub const VALUE_FIELD: &str = "__value__";
/// Payload field of `{"__type__": <python type name>, "value": v}` rows.
pub const ROW_VALUE_FIELD: &str = "value";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CodecOptions {
    pub legacy: LegacyPolicy,
    pub style: TextStyle,
    /// Read a top-level object keyed exactly `{__type__, value}` as its `value`.
    ///
    /// These rows predate the envelope format. Their `__type__` is a Python class name that is
    /// not consulted, and the payload is plain JSON. Nested rows are left as maps.
    pub type_value_rows: bool,
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_legacy(mut self, legacy: LegacyPolicy) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn with_style(mut self, style: TextStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_type_value_rows(mut self, enabled: bool) -> Self {
        self.type_value_rows = enabled;
        self
    }
}

#[derive(Clone, Debug)]
pub struct Codec {
    registry: Arc<Registry>,
    options: CodecOptions,
}

impl Codec {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            options: CodecOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    /// Codec over `Registry::global()` with default options.
    pub fn global() -> &'static Codec {
        static GLOBAL: OnceLock<Codec> = OnceLock::new();
        GLOBAL.get_or_init(|| Codec::new(Registry::global()))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn options(&self) -> CodecOptions {
        self.options
    }

    pub fn encode(&self, value: &Value) -> Result<String, Error> {
        let json = self.encode_json(value)?;
        write::to_string(&json, self.options.style)
    }

    /// Envelope tree for `value`, before text serialization.
    pub fn encode_json(&self, value: &Value) -> Result<JsonValue, Error> {
        self.registry.seal();
        self.encode_value(value, true)
    }

    fn encode_value(&self, value: &Value, top_level: bool) -> Result<JsonValue, Error> {
        if let Some(entry) = self.registry.lookup(value) {
            let payload = entry.encode(value)?;
            return Ok(envelope(entry.marker(), payload));
        }
        match value {
            Value::List(items) => items
                .iter()
                .map(|item| self.encode_value(item, false))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            Value::Map(map) => {
                let mut out = Map::new();
                for (key, item) in map {
                    out.insert(key.clone(), self.encode_value(item, false)?);
                }
                Ok(JsonValue::Object(out))
            }
            scalar if scalar.is_plain_scalar() => {
                let plain = plain_json(scalar)?;
                if top_level {
                    Ok(envelope(DEFAULT_MARKER, plain))
                } else {
                    Ok(plain)
                }
            }
            other => Err(Error::new(ErrorKind::Unserializable)
                .with_message(format!("value of type {} is not serializable", other.type_name()))
                .with_type_name(other.type_name())
                .with_hint("Register the type before the first encode or decode.")),
        }
    }

    pub fn decode(&self, text: &str) -> Result<Value, Error> {
        self.decode_bytes(text.as_bytes())
    }

    /// Decodes envelope JSON, falling back to the legacy pickle reader per policy.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<Value, Error> {
        self.registry.seal();
        match parse::from_slice(bytes) {
            Ok(json) => {
                reject_wide_integers(bytes)?;
                self.reconstruct_row(json)
            }
            Err(parse_err) => self.decode_unparsed(bytes, parse_err),
        }
    }

    /// Reconstructs envelopes in an already-parsed JSON tree.
    pub fn decode_json(&self, json: JsonValue) -> Result<Value, Error> {
        self.registry.seal();
        self.reconstruct_row(json)
    }

    fn reconstruct_row(&self, json: JsonValue) -> Result<Value, Error> {
        match json {
            JsonValue::Object(mut map) if self.options.type_value_rows && is_type_value_row(&map) => {
                tracing::debug!("reading pre-envelope type/value row");
                let payload = map.remove(ROW_VALUE_FIELD).unwrap_or(JsonValue::Null);
                self.reconstruct(payload)
            }
            other => self.reconstruct(other),
        }
    }

    fn reconstruct(&self, json: JsonValue) -> Result<Value, Error> {
        match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Bool(flag) => Ok(Value::Bool(flag)),
            JsonValue::Number(number) => number_value(&number),
            JsonValue::String(text) => Ok(Value::String(text)),
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| self.reconstruct(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            JsonValue::Object(map) if is_envelope(&map) => self.open_envelope(map),
            JsonValue::Object(map) => {
                let mut out = BTreeMap::new();
                for (key, item) in map {
                    out.insert(key, self.reconstruct(item)?);
                }
                Ok(Value::Map(out))
            }
        }
    }

    fn open_envelope(&self, mut map: Map<String, JsonValue>) -> Result<Value, Error> {
        let payload = map.remove(VALUE_FIELD).unwrap_or(JsonValue::Null);
        let marker = match map.remove(TYPE_FIELD) {
            Some(JsonValue::String(marker)) => marker,
            other => {
                let shown = other.map(|tag| tag.to_string()).unwrap_or_default();
                return Err(Error::new(ErrorKind::UnsupportedMarker)
                    .with_message("envelope type tag is not a string")
                    .with_marker(shown));
            }
        };
        if marker == DEFAULT_MARKER {
            return self.reconstruct(payload);
        }
        match self.registry.decoder(&marker) {
            Some(entry) => entry.decode(&payload),
            None => Err(Error::new(ErrorKind::UnsupportedMarker)
                .with_message("no decoder registered for marker")
                .with_marker(marker)),
        }
    }

    fn decode_unparsed(&self, bytes: &[u8], parse_err: serde_json::Error) -> Result<Value, Error> {
        if !legacy::is_eligible(bytes, self.options.legacy) {
            return Err(Error::new(ErrorKind::Malformed)
                .with_message("payload is not valid JSON")
                .with_hint(parse::hint_for_error(&parse_err, "decode"))
                .with_source(parse_err));
        }
        match legacy::decode(bytes) {
            Ok(value) => {
                tracing::debug!(len = bytes.len(), "decoded legacy pickle payload");
                Ok(value)
            }
            Err(legacy_err) => {
                tracing::error!(
                    error = %legacy_err,
                    json_error = %parse_err,
                    preview = %legacy::preview(bytes),
                    "payload is neither JSON nor a legacy pickle"
                );
                Err(Error::new(ErrorKind::LegacyDecode)
                    .with_message(format!("payload is neither JSON nor a legacy pickle ({legacy_err})"))
                    .with_source(parse_err))
            }
        }
    }
}

/// Encodes with the process-wide codec.
pub fn encode(value: &Value) -> Result<String, Error> {
    Codec::global().encode(value)
}

/// Decodes with the process-wide codec.
pub fn decode(text: &str) -> Result<Value, Error> {
    Codec::global().decode(text)
}

/// Parses JSON text with the codec's checks, without reconstructing envelopes.
pub fn parse_json(text: &str) -> Result<JsonValue, Error> {
    let json = parse::from_slice(text.as_bytes()).map_err(|err| {
        Error::new(ErrorKind::Malformed)
            .with_message("text is not valid JSON")
            .with_hint(parse::hint_for_error(&err, "parse"))
            .with_source(err)
    })?;
    reject_wide_integers(text.as_bytes())?;
    Ok(json)
}

fn reject_wide_integers(bytes: &[u8]) -> Result<(), Error> {
    match parse::oversized_integer(bytes) {
        None => Ok(()),
        Some(literal) => Err(Error::new(ErrorKind::InvalidValue)
            .with_message(format!("integer {literal} does not fit in 64 bits"))
            .with_hint("Store wider integers under the decimal marker.")),
    }
}

fn envelope(marker: &str, payload: JsonValue) -> JsonValue {
    let mut map = Map::new();
    map.insert(TYPE_FIELD.to_string(), JsonValue::String(marker.to_string()));
    map.insert(VALUE_FIELD.to_string(), payload);
    JsonValue::Object(map)
}

fn is_envelope(map: &Map<String, JsonValue>) -> bool {
    map.len() == 2 && map.contains_key(TYPE_FIELD) && map.contains_key(VALUE_FIELD)
}

fn is_type_value_row(map: &Map<String, JsonValue>) -> bool {
    map.len() == 2 && map.contains_key(TYPE_FIELD) && map.contains_key(ROW_VALUE_FIELD)
}

fn plain_json(value: &Value) -> Result<JsonValue, Error> {
    match value {
        Value::Null => Ok(JsonValue::Null),
        Value::Bool(flag) => Ok(JsonValue::Bool(*flag)),
        Value::Int(number) => Ok(JsonValue::Number((*number).into())),
        Value::Float(number) => Number::from_f64(*number).map(JsonValue::Number).ok_or_else(|| {
            Error::new(ErrorKind::Unserializable)
                .with_message("non-finite float has no JSON form")
                .with_type_name(value.type_name())
        }),
        Value::String(text) => Ok(JsonValue::String(text.clone())),
        other => Err(Error::new(ErrorKind::Internal)
            .with_message("not a plain JSON scalar")
            .with_type_name(other.type_name())),
    }
}

// Unsigned integers past i64 stay exact as decimals, like oversized legacy integers.
// Anything wider was rejected by `reject_wide_integers` before reconstruction.
fn number_value(number: &Number) -> Result<Value, Error> {
    if let Some(int) = number.as_i64() {
        return Ok(Value::Int(int));
    }
    if let Some(wide) = number.as_u64() {
        return Ok(Value::Decimal(BigDecimal::from(wide)));
    }
    number.as_f64().map(Value::Float).ok_or_else(|| {
        Error::new(ErrorKind::InvalidValue).with_message(format!("unrepresentable number {number}"))
    })
}
