//! Purpose: Shared value-description JSON for `decode`, `get`, and `set` output.
//! Exports: `describe`.
//! Role: Keep the `{"type", "value"}` shape consistent across commands.
//! Invariants: `type` is the registered marker when one applies, else the value's kind name.
//! Invariants: `value` is the envelope payload without the outer tag.

use serde_json::{Value as JsonValue, json};
use tagwire::api::{Codec, Error, TYPE_FIELD, VALUE_FIELD, Value};

pub(crate) fn describe(codec: &Codec, value: &Value) -> Result<JsonValue, Error> {
    let type_label = codec
        .registry()
        .lookup(value)
        .map(|entry| entry.marker().to_string())
        .unwrap_or_else(|| value.type_name().to_string());
    let payload = match codec.encode_json(value)? {
        JsonValue::Object(mut map)
            if map.len() == 2 && map.contains_key(TYPE_FIELD) && map.contains_key(VALUE_FIELD) =>
        {
            map.remove(VALUE_FIELD).unwrap_or(JsonValue::Null)
        }
        other => other,
    };
    Ok(json!({ "type": type_label, "value": payload }))
}
