//! Purpose: Contract tests for the public codec and registry surface.
//! Exports: Integration tests only.
//! Role: Pin wire text and round-trip behavior that stored rows depend on.
//! Invariants: Each test builds its own registry so sealing never leaks between tests.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use serde_json::{Value as JsonValue, json};
use tagwire::api::{
    Codec, CodecOptions, Error, ErrorKind, Registry, TypeEntry, TypeKey, Value, ValueKind,
};
use time::{Duration, UtcOffset};
use time::macros::{date, datetime, time};
use uuid::Uuid;

fn codec() -> Codec {
    Codec::new(Arc::new(Registry::with_builtins()))
}

#[derive(Clone, Debug, PartialEq)]
struct Celsius(f64);

#[derive(Clone, Debug, PartialEq)]
struct Tags(Vec<String>);

fn celsius_entry() -> TypeEntry {
    TypeEntry::custom::<Celsius>(
        "celsius",
        |value| Ok(json!(value.0)),
        |payload| {
            payload.as_f64().map(Celsius).ok_or_else(|| {
                Error::new(ErrorKind::InvalidValue)
                    .with_message("expected degrees")
                    .with_marker("celsius")
            })
        },
    )
}

#[test]
fn registered_builtins_round_trip() {
    let codec = codec();
    let values = [
        Value::from(datetime!(2024-03-01 09:30:00.123456)),
        Value::from(datetime!(2024-03-01 09:30:00 +02:00)),
        Value::from(datetime!(1999-12-31 23:59:59.000000001)),
        Value::Date(date!(2024 - 02 - 29)),
        Value::Time(time!(07:05:03.25)),
        Value::Decimal(BigDecimal::from_str("12345678901234567890.000123").unwrap()),
        Value::Uuid(Uuid::from_u128(0x5e0b7c52_0d7b_4bb6_9b3c_0b2e2b6b7a11)),
        Value::Duration(Duration::seconds(-3600)),
    ];
    for value in values {
        let text = codec.encode(&value).unwrap();
        assert_eq!(codec.decode(&text).unwrap(), value, "{text}");
    }
}

#[test]
fn plain_values_use_default_marker() {
    let codec = codec();
    for value in [
        Value::from("plain"),
        Value::Int(42),
        Value::Bool(true),
        Value::Null,
    ] {
        let text = codec.encode(&value).unwrap();
        let wire: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(wire["__type__"], "default");
        assert_eq!(codec.decode(&text).unwrap(), value);
    }
}

#[test]
fn duration_example_has_exact_wire_text() {
    let codec = codec();
    let value = Value::Duration(Duration::milliseconds(90_500));
    let text = codec.encode(&value).unwrap();
    assert_eq!(text, r#"{"__type__": "timedelta", "__value__": 90.5}"#);
    assert_eq!(codec.decode(&text).unwrap(), value);
}

#[test]
fn timestamp_and_date_decode_to_their_own_kinds() {
    let codec = codec();
    let stamp = codec
        .encode(&Value::from(datetime!(2024-03-01 00:00:00)))
        .unwrap();
    let day = codec.encode(&Value::Date(date!(2024 - 03 - 01))).unwrap();
    assert_eq!(codec.decode(&stamp).unwrap().kind(), Some(ValueKind::DateTime));
    assert_eq!(codec.decode(&day).unwrap().kind(), Some(ValueKind::Date));
}

#[test]
fn untagged_object_passes_through() {
    let value = codec().decode(r#"{"a": 1, "b": 2}"#).unwrap();
    let mut expected = BTreeMap::new();
    expected.insert("a".to_string(), Value::Int(1));
    expected.insert("b".to_string(), Value::Int(2));
    assert_eq!(value, Value::Map(expected));
}

#[test]
fn unknown_marker_error_carries_marker() {
    let err = codec()
        .decode(r#"{"__type__": "bogus", "__value__": 1}"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedMarker);
    assert_eq!(err.marker(), Some("bogus"));
}

#[test]
fn marker_collisions_and_reserved_marker_are_rejected() {
    let registry = Registry::with_builtins();
    let err = registry
        .register_type::<Tags>("date", |_| Ok(json!([])), |_| Ok(Tags(Vec::new())))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registration);
    assert_eq!(err.marker(), Some("date"));

    let err = registry
        .register_type::<Tags>("default", |_| Ok(json!([])), |_| Ok(Tags(Vec::new())))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registration);
}

#[test]
fn custom_type_round_trips_inside_structures() {
    let registry = Arc::new(Registry::with_builtins());
    registry.register(celsius_entry()).unwrap();
    let codec = Codec::new(registry);

    let mut map = BTreeMap::new();
    map.insert("outside".to_string(), Value::custom(Celsius(-4.5)));
    map.insert("label".to_string(), Value::from("north"));
    let value = Value::Map(map);

    let text = codec.encode(&value).unwrap();
    assert_eq!(
        text,
        r#"{"label": "north", "outside": {"__type__": "celsius", "__value__": -4.5}}"#
    );
    let decoded = codec.decode(&text).unwrap();
    assert_eq!(decoded, value);
    let Value::Map(map) = decoded else {
        panic!("expected map");
    };
    assert_eq!(map["outside"].as_custom::<Celsius>(), Some(&Celsius(-4.5)));
}

#[test]
fn unregistered_custom_type_names_the_type() {
    let err = codec().encode(&Value::custom(Tags(vec!["a".into()]))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unserializable);
    assert!(err.type_name().unwrap_or_default().contains("Tags"));
}

#[test]
fn earlier_covering_entry_wins_lookup() {
    let registry = Arc::new(Registry::new());
    let midnight = TypeEntry::new(
        TypeKey::Custom(std::any::TypeId::of::<Tags>()),
        "midnight",
        "midnight",
        |value| match value {
            Value::Date(day) => Ok(json!(day.to_string())),
            _ => Ok(JsonValue::Null),
        },
        |_| Ok(Value::Null),
    )
    .covering(|value| matches!(value, Value::Date(_)));
    registry.register(midnight).unwrap();
    for entry in tagwire::core::builtin::entries() {
        registry.register(entry).unwrap();
    }
    let codec = Codec::new(registry);

    let text = codec.encode(&Value::Date(date!(2024 - 03 - 01))).unwrap();
    assert!(text.contains(r#""__type__": "midnight""#), "{text}");
    let text = codec
        .encode(&Value::from(datetime!(2024-03-01 09:00:00)))
        .unwrap();
    assert!(text.contains(r#""__type__": "datetime""#), "{text}");
}

#[test]
fn registration_after_first_use_is_rejected() {
    let registry = Arc::new(Registry::with_builtins());
    let codec = Codec::new(Arc::clone(&registry));
    codec.encode(&Value::Int(1)).unwrap();
    let err = registry.register(celsius_entry()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registration);
}

#[test]
fn codec_is_shareable_across_threads() {
    let codec = codec();
    std::thread::scope(|scope| {
        for n in 0..4i64 {
            let codec = &codec;
            scope.spawn(move || {
                let value = Value::List(vec![Value::Int(n), Value::Date(date!(2024 - 01 - 01))]);
                let text = codec.encode(&value).unwrap();
                assert_eq!(codec.decode(&text).unwrap(), value);
            });
        }
    });
}

#[test]
fn python_written_rows_decode() {
    let codec = codec();
    let stamp = codec
        .decode(r#"{"__type__": "datetime", "__value__": "2024-05-01T12:30:00.123456+02:00"}"#)
        .unwrap();
    assert_eq!(stamp, Value::from(datetime!(2024-05-01 12:30:00.123456 +02:00)));

    let row = codec
        .decode(r#"[{"__type__": "decimal", "__value__": "1.10"}, {"__type__": "uuid", "__value__": "5e0b7c520d7b4bb69b3c0b2e2b6b7a11"}]"#)
        .unwrap();
    assert_eq!(
        row,
        Value::List(vec![
            Value::Decimal(BigDecimal::from_str("1.10").unwrap()),
            Value::Uuid(Uuid::from_u128(0x5e0b7c52_0d7b_4bb6_9b3c_0b2e2b6b7a11)),
        ])
    );
}

#[test]
fn offsets_with_seconds_round_trip() {
    let codec = codec();
    let offset = UtcOffset::from_hms(1, 2, 3).unwrap();
    let value = Value::from(datetime!(2024-03-01 09:30 UTC).to_offset(offset));
    let text = codec.encode(&value).unwrap();
    assert_eq!(
        text,
        r#"{"__type__": "datetime", "__value__": "2024-03-01T10:32:03+01:02:03"}"#
    );
    assert_eq!(codec.decode(&text).unwrap(), value);
}

#[test]
fn python_big_ints_in_default_envelopes_are_not_rounded() {
    let codec = codec();
    let value = codec
        .decode(r#"{"__type__": "default", "__value__": 18446744073709551615}"#)
        .unwrap();
    assert_eq!(
        value,
        Value::Decimal(BigDecimal::from_str("18446744073709551615").unwrap())
    );

    let err = codec
        .decode(r#"{"__type__": "default", "__value__": 36893488147419103232}"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn json_column_type_value_rows_decode_when_enabled() {
    // Shape of rows written by the JSON column encoder that predates envelopes.
    let rows = [
        (
            r#"{"__type__": "datetime", "value": "2024-03-01T09:30:00.123"}"#,
            Value::from("2024-03-01T09:30:00.123"),
        ),
        (r#"{"__type__": "int", "value": 7}"#, Value::Int(7)),
        (
            r#"{"__type__": "list", "value": [1, "x"]}"#,
            Value::List(vec![Value::Int(1), Value::from("x")]),
        ),
    ];
    let codec = codec().with_options(CodecOptions::new().with_type_value_rows(true));
    for (row, expected) in rows {
        assert_eq!(codec.decode(row).unwrap(), expected, "{row}");
    }

    let plain = codec.decode(r#"{"__type__": "int", "value": 7, "extra": 1}"#).unwrap();
    assert!(matches!(plain, Value::Map(map) if map.len() == 3));
}

#[test]
fn custom_decoders_receive_raw_payload_json() {
    let registry = Arc::new(Registry::with_builtins());
    registry
        .register_type::<Tags>(
            "tags",
            |tags| Ok(json!(tags.0)),
            |payload| {
                let items = payload.as_array().cloned().unwrap_or_default();
                Ok(Tags(items.iter().map(|item| item.to_string()).collect()))
            },
        )
        .unwrap();
    let codec = Codec::new(registry);

    let value = codec
        .decode(r#"{"__type__": "tags", "__value__": [{"__type__": "date", "__value__": "2024-03-01"}]}"#)
        .unwrap();
    assert_eq!(
        value.as_custom::<Tags>(),
        Some(&Tags(vec![
            r#"{"__type__":"date","__value__":"2024-03-01"}"#.to_string()
        ]))
    );

    let inner = codec
        .decode_json(json!({"__type__": "date", "__value__": "2024-03-01"}))
        .unwrap();
    assert_eq!(inner, Value::Date(date!(2024 - 03 - 01)));
}
