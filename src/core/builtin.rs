//! Purpose: Built-in registry entries for temporal, decimal, uuid, and duration values.
//! Exports: `entries`, ISO-8601 `format_*`/`parse_*` helpers.
//! Role: Populates `Registry::with_builtins`; text forms match Python `isoformat` output.
//! Invariants: `datetime` is listed before `date` so timestamps never encode as dates.
//! Invariants: Fractional seconds print as 6 digits for whole microseconds, else 9; omitted when zero.
//! Invariants: Decoders accept every form the encoders emit plus Python-written variants.
//! Notes: Python's `Decimal('NaN')`/`Decimal('Infinity')` have no `BigDecimal` form and decode as
//! `InvalidValue`.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde_json::{Number, Value as JsonValue};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use uuid::Uuid;

use crate::core::error::{Error, ErrorKind};
use crate::core::registry::TypeEntry;
use crate::core::value::{DateTime, TypeKey, Value, ValueKind};

pub fn entries() -> Vec<TypeEntry> {
    vec![
        builtin(
            ValueKind::DateTime,
            "datetime",
            |value| match value {
                Value::DateTime(ts) => format_datetime(ts).map(JsonValue::String),
                other => Err(mismatch("datetime", other)),
            },
            |payload| parse_datetime(payload_str("datetime", payload)?).map(Value::DateTime),
        ),
        builtin(
            ValueKind::Date,
            "date",
            |value| match value {
                Value::Date(date) => format_date(*date).map(JsonValue::String),
                other => Err(mismatch("date", other)),
            },
            |payload| parse_date(payload_str("date", payload)?).map(Value::Date),
        ),
        builtin(
            ValueKind::Time,
            "time",
            |value| match value {
                Value::Time(time) => Ok(JsonValue::String(format_time(*time))),
                other => Err(mismatch("time", other)),
            },
            |payload| parse_time(payload_str("time", payload)?).map(Value::Time),
        ),
        builtin(
            ValueKind::Decimal,
            "decimal",
            |value| match value {
                Value::Decimal(decimal) => Ok(JsonValue::String(decimal.to_string())),
                other => Err(mismatch("decimal", other)),
            },
            decode_decimal,
        ),
        builtin(
            ValueKind::Uuid,
            "uuid",
            |value| match value {
                Value::Uuid(uuid) => Ok(JsonValue::String(uuid.simple().to_string())),
                other => Err(mismatch("uuid", other)),
            },
            |payload| {
                let text = payload_str("uuid", payload)?;
                Uuid::parse_str(text).map(Value::Uuid).map_err(|err| {
                    invalid("uuid", "invalid uuid hex").with_source(err)
                })
            },
        ),
        builtin(
            ValueKind::Duration,
            "timedelta",
            |value| match value {
                Value::Duration(duration) => Number::from_f64(duration.as_seconds_f64())
                    .map(JsonValue::Number)
                    .ok_or_else(|| invalid("timedelta", "duration is not a finite number of seconds")),
                other => Err(mismatch("timedelta", other)),
            },
            |payload| {
                let seconds = payload
                    .as_f64()
                    .ok_or_else(|| invalid("timedelta", "expected a number of seconds"))?;
                Duration::checked_seconds_f64(seconds)
                    .map(Value::Duration)
                    .ok_or_else(|| invalid("timedelta", "seconds out of range"))
            },
        ),
    ]
}

fn builtin(
    kind: ValueKind,
    marker: &'static str,
    encode: impl Fn(&Value) -> Result<JsonValue, Error> + Send + Sync + 'static,
    decode: impl Fn(&JsonValue) -> Result<Value, Error> + Send + Sync + 'static,
) -> TypeEntry {
    TypeEntry::new(TypeKey::Builtin(kind), kind.name(), marker, encode, decode)
}

fn decode_decimal(payload: &JsonValue) -> Result<Value, Error> {
    let text = match payload {
        JsonValue::String(text) => text.clone(),
        JsonValue::Number(number) => number.to_string(),
        _ => return Err(invalid("decimal", "expected a decimal string")),
    };
    let digits = text.trim();
    let magnitude = digits.trim_start_matches(['+', '-']).to_ascii_lowercase();
    if matches!(magnitude.as_str(), "nan" | "snan" | "inf" | "infinity") {
        return Err(invalid("decimal", "non-finite decimal has no exact form"));
    }
    BigDecimal::from_str(digits)
        .map(Value::Decimal)
        .map_err(|err| invalid("decimal", "invalid decimal string").with_source(err))
}

pub fn format_datetime(value: &DateTime) -> Result<String, Error> {
    match value {
        DateTime::Naive(ts) => Ok(format!("{}T{}", format_date(ts.date())?, format_time(ts.time()))),
        DateTime::Offset(ts) => Ok(format!(
            "{}T{}{}",
            format_date(ts.date())?,
            format_time(ts.time()),
            format_offset(ts.offset())
        )),
    }
}

pub fn parse_datetime(text: &str) -> Result<DateTime, Error> {
    let normalized = normalize_separator(text.trim());
    let with_offset = format_description!(
        "[year]-[month]-[day]T[hour]:[minute][optional [:[second][optional [.[subsecond]]]]][offset_hour sign:mandatory]:[offset_minute][optional [:[offset_second]]]"
    );
    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute][optional [:[second][optional [.[subsecond]]]]]"
    );

    if let Ok(ts) = OffsetDateTime::parse(&normalized, with_offset) {
        return Ok(DateTime::Offset(ts));
    }
    if let Ok(ts) = PrimitiveDateTime::parse(&normalized, naive) {
        return Ok(DateTime::Naive(ts));
    }
    OffsetDateTime::parse(&normalized, &Rfc3339)
        .map(DateTime::Offset)
        .map_err(|err| invalid("datetime", "invalid ISO-8601 timestamp").with_source(err))
}

pub fn format_date(value: Date) -> Result<String, Error> {
    value
        .format(format_description!("[year]-[month]-[day]"))
        .map_err(|err| invalid("date", "date cannot be formatted").with_source(err))
}

/// Accepts `YYYY-MM-DD`, or a full timestamp truncated to its date.
pub fn parse_date(text: &str) -> Result<Date, Error> {
    let trimmed = text.trim();
    match Date::parse(trimmed, format_description!("[year]-[month]-[day]")) {
        Ok(date) => Ok(date),
        Err(date_err) => parse_datetime(trimmed)
            .map(|ts| ts.date())
            .map_err(|_| invalid("date", "invalid ISO-8601 date").with_source(date_err)),
    }
}

pub fn format_time(value: Time) -> String {
    format!(
        "{:02}:{:02}:{:02}{}",
        value.hour(),
        value.minute(),
        value.second(),
        fraction(value.nanosecond())
    )
}

pub fn parse_time(text: &str) -> Result<Time, Error> {
    Time::parse(
        text.trim(),
        format_description!("[hour]:[minute][optional [:[second][optional [.[subsecond]]]]]"),
    )
    .map_err(|err| invalid("time", "invalid ISO-8601 time").with_source(err))
}

fn fraction(nanos: u32) -> String {
    if nanos == 0 {
        String::new()
    } else if nanos % 1_000 == 0 {
        format!(".{:06}", nanos / 1_000)
    } else {
        format!(".{nanos:09}")
    }
}

fn format_offset(offset: UtcOffset) -> String {
    let (hours, minutes, seconds) = offset.as_hms();
    let sign = if offset.is_negative() { '-' } else { '+' };
    let mut out = format!("{sign}{:02}:{:02}", hours.unsigned_abs(), minutes.unsigned_abs());
    if seconds != 0 {
        out.push_str(&format!(":{:02}", seconds.unsigned_abs()));
    }
    out
}

// Python's `fromisoformat` also accepts a space between date and time.
fn normalize_separator(text: &str) -> String {
    if text.len() > 10 && text.as_bytes()[10] == b' ' {
        format!("{}T{}", &text[..10], &text[11..])
    } else {
        text.to_string()
    }
}

fn payload_str<'a>(marker: &str, payload: &'a JsonValue) -> Result<&'a str, Error> {
    payload
        .as_str()
        .ok_or_else(|| invalid(marker, "expected a string payload"))
}

fn mismatch(marker: &str, value: &Value) -> Error {
    Error::new(ErrorKind::InvalidValue)
        .with_message("entry encoder received a value of another kind")
        .with_marker(marker)
        .with_type_name(value.type_name())
}

fn invalid(marker: &str, message: &str) -> Error {
    Error::new(ErrorKind::InvalidValue)
        .with_message(message)
        .with_marker(marker)
}
