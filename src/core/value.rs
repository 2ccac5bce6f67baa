//! Purpose: Define the closed sum type of values the codec can carry.
//! Exports: `Value`, `ValueKind`, `DateTime`, `CustomValue`, `CustomType`, `TypeKey`.
//! Role: Replaces runtime duck typing with an explicit discriminant per kind.
//! Invariants: `TypeKey` is the registry identity; built-ins key by `ValueKind`.
//! Invariants: Custom values compare by concrete type first, then by `PartialEq`.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    String,
    DateTime,
    Date,
    Time,
    Decimal,
    Uuid,
    Duration,
    List,
    Map,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::DateTime => "datetime",
            ValueKind::Date => "date",
            ValueKind::Time => "time",
            ValueKind::Decimal => "decimal",
            ValueKind::Uuid => "uuid",
            ValueKind::Duration => "duration",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        }
    }

    /// Kinds JSON can carry natively as a scalar.
    pub fn is_plain_scalar(self) -> bool {
        matches!(
            self,
            ValueKind::Null | ValueKind::Bool | ValueKind::Int | ValueKind::Float | ValueKind::String
        )
    }
}

/// Registry identity of a value's runtime type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TypeKey {
    Builtin(ValueKind),
    Custom(TypeId),
}

impl TypeKey {
    pub fn of<T: CustomType>() -> Self {
        TypeKey::Custom(TypeId::of::<T>())
    }
}

/// A timestamp with or without a UTC offset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DateTime {
    Naive(PrimitiveDateTime),
    Offset(OffsetDateTime),
}

impl DateTime {
    pub fn date(&self) -> Date {
        match self {
            DateTime::Naive(value) => value.date(),
            DateTime::Offset(value) => value.date(),
        }
    }
}

/// Object-safe view over caller-defined value types.
pub trait CustomType: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn CustomType) -> bool;
    fn type_name(&self) -> &'static str;
}

impl<T> CustomType for T
where
    T: Any + fmt::Debug + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn CustomType) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

#[derive(Clone)]
pub struct CustomValue(Arc<dyn CustomType>);

impl CustomValue {
    pub fn new<T: CustomType>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: CustomType>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn type_id(&self) -> TypeId {
        self.0.as_any().type_id()
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime),
    Date(Date),
    Time(Time),
    Decimal(BigDecimal),
    Uuid(Uuid),
    Duration(Duration),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Custom(CustomValue),
}

impl Value {
    pub fn custom<T: CustomType>(value: T) -> Self {
        Value::Custom(CustomValue::new(value))
    }

    /// Built-in kind, or `None` for custom values.
    pub fn kind(&self) -> Option<ValueKind> {
        self.classify().ok()
    }

    pub fn type_key(&self) -> TypeKey {
        match self.classify() {
            Ok(kind) => TypeKey::Builtin(kind),
            Err(custom) => TypeKey::Custom(custom.type_id()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.classify() {
            Ok(kind) => kind.name(),
            Err(custom) => custom.type_name(),
        }
    }

    fn classify(&self) -> Result<ValueKind, &CustomValue> {
        Ok(match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Duration(_) => ValueKind::Duration,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Custom(custom) => return Err(custom),
        })
    }

    pub fn is_plain_scalar(&self) -> bool {
        self.kind().is_some_and(ValueKind::is_plain_scalar)
    }

    pub fn as_custom<T: CustomType>(&self) -> Option<&T> {
        match self {
            Value::Custom(custom) => custom.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<PrimitiveDateTime> for Value {
    fn from(value: PrimitiveDateTime) -> Self {
        Value::DateTime(DateTime::Naive(value))
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Value::DateTime(DateTime::Offset(value))
    }
}

impl From<Date> for Value {
    fn from(value: Date) -> Self {
        Value::Date(value)
    }
}

impl From<Time> for Value {
    fn from(value: Time) -> Self {
        Value::Time(value)
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Value::Duration(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::{CustomValue, TypeKey, Value, ValueKind};
    use time::macros::{date, datetime};

    #[derive(Debug, PartialEq)]
    struct Celsius(f64);

    #[derive(Debug, PartialEq)]
    struct Kelvin(f64);

    #[test]
    fn plain_scalars_are_classified() {
        assert!(Value::Null.is_plain_scalar());
        assert!(Value::from("x").is_plain_scalar());
        assert!(Value::from(3).is_plain_scalar());
        assert!(!Value::from(date!(2024 - 01 - 02)).is_plain_scalar());
        assert!(!Value::List(Vec::new()).is_plain_scalar());
    }

    #[test]
    fn timestamp_and_date_have_distinct_keys() {
        let ts = Value::from(datetime!(2024-01-02 03:04:05));
        let day = Value::from(date!(2024 - 01 - 02));
        assert_eq!(ts.type_key(), TypeKey::Builtin(ValueKind::DateTime));
        assert_eq!(day.type_key(), TypeKey::Builtin(ValueKind::Date));
        assert_ne!(ts, day);
    }

    #[test]
    fn custom_values_compare_by_type_then_value() {
        let a = CustomValue::new(Celsius(1.5));
        let b = CustomValue::new(Celsius(1.5));
        let c = CustomValue::new(Kelvin(1.5));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(Value::Custom(a).type_key(), TypeKey::of::<Celsius>());
    }

    #[test]
    fn custom_type_name_is_concrete() {
        let value = Value::custom(Kelvin(0.0));
        assert!(value.type_name().ends_with("Kelvin"));
        assert!(value.as_custom::<Kelvin>().is_some());
        assert!(value.as_custom::<Celsius>().is_none());
    }

    #[test]
    fn option_none_maps_to_null() {
        let missing: Option<i64> = None;
        assert_eq!(Value::from(missing), Value::Null);
        assert_eq!(Value::from(Some(4)), Value::Int(4));
    }
}
