//! Purpose: Own the ordered mapping between value types and envelope markers.
//! Exports: `Registry`, `TypeEntry`, `EncodeFn`, `DecodeFn`, `CoversFn`, `DEFAULT_MARKER`.
//! Role: Shared lookup table consulted by every codec holding the same `Arc<Registry>`.
//! Invariants: Markers are unique, non-empty, and never equal `DEFAULT_MARKER`.
//! Invariants: Type keys are unique; the first registration for a key wins.
//! Invariants: Encode lookup walks entries in registration order; first match wins.
//! Invariants: Once sealed (first encode/decode), registration is rejected.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde_json::Value as JsonValue;

use crate::core::builtin;
use crate::core::error::{Error, ErrorKind};
use crate::core::value::{CustomType, TypeKey, Value};

/// Reserved marker for plain JSON scalars.
pub const DEFAULT_MARKER: &str = "default";

pub type EncodeFn = Arc<dyn Fn(&Value) -> Result<JsonValue, Error> + Send + Sync>;
pub type DecodeFn = Arc<dyn Fn(&JsonValue) -> Result<Value, Error> + Send + Sync>;
pub type CoversFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// One marker's encoder and decoder.
///
/// Decoders receive the envelope's raw `__value__` JSON. Envelopes nested inside that payload
/// are not reconstructed first; an entry whose payload holds other typed values decodes them
/// itself, for example through `Codec::decode_json`.
#[derive(Clone)]
pub struct TypeEntry {
    key: TypeKey,
    type_name: &'static str,
    marker: String,
    covers: Option<CoversFn>,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl TypeEntry {
    pub fn new(
        key: TypeKey,
        type_name: &'static str,
        marker: impl Into<String>,
        encode: impl Fn(&Value) -> Result<JsonValue, Error> + Send + Sync + 'static,
        decode: impl Fn(&JsonValue) -> Result<Value, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            key,
            type_name,
            marker: marker.into(),
            covers: None,
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    /// Entry for a caller-defined type, with typed encode/decode closures.
    ///
    /// `decode` gets the raw `__value__` JSON, inner envelopes included.
    pub fn custom<T: CustomType>(
        marker: impl Into<String>,
        encode: impl Fn(&T) -> Result<JsonValue, Error> + Send + Sync + 'static,
        decode: impl Fn(&JsonValue) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Self {
        let marker = marker.into();
        let encode_marker = marker.clone();
        Self::new(
            TypeKey::of::<T>(),
            std::any::type_name::<T>(),
            marker,
            move |value: &Value| match value.as_custom::<T>() {
                Some(typed) => encode(typed),
                None => Err(Error::new(ErrorKind::InvalidValue)
                    .with_message("entry encoder received a value of another type")
                    .with_marker(encode_marker.clone())
                    .with_type_name(value.type_name())),
            },
            move |payload: &JsonValue| decode(payload).map(Value::custom),
        )
    }

    /// Also match values the predicate accepts, ahead of any later entry.
    ///
    /// The encoder must then handle every value the predicate admits.
    pub fn covering(mut self, covers: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.covers = Some(Arc::new(covers));
        self
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn matches(&self, value: &Value) -> bool {
        value.type_key() == self.key || self.covers.as_ref().is_some_and(|covers| covers(value))
    }

    pub fn encode(&self, value: &Value) -> Result<JsonValue, Error> {
        (self.encode)(value)
    }

    pub fn decode(&self, payload: &JsonValue) -> Result<Value, Error> {
        (self.decode)(payload)
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("key", &self.key)
            .field("type_name", &self.type_name)
            .field("marker", &self.marker)
            .field("covers", &self.covers.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Table {
    entries: Vec<Arc<TypeEntry>>,
    by_marker: HashMap<String, usize>,
    keys: HashSet<TypeKey>,
}

#[derive(Default)]
pub struct Registry {
    table: RwLock<Table>,
    sealed: AtomicBool,
}

impl Registry {
    /// Empty, unsealed registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in temporal, decimal, uuid, and duration entries.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for entry in builtin::entries() {
            let registered = registry.register(entry);
            debug_assert!(registered.is_ok(), "built-in entry rejected: {registered:?}");
            if let Err(err) = registered {
                tracing::error!(error = %err, "built-in entry rejected");
            }
        }
        registry
    }

    /// Process-wide registry with built-ins, created on first access.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(Registry::with_builtins()))
            .clone()
    }

    pub fn register(&self, entry: TypeEntry) -> Result<(), Error> {
        let marker = entry.marker.clone();
        if marker.is_empty() {
            return Err(Error::new(ErrorKind::Registration).with_message("marker must be specified"));
        }
        if marker == DEFAULT_MARKER {
            return Err(Error::new(ErrorKind::Registration)
                .with_message("marker is reserved for plain JSON values")
                .with_marker(marker));
        }

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if self.is_sealed() {
            return Err(Error::new(ErrorKind::Registration)
                .with_message("registry is sealed; register types before the first encode or decode")
                .with_marker(marker)
                .with_type_name(entry.type_name));
        }
        if table.by_marker.contains_key(&marker) {
            return Err(Error::new(ErrorKind::Registration)
                .with_message("marker already registered")
                .with_marker(marker));
        }
        if table.keys.contains(&entry.key) {
            return Err(Error::new(ErrorKind::Registration)
                .with_message("type already registered")
                .with_marker(marker)
                .with_type_name(entry.type_name));
        }

        tracing::debug!(marker = %marker, type_name = entry.type_name, "registered type");
        let index = table.entries.len();
        table.keys.insert(entry.key);
        table.by_marker.insert(marker, index);
        table.entries.push(Arc::new(entry));
        Ok(())
    }

    /// Shorthand for `register(TypeEntry::custom(...))`.
    pub fn register_type<T: CustomType>(
        &self,
        marker: impl Into<String>,
        encode: impl Fn(&T) -> Result<JsonValue, Error> + Send + Sync + 'static,
        decode: impl Fn(&JsonValue) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.register(TypeEntry::custom(marker, encode, decode))
    }

    /// First entry, in registration order, that matches the value.
    pub fn lookup(&self, value: &Value) -> Option<Arc<TypeEntry>> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .entries
            .iter()
            .find(|entry| entry.matches(value))
            .cloned()
    }

    pub fn decoder(&self, marker: &str) -> Option<Arc<TypeEntry>> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .by_marker
            .get(marker)
            .and_then(|index| table.entries.get(*index))
            .cloned()
    }

    pub fn markers(&self) -> Vec<String> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .entries
            .iter()
            .map(|entry| entry.marker.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn seal(&self) {
        if !self.sealed.swap(true, Ordering::AcqRel) {
            tracing::debug!(entries = self.len(), "registry sealed");
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("markers", &self.markers())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_MARKER, Registry, TypeEntry};
    use crate::core::builtin;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::value::{TypeKey, Value, ValueKind};
    use serde_json::json;
    use time::macros::{date, datetime};

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i64,
        y: i64,
    }

    #[derive(Debug, PartialEq)]
    struct Other;

    fn point_entry(marker: &str) -> TypeEntry {
        TypeEntry::custom::<Point>(
            marker,
            |point| Ok(json!([point.x, point.y])),
            |payload| {
                let pair = payload
                    .as_array()
                    .filter(|items| items.len() == 2)
                    .ok_or_else(|| Error::new(ErrorKind::InvalidValue))?;
                Ok(Point {
                    x: pair[0].as_i64().unwrap_or_default(),
                    y: pair[1].as_i64().unwrap_or_default(),
                })
            },
        )
    }

    #[test]
    fn builtins_register_in_documented_order() {
        let registry = Registry::with_builtins();
        assert_eq!(
            registry.markers(),
            vec!["datetime", "date", "time", "decimal", "uuid", "timedelta"]
        );
        assert!(!registry.is_sealed());
    }

    #[test]
    fn builtins_fill_a_fresh_registry() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.len(), builtin::entries().len());
        for marker in registry.markers() {
            assert!(registry.decoder(&marker).is_some(), "{marker}");
        }
    }

    #[test]
    fn empty_marker_is_rejected() {
        let registry = Registry::new();
        let err = registry.register(point_entry("")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registration);
        assert!(registry.is_empty());
    }

    #[test]
    fn reserved_marker_is_rejected() {
        let registry = Registry::new();
        let err = registry.register(point_entry(DEFAULT_MARKER)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registration);
        assert_eq!(err.marker(), Some("default"));
    }

    #[test]
    fn duplicate_marker_is_rejected() {
        let registry = Registry::with_builtins();
        let err = registry.register(point_entry("uuid")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registration);
        assert_eq!(err.marker(), Some("uuid"));
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn duplicate_type_is_rejected_and_first_wins() {
        let registry = Registry::new();
        registry.register(point_entry("point")).expect("first");
        let err = registry.register(point_entry("point2")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registration);
        let entry = registry
            .lookup(&Value::custom(Point { x: 1, y: 2 }))
            .expect("entry");
        assert_eq!(entry.marker(), "point");
        assert!(registry.decoder("point2").is_none());
    }

    #[test]
    fn sealed_registry_rejects_registration() {
        let registry = Registry::new();
        registry.seal();
        let err = registry.register(point_entry("point")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registration);
        assert_eq!(err.marker(), Some("point"));
        assert!(registry.is_empty());
    }

    #[test]
    fn lookup_distinguishes_timestamp_from_date() {
        let registry = Registry::with_builtins();
        let ts = registry
            .lookup(&Value::from(datetime!(2024-01-02 03:04:05)))
            .expect("datetime entry");
        let day = registry
            .lookup(&Value::from(date!(2024 - 01 - 02)))
            .expect("date entry");
        assert_eq!(ts.marker(), "datetime");
        assert_eq!(day.marker(), "date");
    }

    #[test]
    fn covering_entry_registered_first_wins() {
        let registry = Registry::new();
        let wide = TypeEntry::new(
            TypeKey::Builtin(ValueKind::Int),
            "int",
            "number",
            |value| match value {
                Value::Int(n) => Ok(json!(n)),
                Value::Custom(_) => Ok(json!(0)),
                _ => Err(Error::new(ErrorKind::InvalidValue)),
            },
            |payload| Ok(Value::Int(payload.as_i64().unwrap_or_default())),
        )
        .covering(|value| value.as_custom::<Other>().is_some());
        registry.register(wide).expect("wide");
        registry
            .register_type::<Other>("other", |_| Ok(json!(null)), |_| Ok(Other))
            .expect("other");

        let entry = registry.lookup(&Value::custom(Other)).expect("entry");
        assert_eq!(entry.marker(), "number");
        assert!(registry.lookup(&Value::from("text")).is_none());
    }

    #[test]
    fn custom_entry_encoder_rejects_foreign_values() {
        let entry = point_entry("point");
        let err = entry.encode(&Value::Int(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(err.type_name(), Some("int"));
    }
}
