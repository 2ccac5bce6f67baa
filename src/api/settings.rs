//! Purpose: Persist typed values by key, pairing a `Codec` with a `Store`.
//! Exports: `Settings`.
//! Role: What the CLI `get`/`set`/`list` commands run through.
//! Invariants: Values are stored as codec wire text; stores never see a `Value`.
//! Invariants: Every error that concerns a key carries that key.
#![allow(clippy::result_large_err)]

use super::store::{ApiResult, Store};
use crate::core::codec::Codec;
use crate::core::value::Value;

pub struct Settings<S: Store> {
    store: S,
    codec: Codec,
}

impl<S: Store> Settings<S> {
    /// Settings over `store` using the global codec.
    pub fn new(store: S) -> Self {
        Self::with_codec(store, Codec::global().clone())
    }

    pub fn with_codec(store: S, codec: Codec) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Decoded value for `key`, or `None` when nothing is stored.
    pub fn get(&self, key: &str) -> ApiResult<Option<Value>> {
        let Some(bytes) = self.store.read(key)? else {
            return Ok(None);
        };
        self.codec
            .decode_bytes(&bytes)
            .map(Some)
            .map_err(|err| err.with_key(key))
    }

    pub fn get_or(&self, key: &str, default: Value) -> ApiResult<Value> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn set(&self, key: &str, value: &Value) -> ApiResult<()> {
        let text = self.codec.encode(value).map_err(|err| err.with_key(key))?;
        self.store.write(key, text.as_bytes())
    }

    pub fn keys(&self) -> ApiResult<Vec<String>> {
        self.store.keys()
    }
}
