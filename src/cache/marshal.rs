//! Value codecs used by the Redis engine.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CacheError, Result};

// == Marshaler Trait ==
/// Turns values into bytes for remote storage and back.
///
/// Implement this to store values in a format other than JSON.
pub trait Marshaler<V>: Send + Sync {
    fn marshal(&self, value: &V) -> Result<Vec<u8>>;

    fn unmarshal(&self, bytes: &[u8]) -> Result<V>;
}

// == JSON Marshaler ==
/// Default codec backed by serde_json.
pub struct JsonMarshaler<V> {
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonMarshaler<V> {
    pub fn new() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<V> Default for JsonMarshaler<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for JsonMarshaler<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for JsonMarshaler<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonMarshaler")
    }
}

impl<V> Marshaler<V> for JsonMarshaler<V>
where
    V: Serialize + DeserializeOwned,
{
    fn marshal(&self, value: &V) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::Marshal(Box::new(e)))
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<V> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Unmarshal(Box::new(e)))
    }
}
