//! Session state store: durable key-value storage behind every component.
//!
//! Implementations may fail at any time (quota, privacy mode, missing disk).
//! Components never see those failures directly; they go through [`StoreExt`],
//! which logs and degrades a failed read to "no prior state" and a failed
//! write to "not persisted this time".
use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Errors a store backend can report.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable JSON key-value storage.
///
/// Methods take `&self`; backends use interior mutability so the store can be
/// shared by the components of a single-threaded session.
pub trait Store {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

impl<S: Store + ?Sized> Store for &S {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

impl<S: Store + ?Sized> Store for Rc<S> {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

/// Typed, failure-tolerant helpers layered over any [`Store`].
pub trait StoreExt: Store {
    /// Load and decode `key`. Missing keys, backend failures, and values of
    /// the wrong shape all read as `None`.
    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(err) => {
                warn!("store read for {key} failed: {err}");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!("stored value for {key} has an unexpected shape: {err}");
                None
            }
        }
    }

    /// Encode and write `value`. Returns `false` when it was not persisted.
    fn persist<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let encoded = match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("could not encode {key}: {err}");
                return false;
            }
        };
        match self.set(key, encoded) {
            Ok(()) => true,
            Err(err) => {
                warn!("store write for {key} failed, continuing in memory: {err}");
                false
            }
        }
    }

    /// Shallow-merge the fields of `patch` into the object stored at `key`.
    ///
    /// A missing or non-object value is replaced by the patch fields. Returns
    /// the merged value whether or not it could be written back.
    fn merge(&self, key: &str, patch: Map<String, Value>) -> Value {
        let mut base = match self.load::<Value>(key) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (field, value) in patch {
            base.insert(field, value);
        }
        let merged = Value::Object(base);
        self.persist(key, &merged);
        merged
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// In-memory store. Clones share the same backing map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, Value>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value currently held under `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }
}

/// A store whose every call fails, standing in for denied storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl Store for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
        Err(StoreError::Unavailable("storage access denied".to_string()))
    }

    fn set(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("storage access denied".to_string()))
    }
}
