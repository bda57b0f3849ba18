//! Interfaces supplied by the hosting secrets runtime.
//!
//! The runtime owns durable storage, lease scheduling and the request
//! surface. This module models the parts the backend touches: a key-value
//! [`Storage`], the [`Secret`] lease wrapper with its opaque internal data,
//! and the [`Response`] returned from every operation.

use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// A raw storage record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Storage key
    pub key: String,
    /// Encoded value
    pub value: Vec<u8>,
}

impl StorageEntry {
    /// Encode `value` as JSON under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn json<T: Serialize>(key: impl Into<String>, value: &T) -> BackendResult<Self> {
        Ok(Self {
            key: key.into(),
            value: serde_json::to_vec(value)?,
        })
    }

    /// Decode the stored JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not valid JSON for `T`.
    pub fn decode_json<T: DeserializeOwned>(&self) -> BackendResult<T> {
        Ok(serde_json::from_slice(&self.value)?)
    }
}

/// Durable key-value storage provided by the runtime.
///
/// Implementations provide per-key atomicity; the backend adds no locking
/// around stored records.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the entry stored at `key`.
    async fn get(&self, key: &str) -> BackendResult<Option<StorageEntry>>;

    /// Insert or replace an entry.
    async fn put(&self, entry: StorageEntry) -> BackendResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> BackendResult<()>;

    /// List keys directly under `prefix`, with the prefix stripped.
    ///
    /// Nested keys are returned once as `segment/`.
    async fn list(&self, prefix: &str) -> BackendResult<Vec<String>>;
}

/// In-process [`Storage`] backed by a sorted map.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get(&self, key: &str) -> BackendResult<Option<StorageEntry>> {
        Ok(self.entries.read().await.get(key).map(|value| StorageEntry {
            key: key.to_string(),
            value: value.clone(),
        }))
    }

    async fn put(&self, entry: StorageEntry) -> BackendResult<()> {
        if entry.key.is_empty() {
            return Err(BackendError::storage("storage key must not be empty"));
        }
        self.entries.write().await.insert(entry.key, entry.value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> BackendResult<Vec<String>> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = Vec::new();

        for key in entries.keys().filter(|k| k.starts_with(prefix)) {
            let rest = &key[prefix.len()..];
            let item = match rest.find('/') {
                Some(idx) => &rest[..=idx],
                None => rest,
            };
            if !item.is_empty() && keys.last().map(String::as_str) != Some(item) {
                keys.push(item.to_string());
            }
        }

        Ok(keys)
    }
}

/// Operation requested by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Write to a path that does not exist yet
    Create,
    /// Read a path
    Read,
    /// Write to an existing path
    Update,
    /// Delete a path
    Delete,
    /// List keys under a path
    List,
    /// Extend a lease
    Renew,
    /// End a lease
    Revoke,
}

/// Caller-supplied request fields.
#[derive(Debug, Clone, Default)]
pub struct FieldData {
    raw: Map<String, Value>,
}

impl From<Map<String, Value>> for FieldData {
    fn from(raw: Map<String, Value>) -> Self {
        Self { raw }
    }
}

impl FieldData {
    /// Create an empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.raw.insert(key.to_string(), value.into());
        self
    }

    /// String field.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the field is not a string.
    pub fn get_str(&self, key: &str) -> BackendResult<Option<String>> {
        match self.raw.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(BackendError::validation(format!(
                "field {key} must be a string, got {other}"
            ))),
        }
    }

    /// Integer field. Numeric strings are accepted.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the field is not an integer.
    pub fn get_int(&self, key: &str) -> BackendResult<Option<i64>> {
        let invalid = || BackendError::validation(format!("field {key} must be an integer"));
        match self.raw.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(invalid),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid()),
            Some(_) => Err(invalid()),
        }
    }

    /// Duration field. Integers and numeric strings are seconds; other
    /// strings are humantime durations such as `90m` or `1h 30m`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for negative or unparsable values.
    pub fn get_duration_secs(&self, key: &str) -> BackendResult<Option<Duration>> {
        let invalid = || BackendError::validation(format!("field {key} must be a duration"));
        match self.raw.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(|s| Some(Duration::from_secs(s))).ok_or_else(invalid),
            Some(Value::String(s)) => {
                let s = s.trim();
                s.parse::<u64>()
                    .map(Duration::from_secs)
                    .or_else(|_| humantime::parse_duration(s))
                    .map(Some)
                    .map_err(|_| invalid())
            }
            Some(_) => Err(invalid()),
        }
    }
}

/// A leased secret handed to the runtime.
///
/// `internal_data` is never shown to the caller; the runtime returns it
/// verbatim on renew and revoke.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Secret {
    /// Secret type, used to route renew and revoke
    pub secret_type: String,
    /// Lease TTL; zero defers to the runtime default
    pub ttl: Duration,
    /// Lease maximum TTL; zero defers to the runtime default
    pub max_ttl: Duration,
    /// Opaque data round-tripped by the runtime
    pub internal_data: Map<String, Value>,
}

impl Secret {
    /// Create a secret of the given type.
    #[must_use]
    pub fn new(secret_type: impl Into<String>, internal_data: Map<String, Value>) -> Self {
        Self {
            secret_type: secret_type.into(),
            internal_data,
            ..Self::default()
        }
    }

    /// Required string value from the internal data.
    ///
    /// # Errors
    ///
    /// Returns a malformed secret error if the key is missing or not a string.
    pub fn internal_str(&self, key: &str) -> BackendResult<&str> {
        self.optional_internal_str(key)?.ok_or_else(|| {
            BackendError::malformed_secret(format!("secret is missing {key} internal data"))
        })
    }

    /// Optional string value from the internal data.
    ///
    /// # Errors
    ///
    /// Returns a malformed secret error if the key is present but not a string.
    pub fn optional_internal_str(&self, key: &str) -> BackendResult<Option<&str>> {
        match self.internal_data.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(BackendError::malformed_secret(format!(
                "invalid value for {key} in secret internal data"
            ))),
        }
    }
}

/// Result of a backend operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// Data returned to the caller
    pub data: Map<String, Value>,
    /// Lease to track, if the operation produced one
    pub secret: Option<Secret>,
    /// Caller-facing error message
    pub error: Option<String>,
}

impl Response {
    /// Response carrying `data`.
    #[must_use]
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Response reporting a caller error.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Response listing `keys`.
    #[must_use]
    pub fn list(keys: Vec<String>) -> Self {
        let mut data = Map::new();
        data.insert(
            "keys".to_string(),
            Value::Array(keys.into_iter().map(Value::String).collect()),
        );
        Self::with_data(data)
    }

    /// Whether this is an error response.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
