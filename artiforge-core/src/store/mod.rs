//! Storage collaborator abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`StorageEntry`] - A single key/value record as handed to a storage backend
//! - [`Storage`] - Trait for the per-mount storage view supplied by the host
//! - [`MemoryStorage`] - In-memory implementation for testing
//! - [`FileStorage`] - File-per-key implementation used by the daemon
//!
//! # Storage Key Convention
//!
//! Keys are logical paths such as `config/admin`. Every backend must make
//! `put` of a single key atomic: a concurrent reader sees either the old
//! entry or the new one, never a mix.
//!
//! # Example
//!
//! ```rust,ignore
//! use artiforge_core::store::{MemoryStorage, Storage, StorageEntry};
//!
//! let storage = MemoryStorage::new();
//! storage.put(StorageEntry::new("config/admin", b"{}".to_vec())).await.unwrap();
//!
//! let entry = storage.get("config/admin").await.unwrap();
//! assert!(entry.is_some());
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is zeroed when the secret is dropped.
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the wrapped value is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O error in a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The key cannot be mapped onto the backend (e.g. escapes the root).
    #[error("invalid storage key: {key}")]
    InvalidKey { key: String },
}

/// A single stored record.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Logical key, e.g. `config/admin`.
    pub key: String,

    /// Raw value bytes.
    pub value: Vec<u8>,
}

impl StorageEntry {
    /// Create an entry from raw bytes.
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Create an entry holding the JSON encoding of `value`.
    pub fn json<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self, StoreError> {
        Ok(Self::new(key, serde_json::to_vec(value)?))
    }

    /// Decode the entry's JSON value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(&self.value)?)
    }
}

// Values routinely hold serialized secrets.
impl std::fmt::Debug for StorageEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEntry")
            .field("key", &self.key)
            .field("value_len", &self.value.len())
            .finish()
    }
}

/// The storage view the host hands to the backend.
///
/// Implementations include:
/// - [`MemoryStorage`] - In-memory storage for testing
/// - [`FileStorage`] - One file per key under a root directory
#[async_trait]
pub trait Storage: Send + Sync {
    /// Retrieve an entry by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, StoreError>;

    /// Store an entry, replacing any existing value as a single unit.
    async fn put(&self, entry: StorageEntry) -> Result<(), StoreError>;

    /// Delete an entry by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: Storage + ?Sized> Storage for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, StoreError> {
        (**self).get(key).await
    }

    async fn put(&self, entry: StorageEntry) -> Result<(), StoreError> {
        (**self).put(entry).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}
