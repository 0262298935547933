//! Persistence of the admin configuration record.
//!
//! The record lives under a single key, [`CONFIG_ADMIN_KEY`]. Every write
//! replaces the whole entry, so a concurrent reader sees either the previous
//! record or the new one. Concurrent updates are last-write-wins.
//!
//! # Example
//!
//! ```rust,ignore
//! use artiforge_core::{ConfigStore, MemoryStorage};
//!
//! let store = ConfigStore::new(MemoryStorage::new());
//! assert!(store.get().await?.is_none());
//! ```

use tracing::{debug, info};

use crate::client::ConnectionParams;
use crate::config::{AdminConfiguration, CachedRootCert, ConfigDelta};
use crate::error::BackendError;
use crate::store::{Storage, StorageEntry, StoreError};

/// Storage key of the admin configuration.
pub const CONFIG_ADMIN_KEY: &str = "config/admin";

/// Owns the admin configuration record inside a storage view.
pub struct ConfigStore<S: Storage> {
    storage: S,
}

impl<S: Storage> ConfigStore<S> {
    /// Wrap a storage view.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load the record. `Ok(None)` means the backend is not configured.
    pub async fn get(&self) -> Result<Option<AdminConfiguration>, StoreError> {
        match self.storage.get(CONFIG_ADMIN_KEY).await? {
            Some(entry) => Ok(Some(entry.decode()?)),
            None => Ok(None),
        }
    }

    /// Load the record, treating absence as [`BackendError::NotConfigured`].
    pub async fn require(&self) -> Result<AdminConfiguration, BackendError> {
        self.get().await?.ok_or(BackendError::NotConfigured)
    }

    /// Merge `delta` onto `existing` (creating the record if it is `None`)
    /// and write the result back as one entry.
    ///
    /// `existing` must be the snapshot the delta was validated against, so
    /// the merged record is the one the validator approved. A concurrent
    /// write between that read and this one is overwritten.
    pub async fn put(
        &self,
        existing: Option<AdminConfiguration>,
        delta: ConfigDelta,
    ) -> Result<AdminConfiguration, StoreError> {
        let created = existing.is_none();
        let config = AdminConfiguration::merge(existing, delta);

        self.write(&config).await?;
        if created {
            info!(url = %config.artifactory_url, "admin configuration created");
        } else {
            info!(url = %config.artifactory_url, "admin configuration updated");
        }
        Ok(config)
    }

    /// Remove the record. Deleting an absent record is not an error.
    pub async fn delete(&self) -> Result<(), StoreError> {
        self.storage.delete(CONFIG_ADMIN_KEY).await?;
        info!("admin configuration deleted");
        Ok(())
    }

    /// Attach a root certificate fetched with `fetched_with` to the stored
    /// record.
    ///
    /// Returns `Ok(None)` without writing when the record is gone or no
    /// longer points at the same URL and token.
    pub async fn set_root_cert(
        &self,
        cert: CachedRootCert,
        fetched_with: &ConnectionParams,
    ) -> Result<Option<AdminConfiguration>, StoreError> {
        let Some(mut config) = self.get().await? else {
            debug!("record deleted while fetching root certificate");
            return Ok(None);
        };
        if config.connection() != *fetched_with {
            debug!("record changed while fetching root certificate");
            return Ok(None);
        }

        config.root_cert = Some(cert);
        self.write(&config).await?;
        debug!("cached Artifactory root certificate");
        Ok(Some(config))
    }

    async fn write(&self, config: &AdminConfiguration) -> Result<(), StoreError> {
        let entry = StorageEntry::json(CONFIG_ADMIN_KEY, config)?;
        self.storage.put(entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStorage, Secret};
    use std::sync::Arc;

    fn first_delta() -> ConfigDelta {
        ConfigDelta {
            access_token: Some(Secret::new("test-access-token")),
            url: Some("http://myserver.com:80".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_absent_is_none() {
        let store = ConfigStore::new(MemoryStorage::new());
        assert!(store.get().await.unwrap().is_none());
        assert!(matches!(
            store.require().await,
            Err(BackendError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_put_creates_then_merges() {
        let store = ConfigStore::new(MemoryStorage::new());

        let created = store.put(None, first_delta()).await.unwrap();
        assert!(!created.use_expiring_tokens);

        let existing = store.get().await.unwrap();
        let updated = store
            .put(
                existing,
                ConfigDelta {
                    use_expiring_tokens: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(updated.use_expiring_tokens);
        assert_eq!(updated.access_token.expose(), "test-access-token");
        assert_eq!(store.get().await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_put_merges_onto_snapshot_not_current_state() {
        let store = ConfigStore::new(MemoryStorage::new());
        store.put(None, first_delta()).await.unwrap();

        let snapshot = store.get().await.unwrap();
        store.delete().await.unwrap();

        let config = store
            .put(
                snapshot,
                ConfigDelta {
                    use_expiring_tokens: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = store.get().await.unwrap().unwrap();
        assert_eq!(stored, config);
        assert_eq!(stored.access_token.expose(), "test-access-token");
        assert_eq!(stored.artifactory_url, "http://myserver.com:80");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = ConfigStore::new(MemoryStorage::new());
        store.put(None, first_delta()).await.unwrap();

        store.delete().await.unwrap();
        store.delete().await.unwrap();
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_root_cert_skips_missing_record() {
        let store = ConfigStore::new(MemoryStorage::new());
        let conn = AdminConfiguration::from_delta(first_delta()).connection();

        let result = store.set_root_cert(CachedRootCert::new("CERT"), &conn).await;
        assert!(result.unwrap().is_none());
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_root_cert_matching_record() {
        let store = ConfigStore::new(MemoryStorage::new());
        let config = store.put(None, first_delta()).await.unwrap();

        let updated = store
            .set_root_cert(CachedRootCert::new("CERT"), &config.connection())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.root_cert.unwrap().pem, "CERT");
    }

    #[tokio::test]
    async fn test_set_root_cert_skips_changed_record() {
        let store = ConfigStore::new(MemoryStorage::new());
        let original = store.put(None, first_delta()).await.unwrap();

        let moved = ConfigDelta {
            url: Some("https://other.example.com".to_string()),
            ..Default::default()
        };
        store.put(Some(original.clone()), moved).await.unwrap();

        let result = store
            .set_root_cert(CachedRootCert::new("OLD"), &original.connection())
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.get().await.unwrap().unwrap().root_cert.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_storage_error() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .put(StorageEntry::new(CONFIG_ADMIN_KEY, b"{oops".to_vec()))
            .await
            .unwrap();

        let store = ConfigStore::new(storage);
        assert!(matches!(
            store.get().await,
            Err(StoreError::SerializationError(_))
        ));
    }
}
