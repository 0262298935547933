//! File-backed storage implementation.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Storage, StorageEntry, StoreError};

/// Storage that keeps one file per key under a root directory.
///
/// The key `config/admin` lives at `<root>/config/admin`. Writes go to a
/// temporary file in the same directory which is then renamed over the
/// target, so a reader sees either the previous value or the new one.
///
/// # Example
///
/// ```rust,ignore
/// use artiforge_core::store::FileStorage;
///
/// let storage = FileStorage::new("/var/lib/artiforge/storage")?;
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a logical key onto a path below the root.
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment.starts_with('.') {
                return Err(StoreError::InvalidKey {
                    key: key.to_string(),
                });
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(value) => Ok(Some(StorageEntry::new(key, value))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, entry: StorageEntry) -> Result<(), StoreError> {
        let path = self.path_for(&entry.key)?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &entry.value))
            .await
            .map_err(|e| StoreError::BackendError {
                message: format!("write task failed: {}", e),
            })?
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_atomic(path: &Path, value: &[u8]) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| StoreError::InvalidKey {
        key: path.display().to_string(),
    })?;
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(value)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
