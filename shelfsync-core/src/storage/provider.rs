//! Flat key-value storage underneath the fallback backend

use super::StorageResult;
use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

/// Abstract key-value store.
///
/// Values are opaque byte blobs addressed by a relative key.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Read the value at `key`; `NotFound` if nothing was ever written
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Replace the value at `key`
    async fn write(&self, key: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Check if a value exists at `key`
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Local filesystem storage provider, one file per key
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage provider with the given root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Safely resolve a key, preventing path traversal attacks
    fn full_path(&self, key: &str) -> StorageResult<PathBuf> {
        let mut normalized = PathBuf::new();
        for component in Path::new(key).components() {
            match component {
                Component::Normal(c) => normalized.push(c),
                Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) | Component::RootDir => {
                    return Err(StorageError::Unavailable(
                        "Path traversal attempt detected".to_string(),
                    ));
                }
            }
        }

        Ok(self.root.join(normalized))
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let full_path = self.full_path(key)?;
        match tokio::fs::read(full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a temp file then renames to avoid partial writes
    async fn write(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        let full_path = self.full_path(key)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut temp_name = full_path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        tokio::fs::write(&temp_path, data).await?;
        tokio::fs::rename(&temp_path, &full_path).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let full_path = self.full_path(key)?;
        Ok(tokio::fs::try_exists(full_path).await?)
    }
}

/// In-memory storage provider (for testing and ephemeral sessions)
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("memory store lock poisoned".to_string())
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.data
            .read()
            .map_err(|_| poisoned())?
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        self.data
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.read().map_err(|_| poisoned())?.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();

        storage.write("lists.json", b"[]".to_vec()).await.unwrap();
        assert_eq!(storage.read("lists.json").await.unwrap(), b"[]");

        assert!(storage.exists("lists.json").await.unwrap());
        assert!(!storage.exists("books.json").await.unwrap());
        assert!(matches!(
            storage.read("books.json").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("kv"));

        assert!(matches!(
            storage.read("books.json").await,
            Err(StorageError::NotFound(_))
        ));

        storage.write("books.json", b"{}".to_vec()).await.unwrap();
        storage.write("books.json", b"{\"a\":1}".to_vec()).await.unwrap();
        assert_eq!(storage.read("books.json").await.unwrap(), b"{\"a\":1}");
        assert!(!dir.path().join("kv/books.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_local_storage_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.read("../etc/passwd").await.is_err());
        assert!(storage.write("/abs.json", vec![]).await.is_err());
    }
}
