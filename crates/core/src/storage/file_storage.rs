use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Storage, StorageError, StorageResult};

/// A file-based storage implementation.
///
/// Every mutation runs under a single write lock, so `compare_and_swap`
/// observes a stable value between its compare and its write. This gives
/// single-process atomicity; a networked deployment would back the trait
/// with a store that offers its own conditional write.
pub struct FileStorage {
    base_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStorage {
    /// Create a new file storage instance
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = base_path.into();

        if !path.exists() {
            fs::create_dir_all(&path).await?;
        }

        Ok(Self {
            base_path: path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Get the full path for a key
    fn get_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key.replace('/', &std::path::MAIN_SEPARATOR.to_string()))
    }

    async fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>> {
        let mut file = fs::File::open(path).await?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = fs::File::create(path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Recursive helper to list directory contents
    async fn list_directory(&self, dir_path: &Path) -> StorageResult<Vec<String>> {
        let mut result = Vec::new();

        let mut entries = fs::read_dir(dir_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.is_file() {
                if let Ok(rel_path) = path.strip_prefix(&self.base_path) {
                    let rel_path_str = rel_path
                        .to_string_lossy()
                        .replace(std::path::MAIN_SEPARATOR, "/");
                    result.push(rel_path_str);
                }
            } else if path.is_dir() {
                let sub_results = Box::pin(self.list_directory(&path)).await?;
                result.extend(sub_results);
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_file(&self.get_path(key), data).await?;
        debug!("Stored data at key: {}", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.get_path(key);
        if !path.exists() {
            return Err(StorageError::KeyNotFound(key.to_string()));
        }
        self.read_file(&path).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.get_path(key);
        if path.exists() {
            fs::remove_file(path).await?;
            debug!("Deleted key: {}", key);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get_path(key).exists())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let path = self.base_path.join(prefix);

        if !path.exists() {
            return Ok(Vec::new());
        }

        if !path.is_dir() {
            return Err(StorageError::NotADirectory(prefix.to_string()));
        }

        self.list_directory(&path).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;

        let path = self.get_path(key);
        let current = if path.exists() {
            Some(self.read_file(&path).await?)
        } else {
            None
        };

        if current.as_deref() != expected {
            return Ok(false);
        }

        self.write_file(&path, new).await?;
        debug!("Swapped data at key: {}", key);
        Ok(true)
    }

    fn base_path(&self) -> Option<PathBuf> {
        Some(self.base_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_storage_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).await.unwrap();

        storage.put("motions/1", b"payload").await.unwrap();
        assert_eq!(storage.get("motions/1").await.unwrap(), b"payload");
        assert!(storage.exists("motions/1").await.unwrap());

        let keys = storage.list("motions").await.unwrap();
        assert_eq!(keys, vec!["motions/1".to_string()]);

        storage.delete("motions/1").await.unwrap();
        assert!(!storage.exists("motions/1").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_storage_compare_and_swap() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).await.unwrap();

        assert!(storage.compare_and_swap("slot", None, b"a").await.unwrap());
        assert!(!storage.compare_and_swap("slot", None, b"b").await.unwrap());
        assert!(storage.compare_and_swap("slot", Some(b"a"), b"b").await.unwrap());
        assert_eq!(storage.get("slot").await.unwrap(), b"b");
    }
}
