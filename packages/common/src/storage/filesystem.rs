use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::error::StorageError;
use super::hash::Checksum;
use super::traits::ObjectStore;

/// Filesystem-backed object store.
///
/// Objects live at `{root}/{bucket}/{key}`; key segments map to
/// subdirectories. Writes go through a temp file and a rename so readers
/// never observe a partial object. The reported etag is the SHA-256 hex of
/// the stored bytes.
pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    /// Create a new filesystem object store rooted at `root`.
    pub async fn new(root: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self { root })
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_segment(bucket)?;
        validate_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }

    fn temp_path(&self) -> PathBuf {
        self.root.join(".tmp").join(uuid::Uuid::new_v4().to_string())
    }
}

/// Reject empty segments and anything that could escape the store root.
fn validate_segment(segment: &str) -> Result<(), StorageError> {
    if segment.is_empty() {
        return Err(StorageError::InvalidKey("empty path segment".into()));
    }
    if segment == "." || segment == ".." {
        return Err(StorageError::InvalidKey(format!(
            "traversal segment '{segment}'"
        )));
    }
    if segment.contains(['\\', '\0']) {
        return Err(StorageError::InvalidKey(
            "segment contains forbidden characters".into(),
        ));
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".into()));
    }
    for segment in key.split('/') {
        validate_segment(segment)?;
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        validate_segment(bucket)?;
        fs::create_dir_all(self.root.join(bucket)).await?;
        Ok(())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let object_path = self.object_path(bucket, key)?;
        let etag = Checksum::compute(data).to_hex();

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(etag)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let object_path = self.object_path(bucket, key)?;
        match fs::read(&object_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_exists(root: &Path, bucket: &str, key: &str) -> bool {
        root.join(bucket).join(key).exists()
    }

    async fn temp_store() -> (FilesystemObjectStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path().join("objects"))
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (store, _dir) = temp_store().await;
        let data = b"id,total\n1,10\n";
        store.ensure_bucket("uploads").await.unwrap();
        let etag = store
            .put("uploads", "datasets/d1/source/a.csv", data, "text/csv")
            .await
            .unwrap();
        assert_eq!(etag, Checksum::compute(data).to_hex());

        let retrieved = store.get("uploads", "datasets/d1/source/a.csv").await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn put_creates_nested_key_directories() {
        let (store, dir) = temp_store().await;
        store
            .put("reports", "datasets/d1/report/report.json", b"{}", "application/json")
            .await
            .unwrap();
        assert!(object_exists(
            &dir.path().join("objects"),
            "reports",
            "datasets/d1/report/report.json"
        ));
    }

    #[tokio::test]
    async fn get_missing_object_is_not_found() {
        let (store, _dir) = temp_store().await;
        let result = store.get("uploads", "datasets/missing/source/x.csv").await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (store, _dir) = temp_store().await;
        for key in ["../escape", "a/../b", "a//b", ""] {
            let result = store.put("uploads", key, b"x", "text/csv").await;
            assert!(
                matches!(result, Err(StorageError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
        let result = store.get("..", "key").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn ensure_bucket_is_idempotent() {
        let (store, _dir) = temp_store().await;
        store.ensure_bucket("uploads").await.unwrap();
        store.ensure_bucket("uploads").await.unwrap();
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        // The system never rewrites a key, but the store itself is
        // last-writer-wins rather than erroring.
        let (store, _dir) = temp_store().await;
        store.put("uploads", "k", b"v1", "text/csv").await.unwrap();
        store.put("uploads", "k", b"v2", "text/csv").await.unwrap();
        assert_eq!(store.get("uploads", "k").await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn concurrent_puts_distinct_keys() {
        let (store, _dir) = temp_store().await;
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .put("uploads", &format!("datasets/d{i}/source/f.csv"), b"data", "text/csv")
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }
}
