use async_trait::async_trait;

use super::error::StorageError;

/// Blob storage addressed by bucket and key.
///
/// The system never writes the same key twice: keys are derived from dataset
/// identity, so implementations need no ordering guarantees between
/// concurrent puts to one key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the bucket if it does not exist.
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Store bytes under `bucket`/`key` and return the object etag.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Retrieve all bytes for an object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;
}
