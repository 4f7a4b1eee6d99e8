//! Blob storage port and its MinIO/S3 implementation.

mod minio_store;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::Result;

pub use minio_store::MinioStore;

/// Callback fed with `(bytes_sent, bytes_total)` as a transfer advances.
pub type ProgressSink = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A sink that discards progress, for transfers nobody watches.
pub fn silent_progress() -> ProgressSink {
    Arc::new(|_, _| {})
}

/// Result of a completed blob transfer
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub key: String,
    pub size: i64,
    pub url: String,
}

/// Object-store port. The upload pipeline and directory service talk to this
/// trait; `MinioStore` is the production implementation.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Transfer `data` to the store under `key`, reporting progress along the
    /// way. The transfer runs to completion; callers decide afterwards
    /// whether to keep the blob.
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        progress: ProgressSink,
    ) -> Result<StoredBlob>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Publicly reachable URL for a stored blob
    fn url_for(&self, key: &str) -> String;
}
