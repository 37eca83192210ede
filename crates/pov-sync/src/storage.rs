//! Blob storage port for uploaded documents

use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Object storage addressed by bucket and path
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-process blob storage
#[derive(Debug, Default)]
pub struct MemoryBlobStorage {
    blobs: DashMap<(String, String), StoredBlob>,
    failing: AtomicBool,
}

impl MemoryBlobStorage {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a transport error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn get(&self, bucket: &str, path: &str) -> Option<StoredBlob> {
        self.blobs
            .get(&(bucket.to_string(), path.to_string()))
            .map(|b| b.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Transport("storage unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.check()?;
        self.blobs.insert(
            (bucket.to_string(), path.to_string()),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StorageError> {
        self.check()?;
        self.blobs
            .remove(&(bucket.to_string(), path.to_string()))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })
    }
}
