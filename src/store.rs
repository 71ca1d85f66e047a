//! Durable raw object store used by the `store` stage.
//!
//! Payloads are content-addressed by their SHA-256 digest, so resubmitting
//! identical bytes reuses the existing object. The store itself is a
//! collaborator behind [`ObjectStore`]; the filesystem implementation here
//! is the default backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Storage backend for raw submission bytes.
///
/// Implementations must be safe to call from concurrent ingestions.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist `payload` and return its content-addressed key.
    ///
    /// Writing the same bytes twice returns the same key.
    async fn put(&self, payload: &[u8]) -> Result<String>;

    /// Fetch previously stored bytes by key.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// Filesystem-backed object store.
///
/// Objects live under `root/<k0k1>/<key>` where `k0k1` is the first two hex
/// characters of the key, keeping directory fan-out bounded.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let prefix = &key[..2.min(key.len())];
        self.root.join(prefix).join(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, payload: &[u8]) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        let key = format!("{:x}", hasher.finalize());

        let path = self.object_path(&key);
        if path.exists() {
            return Ok(key);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create object directory: {}", parent.display()))?;
        }

        // Write to a sibling temp file, then rename. Readers never observe a
        // partially written object.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, payload)
            .await
            .with_context(|| format!("Failed to write object: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to finalize object: {}", path.display()))?;

        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("object not found: {}", key))
    }
}
