//! Filesystem-backed `BlobStore`, grounded on the teacher's local disk
//! cache (`host/src/cache.rs`): a plain directory keyed by the caller's
//! key, used for local development and tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::{BlobStore, BlobStoreError, BlobStoreResult, PutOutcome};

pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> BlobStoreResult<PutOutcome> {
        let path = self.path_for(key);
        if let Some(parent) = Path::new(&path).parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(PutOutcome {
            public_url: self.public_url_for(key),
        })
    }

    async fn get(&self, key: &str) -> BlobStoreResult<Vec<u8>> {
        let path = self.path_for(key);
        fs::read(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BlobStoreError::NotFound(key.to_string()),
                _ => BlobStoreError::Io(e),
            })
    }

    async fn delete(&self, key: &str) -> BlobStoreResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobStoreError::Io(e)),
        }
    }

    fn public_url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "https://cdn.example.test");

        let outcome = store
            .put("u1/generations/g1/1.png", b"hello".to_vec(), "image/png")
            .await
            .unwrap();
        assert_eq!(outcome.public_url, "https://cdn.example.test/u1/generations/g1/1.png");

        let bytes = store.get("u1/generations/g1/1.png").await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "https://cdn.example.test");
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, BlobStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "https://cdn.example.test");
        store.delete("never-existed").await.unwrap();
        store
            .put("k", b"x".to_vec(), "image/png")
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(matches!(
            store.get("k").await.unwrap_err(),
            BlobStoreError::NotFound(_)
        ));
    }
}
