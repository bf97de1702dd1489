//! TempFileStore (§4.C): an in-process registry coupling the synchronous
//! upload path to the Worker, so a just-uploaded reference image doesn't
//! need to be re-downloaded from blob storage.
//!
//! Grounded on `memory_backend.rs`'s `Mutex`-guarded map pattern, but with
//! the `LruCache`/capacity eviction dropped — the spec wants TTL-only
//! expiry, not a bounded cache — and no `lazy_static` global: per §9's
//! design notes ("wire singleton services as explicit collaborators held
//! by an application context"), the store is constructed once at boot and
//! passed around, not reached via a global.

mod error;

pub use error::{TempStoreError, TempStoreResult};

use chrono::{DateTime, Duration, Utc};
use imagegen_core::{TempFile, TempFileId, TempFileMetadata, DEFAULT_TEMP_FILE_TTL_SECS};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct TempFileStore {
    root_dir: PathBuf,
    registry: Mutex<HashMap<TempFileId, TempFile>>,
}

impl TempFileStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Copies `src_path` into a private, UUID-named entry and records it.
    /// Fresh UUIDs mean concurrent `store` calls never collide.
    pub async fn store(
        &self,
        src_path: &Path,
        metadata: TempFileMetadata,
        ttl: Option<Duration>,
    ) -> TempStoreResult<TempFileId> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let id = TempFileId::new();
        let ext = src_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let dest = self.root_dir.join(format!("{id}.{ext}"));
        tokio::fs::copy(src_path, &dest).await?;

        let ttl = ttl.unwrap_or_else(|| Duration::seconds(DEFAULT_TEMP_FILE_TTL_SECS));
        let entry = TempFile {
            id,
            local_path: dest,
            expires_at: Utc::now() + ttl,
            metadata,
        };

        self.registry.lock().await.insert(id, entry);
        Ok(id)
    }

    /// Returns the path if the entry exists, hasn't expired, and the file
    /// is still present on disk; `None` otherwise. Callers fall back to
    /// BlobStore on `None` — this is never treated as an error (§7).
    pub async fn get_path(&self, id: TempFileId) -> Option<PathBuf> {
        let registry = self.registry.lock().await;
        let entry = registry.get(&id)?;
        if entry.expires_at < Utc::now() {
            return None;
        }
        if !tokio::fs::try_exists(&entry.local_path).await.unwrap_or(false) {
            return None;
        }
        Some(entry.local_path.clone())
    }

    /// Returns the full entry (e.g. for verifying ownership), subject to
    /// the same existence/expiry checks as `get_path`.
    pub async fn get(&self, id: TempFileId) -> Option<TempFile> {
        let registry = self.registry.lock().await;
        let entry = registry.get(&id)?;
        if entry.expires_at < Utc::now() {
            return None;
        }
        Some(entry.clone())
    }

    /// Removes the entry and unlinks its file. Idempotent: cleaning up an
    /// id that's already gone (or was never there) is not an error.
    pub async fn cleanup(&self, id: TempFileId) -> TempStoreResult<()> {
        let entry = self.registry.lock().await.remove(&id);
        if let Some(entry) = entry {
            match tokio::fs::remove_file(&entry.local_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Removes every entry whose TTL has elapsed, unlinking their files.
    /// Returns the count removed.
    pub async fn sweep_expired(&self) -> TempStoreResult<usize> {
        let now = Utc::now();
        let expired: Vec<TempFileId> = {
            let registry = self.registry.lock().await;
            registry
                .iter()
                .filter(|(_, entry)| entry.expires_at < now)
                .map(|(id, _)| *id)
                .collect()
        };

        for id in &expired {
            self.cleanup(*id).await?;
        }
        Ok(expired.len())
    }

    /// Best-effort sweep of files on disk that have no registry entry —
    /// e.g. orphaned by a crash between `store` and process exit — deleting
    /// anything whose mtime exceeds `max_age`. Per §9: runs independently
    /// of registry presence, typically `2 * DEFAULT_TEMP_FILE_TTL_SECS`.
    pub async fn sweep_orphaned_files(&self, max_age: Duration) -> TempStoreResult<usize> {
        let mut removed = 0;
        let mut dir = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let known_paths: std::collections::HashSet<PathBuf> = self
            .registry
            .lock()
            .await
            .values()
            .map(|entry| entry.local_path.clone())
            .collect();

        let cutoff = std::time::SystemTime::now()
            - std::time::Duration::from_secs(max_age.num_seconds().max(0) as u64);

        while let Some(file) = dir.next_entry().await? {
            let path = file.path();
            if known_paths.contains(&path) {
                continue;
            }
            let Ok(metadata) = file.metadata().await else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            if modified < cutoff {
                if tokio::fs::remove_file(&path).await.is_ok() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imagegen_core::{UploadPurpose, UserId};
    use std::io::Write;

    fn metadata() -> TempFileMetadata {
        TempFileMetadata {
            owner: UserId::new(),
            purpose: UploadPurpose::ReferenceInput,
            linked_upload_id: None,
        }
    }

    async fn write_src_file(dir: &Path, contents: &[u8]) -> PathBuf {
        let path = dir.join("src.png");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[tokio::test]
    async fn store_then_get_path_returns_a_copy() {
        let src_dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let src = write_src_file(src_dir.path(), b"hello").await;

        let store = TempFileStore::new(store_dir.path());
        let id = store.store(&src, metadata(), None).await.unwrap();

        let path = store.get_path(id).await.unwrap();
        assert_eq!(tokio::fs::read(path).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn expired_entry_returns_none() {
        let src_dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let src = write_src_file(src_dir.path(), b"hello").await;

        let store = TempFileStore::new(store_dir.path());
        let id = store
            .store(&src, metadata(), Some(Duration::seconds(-1)))
            .await
            .unwrap();

        assert!(store.get_path(id).await.is_none());
    }

    #[tokio::test]
    async fn cleanup_removes_entry_and_file_and_is_idempotent() {
        let src_dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let src = write_src_file(src_dir.path(), b"hello").await;

        let store = TempFileStore::new(store_dir.path());
        let id = store.store(&src, metadata(), None).await.unwrap();
        let path = store.get_path(id).await.unwrap();

        store.cleanup(id).await.unwrap();
        assert!(!tokio::fs::try_exists(&path).await.unwrap());
        assert!(store.get_path(id).await.is_none());

        // Idempotent: cleaning up again is not an error.
        store.cleanup(id).await.unwrap();
    }

    #[tokio::test]
    async fn sweep_expired_only_removes_expired_entries() {
        let src_dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let src = write_src_file(src_dir.path(), b"hello").await;

        let store = TempFileStore::new(store_dir.path());
        let fresh = store.store(&src, metadata(), None).await.unwrap();
        let stale = store
            .store(&src, metadata(), Some(Duration::seconds(-1)))
            .await
            .unwrap();

        let removed = store.sweep_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_path(fresh).await.is_some());
        assert!(store.get_path(stale).await.is_none());
    }

    #[tokio::test]
    async fn concurrent_stores_never_collide_on_id() {
        let src_dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let src = write_src_file(src_dir.path(), b"hello").await;
        let store = std::sync::Arc::new(TempFileStore::new(store_dir.path()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let src = src.clone();
            handles.push(tokio::spawn(
                async move { store.store(&src, metadata(), None).await.unwrap() },
            ));
        }

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 16);
    }
}
