//! BlobStore (§4.B): `put`/`get`/`delete` by a caller-supplied
//! content-addressed key, plus `publicUrlFor`. No retries inside the
//! adapter — failures are surfaced verbatim, the same contract the spec
//! gives the Worker.

mod error;
mod local;
mod remote;

pub use error::{BlobStoreError, BlobStoreResult};
pub use local::LocalBlobStore;
pub use remote::RemoteBlobStore;

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub public_url: String,
}

/// One trait, multiple backends selected by configuration — the same shape
/// as the teacher's prover-driver dispatch, applied to storage instead of
/// proving.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BlobStoreResult<PutOutcome>;

    async fn get(&self, key: &str) -> BlobStoreResult<Vec<u8>>;

    async fn delete(&self, key: &str) -> BlobStoreResult<()>;

    fn public_url_for(&self, key: &str) -> String;
}

/// Derives the `userId/<timestamp>-<slug>.ext` storage key convention named
/// in §6, content-addressed by a sha256 prefix so repeated uploads of the
/// same bytes collide onto the same key.
pub fn content_addressed_key(owner: &str, bytes: &[u8], ext: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(bytes);
    let hash_prefix = hex::encode(&digest[..8]);
    format!("{owner}/{hash_prefix}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_addressed_key_is_stable_for_identical_bytes() {
        let bytes = b"same bytes".to_vec();
        let k1 = content_addressed_key("user-1", &bytes, "png");
        let k2 = content_addressed_key("user-1", &bytes, "png");
        assert_eq!(k1, k2);
    }

    #[test]
    fn content_addressed_key_differs_across_owners() {
        let bytes = b"same bytes".to_vec();
        let k1 = content_addressed_key("user-1", &bytes, "png");
        let k2 = content_addressed_key("user-2", &bytes, "png");
        assert_ne!(k1, k2);
    }
}
