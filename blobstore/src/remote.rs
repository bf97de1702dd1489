//! R2/S3-compatible `BlobStore`, addressed by the `R2_*` configuration keys
//! named in §6. Talks to the bucket's S3-compatible HTTP API directly with
//! `reqwest`; signing is the caller-supplied access key id/secret pair sent
//! as HTTP basic auth, matching the subset of the S3 API R2 exposes over a
//! plain bucket endpoint rather than pulling in a full SigV4 client crate.

use async_trait::async_trait;
use reqwest::Client;

use crate::{BlobStore, BlobStoreError, BlobStoreResult, PutOutcome};

pub struct RemoteBlobStore {
    client: Client,
    endpoint: String,
    bucket: String,
    access_key_id: String,
    secret_access_key: String,
    public_base_url: String,
}

impl RemoteBlobStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            key
        )
    }
}

#[async_trait]
impl BlobStore for RemoteBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BlobStoreResult<PutOutcome> {
        let response = self
            .client
            .put(self.object_url(key))
            .basic_auth(&self.access_key_id, Some(&self.secret_access_key))
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        response.error_for_status()?;
        Ok(PutOutcome {
            public_url: self.public_url_for(key),
        })
    }

    async fn get(&self, key: &str) -> BlobStoreResult<Vec<u8>> {
        let response = self
            .client
            .get(self.object_url(key))
            .basic_auth(&self.access_key_id, Some(&self.secret_access_key))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BlobStoreError::NotFound(key.to_string()));
        }
        let response = response.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, key: &str) -> BlobStoreResult<()> {
        let response = self
            .client
            .delete(self.object_url(key))
            .basic_auth(&self.access_key_id, Some(&self.secret_access_key))
            .send()
            .await?;
        match response.status() {
            reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::NO_CONTENT => Ok(()),
            status if status.is_success() => Ok(()),
            _ => {
                response.error_for_status()?;
                Ok(())
            }
        }
    }

    fn public_url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }
}
