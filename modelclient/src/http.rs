//! `HttpModelClient`: calls an external model endpoint over HTTP.
//!
//! Owns its own retry policy (per §4.F: "timeouts and retries live in the
//! ModelClient, not the Worker"), using the same exponential-backoff shape
//! `imagegen-broker` uses for job retries.

use std::time::Duration;

use async_trait::async_trait;
use imagegen_core::CoreError;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use url::Url;

use crate::client::ModelClient;
use crate::types::{ModelMetadata, ModelOutput, ModelRequest};

#[derive(Debug, Clone)]
pub struct HttpModelClientConfig {
    pub base_url: Url,
    pub api_key: String,
    pub request_timeout: Duration,
    pub max_attempts: u32,
}

impl Default for HttpModelClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:9000").expect("static url"),
            api_key: String::new(),
            request_timeout: Duration::from_secs(60),
            max_attempts: 3,
        }
    }
}

pub struct HttpModelClient {
    config: HttpModelClientConfig,
    http: Client,
}

impl HttpModelClient {
    pub fn new(config: HttpModelClientConfig) -> Result<Self, CoreError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CoreError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self { config, http })
    }

    async fn post_once(&self, body: &WirePayload<'_>) -> Result<ModelOutput, CoreError> {
        let response = self
            .http
            .post(self.config.base_url.join("/v1/generate").expect("static path"))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            let parsed: WireResponse = response
                .json()
                .await
                .map_err(|e| CoreError::Internal(anyhow::anyhow!(e)))?;
            Ok(ModelOutput {
                bytes: parsed.image_bytes.into_vec(),
                mime_type: parsed.mime_type,
                metadata: ModelMetadata {
                    model_name: parsed.model_name,
                    model_version: parsed.model_version,
                    generation_ms: parsed.generation_ms,
                },
            })
        } else if is_retryable_status(status) {
            Err(CoreError::Retryable(format!("model endpoint returned {status}")))
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(CoreError::Permanent(format!("model endpoint rejected request: {status} {detail}")))
        }
    }

    pub async fn generate_with_retry(&self, request: ModelRequest) -> Result<ModelOutput, CoreError> {
        let body = WirePayload::from(&request);
        let policy = backoff::ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_interval(Duration::from_secs(10))
            .with_max_elapsed_time(Some(self.config.request_timeout * self.config.max_attempts))
            .build();

        let mut attempts_left = self.config.max_attempts;
        backoff::future::retry(policy, || async {
            attempts_left -= 1;
            match self.post_once(&body).await {
                Ok(output) => Ok(output),
                Err(CoreError::Retryable(reason)) if attempts_left > 0 => {
                    tracing::warn!(reason, attempts_left, "model request failed, retrying");
                    Err(backoff::Error::transient(CoreError::Retryable(reason)))
                }
                Err(other) => Err(backoff::Error::permanent(other)),
            }
        })
        .await
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn generate(&self, request: ModelRequest) -> Result<ModelOutput, CoreError> {
        self.generate_with_retry(request).await
    }
}

fn classify_transport_error(error: reqwest::Error) -> CoreError {
    if error.is_timeout() || error.is_connect() {
        CoreError::Retryable(error.to_string())
    } else {
        CoreError::Internal(anyhow::anyhow!(error))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[derive(Debug, Serialize)]
struct WirePayload<'a> {
    kind: &'static str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_base64: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reference_base64: Vec<String>,
}

impl<'a> From<&'a ModelRequest> for WirePayload<'a> {
    fn from(request: &'a ModelRequest) -> Self {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        match request {
            ModelRequest::TextToImage { prompt, .. } => WirePayload {
                kind: "text_to_image",
                prompt,
                target_base64: None,
                reference_base64: Vec::new(),
            },
            ModelRequest::ImageToImage { prompt, reference, .. } => WirePayload {
                kind: "image_reference",
                prompt,
                target_base64: None,
                reference_base64: vec![STANDARD.encode(&reference.bytes)],
            },
            ModelRequest::MultiReferenceToImage {
                prompt,
                target,
                references,
                ..
            } => WirePayload {
                kind: "image_multiple_reference",
                prompt,
                target_base64: Some(STANDARD.encode(target)),
                reference_base64: references.iter().map(|r| STANDARD.encode(r)).collect(),
            },
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct WireResponse {
    #[serde(with = "base64_bytes")]
    image_bytes: ByteBuf,
    mime_type: String,
    model_name: String,
    model_version: String,
    generation_ms: u64,
}

#[derive(Debug)]
struct ByteBuf(Vec<u8>);

impl ByteBuf {
    fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

mod base64_bytes {
    use super::ByteBuf;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ByteBuf, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(ByteBuf)
            .map_err(serde::de::Error::custom)
    }
}
