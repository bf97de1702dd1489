//! A scriptable `ModelClient` for tests: queues a fixed sequence of
//! outcomes and replays them in order, repeating the last one once the
//! queue is drained.

use async_trait::async_trait;
use imagegen_core::CoreError;
use tokio::sync::Mutex;

use crate::client::ModelClient;
use crate::types::{ModelMetadata, ModelOutput, ModelRequest};

#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Success { bytes: Vec<u8>, mime_type: String },
    Retryable(String),
    Permanent(String),
}

pub struct MockModelClient {
    script: Mutex<Vec<ScriptedOutcome>>,
}

impl MockModelClient {
    pub fn new(script: Vec<ScriptedOutcome>) -> Self {
        Self {
            script: Mutex::new(script),
        }
    }

    pub fn always_succeeds() -> Self {
        Self::new(vec![ScriptedOutcome::Success {
            bytes: vec![0xFF, 0xD8, 0xFF],
            mime_type: "image/jpeg".to_string(),
        }])
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn generate(&self, _request: ModelRequest) -> Result<ModelOutput, CoreError> {
        let mut script = self.script.lock().await;
        let outcome = if script.len() > 1 {
            script.remove(0)
        } else {
            script.first().cloned().unwrap_or(ScriptedOutcome::Permanent(
                "mock model client has no scripted outcomes left".to_string(),
            ))
        };

        match outcome {
            ScriptedOutcome::Success { bytes, mime_type } => Ok(ModelOutput {
                bytes,
                mime_type,
                metadata: ModelMetadata {
                    model_name: "mock".to_string(),
                    model_version: "test".to_string(),
                    generation_ms: 1,
                },
            }),
            ScriptedOutcome::Retryable(message) => Err(CoreError::Retryable(message)),
            ScriptedOutcome::Permanent(message) => Err(CoreError::Permanent(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelOptions;

    fn prompt_request() -> ModelRequest {
        ModelRequest::TextToImage {
            prompt: "a cat".to_string(),
            options: ModelOptions::default(),
        }
    }

    #[tokio::test]
    async fn replays_scripted_outcomes_in_order() {
        let client = MockModelClient::new(vec![
            ScriptedOutcome::Retryable("timeout".to_string()),
            ScriptedOutcome::Success {
                bytes: vec![1, 2, 3],
                mime_type: "image/png".to_string(),
            },
        ]);

        let first = client.generate(prompt_request()).await;
        assert!(matches!(first, Err(CoreError::Retryable(_))));

        let second = client.generate(prompt_request()).await.unwrap();
        assert_eq!(second.bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn last_outcome_repeats_once_drained() {
        let client = MockModelClient::always_succeeds();
        assert!(client.generate(prompt_request()).await.is_ok());
        assert!(client.generate(prompt_request()).await.is_ok());
    }
}
