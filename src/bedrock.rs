//! Embedding and generative completion through Amazon Bedrock.

use async_trait::async_trait;
use aws_sdk_bedrockruntime::primitives::Blob;
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::params::LlmParameters;

/// Fixed text-to-embedding model. Its dimension is baked into the vector
/// store schema, so it is not configurable per request.
pub const EMBEDDING_MODEL_ID: &str = "amazon.titan-embed-text-v1";

/// The model operations the request pipeline needs.
#[async_trait]
pub trait TextModels {
    /// Computes the embedding vector for `text`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Invokes the completion model with the rendered prompt and the stored
    /// generation parameters, returning the raw completion text.
    async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        params: &LlmParameters,
    ) -> Result<String>;
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    completion: String,
}

/// Bedrock-backed [`TextModels`] implementation.
pub struct Bedrock {
    client: aws_sdk_bedrockruntime::Client,
}

impl Bedrock {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_bedrockruntime::Client::new(config),
        }
    }
}

#[async_trait]
impl TextModels for Bedrock {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "inputText": text }).to_string();
        let output = self
            .client
            .invoke_model()
            .content_type("application/json")
            .model_id(EMBEDDING_MODEL_ID)
            .body(Blob::new(body.into_bytes()))
            .send()
            .await
            .map_err(|e| Error::upstream(format!("embedding failed: {e}")))?;
        let response: EmbeddingResponse =
            serde_json::from_slice(output.body().as_ref())
                .map_err(Error::upstream)?;
        Ok(response.embedding)
    }

    async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        params: &LlmParameters,
    ) -> Result<String> {
        let body = params.invocation_body(prompt)?;
        info!("invoking completion model {model_id}");
        let output = self
            .client
            .invoke_model()
            .content_type("application/json")
            .model_id(model_id)
            .body(Blob::new(body.into_bytes()))
            .send()
            .await
            .map_err(|e| Error::upstream(format!("completion failed: {e}")))?;
        let response: CompletionResponse =
            serde_json::from_slice(output.body().as_ref())
                .map_err(Error::upstream)?;
        Ok(response.completion)
    }
}
