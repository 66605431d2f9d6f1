//! Azure `OpenAI` embeddings client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Embedder, EmbeddingError, error_body};

const API_KEY_HEADER: &str = "api-key";

/// Connection settings for an Azure `OpenAI` embedding deployment.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub deployment: String,
    /// Maximum number of inputs sent in one request.
    pub chunk_size: usize,
    /// Expected vector length; mismatches are logged.
    pub dimension: Option<usize>,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct AzureOpenAiEmbeddings {
    client: Client,
    config: EmbeddingConfig,
}

impl AzureOpenAiEmbeddings {
    /// Builds the client.
    ///
    /// # Errors
    /// Returns `EmbeddingError::Http` if the HTTP client cannot be built.
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn embeddings_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            urlencoding::encode(&self.config.deployment),
            urlencoding::encode(&self.config.api_version),
        )
    }

    /// Embeds every text, sending at most `chunk_size` inputs per request.
    ///
    /// # Errors
    /// Returns `EmbeddingError` if any request fails or a response is malformed.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.chunk_size.max(1)) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        debug!(
            inputs = inputs.len(),
            deployment = %self.config.deployment,
            "requesting embeddings"
        );
        let response = self
            .client
            .post(self.embeddings_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&EmbeddingRequest { input: inputs })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }

        let mut payload: EmbeddingResponse = response.json().await?;
        if payload.data.len() != inputs.len() {
            return Err(EmbeddingError::Decode(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                payload.data.len()
            )));
        }
        payload.data.sort_by_key(|item| item.index);

        if let Some(expected) = self.config.dimension {
            for item in payload.data.iter().filter(|item| item.embedding.len() != expected) {
                warn!(
                    expected,
                    actual = item.embedding.len(),
                    "embedding dimension differs from configuration"
                );
            }
        }

        Ok(payload.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl Embedder for AzureOpenAiEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_documents(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::Decode("empty embedding response".to_string()))
    }
}
