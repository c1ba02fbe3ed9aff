
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::config::EmbeddingConfig;
use crate::{BrainError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Client for an Ollama-compatible embedding endpoint.
///
/// Returned vectors are L2-normalized so cosine similarity downstream reduces
/// to a dot product. Identical input text and model configuration yield an
/// identical vector.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    base_url: Url,
    model: String,
    dimension: usize,
    client: reqwest::Client,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .base_url()
            .map_err(|e| BrainError::Config(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| BrainError::Embedding(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            dimension: config.dimension,
            client,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Dimension of the vectors this client produces.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed a single text into a unit-length vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let url = self
            .base_url
            .join("/api/embed")
            .map_err(|e| BrainError::Embedding(format!("Failed to build embedding URL: {e}")))?;

        let request = EmbedRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response: EmbedResponse = self.post_with_retry(&url, &request).await?;

        if response.embedding.len() != self.dimension {
            return Err(BrainError::Embedding(format!(
                "Model returned {} dimensions, expected {}",
                response.embedding.len(),
                self.dimension
            )));
        }

        Ok(l2_normalize(response.embedding))
    }

    /// Verify the embedding backend is reachable and serving the model.
    pub async fn health_check(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/api/tags")
            .map_err(|e| BrainError::Embedding(format!("Failed to build ping URL: {e}")))?;

        debug!("Pinging embedding server at {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BrainError::Embedding(format!("Embedding server unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(BrainError::Embedding(format!(
                "Embedding server ping failed: HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn post_with_retry<T, R>(&self, url: &Url, body: &T) -> Result<R>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("Embedding request attempt {}/{}", attempt, self.retry_attempts);

            match self.client.post(url.clone()).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<R>().await.map_err(|e| {
                            BrainError::Embedding(format!(
                                "Failed to parse embedding response: {e}"
                            ))
                        });
                    }

                    if status.is_server_error() {
                        warn!(
                            "Embedding server error (status {}), attempt {}/{}",
                            status, attempt, self.retry_attempts
                        );
                        last_error = Some(BrainError::Embedding(format!(
                            "Server error: HTTP {status}"
                        )));
                    } else {
                        // Client errors will not improve with retries.
                        return Err(BrainError::Embedding(format!(
                            "Client error: HTTP {status}"
                        )));
                    }
                }
                Err(e) => {
                    warn!(
                        "Embedding transport error: {}, attempt {}/{}",
                        e, attempt, self.retry_attempts
                    );
                    last_error = Some(BrainError::Embedding(format!("Request error: {e}")));
                }
            }

            if attempt < self.retry_attempts {
                let delay = Duration::from_millis(
                    EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000,
                );
                debug!("Waiting {:?} before retry", delay);
                sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| BrainError::Embedding("Request failed after retries".to_string())))
    }
}

/// Scale a vector to unit L2 norm. Zero vectors are returned unchanged.
fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}
