//! Embedding generation through an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::EmbeddingModel;
use super::retry::RetryPolicy;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSIONS: u32 = 1536;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Inputs per request; keeps each call well under the API's token limit.
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Embedding request timed out")]
    Timeout,

    #[error("Embedding API rejected the credentials")]
    Auth,

    #[error("Embedding API rate limit exceeded")]
    RateLimited,

    #[error("Embedding API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: u32, actual: u32 },
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

impl EmbeddingError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::RateLimited => true,
            Self::Http(e) => e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Turns text into fixed-length vectors.
pub trait Embedder: Send + Sync {
    /// Model identity and dimensionality of the produced vectors.
    fn model(&self) -> EmbeddingModel;

    /// One vector per input, in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Blocking client for the OpenAI embeddings API.
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: EmbeddingModel,
    batch_size: usize,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: EmbeddingModel,
        batch_size: usize,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            batch_size: batch_size.max(1),
            retry,
        })
    }

    fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model.model,
                input: batch,
            })
            .send()?;

        let parsed: EmbeddingResponse = check_status(response)?.json()?;

        if parsed.data.len() != batch.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                parsed.data.len()
            )));
        }

        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; batch.len()];
        for item in parsed.data {
            if item.embedding.len() as u32 != self.model.dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.model.dimensions,
                    actual: item.embedding.len() as u32,
                });
            }
            let slot = vectors.get_mut(item.index).ok_or_else(|| {
                EmbeddingError::InvalidResponse(format!("index {} out of range", item.index))
            })?;
            *slot = Some(item.embedding);
        }

        vectors
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| EmbeddingError::InvalidResponse(format!("missing index {}", i)))
            })
            .collect()
    }
}

impl Embedder for OpenAiEmbedder {
    fn model(&self) -> EmbeddingModel {
        self.model.clone()
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (n, batch) in texts.chunks(self.batch_size).enumerate() {
            log::debug!("Embedding batch {} ({} inputs)", n + 1, batch.len());
            let embedded = self.retry.run(
                "Embedding request",
                || self.embed_batch(batch),
                EmbeddingError::is_transient,
            )?;
            vectors.extend(embedded);
        }

        Ok(vectors)
    }
}

fn check_status(response: Response) -> Result<Response> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(EmbeddingError::Auth),
        StatusCode::TOO_MANY_REQUESTS => Err(EmbeddingError::RateLimited),
        status if !status.is_success() => Err(EmbeddingError::Api {
            status: status.as_u16(),
            message: response.text().unwrap_or_default(),
        }),
        _ => Ok(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_api;

    fn embedder(base_url: &str, dimensions: u32, batch_size: usize) -> OpenAiEmbedder {
        OpenAiEmbedder::new(
            "sk-test".to_string(),
            base_url,
            EmbeddingModel {
                model: DEFAULT_EMBEDDING_MODEL.to_string(),
                dimensions,
            },
            batch_size,
            Duration::from_secs(5),
            RetryPolicy {
                max_retries: 1,
                base_delay: Duration::ZERO,
            },
        )
        .unwrap()
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {}", i)).collect()
    }

    #[test]
    fn test_empty_input_makes_no_request() {
        // Nothing listens on this port; a request would fail.
        let embedder = embedder("http://127.0.0.1:9", 2, 10);
        assert!(embedder.embed(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_batches_and_reorders_by_index() {
        let api = fake_api(vec![
            (
                200,
                r#"{"data":[{"embedding":[0.0,1.0],"index":1},{"embedding":[1.0,0.0],"index":0}]}"#
                    .to_string(),
            ),
            (200, r#"{"data":[{"embedding":[0.5,0.5],"index":0}]}"#.to_string()),
        ]);
        let embedder = embedder(&api.base_url, 2, 2);

        let vectors = embedder.embed(&texts(3)).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]);

        let requests = api.finish();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].request_line.starts_with("POST /embeddings"));
        assert_eq!(requests[0].header("authorization"), Some("Bearer sk-test"));
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["model"], DEFAULT_EMBEDDING_MODEL);
        assert_eq!(body["input"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_auth_failure_is_not_retried() {
        let api = fake_api(vec![(401, r#"{"error":"bad key"}"#.to_string())]);
        let embedder = embedder(&api.base_url, 2, 10);

        assert!(matches!(embedder.embed(&texts(1)), Err(EmbeddingError::Auth)));
        assert_eq!(api.finish().len(), 1);
    }

    #[test]
    fn test_rate_limit_is_retried() {
        let api = fake_api(vec![
            (429, "{}".to_string()),
            (200, r#"{"data":[{"embedding":[1.0,2.0],"index":0}]}"#.to_string()),
        ]);
        let embedder = embedder(&api.base_url, 2, 10);

        assert_eq!(embedder.embed(&texts(1)).unwrap(), vec![vec![1.0, 2.0]]);
        assert_eq!(api.finish().len(), 2);
    }

    #[test]
    fn test_wrong_dimensions_rejected() {
        let api = fake_api(vec![(
            200,
            r#"{"data":[{"embedding":[1.0,2.0,3.0],"index":0}]}"#.to_string(),
        )]);
        let embedder = embedder(&api.base_url, 2, 10);

        assert!(matches!(
            embedder.embed(&texts(1)),
            Err(EmbeddingError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        api.finish();
    }
}
