use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("Embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    #[error("Embedding vector has no usable norm ({0})")]
    Degenerate(f32),
}

/// Turns raw image bytes into a fixed-dimension unit vector.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Output dimensionality.
    fn dim(&self) -> usize;

    /// Encode one image into an L2-normalized embedding.
    async fn encode(&self, image: &[u8]) -> Result<Vec<f32>, EmbedError>;
}

/// Embedder backed by an HTTP inference service. Posts the raw bytes and
/// expects `{"embedding": [f32, ...]}` back.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    dim: usize,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(endpoint: String, dim: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            dim,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn encode(&self, image: &[u8]) -> Result<Vec<f32>, EmbedError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await?
            .error_for_status()?;

        let parsed: EmbedResponse = response.json().await?;
        if parsed.embedding.len() != self.dim {
            return Err(EmbedError::Dimension {
                expected: self.dim,
                got: parsed.embedding.len(),
            });
        }

        l2_normalize(parsed.embedding)
    }
}

/// Scale to unit L2 norm. Zero and non-finite norms cannot be normalized.
fn l2_normalize(mut v: Vec<f32>) -> Result<Vec<f32>, EmbedError> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return Err(EmbedError::Degenerate(norm));
    }
    for x in &mut v {
        *x /= norm;
    }
    Ok(v)
}
