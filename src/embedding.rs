//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete backends:
//! - **[`DisabledProvider`]** — returns errors; the pipeline runs in a
//!   degraded no-retrieval mode when embeddings are not configured.
//! - **[`OpenAIProvider`]** — calls the OpenAI embeddings API with batching,
//!   retry, and backoff.
//! - **[`OllamaProvider`]** — calls a local Ollama instance's `/api/embed`
//!   endpoint.
//!
//! Also provides vector utilities:
//! - [`cosine_similarity`] — relevance score between two embedding vectors
//! - [`vec_to_blob`] / [`blob_to_vec`] — little-endian f32 BLOB codec for
//!   SQLite storage
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama backends use exponential backoff for transient
//! errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

/// Trait for embedding providers. All vectors stored in one database must
/// share the provider's dimensionality; a mismatch is a configuration
/// error, not a runtime-recoverable one.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;
}

/// Embed a batch of texts using the configured provider.
///
/// Returns one vector per input text, in input order. The `disabled`
/// provider always fails; the caller decides whether that is fatal
/// (ingestion) or degradable (retrieval).
pub async fn embed_texts(
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, PipelineError> {
    match config.provider.as_str() {
        "openai" => embed_openai(config, texts).await,
        "ollama" => embed_ollama(config, texts).await,
        "disabled" => Err(PipelineError::provider(0, "embedding provider is disabled")),
        other => Err(PipelineError::provider(
            0,
            format!("unknown embedding provider: {}", other),
        )),
    }
}

/// Embed a single query text.
///
/// Convenience wrapper around [`embed_texts`] for embedding a retrieval
/// query.
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>, PipelineError> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::provider(0, "empty embedding response"))
}

// ============ Disabled Provider ============

/// A no-op embedding provider. Any attempt to embed text fails; the
/// ingestion pipeline reports zero fragments processed and summarization
/// proceeds without retrieved context.
pub struct DisabledProvider;

impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            anyhow::bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self { model, dims })
    }
}

impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

async fn embed_openai(
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| PipelineError::provider(0, "OPENAI_API_KEY not set"))?;

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| PipelineError::provider(0, "embedding.model required"))?;

    let url = config
        .url
        .as_deref()
        .unwrap_or("https://api.openai.com/v1/embeddings");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| PipelineError::provider(0, e.to_string()))?;

    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response
                        .json()
                        .await
                        .map_err(|e| PipelineError::provider(status.as_u16(), e.to_string()))?;
                    return parse_openai_response(&json);
                }

                let body_text = response.text().await.unwrap_or_default();

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(PipelineError::provider(status.as_u16(), body_text));
                    continue;
                }

                // Client error (not 429) — don't retry
                return Err(PipelineError::provider(status.as_u16(), body_text));
            }
            Err(e) => {
                last_err = Some(PipelineError::provider(0, e.to_string()));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| PipelineError::provider(0, "embedding failed after retries")))
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, PipelineError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| PipelineError::provider(0, "invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| PipelineError::provider(0, "invalid OpenAI response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default:
/// `http://localhost:11434`). Requires an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;

        Ok(Self { model, dims })
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

async fn embed_ollama(
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let model = config
        .model
        .as_ref()
        .ok_or_else(|| PipelineError::provider(0, "embedding.model required"))?;

    let url = config.url.as_deref().unwrap_or("http://localhost:11434");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| PipelineError::provider(0, e.to_string()))?;

    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(format!("{}/api/embed", url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response
                        .json()
                        .await
                        .map_err(|e| PipelineError::provider(status.as_u16(), e.to_string()))?;
                    return parse_ollama_response(&json);
                }

                let body_text = response.text().await.unwrap_or_default();

                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(PipelineError::provider(status.as_u16(), body_text));
                    continue;
                }

                return Err(PipelineError::provider(status.as_u16(), body_text));
            }
            Err(e) => {
                last_err = Some(PipelineError::provider(
                    0,
                    format!("Ollama connection error (is Ollama running at {}?): {}", url, e),
                ));
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| PipelineError::provider(0, "Ollama embedding failed after retries")))
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, PipelineError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            PipelineError::provider(0, "invalid Ollama response: missing embeddings array")
        })?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| {
                PipelineError::provider(0, "invalid Ollama response: embedding is not an array")
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a
/// BLOB of `vec.len() × 4` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Reverses [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Equivalent to `1 - cosine_distance`: `1.0` means identical direction,
/// `0.0` orthogonal, `-1.0` opposite. Returns `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_disabled_provider_errors() {
        let config = crate::config::EmbeddingConfig::default();
        let result = embed_texts(&config, &["hello".to_string()]).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_create_provider_disabled_by_default() {
        let config = crate::config::EmbeddingConfig::default();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "disabled");
        assert_eq!(provider.dims(), 0);
    }

    #[test]
    fn test_create_provider_rejects_unknown() {
        let config = crate::config::EmbeddingConfig {
            provider: "bedrock".to_string(),
            ..Default::default()
        };
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn test_parse_openai_response() {
        let json = serde_json::json!({
            "data": [
                {"embedding": [0.1, 0.2], "index": 0},
                {"embedding": [0.3, 0.4], "index": 1}
            ]
        });
        let vecs = parse_openai_response(&json).unwrap();
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs[0].len(), 2);
        assert!((vecs[1][0] - 0.3).abs() < 1e-6);
    }
}
