use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub insight: InsightConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Sliding window size in characters.
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    /// Characters shared between consecutive windows. Must satisfy
    /// `0 < overlap < size`.
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Results must score strictly above this cosine similarity.
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: f64,
    /// Maximum number of fragments folded into the context blob.
    #[serde(default = "default_retrieval_limit")]
    pub limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_floor: default_similarity_floor(),
            limit: default_retrieval_limit(),
        }
    }
}

fn default_similarity_floor() -> f64 {
    0.7
}
fn default_retrieval_limit() -> i64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `disabled`, `openai`, or `ollama`.
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `openai` or `gemini`.
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    /// `structured` (function-call payload) or `freetext` (prose).
    /// A configuration choice, not an inferred one — both shapes normalize
    /// into the same summary.
    #[serde(default = "default_generation_mode")]
    pub mode: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            mode: default_generation_mode(),
            model: default_generation_model(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InsightConfig {
    /// Hugging Face model id for the domain-insight side channel.
    /// The channel is advisory-only: it also stays silent when no
    /// `HF_API_KEY` is present in the environment.
    #[serde(default)]
    pub model: Option<String>,
    /// Input is truncated to this many characters before the call.
    #[serde(default = "default_insight_max_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_input_chars: default_insight_max_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_mode() -> String {
    "freetext".to_string()
}
fn default_generation_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    120
}
fn default_insight_max_chars() -> usize {
    4000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Chunking: the window must strictly advance.
    if config.chunking.size == 0 {
        anyhow::bail!("chunking.size must be > 0");
    }
    if config.chunking.overlap == 0 || config.chunking.overlap >= config.chunking.size {
        anyhow::bail!(
            "chunking.overlap must satisfy 0 < overlap < size (got overlap={}, size={})",
            config.chunking.overlap,
            config.chunking.size
        );
    }

    if config.retrieval.limit < 1 {
        anyhow::bail!("retrieval.limit must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.similarity_floor) {
        anyhow::bail!("retrieval.similarity_floor must be in [0.0, 1.0]");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "openai" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be openai or gemini.",
            other
        ),
    }

    match config.generation.mode.as_str() {
        "structured" | "freetext" => {}
        other => anyhow::bail!(
            "Unknown generation mode: '{}'. Must be structured or freetext.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(chunking: &str) -> String {
        format!(
            r#"
[db]
path = "/tmp/medsum-test.sqlite"

[chunking]
{chunking}
"#
        )
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str(&base_config("size = 1000\noverlap = 200")).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.retrieval.similarity_floor, 0.7);
        assert_eq!(config.retrieval.limit, 5);
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.generation.mode, "freetext");
    }

    #[test]
    fn test_rejects_zero_overlap() {
        let config: Config = toml::from_str(&base_config("size = 1000\noverlap = 0")).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_overlap_ge_size() {
        let config: Config = toml::from_str(&base_config("size = 200\noverlap = 200")).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_enabled_embedding_without_dims() {
        let mut toml_str = base_config("size = 1000\noverlap = 200");
        toml_str.push_str("\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n");
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_unknown_generation_mode() {
        let mut toml_str = base_config("size = 1000\noverlap = 200");
        toml_str.push_str("\n[generation]\nmode = \"both\"\n");
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(validate(&config).is_err());
    }
}
