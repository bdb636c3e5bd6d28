//! Runtime configuration: settings from an optional TOML file, secrets from the
//! environment.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rag::{
    EmbeddingModel, RetryPolicy, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE,
    DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_GENERATION_MODEL, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_OPENAI_BASE_URL,
    DEFAULT_OVERLAP, DEFAULT_TEMPERATURE,
};

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";

/// Values shipped in the sample `.env`; treated as unset.
const PLACEHOLDERS: [&str; 2] = ["your_openai_api_key_here", "your_google_api_key_here"];

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MIN_SCORE: f32 = 0.25;
pub const DEFAULT_PORT: u16 = 8501;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Upper bound for `max_retries`; backoff doubles per retry.
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Missing required environment variables: {} (set them in .env)", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingSettings {
    pub model: String,
    pub dimensions: u32,
    pub base_url: String,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationSettings {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_GENERATION_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

/// Application settings. Every field has a default, so a config file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory scanned for .docx files
    pub data_dir: PathBuf,
    /// Directory holding the vector index
    pub index_dir: PathBuf,
    /// Descend into subdirectories of `data_dir`
    pub recursive: bool,
    /// Chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub overlap: usize,
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Hits below this cosine similarity are not used as context
    pub min_score: f32,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    /// Web UI port
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            index_dir: PathBuf::from("./index"),
            recursive: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
            embedding: EmbeddingSettings::default(),
            generation: GenerationSettings::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load from a TOML file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check the numeric settings, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.chunk_size == 0 {
            problems.push("chunk_size must be greater than 0".to_string());
        }
        if self.overlap >= self.chunk_size {
            problems.push(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            ));
        }
        if self.top_k == 0 {
            problems.push("top_k must be greater than 0".to_string());
        }
        if !(-1.0..=1.0).contains(&self.min_score) {
            problems.push(format!("min_score ({}) must be within -1..1", self.min_score));
        }
        if self.embedding.dimensions == 0 {
            problems.push("embedding.dimensions must be greater than 0".to_string());
        }
        if self.embedding.batch_size == 0 {
            problems.push("embedding.batch_size must be greater than 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            problems.push("request_timeout_secs must be greater than 0".to_string());
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            problems.push(format!(
                "max_retries ({}) must be at most {}",
                self.max_retries, MAX_RETRIES_LIMIT
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    pub fn embedding_model(&self) -> EmbeddingModel {
        EmbeddingModel {
            model: self.embedding.model.clone(),
            dimensions: self.embedding.dimensions,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            ..RetryPolicy::default()
        }
    }
}

/// API keys for the hosted services.
#[derive(Clone)]
pub struct Credentials {
    pub openai_api_key: String,
    pub google_api_key: String,
}

impl Credentials {
    /// Read both keys from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read both keys through `lookup`, naming every key that is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty() && !PLACEHOLDERS.contains(&value.as_str()))
        };

        let openai = read(OPENAI_API_KEY);
        let google = read(GOOGLE_API_KEY);

        match (openai, google) {
            (Some(openai_api_key), Some(google_api_key)) => Ok(Self {
                openai_api_key,
                google_api_key,
            }),
            (openai, google) => {
                let mut missing = Vec::new();
                if openai.is_none() {
                    missing.push(OPENAI_API_KEY);
                }
                if google.is_none() {
                    missing.push(GOOGLE_API_KEY);
                }
                Err(ConfigError::MissingCredentials(missing))
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &"<redacted>")
            .field("google_api_key", &"<redacted>")
            .finish()
    }
}
