#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub notion: NotionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotionConfig {
    pub api_key: String,
    pub database_ids: Vec<String>,
    /// Notion API version header sent with every request.
    pub api_version: String,
    /// Server-side page size for database queries, capped at 100 by the API.
    pub page_size: u32,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            database_ids: Vec::new(),
            api_version: "2022-06-28".to_string(),
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            dimension: 768,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub max_context_chunks: usize,
    pub min_similarity_score: f32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            max_context_chunks: 5,
            min_similarity_score: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk.
    pub max_chunk_tokens: usize,
    /// Tokens shared between adjacent chunks.
    pub chunk_overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_tokens: 500,
            chunk_overlap_tokens: 50,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Notion API key is required")]
    MissingNotionApiKey,
    #[error("At least one Notion database id must be configured")]
    MissingDatabaseIds,
    #[error("Gemini API key is required")]
    MissingGeminiApiKey,
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(usize),
    #[error("Invalid page size: {0} (must be between 1 and 100)")]
    InvalidPageSize(u32),
    #[error("Invalid max chunk tokens: {0} (must be between 1 and 8192)")]
    InvalidMaxChunkTokens(usize),
    #[error("Chunk overlap ({0}) must be smaller than max chunk tokens ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid max context chunks: {0} (must be between 1 and 50)")]
    InvalidMaxContextChunks(usize),
    #[error("Invalid minimum similarity score: {0} (must be between 0.0 and 1.0)")]
    InvalidMinScore(f32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Default configuration directory, e.g. `~/.config/notion-brain` on Linux.
pub fn get_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine user config directory")?;
    Ok(base.join("notion-brain"))
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.notion.validate()?;
        self.embedding.validate()?;
        self.gemini.validate()?;
        self.chunking.validate()?;
        Ok(())
    }

    /// Directory holding the LanceDB chunk tables.
    pub fn vector_store_path(&self) -> PathBuf {
        self.base_dir.join("vectors")
    }
}

impl NotionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingNotionApiKey);
        }

        if self.database_ids.iter().all(|id| id.trim().is_empty()) {
            return Err(ConfigError::MissingDatabaseIds);
        }

        if self.page_size == 0 || self.page_size > 100 {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }

        Ok(())
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.base_url()?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(64..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl GeminiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingGeminiApiKey);
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.max_context_chunks == 0 || self.max_context_chunks > 50 {
            return Err(ConfigError::InvalidMaxContextChunks(
                self.max_context_chunks,
            ));
        }

        if !(0.0..=1.0).contains(&self.min_similarity_score) {
            return Err(ConfigError::InvalidMinScore(self.min_similarity_score));
        }

        Ok(())
    }
}

impl ChunkingConfig {
    /// A zero or negative window advance would make the chunker loop forever,
    /// so an overlap at or above the window size is rejected up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk_tokens == 0 || self.max_chunk_tokens > 8192 {
            return Err(ConfigError::InvalidMaxChunkTokens(self.max_chunk_tokens));
        }

        if self.chunk_overlap_tokens >= self.max_chunk_tokens {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap_tokens,
                self.max_chunk_tokens,
            ));
        }

        Ok(())
    }
}
