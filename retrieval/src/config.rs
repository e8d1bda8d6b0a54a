//! Retrieval configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// How `get_full_text` removes the overlap between consecutive chunks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FullTextMode {
    /// Keep a fixed leading share of every chunk but the last. Approximate:
    /// may duplicate or drop characters near chunk boundaries.
    #[default]
    Approximate,
    /// Drop the overlapping tokens using the shared tokenizer.
    Exact,
}

/// Parameters for chunking, retrieval and context assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Tokens per chunk window.
    pub chunk_size: u32,
    /// Tokens shared by consecutive windows.
    pub chunk_overlap: u32,
    /// `top_k` used when a caller does not supply one.
    pub default_top_k: u32,
    /// Candidates fetched before budget trimming in `get_context_for_query`.
    pub context_fan_out: u32,
    /// Default token budget for query context.
    pub max_context_tokens: u32,
    /// Delimiter placed between chunks in assembled context.
    pub context_separator: String,
    /// Texts sent to the embedding model per request.
    pub embedding_batch_size: usize,
    pub full_text_mode: FullTextMode,
    /// Share of each non-final chunk kept by [`FullTextMode::Approximate`].
    pub approximate_keep_ratio: f64,
    /// Characters returned by document previews.
    pub preview_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            default_top_k: 5,
            context_fan_out: 10,
            max_context_tokens: 4000,
            context_separator: "\n\n---\n\n".to_string(),
            embedding_batch_size: 32,
            full_text_mode: FullTextMode::Approximate,
            approximate_keep_ratio: 0.8,
            preview_chars: 2000,
        }
    }
}

impl RetrievalConfig {
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder::default()
    }

    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::ConfigurationError(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: RetrievalConfig = serde_json::from_str(&raw).map_err(|e| {
            RetrievalError::ConfigurationError(format!("invalid config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that parameters are mutually consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigurationError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `context_fan_out == 0` or `embedding_batch_size == 0`
    /// - `approximate_keep_ratio` is outside `(0, 1]`
    pub fn validate(&self) -> Result<()> {
        validate_window(self.chunk_size, self.chunk_overlap)?;
        if self.context_fan_out == 0 {
            return Err(RetrievalError::ConfigurationError(
                "context_fan_out must be greater than zero".to_string(),
            ));
        }
        if self.embedding_batch_size == 0 {
            return Err(RetrievalError::ConfigurationError(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if !(self.approximate_keep_ratio > 0.0 && self.approximate_keep_ratio <= 1.0) {
            return Err(RetrievalError::ConfigurationError(format!(
                "approximate_keep_ratio ({}) must be in (0, 1]",
                self.approximate_keep_ratio
            )));
        }
        Ok(())
    }
}

/// A window that never advances is a configuration error, not something to
/// paper over at split time.
pub(crate) fn validate_window(chunk_size: u32, overlap: u32) -> Result<()> {
    if chunk_size == 0 {
        return Err(RetrievalError::ConfigurationError(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(RetrievalError::ConfigurationError(format!(
            "chunk_overlap ({overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Builder for a validated [`RetrievalConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetrievalConfigBuilder {
    config: RetrievalConfig,
}

impl RetrievalConfigBuilder {
    pub fn chunk_size(mut self, size: u32) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn chunk_overlap(mut self, overlap: u32) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    pub fn default_top_k(mut self, k: u32) -> Self {
        self.config.default_top_k = k;
        self
    }

    pub fn context_fan_out(mut self, k: u32) -> Self {
        self.config.context_fan_out = k;
        self
    }

    pub fn max_context_tokens(mut self, tokens: u32) -> Self {
        self.config.max_context_tokens = tokens;
        self
    }

    pub fn context_separator(mut self, separator: impl Into<String>) -> Self {
        self.config.context_separator = separator.into();
        self
    }

    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    pub fn full_text_mode(mut self, mode: FullTextMode) -> Self {
        self.config.full_text_mode = mode;
        self
    }

    pub fn approximate_keep_ratio(mut self, ratio: f64) -> Self {
        self.config.approximate_keep_ratio = ratio;
        self
    }

    pub fn preview_chars(mut self, chars: usize) -> Self {
        self.config.preview_chars = chars;
        self
    }

    pub fn build(self) -> Result<RetrievalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
