//! Error types for the retrieval core.

use thiserror::Error;

/// Errors raised by chunking, embedding, indexing and lookup.
///
/// Every variant is terminal for the call that produced it; nothing is retried
/// internally.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Chunking produced nothing to index.
    #[error("no content could be extracted from document '{doc_id}'")]
    EmptyDocument { doc_id: String },

    /// The document id has no registry entry.
    #[error("document '{0}' is not indexed")]
    DocumentNotIndexed(String),

    /// A vector does not have the dimension the index or model is configured for.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Chunk list and vector list handed to the registry differ in length.
    #[error("chunk/vector count mismatch: {chunks} chunks, {vectors} vectors")]
    ChunkVectorMismatch { chunks: usize, vectors: usize },

    /// The embedding model failed or returned unusable output.
    #[error("embedding error ({model}): {message}")]
    EmbeddingError { model: String, message: String },

    /// Invalid chunking or retrieval parameters.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// The text extractor could not read the source file.
    #[error("extraction error: {0}")]
    ExtractionError(String),

    /// The downstream generator failed.
    #[error("generation error: {0}")]
    GenerationError(String),
}

impl RetrievalError {
    pub(crate) fn embedding(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingError { model: model.into(), message: message.into() }
    }

    /// True for the expected "unknown document" condition, as opposed to a defect.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DocumentNotIndexed(_))
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RetrievalError>;
