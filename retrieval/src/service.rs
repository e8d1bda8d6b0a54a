//! The retrieval facade: chunk, embed, index, search, assemble.
//!
//! A [`Retriever`] is built once at startup and shared (usually behind an
//! `Arc`) with whatever handles requests. Slow work, extraction and embedding,
//! runs before the registry is touched; the registry only ever sees a finished
//! document.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunker::Chunker;
use crate::config::{FullTextMode, RetrievalConfig};
use crate::context::ContextAssembler;
use crate::embedding::{normalize, Embedder, EmbeddingModel};
use crate::error::{Result, RetrievalError};
use crate::extract::TextExtractor;
use crate::index::{DocumentEntry, DocumentIndex, EmbeddingRecord, IndexResult, SearchResult};
use crate::reconstruct;
use crate::tokenizer::{Tokenizer, WordTokenizer};

/// Leading slice of a document's reconstructed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub text: String,
    pub truncated: bool,
    /// Characters in the full reconstructed text.
    pub total_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub chunk_count: u32,
    pub total_tokens: u32,
    pub total_characters: usize,
}

pub struct Retriever {
    config: RetrievalConfig,
    chunker: Chunker,
    embedder: Embedder,
    documents: DocumentIndex,
    assembler: ContextAssembler,
}

impl Retriever {
    pub fn builder() -> RetrieverBuilder {
        RetrieverBuilder::default()
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        self.chunker.tokenizer()
    }

    pub fn documents(&self) -> &DocumentIndex {
        &self.documents
    }

    /// Chunk and embed `raw_text`, then publish it under `doc_id`.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::EmptyDocument`] if no chunks could be produced.
    /// - [`RetrievalError::EmbeddingError`] / [`RetrievalError::DimensionMismatch`]
    ///   from the embedding model; any previous entry is left untouched.
    pub async fn index_document(&self, doc_id: &str, raw_text: &str) -> Result<IndexResult> {
        let chunks = self.chunker.split(raw_text, self.config.chunk_size, self.config.chunk_overlap)?;
        if chunks.is_empty() {
            warn!(doc_id, "no content to index");
            return Err(RetrievalError::EmptyDocument { doc_id: doc_id.to_string() });
        }
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self.embedder.embed(&texts).await.inspect_err(|e| {
            warn!(doc_id, model = self.embedder.model_name(), error = %e, "embedding failed during indexing");
        })?;
        self.documents.index_document(doc_id, chunks, vectors)
    }

    /// Extract a file with `extractor` and index its text.
    pub async fn index_file(&self, doc_id: &str, path: &Path, extractor: &dyn TextExtractor) -> Result<IndexResult> {
        let text = extractor.extract(path)?;
        info!(doc_id, path = %path.display(), characters = text.chars().count(), "extracted document");
        self.index_document(doc_id, &text).await
    }

    /// Top `top_k` chunks of `doc_id` for `query`, best first.
    pub async fn search(&self, doc_id: &str, query: &str, top_k: u32) -> Result<Vec<SearchResult>> {
        if !self.documents.is_indexed(doc_id) {
            return Err(RetrievalError::DocumentNotIndexed(doc_id.to_string()));
        }
        let query_vector = self.embedder.embed_one(query).await?;
        self.documents.search(doc_id, &query_vector, top_k as usize)
    }

    /// Reconstructed document text, per the configured [`FullTextMode`].
    pub fn get_full_text(&self, doc_id: &str) -> Result<String> {
        let entry = self.documents.entry(doc_id)?;
        Ok(self.full_text(&entry))
    }

    fn full_text(&self, entry: &DocumentEntry) -> String {
        match self.config.full_text_mode {
            FullTextMode::Approximate => reconstruct::approximate(entry.chunks(), self.config.approximate_keep_ratio),
            FullTextMode::Exact => reconstruct::exact(entry.chunks(), self.tokenizer().as_ref()),
        }
    }

    /// Best-ranked chunks for `query` that fit in `max_tokens`, joined with
    /// the configured separator.
    pub async fn get_context_for_query(&self, doc_id: &str, query: &str, max_tokens: u32) -> Result<String> {
        let results = self.search(doc_id, query, self.config.context_fan_out).await?;
        let context = self.assembler.assemble(&results, max_tokens);
        tracing::debug!(doc_id, candidates = results.len(), max_tokens, empty = context.is_empty(), "assembled context");
        Ok(context)
    }

    pub fn is_indexed(&self, doc_id: &str) -> bool {
        self.documents.is_indexed(doc_id)
    }

    /// # Errors
    ///
    /// [`RetrievalError::DocumentNotIndexed`] if `doc_id` is absent.
    pub fn remove_document(&self, doc_id: &str) -> Result<()> {
        self.documents.remove_document(doc_id)
    }

    pub fn preview(&self, doc_id: &str) -> Result<Preview> {
        let text = self.get_full_text(doc_id)?;
        let total_length = text.chars().count();
        let limit = self.config.preview_chars;
        if total_length <= limit {
            return Ok(Preview { text, truncated: false, total_length });
        }
        let mut head: String = text.chars().take(limit).collect();
        head.push_str("...");
        Ok(Preview { text: head, truncated: true, total_length })
    }

    pub fn document_info(&self, doc_id: &str) -> Result<DocumentInfo> {
        let entry = self.documents.entry(doc_id)?;
        Ok(DocumentInfo {
            chunk_count: entry.chunks().len() as u32,
            total_tokens: entry.total_tokens(),
            total_characters: self.full_text(&entry).chars().count(),
        })
    }

    /// Rows for an external store, in chunk order.
    pub fn export(&self, doc_id: &str) -> Result<Vec<EmbeddingRecord>> {
        let entry = self.documents.entry(doc_id)?;
        let index = entry.index();
        entry
            .chunks()
            .iter()
            .enumerate()
            .map(|(pos, chunk)| {
                let vector = index.vector(pos).ok_or(RetrievalError::ChunkVectorMismatch {
                    chunks: entry.chunks().len(),
                    vectors: index.len(),
                })?;
                Ok(EmbeddingRecord::new(doc_id, chunk, vector.to_vec()))
            })
            .collect()
    }

    /// Rebuild a document from stored rows without calling the embedding model.
    ///
    /// Rows may arrive in any order but must all belong to `doc_id` and carry
    /// each chunk index `0..n` exactly once.
    pub fn restore(&self, doc_id: &str, mut records: Vec<EmbeddingRecord>) -> Result<IndexResult> {
        if let Some(stray) = records.iter().find(|r| r.document_id != doc_id) {
            return Err(RetrievalError::ConfigurationError(format!(
                "record for '{}' cannot be restored into '{doc_id}'",
                stray.document_id
            )));
        }
        records.sort_by_key(|r| r.chunk_index);
        let mut chunks = Vec::with_capacity(records.len());
        let mut vectors = Vec::with_capacity(records.len());
        for (pos, record) in records.into_iter().enumerate() {
            if record.chunk_index as usize != pos {
                return Err(RetrievalError::ConfigurationError(format!(
                    "records for '{doc_id}' have a duplicate or missing chunk index at position {pos} (found {})",
                    record.chunk_index
                )));
            }
            let (chunk, mut vector) = record.into_parts();
            if vector.len() != self.documents.dimension() {
                return Err(RetrievalError::DimensionMismatch {
                    expected: self.documents.dimension(),
                    actual: vector.len(),
                });
            }
            normalize(&mut vector).map_err(|message| RetrievalError::EmbeddingError {
                model: "stored".to_string(),
                message: format!("chunk {}: {message}", chunk.chunk_index),
            })?;
            chunks.push(chunk);
            vectors.push(vector);
        }
        self.documents.index_document(doc_id, chunks, vectors)
    }
}

/// Builder for a [`Retriever`]. The embedding model is required; the
/// tokenizer defaults to [`WordTokenizer`] and the config to its defaults.
#[derive(Default)]
pub struct RetrieverBuilder {
    config: Option<RetrievalConfig>,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    embedding_model: Option<Arc<dyn EmbeddingModel>>,
}

impl RetrieverBuilder {
    pub fn config(mut self, config: RetrievalConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn embedding_model(mut self, model: Arc<dyn EmbeddingModel>) -> Self {
        self.embedding_model = Some(model);
        self
    }

    pub fn build(self) -> Result<Retriever> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let model = self
            .embedding_model
            .ok_or_else(|| RetrievalError::ConfigurationError("embedding_model is required".to_string()))?;
        if model.dimensions() == 0 {
            return Err(RetrievalError::ConfigurationError(format!(
                "embedding model '{}' reports zero dimensions",
                model.name()
            )));
        }
        let tokenizer = self.tokenizer.unwrap_or_else(|| Arc::new(WordTokenizer));

        info!(
            model = model.name(),
            dimensions = model.dimensions(),
            chunk_size = config.chunk_size,
            chunk_overlap = config.chunk_overlap,
            "retriever ready"
        );
        Ok(Retriever {
            chunker: Chunker::new(tokenizer.clone()),
            embedder: Embedder::new(model.clone(), config.embedding_batch_size),
            documents: DocumentIndex::new(model.dimensions()),
            assembler: ContextAssembler::new(tokenizer, config.context_separator.clone()),
            config,
        })
    }
}
