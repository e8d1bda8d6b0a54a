//! Chunk and search-result types, and the registry of indexed documents.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, RetrievalError};
use crate::vector::{FlatIndex, VectorSearch};

/// A token window of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub chunk_index: u32,
    pub token_count: u32,
    pub start_token: u32,
    /// Exclusive.
    pub end_token: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub chunk_index: u32,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResult {
    pub chunks_indexed: u32,
    pub total_tokens: u32,
}

/// A chunk with its embedding, as handed to an external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub document_id: String,
    pub content: String,
    pub chunk_index: u32,
    pub token_count: u32,
    pub start_token: u32,
    pub end_token: u32,
    pub embedding: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(document_id: &str, chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            document_id: document_id.to_string(),
            content: chunk.content.clone(),
            chunk_index: chunk.chunk_index,
            token_count: chunk.token_count,
            start_token: chunk.start_token,
            end_token: chunk.end_token,
            embedding,
        }
    }

    pub fn into_parts(self) -> (Chunk, Vec<f32>) {
        let chunk = Chunk {
            content: self.content,
            chunk_index: self.chunk_index,
            token_count: self.token_count,
            start_token: self.start_token,
            end_token: self.end_token,
        };
        (chunk, self.embedding)
    }
}

/// One indexed document: its chunks and the vectors for them, same order.
pub struct DocumentEntry {
    chunks: Vec<Chunk>,
    index: Box<dyn VectorSearch>,
}

impl DocumentEntry {
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn index(&self) -> &dyn VectorSearch {
        self.index.as_ref()
    }

    pub fn total_tokens(&self) -> u32 {
        self.chunks.iter().map(|c| c.token_count).sum()
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let hits = self.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|(pos, score)| {
                self.chunks.get(pos).map(|c| SearchResult {
                    content: c.content.clone(),
                    chunk_index: c.chunk_index,
                    score: f64::from(score),
                })
            })
            .collect())
    }
}

/// Registry of indexed documents.
///
/// Entries are immutable and published whole: writers build the new entry
/// outside the lock and swap it in, readers clone the `Arc` and release the
/// lock before doing any work. A reader therefore sees either the old or the
/// new document, never a mix.
pub struct DocumentIndex {
    dimension: usize,
    entries: RwLock<HashMap<String, Arc<DocumentEntry>>>,
}

impl DocumentIndex {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, entries: RwLock::new(HashMap::new()) }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Install `chunks` and `vectors` under `doc_id`, replacing any previous
    /// entry. On error the previous entry is left as it was.
    pub fn index_document(&self, doc_id: &str, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<IndexResult> {
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyDocument { doc_id: doc_id.to_string() });
        }
        if chunks.len() != vectors.len() {
            return Err(RetrievalError::ChunkVectorMismatch { chunks: chunks.len(), vectors: vectors.len() });
        }
        let index = FlatIndex::build(self.dimension, &vectors)?;
        let entry = DocumentEntry { chunks, index: Box::new(index) };
        let result = IndexResult {
            chunks_indexed: entry.chunks.len() as u32,
            total_tokens: entry.total_tokens(),
        };

        let replaced = self.entries.write().insert(doc_id.to_string(), Arc::new(entry)).is_some();
        tracing::info!(doc_id, chunks = result.chunks_indexed, tokens = result.total_tokens, replaced, "indexed document");
        Ok(result)
    }

    /// Snapshot of a document's entry.
    pub fn entry(&self, doc_id: &str) -> Result<Arc<DocumentEntry>> {
        self.entries
            .read()
            .get(doc_id)
            .cloned()
            .ok_or_else(|| RetrievalError::DocumentNotIndexed(doc_id.to_string()))
    }

    pub fn search(&self, doc_id: &str, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let entry = self.entry(doc_id)?;
        let results = entry.search(query, k)?;
        tracing::debug!(doc_id, k, results = results.len(), "searched document");
        Ok(results)
    }

    /// Full text rebuilt with the approximate overlap cut (first 80% of each
    /// non-final chunk).
    pub fn get_full_text(&self, doc_id: &str) -> Result<String> {
        let entry = self.entry(doc_id)?;
        Ok(crate::reconstruct::approximate(entry.chunks(), crate::reconstruct::DEFAULT_KEEP_RATIO))
    }

    /// Drop a document. Unknown ids are an error, not a no-op.
    pub fn remove_document(&self, doc_id: &str) -> Result<()> {
        match self.entries.write().remove(doc_id) {
            Some(_) => {
                tracing::info!(doc_id, "removed document");
                Ok(())
            }
            None => Err(RetrievalError::DocumentNotIndexed(doc_id.to_string())),
        }
    }

    pub fn is_indexed(&self, doc_id: &str) -> bool {
        self.entries.read().contains_key(doc_id)
    }

    /// Indexed ids, sorted.
    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
