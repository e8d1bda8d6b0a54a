//! Embedding model seam and the normalizing wrapper around it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Result, RetrievalError};

/// A capability that turns text into vectors.
///
/// Implementations wrap a specific backend (a local model, an HTTP API).
/// They may or may not normalize their output; [`Embedder`] does it anyway.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Dimension of every vector this model returns.
    fn dimensions(&self) -> usize;

    /// Short name used in errors and logs.
    fn name(&self) -> &str;
}

/// Validating, normalizing front end over an [`EmbeddingModel`].
///
/// Input is sent in batches of at most `batch_size`; batching never changes the
/// result because each vector depends on its own text only.
#[derive(Clone)]
pub struct Embedder {
    model: Arc<dyn EmbeddingModel>,
    batch_size: usize,
}

impl Embedder {
    pub fn new(model: Arc<dyn EmbeddingModel>, batch_size: usize) -> Self {
        Self { model, batch_size: batch_size.max(1) }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Embed `texts` into unit-length vectors, preserving order.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::EmbeddingError`] if the model fails, returns the
    ///   wrong number of vectors, or a vector is non-finite or all zeros.
    /// - [`RetrievalError::DimensionMismatch`] if a vector has the wrong length.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let dims = self.model.dimensions();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = self.model.name(), batch_size = batch.len(), "embedding batch");
            let vectors = self.model.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                warn!(model = self.model.name(), expected = batch.len(), got = vectors.len(), "embedding count mismatch");
                return Err(RetrievalError::embedding(
                    self.model.name(),
                    format!("expected {} vectors, got {}", batch.len(), vectors.len()),
                ));
            }
            for mut vector in vectors {
                if vector.len() != dims {
                    return Err(RetrievalError::DimensionMismatch { expected: dims, actual: vector.len() });
                }
                normalize(&mut vector).map_err(|message| RetrievalError::embedding(self.model.name(), message))?;
                out.push(vector);
            }
        }
        Ok(out)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text])
            .await?
            .pop()
            .ok_or_else(|| RetrievalError::embedding(self.model.name(), "model returned no vector"))
    }
}

/// Scale `vector` to unit L2 length in place.
pub fn normalize(vector: &mut [f32]) -> std::result::Result<(), String> {
    if vector.iter().any(|x| !x.is_finite()) {
        return Err("vector has non-finite components".to_string());
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return Err("vector has zero norm".to_string());
    }
    for x in vector.iter_mut() {
        *x /= norm;
    }
    Ok(())
}
