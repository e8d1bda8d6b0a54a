//! Token-window chunking.

use std::sync::Arc;

use crate::config::validate_window;
use crate::error::Result;
use crate::tokenizer::Tokenizer;
use crate::Chunk;

/// Splits text into overlapping, token-bounded windows.
///
/// Windows start every `chunk_size - overlap` tokens and generation stops once
/// a window reaches the end of the token stream, so a text of `n > chunk_size`
/// tokens yields `ceil((n - overlap) / stride)` chunks and anything shorter
/// yields exactly one.
#[derive(Clone)]
pub struct Chunker {
    tokenizer: Arc<dyn Tokenizer>,
}

impl Chunker {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Split `text` into chunks. Blank text, or text the tokenizer finds no
    /// tokens in, yields an empty vector.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`](crate::RetrievalError::ConfigurationError) when
    /// `chunk_size == 0` or `overlap >= chunk_size`.
    pub fn split(&self, text: &str, chunk_size: u32, overlap: u32) -> Result<Vec<Chunk>> {
        validate_window(chunk_size, overlap)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let spans = self.tokenizer.tokenize(text);
        if spans.is_empty() {
            return Ok(Vec::new());
        }

        let total = spans.len();
        let size = chunk_size as usize;
        let stride = (chunk_size - overlap) as usize;

        let mut chunks = Vec::with_capacity(total.saturating_sub(overlap as usize) / stride + 1);
        let mut start = 0usize;
        loop {
            let end = (start + size).min(total);
            let content = &text[spans[start].start..spans[end - 1].end];
            chunks.push(Chunk {
                content: content.to_string(),
                chunk_index: chunks.len() as u32,
                token_count: (end - start) as u32,
                start_token: start as u32,
                end_token: end as u32,
            });
            if end == total {
                break;
            }
            start += stride;
        }

        tracing::debug!(tokens = total, chunks = chunks.len(), chunk_size, overlap, "split text");
        Ok(chunks)
    }
}
