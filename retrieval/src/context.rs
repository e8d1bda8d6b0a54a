//! Token-budgeted context assembly for downstream generation.

use std::sync::Arc;

use crate::tokenizer::Tokenizer;
use crate::SearchResult;

/// Join whole chunks, in the given order, until the next one would exceed
/// `max_tokens`. Chunks are never cut; if the first does not fit the result is
/// empty.
pub fn assemble_context<F>(results: &[SearchResult], max_tokens: u32, separator: &str, count_tokens: F) -> String
where
    F: Fn(&str) -> u32,
{
    let mut parts: Vec<&str> = Vec::new();
    let mut total = 0u32;
    for result in results {
        let tokens = count_tokens(&result.content);
        if total.saturating_add(tokens) > max_tokens {
            break;
        }
        parts.push(&result.content);
        total += tokens;
    }
    parts.join(separator)
}

/// [`assemble_context`] bound to the shared tokenizer and a fixed separator.
#[derive(Clone)]
pub struct ContextAssembler {
    tokenizer: Arc<dyn Tokenizer>,
    separator: String,
}

impl ContextAssembler {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, separator: impl Into<String>) -> Self {
        Self { tokenizer, separator: separator.into() }
    }

    pub fn assemble(&self, results: &[SearchResult], max_tokens: u32) -> String {
        assemble_context(results, max_tokens, &self.separator, |text| self.tokenizer.count_tokens(text) as u32)
    }
}
