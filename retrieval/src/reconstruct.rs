//! Rebuilding a document's text from its overlapping chunks.

use crate::tokenizer::Tokenizer;
use crate::Chunk;

pub const DEFAULT_KEEP_RATIO: f64 = 0.8;

/// Keep the first `keep_ratio` of every chunk but the last (measured in
/// characters), then the last chunk whole.
///
/// Approximate: unless the overlap is exactly `1 - keep_ratio` of each chunk,
/// text near boundaries is duplicated or lost.
pub fn approximate(chunks: &[Chunk], keep_ratio: f64) -> String {
    let mut text = String::new();
    let Some((last, rest)) = chunks.split_last() else {
        return text;
    };
    for chunk in rest {
        let chars = chunk.content.chars().count();
        let cut = (chars as f64 * keep_ratio) as usize;
        text.extend(chunk.content.chars().take(cut));
    }
    text.push_str(&last.content);
    text
}

/// Drop from each chunk the tokens it shares with its predecessor.
///
/// Exact as long as the chunks were produced by the same tokenizer.
pub fn exact(chunks: &[Chunk], tokenizer: &dyn Tokenizer) -> String {
    let mut text = String::new();
    let mut covered_to = 0u32;
    for chunk in chunks {
        let skip = covered_to.saturating_sub(chunk.start_token) as usize;
        if skip == 0 {
            text.push_str(&chunk.content);
        } else {
            let spans = tokenizer.tokenize(&chunk.content);
            if let Some(span) = spans.get(skip) {
                text.push_str(&chunk.content[span.start..]);
            }
        }
        covered_to = covered_to.max(chunk.end_token);
    }
    text
}
