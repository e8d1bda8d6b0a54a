//! Deterministic local embedding model based on feature hashing.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::embedding::EmbeddingModel;
use crate::error::Result;
use crate::tokenizer::{analyze, words};

pub const DEFAULT_DIMENSIONS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashes analyzed terms into a fixed number of buckets weighted by
/// `1 + ln(tf)`.
///
/// Texts made only of stopwords fall back to their raw lowercase words, and
/// texts with no words at all to their trimmed content, so every input maps to
/// a non-zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    /// Embed one text. Output is not normalized.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut features: Vec<String> = analyze(text).into_iter().map(|(term, _)| term).collect();
        if features.is_empty() {
            features = words(text);
        }
        if features.is_empty() {
            features.push(text.trim().to_string());
        }

        let mut tf: HashMap<usize, u32> = HashMap::new();
        for feature in &features {
            *tf.entry(self.bucket(feature)).or_insert(0) += 1;
        }
        let mut vector = vec![0.0f32; self.dimensions];
        for (bucket, count) in tf {
            vector[bucket] = 1.0 + (count as f32).ln();
        }
        vector
    }

    fn bucket(&self, feature: &str) -> usize {
        (fnv1a(feature.as_bytes()) % self.dimensions as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingModel for HashingEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}
