//! Per-document retrieval for study material: token-window chunking,
//! embedding, exact cosine search, full-text reconstruction and
//! token-budgeted context assembly.

pub mod chunker;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod hashing;
#[cfg(feature = "http")]
pub mod http;
pub mod index;
pub mod persist;
pub mod reconstruct;
pub mod service;
pub mod study;
pub mod tokenizer;
pub mod vector;

pub use chunker::Chunker;
pub use config::{FullTextMode, RetrievalConfig};
pub use context::{assemble_context, ContextAssembler};
pub use embedding::{Embedder, EmbeddingModel};
pub use error::{Result, RetrievalError};
pub use extract::{PlainTextExtractor, TextExtractor};
pub use hashing::HashingEmbedder;
pub use index::{Chunk, DocumentEntry, DocumentIndex, EmbeddingRecord, IndexResult, SearchResult};
pub use service::{DocumentInfo, Preview, Retriever};
pub use tokenizer::{Tokenizer, WordTokenizer};
pub use vector::{FlatIndex, VectorSearch};
