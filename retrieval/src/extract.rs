//! Raw text extraction from uploaded files.

use std::path::Path;

use crate::error::{Result, RetrievalError};

/// Turns a stored file into raw Unicode text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Plain-text files (`.txt`, `.text`, `.md`). UTF-8 first, Latin-1 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn supports(path: &Path) -> bool {
        matches!(extension(path).as_deref(), Some("txt" | "text" | "md"))
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        if !Self::supports(path) {
            let ext = extension(path).unwrap_or_default();
            return Err(RetrievalError::ExtractionError(format!("unsupported file type: .{ext}")));
        }
        let bytes = std::fs::read(path)
            .map_err(|e| RetrievalError::ExtractionError(format!("cannot read {}: {e}", path.display())))?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::debug!(path = %path.display(), "not utf-8, decoding as latin-1");
                Ok(e.into_bytes().iter().map(|&b| char::from(b)).collect())
            }
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(|s| s.to_str()).map(|s| s.to_ascii_lowercase())
}
