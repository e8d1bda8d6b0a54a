//! Embedding model served over an OpenAI-compatible `/v1/embeddings` API.
//!
//! Only available with the `http` feature.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingModel;
use crate::error::{Result, RetrievalError};

pub struct HttpEmbeddingModel {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl HttpEmbeddingModel {
    /// `url` is the full embeddings endpoint, e.g. `http://localhost:8081/v1/embeddings`.
    pub fn new(url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self { client: reqwest::Client::new(), url: url.into(), model: model.into(), api_key: None, dimensions }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    /// Vectors in input order; servers may return items out of order, and
    /// `index` is authoritative when every item carries one.
    fn into_vectors(mut self) -> Vec<Vec<f32>> {
        if self.data.iter().all(|d| d.index.is_some()) {
            self.data.sort_by_key(|d| d.index);
        }
        self.data.into_iter().map(|d| d.embedding).collect()
    }
}

#[async_trait]
impl EmbeddingModel for HttpEmbeddingModel {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(url = %self.url, model = %self.model, batch_size = texts.len(), "requesting embeddings");

        let mut request = self.client.post(&self.url).json(&EmbeddingRequest { model: &self.model, input: texts });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| {
            error!(url = %self.url, error = %e, "embedding request failed");
            RetrievalError::embedding(&self.model, format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(url = %self.url, %status, "embedding endpoint returned an error");
            return Err(RetrievalError::embedding(&self.model, format!("HTTP {status}: {body}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::embedding(&self.model, format!("invalid response: {e}")))?;
        Ok(parsed.into_vectors())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }
}
