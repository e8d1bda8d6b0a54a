use anyhow::{bail, Result};
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use retrieval::persist::{load_all, try_load_meta, StorePaths};
use retrieval::{DocumentInfo, IndexResult, Preview, RetrievalError, Retriever, SearchResult};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<u32>,
}

#[derive(Deserialize)]
pub struct ContextParams {
    pub q: String,
    pub max_tokens: Option<u32>,
}

#[derive(Deserialize)]
pub struct IndexRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub document_id: String,
    pub query: String,
    pub took_s: f64,
    pub results: Vec<SearchResult>,
}

#[derive(Serialize)]
pub struct TextResponse {
    pub document_id: String,
    pub text: String,
}

#[derive(Serialize)]
pub struct ContextResponse {
    pub document_id: String,
    pub query: String,
    pub context: String,
}

#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<Retriever>,
}

type ApiResult<T> = std::result::Result<T, (StatusCode, String)>;

pub fn build_app(retriever: Arc<Retriever>) -> Router {
    let app_state = AppState { retriever };
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/documents", get(list_handler))
        .route("/documents/:doc_id", get(info_handler).put(index_handler).delete(remove_handler))
        .route("/documents/:doc_id/search", get(search_handler))
        .route("/documents/:doc_id/text", get(text_handler))
        .route("/documents/:doc_id/preview", get(preview_handler))
        .route("/documents/:doc_id/context", get(context_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

/// Embedding dimensions recorded in a store's metadata, if it has any.
pub fn store_dimensions(dir: &FsPath) -> Result<Option<usize>> {
    Ok(try_load_meta(&StorePaths::new(dir))?.map(|meta| meta.dimensions))
}

/// Rebuild the registry from an embedding-record store written by the indexer.
///
/// Fails before restoring anything if the store was built for a different
/// embedding dimension than `retriever` uses.
pub fn load_store(retriever: &Retriever, dir: &FsPath) -> Result<usize> {
    let paths = StorePaths::new(dir);
    if let Some(meta) = try_load_meta(&paths)? {
        let expected = retriever.documents().dimension();
        if meta.dimensions != expected {
            bail!(
                "store {} holds {}-dimensional embeddings but the embedding model produces {expected}; \
                 start with --dimensions {}",
                dir.display(),
                meta.dimensions,
                meta.dimensions
            );
        }
    }
    let mut loaded = 0;
    for (doc_id, records) in load_all(&paths)? {
        retriever.restore(&doc_id, records)?;
        loaded += 1;
    }
    tracing::info!(dir = %dir.display(), documents = loaded, "restored documents from store");
    Ok(loaded)
}

fn error_response(err: RetrievalError) -> (StatusCode, String) {
    let status = match &err {
        RetrievalError::DocumentNotIndexed(_) => StatusCode::NOT_FOUND,
        RetrievalError::EmptyDocument { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RetrievalError::ConfigurationError(_) => StatusCode::BAD_REQUEST,
        RetrievalError::EmbeddingError { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, err.to_string())
}

async fn list_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.retriever.documents().document_ids())
}

async fn info_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> ApiResult<Json<DocumentInfo>> {
    state.retriever.document_info(&doc_id).map(Json).map_err(error_response)
}

pub async fn index_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
    Json(body): Json<IndexRequest>,
) -> ApiResult<Json<IndexResult>> {
    state.retriever.index_document(&doc_id, &body.text).await.map(Json).map_err(error_response)
}

async fn remove_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> ApiResult<StatusCode> {
    state.retriever.remove_document(&doc_id).map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    let start = std::time::Instant::now();
    let k = params.k.unwrap_or(state.retriever.config().default_top_k).min(100);
    let results = state.retriever.search(&doc_id, &params.q, k).await.map_err(error_response)?;
    Ok(Json(SearchResponse { document_id: doc_id, query: params.q, took_s: start.elapsed().as_secs_f64(), results }))
}

async fn text_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> ApiResult<Json<TextResponse>> {
    let text = state.retriever.get_full_text(&doc_id).map_err(error_response)?;
    Ok(Json(TextResponse { document_id: doc_id, text }))
}

async fn preview_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> ApiResult<Json<Preview>> {
    state.retriever.preview(&doc_id).map(Json).map_err(error_response)
}

async fn context_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
    Query(params): Query<ContextParams>,
) -> ApiResult<Json<ContextResponse>> {
    let max_tokens = params.max_tokens.unwrap_or(state.retriever.config().max_context_tokens);
    let context = state
        .retriever
        .get_context_for_query(&doc_id, &params.q, max_tokens)
        .await
        .map_err(error_response)?;
    Ok(Json(ContextResponse { document_id: doc_id, query: params.q, context }))
}
