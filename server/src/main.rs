use anyhow::Result;
use axum::Router;
use clap::Parser;
use retrieval::http::HttpEmbeddingModel;
use retrieval::{EmbeddingModel, HashingEmbedder, RetrievalConfig, Retriever};
use server::{build_app, load_store, store_dimensions};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Embedding-record store to restore documents from at startup
    #[arg(long)]
    store: Option<PathBuf>,
    /// JSON retrieval config; defaults apply to missing fields
    #[arg(long)]
    config: Option<PathBuf>,
    /// Embedding dimensions; defaults to the store's recorded dimensions, else 256
    #[arg(long)]
    dimensions: Option<usize>,
    /// OpenAI-compatible embeddings endpoint; the local hashing model is used when absent
    #[arg(long)]
    embedding_url: Option<String>,
    /// Model name sent to the embeddings endpoint
    #[arg(long, default_value = "text-embedding-3-small")]
    embedding_model: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RetrievalConfig::from_json_file(path)?,
        None => RetrievalConfig::default(),
    };
    let stored = match &args.store {
        Some(store) => store_dimensions(store)?,
        None => None,
    };
    let dimensions = args.dimensions.or(stored).unwrap_or(retrieval::hashing::DEFAULT_DIMENSIONS);
    let model: Arc<dyn EmbeddingModel> = match &args.embedding_url {
        Some(url) => {
            let mut model = HttpEmbeddingModel::new(url, &args.embedding_model, dimensions);
            if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
                model = model.with_api_key(key);
            }
            Arc::new(model)
        }
        None => Arc::new(HashingEmbedder::new(dimensions)),
    };
    let retriever = Arc::new(Retriever::builder().config(config).embedding_model(model).build()?);
    if let Some(store) = &args.store {
        load_store(&retriever, store)?;
    }

    let app: Router = build_app(retriever);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
