use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use retrieval::persist::{load_all, load_meta, save_meta, store_document, StoreMeta, StorePaths};
use retrieval::{Chunker, HashingEmbedder, PlainTextExtractor, RetrievalConfig, Retriever, TextExtractor, WordTokenizer};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Chunk and embed study documents into an embedding-record store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a text file, or every .txt/.md file under a directory, into a store
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output store directory
        #[arg(long)]
        output: String,
        /// JSON retrieval config
        #[arg(long)]
        config: Option<PathBuf>,
        /// Embedding dimensions
        #[arg(long, default_value_t = retrieval::hashing::DEFAULT_DIMENSIONS)]
        dimensions: usize,
    },
    /// Print the chunks of a text file as JSON lines
    Chunk {
        #[arg(long)]
        input: String,
        #[arg(long, default_value_t = 1000)]
        chunk_size: u32,
        #[arg(long, default_value_t = 200)]
        overlap: u32,
    },
    /// Search one stored document
    Query {
        /// Store directory written by `build`
        #[arg(long)]
        store: String,
        /// Document id
        #[arg(long)]
        doc: String,
        /// Query text
        #[arg(long)]
        q: String,
        #[arg(long, default_value_t = 5)]
        k: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config, dimensions } => build_store(&input, &output, config.as_deref(), dimensions).await,
        Commands::Chunk { input, chunk_size, overlap } => print_chunks(&input, chunk_size, overlap),
        Commands::Query { store, doc, q, k } => query_store(&store, &doc, &q, k).await,
    }
}

fn retriever(config: RetrievalConfig, dimensions: usize) -> Result<Retriever> {
    Ok(Retriever::builder()
        .config(config)
        .embedding_model(Arc::new(HashingEmbedder::new(dimensions)))
        .build()?)
}

/// Text files under `input`, sorted so slot assignment is reproducible.
fn collect_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && PlainTextExtractor::supports(p) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files.sort();
    files
}

fn doc_id_for(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).ok().filter(|p| !p.as_os_str().is_empty()).unwrap_or(file);
    let rel = rel.with_extension("");
    match rel.file_name() {
        Some(_) if root.is_dir() => rel.to_string_lossy().replace('\\', "/"),
        Some(name) => name.to_string_lossy().to_string(),
        None => file.to_string_lossy().to_string(),
    }
}

async fn build_store(input: &str, output: &str, config: Option<&Path>, dimensions: usize) -> Result<()> {
    let config = match config {
        Some(path) => RetrievalConfig::from_json_file(path)?,
        None => RetrievalConfig::default(),
    };
    let retriever = retriever(config, dimensions)?;
    let input_path = Path::new(input);
    let out_paths = StorePaths::new(output);

    let files = collect_files(input_path);
    if files.is_empty() {
        bail!("no .txt/.md files found under {input}");
    }

    let mut num_docs = 0u32;
    for file in files {
        let doc_id = doc_id_for(input_path, &file);
        match retriever.index_file(&doc_id, &file, &PlainTextExtractor).await {
            Ok(result) => {
                store_document(&out_paths, &doc_id, &retriever.export(&doc_id)?)?;
                tracing::info!(doc_id, chunks = result.chunks_indexed, tokens = result.total_tokens, "stored document");
                num_docs += 1;
            }
            Err(e @ retrieval::RetrievalError::EmptyDocument { .. }) => {
                tracing::warn!(doc_id, error = %e, "skipping document");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let meta = StoreMeta {
        num_docs: load_all(&out_paths)?.len() as u32,
        dimensions,
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: 1,
    };
    save_meta(&out_paths, &meta)?;

    tracing::info!(output, indexed = num_docs, "store build complete");
    Ok(())
}

fn print_chunks(input: &str, chunk_size: u32, overlap: u32) -> Result<()> {
    let text = PlainTextExtractor.extract(Path::new(input))?;
    let chunker = Chunker::new(Arc::new(WordTokenizer));
    for chunk in chunker.split(&text, chunk_size, overlap)? {
        println!("{}", serde_json::to_string(&chunk)?);
    }
    Ok(())
}

async fn query_store(store: &str, doc: &str, q: &str, k: u32) -> Result<()> {
    let paths = StorePaths::new(store);
    let meta = load_meta(&paths)?;
    let retriever = retriever(RetrievalConfig::default(), meta.dimensions)?;
    let Some((_, records)) = load_all(&paths)?.into_iter().find(|(id, _)| id == doc) else {
        bail!("document '{doc}' is not in store {store}");
    };
    retriever.restore(doc, records)?;
    let results = retriever.search(doc, q, k).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn doc_ids_are_relative_paths_without_extension() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("bio")).unwrap();
        let file = root.join("bio").join("cells.txt");
        std::fs::write(&file, "Cells.").unwrap();
        assert_eq!(doc_id_for(root, &file), "bio/cells");
        assert_eq!(doc_id_for(&file, &file), "cells");
    }

    #[tokio::test]
    async fn build_then_query() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        std::fs::write(input.path().join("cells.txt"), "Mitochondria release energy. Ribosomes build proteins.").unwrap();
        std::fs::write(input.path().join("empty.md"), "   ").unwrap();
        std::fs::write(input.path().join("slides.pdf"), "%PDF").unwrap();

        let out = output.path().to_string_lossy().to_string();
        build_store(&input.path().to_string_lossy(), &out, None, 64).await.unwrap();

        let paths = StorePaths::new(&out);
        let meta = load_meta(&paths).unwrap();
        assert_eq!((meta.num_docs, meta.dimensions), (1, 64));
        let all = load_all(&paths).unwrap();
        assert_eq!(all[0].0, "cells");
        assert_eq!(all[0].1[0].embedding.len(), 64);
        query_store(&out, "cells", "ribosomes", 1).await.unwrap();
        assert!(query_store(&out, "missing", "x", 1).await.is_err());
    }
}
