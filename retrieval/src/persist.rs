//! On-disk store of embedding records, one bincode file per document.

use crate::EmbeddingRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Store-wide metadata, written as JSON next to the record files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub num_docs: u32,
    pub dimensions: usize,
    pub created_at: String,
    pub version: u32,
}

/// Layout of an embedding-record store:
/// `meta.json`, `documents.bin` (doc id → slot) and `records/{slot}.records.bin`.
pub struct StorePaths {
    pub root: PathBuf,
}

impl StorePaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn documents(&self) -> PathBuf { self.root.join("documents.bin") }
    fn records_dir(&self) -> PathBuf { self.root.join("records") }
    fn records(&self, slot: u32) -> PathBuf { self.records_dir().join(format!("{slot:08}.records.bin")) }
}

pub fn save_meta(paths: &StorePaths, meta: &StoreMeta) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &StorePaths) -> Result<StoreMeta> {
    let mut f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: StoreMeta = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Metadata if the store has a `meta.json`, `None` otherwise.
pub fn try_load_meta(paths: &StorePaths) -> Result<Option<StoreMeta>> {
    if !paths.meta().exists() {
        return Ok(None);
    }
    load_meta(paths).map(Some)
}

pub fn save_document_slots(paths: &StorePaths, slots: &HashMap<String, u32>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.documents())?;
    let bytes = bincode::serialize(slots)?;
    f.write_all(&bytes)?;
    Ok(())
}

/// Doc id → slot map; empty if the store has no documents yet.
pub fn load_document_slots(paths: &StorePaths) -> Result<HashMap<String, u32>> {
    let path = paths.documents();
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let slots = bincode::deserialize(&buf)?;
    Ok(slots)
}

pub fn save_records(paths: &StorePaths, slot: u32, records: &[EmbeddingRecord]) -> Result<()> {
    create_dir_all(paths.records_dir())?;
    let mut f = File::create(paths.records(slot))?;
    let bytes = bincode::serialize(records)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_records(paths: &StorePaths, slot: u32) -> Result<Vec<EmbeddingRecord>> {
    let file = paths.records(slot);
    let mut f = File::open(&file).with_context(|| format!("opening {}", file.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let records = bincode::deserialize(&buf)?;
    Ok(records)
}

/// Write one document's records, reusing its slot if the id is already stored.
pub fn store_document(paths: &StorePaths, doc_id: &str, records: &[EmbeddingRecord]) -> Result<u32> {
    let mut slots = load_document_slots(paths)?;
    let next = slots.values().max().map_or(0, |s| s + 1);
    let slot = *slots.entry(doc_id.to_string()).or_insert(next);
    save_records(paths, slot, records)?;
    save_document_slots(paths, &slots)?;
    Ok(slot)
}

/// Every stored document with its records, sorted by doc id.
pub fn load_all(paths: &StorePaths) -> Result<Vec<(String, Vec<EmbeddingRecord>)>> {
    let mut slots: Vec<(String, u32)> = load_document_slots(paths)?.into_iter().collect();
    slots.sort();
    slots
        .into_iter()
        .map(|(doc_id, slot)| Ok((doc_id, load_records(paths, slot)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(doc: &str, i: u32) -> EmbeddingRecord {
        EmbeddingRecord {
            document_id: doc.to_string(),
            content: format!("chunk {i} "),
            chunk_index: i,
            token_count: 2,
            start_token: i * 2,
            end_token: i * 2 + 2,
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn meta_is_optional() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::new(dir.path());
        assert!(try_load_meta(&paths).unwrap().is_none());
        let meta = StoreMeta { num_docs: 2, dimensions: 64, created_at: "2026-01-01T00:00:00Z".into(), version: 1 };
        save_meta(&paths, &meta).unwrap();
        assert_eq!(try_load_meta(&paths).unwrap(), Some(meta));
    }

    #[test]
    fn store_and_reload() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::new(dir.path());
        assert_eq!(store_document(&paths, "lecture-1", &[record("lecture-1", 0), record("lecture-1", 1)]).unwrap(), 0);
        assert_eq!(store_document(&paths, "lecture-2", &[record("lecture-2", 0)]).unwrap(), 1);
        // same id keeps its slot and replaces the rows
        assert_eq!(store_document(&paths, "lecture-1", &[record("lecture-1", 0)]).unwrap(), 0);

        let all = load_all(&paths).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "lecture-1");
        assert_eq!(all[0].1, vec![record("lecture-1", 0)]);
        assert_eq!(all[1].1.len(), 1);
    }

    #[test]
    fn meta_round_trip() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::new(dir.path());
        let meta = StoreMeta { num_docs: 3, dimensions: 256, created_at: "2024-01-01T00:00:00Z".into(), version: 1 };
        save_meta(&paths, &meta).unwrap();
        assert_eq!(load_meta(&paths).unwrap(), meta);
    }

    #[test]
    fn empty_store_has_no_documents() {
        let dir = tempdir().unwrap();
        assert!(load_all(&StorePaths::new(dir.path())).unwrap().is_empty());
    }
}
