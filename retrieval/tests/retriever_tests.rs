use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use retrieval::{
    EmbeddingModel, FullTextMode, HashingEmbedder, Embedder, Result, RetrievalConfig, RetrievalError, Retriever,
};

fn retriever_with(config: RetrievalConfig) -> Retriever {
    Retriever::builder()
        .config(config)
        .embedding_model(Arc::new(HashingEmbedder::default()))
        .build()
        .unwrap()
}

fn small_config() -> RetrievalConfig {
    RetrievalConfig::builder().chunk_size(40).chunk_overlap(10).build().unwrap()
}

fn scenario_text() -> String {
    format!("{}{}", "A. ".repeat(50), "B. ".repeat(50))
}

const BIOLOGY: &str = "Photosynthesis converts light energy into chemical energy inside chloroplasts. \
Chlorophyll absorbs red and blue light. \
Mitochondria release energy from glucose through cellular respiration. \
The Krebs cycle runs in the mitochondrial matrix. \
Ribosomes assemble proteins from amino acids using messenger RNA. ";

#[tokio::test]
async fn scenario_b_query_ranks_b_chunks_first() {
    let r = retriever_with(small_config());
    let res = r.index_document("d1", &scenario_text()).await.unwrap();
    assert_eq!(res.chunks_indexed, 3);
    assert_eq!(res.total_tokens, 120);

    let hits = r.search("d1", "B", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.content.contains('B')));
    assert_eq!(hits.iter().map(|h| h.chunk_index).collect::<Vec<_>>(), vec![1, 2]);

    let all = r.search("d1", "B", 10).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].chunk_index, 0);
    assert!(all[2].score < all[1].score);
}

#[tokio::test]
async fn index_chunk_parity() {
    let r = retriever_with(small_config());
    r.index_document("bio", &BIOLOGY.repeat(4)).await.unwrap();
    let entry = r.documents().entry("bio").unwrap();
    assert_eq!(entry.index().len(), entry.chunks().len());
    assert_eq!(r.export("bio").unwrap().len(), entry.chunks().len());
}

#[tokio::test]
async fn self_similarity_tops_the_ranking() {
    let r = retriever_with(small_config());
    r.index_document("bio", &BIOLOGY.repeat(3)).await.unwrap();
    let entry = r.documents().entry("bio").unwrap();
    for chunk in entry.chunks() {
        let hits = r.search("bio", &chunk.content, 1).await.unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-5, "chunk {} scored {}", chunk.chunk_index, hits[0].score);
    }
}

#[tokio::test]
async fn reindex_replaces_previous_content() {
    let r = retriever_with(small_config());
    r.index_document("doc", "Mitochondria are the powerhouse of the cell. ").await.unwrap();
    r.index_document("doc", "Tectonic plates drift over the mantle. ").await.unwrap();
    let hits = r.search("doc", "mitochondria powerhouse", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits.iter().all(|h| !h.content.contains("Mitochondria")));
}

#[tokio::test]
async fn empty_document_is_rejected() {
    let r = retriever_with(small_config());
    let err = r.index_document("blank", "   \n ").await.unwrap_err();
    assert!(matches!(err, RetrievalError::EmptyDocument { .. }));
    assert!(!r.is_indexed("blank"));
}

#[tokio::test]
async fn context_smaller_than_first_chunk_is_empty() {
    let r = retriever_with(small_config());
    r.index_document("d1", &scenario_text()).await.unwrap();
    assert_eq!(r.get_context_for_query("d1", "B", 39).await.unwrap(), "");
    let context = r.get_context_for_query("d1", "B", 40).await.unwrap();
    assert_eq!(context, "A. ".repeat(20) + &"B. ".repeat(20));
    let context = r.get_context_for_query("d1", "B", 80).await.unwrap();
    assert_eq!(context.matches("\n\n---\n\n").count(), 1);
}

#[tokio::test]
async fn remove_missing_document_fails() {
    let r = retriever_with(small_config());
    assert!(r.remove_document("missing").unwrap_err().is_not_found());
    r.index_document("d1", &scenario_text()).await.unwrap();
    r.remove_document("d1").unwrap();
    assert!(!r.is_indexed("d1"));
    assert!(r.search("d1", "B", 1).await.unwrap_err().is_not_found());
    assert!(r.get_full_text("d1").unwrap_err().is_not_found());
}

#[tokio::test]
async fn full_text_modes() {
    let text = BIOLOGY.repeat(3);
    let exact = retriever_with(
        RetrievalConfig::builder().chunk_size(40).chunk_overlap(10).full_text_mode(FullTextMode::Exact).build().unwrap(),
    );
    exact.index_document("bio", &text).await.unwrap();
    assert_eq!(exact.get_full_text("bio").unwrap(), text);

    let approx = retriever_with(small_config());
    approx.index_document("bio", &text).await.unwrap();
    assert_eq!(approx.get_full_text("bio").unwrap(), approx.documents().get_full_text("bio").unwrap());
}

#[tokio::test]
async fn preview_truncates_long_text() {
    let r = retriever_with(
        RetrievalConfig::builder().chunk_size(40).chunk_overlap(10).preview_chars(10).build().unwrap(),
    );
    r.index_document("short", "tiny").await.unwrap();
    let p = r.preview("short").unwrap();
    assert!(!p.truncated);
    assert_eq!(p.text, "tiny");

    r.index_document("long", "Chlorophyll absorbs light").await.unwrap();
    let p = r.preview("long").unwrap();
    assert!(p.truncated);
    assert_eq!(p.text, "Chlorophyl...");
    assert_eq!(p.total_length, 25);
}

#[tokio::test]
async fn export_then_restore_matches_search() {
    let source = retriever_with(small_config());
    source.index_document("bio", &BIOLOGY.repeat(2)).await.unwrap();
    let mut records = source.export("bio").unwrap();
    records.reverse();

    let target = retriever_with(small_config());
    let res = target.restore("bio", records).unwrap();
    let info = source.document_info("bio").unwrap();
    assert_eq!((res.chunks_indexed, res.total_tokens), (info.chunk_count, info.total_tokens));
    assert_eq!(target.get_full_text("bio").unwrap(), source.get_full_text("bio").unwrap());

    let restored = target.search("bio", "Krebs cycle", 3).await.unwrap();
    let original = source.search("bio", "Krebs cycle", 3).await.unwrap();
    assert_eq!(restored.len(), original.len());
    for (a, b) in restored.iter().zip(&original) {
        assert_eq!(a.content, b.content);
        assert!((a.score - b.score).abs() < 1e-5);
    }
}

#[tokio::test]
async fn restore_rejects_wrong_dimension() {
    let source = Retriever::builder()
        .config(small_config())
        .embedding_model(Arc::new(HashingEmbedder::new(32)))
        .build()
        .unwrap();
    source.index_document("bio", BIOLOGY).await.unwrap();
    let records = source.export("bio").unwrap();
    let target = retriever_with(small_config());
    let err = target.restore("bio", records).unwrap_err();
    assert!(matches!(err, RetrievalError::DimensionMismatch { expected: 256, actual: 32 }));
}

#[tokio::test]
async fn restore_rejects_inconsistent_rows() {
    let source = retriever_with(small_config());
    source.index_document("bio", &BIOLOGY.repeat(2)).await.unwrap();
    let records = source.export("bio").unwrap();
    assert!(records.len() >= 3);
    let target = retriever_with(small_config());

    let err = target.restore("chem", records.clone()).unwrap_err();
    assert!(matches!(err, RetrievalError::ConfigurationError(_)));

    let mut duplicated = records.clone();
    duplicated.push(records[1].clone());
    assert!(matches!(target.restore("bio", duplicated), Err(RetrievalError::ConfigurationError(_))));

    let mut gapped = records.clone();
    gapped.remove(1);
    assert!(matches!(target.restore("bio", gapped), Err(RetrievalError::ConfigurationError(_))));

    assert!(!target.is_indexed("bio"));
    assert_eq!(target.restore("bio", records).unwrap().chunks_indexed, source.document_info("bio").unwrap().chunk_count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn document_info_is_taken_from_one_snapshot() {
    let mut expected = Vec::new();
    for n in 1..=4 {
        let reference = retriever_with(small_config());
        reference.index_document("doc", &BIOLOGY.repeat(n)).await.unwrap();
        expected.push(reference.document_info("doc").unwrap());
    }

    let r = Arc::new(retriever_with(small_config()));
    r.index_document("doc", BIOLOGY).await.unwrap();
    let writer = {
        let r = r.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                r.index_document("doc", &BIOLOGY.repeat(i % 4 + 1)).await.unwrap();
            }
        })
    };
    for _ in 0..200 {
        let info = r.document_info("doc").unwrap();
        assert!(expected.contains(&info), "mixed info {info:?}");
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();
}

/// Succeeds until switched off, then fails every call.
struct Flaky {
    inner: HashingEmbedder,
    broken: AtomicBool,
}

#[async_trait]
impl EmbeddingModel for Flaky {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(RetrievalError::EmbeddingError { model: "flaky".into(), message: "unavailable".into() });
        }
        self.inner.embed_batch(texts).await
    }
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
    fn name(&self) -> &str {
        "flaky"
    }
}

#[tokio::test]
async fn embedding_failure_leaves_previous_entry() {
    let model = Arc::new(Flaky { inner: HashingEmbedder::default(), broken: AtomicBool::new(false) });
    let r = Retriever::builder().config(small_config()).embedding_model(model.clone()).build().unwrap();
    r.index_document("doc", "Old lecture notes on osmosis. ").await.unwrap();

    model.broken.store(true, Ordering::SeqCst);
    let err = r.index_document("doc", "New lecture notes on diffusion. ").await.unwrap_err();
    assert!(matches!(err, RetrievalError::EmbeddingError { .. }));
    assert!(r.search("doc", "osmosis", 1).await.is_err());

    model.broken.store(false, Ordering::SeqCst);
    let hits = r.search("doc", "osmosis", 1).await.unwrap();
    assert!(hits[0].content.contains("osmosis"));
}

#[tokio::test]
async fn builder_requires_model() {
    assert!(matches!(Retriever::builder().build(), Err(RetrievalError::ConfigurationError(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_documents_are_independent() {
    let r = Arc::new(retriever_with(small_config()));
    let mut handles = Vec::new();
    for i in 0..16 {
        let r = r.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("doc-{i}");
            r.index_document(&id, &BIOLOGY.repeat(i % 3 + 1)).await.unwrap();
            let entry = r.documents().entry(&id).unwrap();
            assert_eq!(entry.chunks().len(), entry.index().len());
            r.search(&id, "energy", 3).await.unwrap().len()
        }));
    }
    for h in handles {
        assert!(h.await.unwrap() >= 1);
    }
    assert_eq!(r.documents().len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_torn_entries() {
    let r = Arc::new(retriever_with(small_config()));
    r.index_document("doc", &BIOLOGY.repeat(1)).await.unwrap();
    let writer = {
        let r = r.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                r.index_document("doc", &BIOLOGY.repeat(i % 4 + 1)).await.unwrap();
            }
        })
    };
    for _ in 0..200 {
        let entry = r.documents().entry("doc").unwrap();
        assert_eq!(entry.chunks().len(), entry.index().len());
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();
}

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn search_results_are_bounded_and_ordered(
        sentences in proptest::collection::vec("[a-z]{2,9}( [a-z]{2,9}){2,8}\\. ", 1..30),
        query in "[a-z]{2,9}( [a-z]{2,9}){0,3}",
        k in 0u32..12,
    ) {
        let text: String = sentences.concat();
        let r = retriever_with(RetrievalConfig::builder().chunk_size(12).chunk_overlap(3).build().unwrap());
        let hits = block_on(async {
            r.index_document("p", &text).await.unwrap();
            r.search("p", &query, k).await.unwrap()
        });
        let total = r.documents().entry("p").unwrap().chunks().len();
        prop_assert_eq!(hits.len(), (k as usize).min(total));
        for pair in hits.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                prop_assert!(pair[0].chunk_index < pair[1].chunk_index);
            }
        }
        prop_assert!(hits.iter().all(|h| (-1.0..=1.0).contains(&h.score)));
    }

    #[test]
    fn batch_embedding_matches_one_at_a_time(texts in proptest::collection::vec("[a-zA-Z ,.]{0,40}", 1..10)) {
        let embedder = Embedder::new(Arc::new(HashingEmbedder::default()), 3);
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let (batched, single) = block_on(async {
            let batched = embedder.embed(&refs).await.unwrap();
            let mut single = Vec::new();
            for t in &refs {
                single.push(embedder.embed_one(t).await.unwrap());
            }
            (batched, single)
        });
        prop_assert_eq!(&batched, &single);
        for v in &batched {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            prop_assert!((norm - 1.0).abs() < 1e-5);
        }
    }
}
