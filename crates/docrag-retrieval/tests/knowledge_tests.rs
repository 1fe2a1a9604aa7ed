use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docrag_core::config::RetrievalConfig;
use docrag_core::error::{Error, Result};
use docrag_core::traits::{Embedder, VectorStore};
use docrag_core::types::{Chunk, ChunkMeta, RankedResult, SearchFilter, SearchPass, SearchResult, StoreStats};
use docrag_retrieval::{build_context, KnowledgeService};
use docrag_vector::MemoryVectorStore;

/// `simNN` in a text maps to a unit vector with cosine `0.NN` against any
/// text without such a token, which maps to `[1, 0]`.
struct SimEmbedder;

impl Embedder for SimEmbedder {
    fn id(&self) -> &str { "sim" }
    fn dim(&self) -> usize { 2 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let score = t
                    .split_whitespace()
                    .find_map(|tok| tok.strip_prefix("sim").and_then(|n| n.parse::<u32>().ok()))
                    .map(|n| n as f32 / 100.0);
                match score {
                    Some(s) => vec![s, (1.0 - s * s).sqrt()],
                    None => vec![1.0, 0.0],
                }
            })
            .collect())
    }
}

/// Counts `search` calls on the wrapped store.
struct CountingStore {
    inner: MemoryVectorStore,
    searches: AtomicUsize,
}

impl VectorStore for CountingStore {
    fn add(&self, chunks: &[Chunk]) -> Result<()> { self.inner.add(chunks) }
    fn search(&self, query: &str, top_k: usize, threshold: f32, filter: &SearchFilter) -> Result<Vec<SearchResult>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(query, top_k, threshold, filter)
    }
    fn stats(&self) -> Result<StoreStats> { self.inner.stats() }
    fn clear(&self) -> Result<()> { self.inner.clear() }
    fn chunks(&self) -> Result<Vec<Chunk>> { self.inner.chunks() }
}

fn chunk(id: &str, content: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        document_id: format!("doc-{id}"),
        content: content.to_string(),
        chunk_index: 0,
        start_pos: 0,
        end_pos: content.len(),
        language: "en".to_string(),
        category: "guide".to_string(),
        metadata: ChunkMeta {
            title: format!("Doc {id}"),
            tags: vec![],
            source_path: format!("docs/{id}.md"),
            extra: Default::default(),
        },
    }
}

fn service(chunks: &[Chunk], config: RetrievalConfig) -> KnowledgeService<CountingStore> {
    let store = CountingStore { inner: MemoryVectorStore::new(Arc::new(SimEmbedder)), searches: AtomicUsize::new(0) };
    store.add(chunks).unwrap();
    KnowledgeService::new(Arc::new(store), config).unwrap()
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("a", "sim95 note"),
        chunk("b", "sim80 note"),
        chunk("c", "sim60 note"),
        chunk("d", "sim40 note"),
        chunk("e", "sim20 note"),
    ]
}

fn summary(results: &[RankedResult]) -> Vec<(String, SearchPass)> {
    results.iter().map(|r| (r.chunk.id.clone(), r.pass)).collect()
}

#[test]
fn merges_refined_hits_ahead_of_broad_hits() {
    let svc = service(&corpus(), RetrievalConfig::default());
    let results = svc.multi_round_search("question").unwrap();
    assert_eq!(
        summary(&results),
        vec![
            ("a".to_string(), SearchPass::Refined),
            ("b".to_string(), SearchPass::Refined),
            ("c".to_string(), SearchPass::Refined),
            ("d".to_string(), SearchPass::Broad),
        ]
    );
    assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    assert_eq!(svc.store().searches.load(Ordering::SeqCst), 2);
}

#[test]
fn small_refined_k_leaves_the_rest_to_broad() {
    let config = RetrievalConfig { refined_top_k: 1, ..Default::default() };
    let svc = service(&corpus(), config);
    let passes: Vec<SearchPass> = svc.multi_round_search("question").unwrap().iter().map(|r| r.pass).collect();
    assert_eq!(passes, vec![SearchPass::Refined, SearchPass::Broad, SearchPass::Broad, SearchPass::Broad]);
}

#[test]
fn equal_scores_keep_refined_first() {
    let config = RetrievalConfig { refined_top_k: 1, ..Default::default() };
    let svc = service(&[chunk("x", "sim90 one"), chunk("y", "sim90 two")], config);
    let results = svc.multi_round_search("question").unwrap();
    assert_eq!(summary(&results), vec![("x".to_string(), SearchPass::Refined), ("y".to_string(), SearchPass::Broad)]);
}

#[test]
fn empty_broad_pass_skips_refined_pass() {
    let svc = service(&[chunk("low", "sim10 note")], RetrievalConfig::default());
    assert!(svc.multi_round_search("question").unwrap().is_empty());
    assert_eq!(svc.store().searches.load(Ordering::SeqCst), 1);

    let empty = service(&[], RetrievalConfig::default());
    assert!(empty.multi_round_search("question").unwrap().is_empty());
    assert_eq!(empty.search_with_context("question", 5).unwrap(), (Vec::<RankedResult>::new(), String::new()));
}

#[test]
fn blank_query_returns_nothing() {
    let svc = service(&corpus(), RetrievalConfig::default());
    assert!(svc.multi_round_search("  ").unwrap().is_empty());
    assert_eq!(svc.store().searches.load(Ordering::SeqCst), 0);
}

#[test]
fn search_is_idempotent_on_a_static_index() {
    let svc = service(&corpus(), RetrievalConfig::default());
    let first = svc.multi_round_search("question").unwrap();
    let second = svc.multi_round_search("question").unwrap();
    assert_eq!(first, second);
}

#[test]
fn explicit_parameters_and_filters() {
    let mut chunks = corpus();
    chunks[1].category = "reference".to_string();
    let svc = service(&chunks, RetrievalConfig::default());

    let strict = RetrievalConfig { broad_threshold: 0.7, refined_threshold: 0.9, ..Default::default() };
    let results = svc.multi_round_search_with("question", &strict, &SearchFilter::none()).unwrap();
    assert_eq!(summary(&results), vec![("a".to_string(), SearchPass::Refined), ("b".to_string(), SearchPass::Broad)]);

    let reference = svc.multi_round_search_with("question", &strict, &SearchFilter::none().category("reference")).unwrap();
    assert_eq!(summary(&reference), vec![("b".to_string(), SearchPass::Broad)]);
}

#[test]
fn out_of_range_thresholds_are_rejected() {
    let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new(Arc::new(SimEmbedder)));
    let bad = RetrievalConfig { broad_threshold: 1.5, ..Default::default() };
    assert!(matches!(KnowledgeService::new(store.clone(), bad.clone()), Err(Error::InvalidConfig(_))));

    let svc = KnowledgeService::new(store, RetrievalConfig::default()).unwrap();
    let err = svc.multi_round_search_with("question", &bad, &SearchFilter::none()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn context_block_format() {
    let svc = service(&[chunk("a", "sim95 note")], RetrievalConfig::default());
    let (results, context) = svc.search_with_context("question", 5).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        context,
        "## 1. Doc a (similarity: 0.950, refined)\nSource: docs/a.md\nLanguage: en\nCategory: guide\n\nsim95 note\n\n---"
    );
}

#[test]
fn context_is_limited_to_max_results() {
    let svc = service(&corpus(), RetrievalConfig::default());
    let (results, context) = svc.search_with_context("question", 2).unwrap();
    assert_eq!(results.len(), 2);
    assert!(context.starts_with("## 1. Doc a"));
    assert!(context.contains("---\n## 2. Doc b"));
    assert!(!context.contains("## 3."));
    assert_eq!(context, build_context(&results));
}

#[test]
fn context_falls_back_for_missing_metadata() {
    let mut bare = chunk("z", "sim99 body");
    bare.metadata.title.clear();
    bare.metadata.source_path.clear();
    let svc = service(&[bare], RetrievalConfig::default());
    let (_, context) = svc.search_with_context("question", 1).unwrap();
    assert!(context.starts_with("## 1. Untitled (similarity: 0.990, refined)\nSource: Unknown\n"));
}

#[test]
fn stats_describe_store_and_strategy() {
    let svc = service(&corpus(), RetrievalConfig::default());
    let stats = svc.search_stats().unwrap();
    assert_eq!(stats.vector_store.total_chunks, 5);
    assert_eq!(stats.vector_store.embedder_id, "sim");
    assert_eq!(stats.search_strategy, "multi-round");
    assert!(stats.description.contains("threshold=0.3"));
    assert!(stats.description.contains("threshold=0.5"));

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["parameters"]["broad_top_k"], 20);
    assert_eq!(json["vector_store"]["store_type"], "memory");

    svc.clear().unwrap();
    assert_eq!(svc.search_stats().unwrap().vector_store.total_chunks, 0);
    assert!(svc.multi_round_search("question").unwrap().is_empty());
}
