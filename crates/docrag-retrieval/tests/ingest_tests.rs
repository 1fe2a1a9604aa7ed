use std::fs;
use std::path::Path;
use std::sync::Arc;

use docrag_core::chunker::{Chunker, ChunkingConfig};
use docrag_core::config::RetrievalConfig;
use docrag_core::document::{DocumentLoader, LoaderConfig};
use docrag_core::traits::VectorStore;
use docrag_core::types::Document;
use docrag_embed::HashEmbedder;
use docrag_retrieval::{Ingestor, KnowledgeService};
use docrag_vector::create_store_by_name;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn docs_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "README.md", "# Index\n\nnot a document");
    write(
        dir.path(),
        "guide/ownership.md",
        "---\ntitle: Ownership\ntag: [memory]\n---\n# Ownership\n\nownership borrowing lifetimes move semantics\n\n## Borrowing\n\nshared and mutable borrowing rules",
    );
    write(dir.path(), "zh/libs/io.md", "# Files\n\nopen read write flush");
    dir
}

fn store() -> Arc<dyn VectorStore> {
    create_store_by_name("memory", Arc::new(HashEmbedder::new(256).unwrap())).unwrap()
}

fn ingestor(store: Arc<dyn VectorStore>) -> Ingestor {
    Ingestor::new(store, Chunker::new(ChunkingConfig::new(400, 80)).unwrap()).with_concurrency(2)
}

#[tokio::test]
async fn ingests_a_docs_tree() {
    let dir = docs_tree();
    let loader = DocumentLoader::new(dir.path(), LoaderConfig::default());
    let store = store();
    let report = ingestor(store.clone()).ingest_dir(&loader).await.unwrap();

    assert_eq!(report.documents_total, 2);
    assert_eq!(report.documents_indexed, 2);
    assert!(report.failures.is_empty());
    assert_eq!(store.len().unwrap(), report.chunks_indexed);

    let chunks = store.chunks().unwrap();
    assert!(chunks.iter().any(|c| c.language == "zh" && c.category == "libs"));
    assert!(chunks.iter().any(|c| c.metadata.title == "Ownership" && c.metadata.tags == vec!["memory".to_string()]));
    assert!(chunks.iter().all(|c| !c.content.contains("not a document")));
}

#[tokio::test]
async fn report_carries_document_stats() {
    let dir = docs_tree();
    write(dir.path(), "v2/notes/misc.md", "# Misc\n\nloose notes");
    let loader = DocumentLoader::new(dir.path(), LoaderConfig::default());
    let report = ingestor(store()).ingest_dir(&loader).await.unwrap();

    let stats = &report.document_stats;
    assert_eq!(stats.total_documents, 3);
    assert_eq!(stats.languages.get("en"), Some(&2));
    assert_eq!(stats.languages.get("zh"), Some(&1));
    assert_eq!(stats.categories.get("guide"), Some(&1));
    assert_eq!(stats.categories.get("libs"), Some(&1));
    assert_eq!(stats.categories.get("general"), Some(&1));
    assert!(stats.categories.get("v2").is_none());
    assert!(stats.total_content_length > 0);
    assert!((stats.average_content_length - stats.total_content_length as f64 / 3.0).abs() < 1e-9);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["document_stats"]["languages"]["zh"], 1);
}

#[tokio::test]
async fn reingesting_replaces_chunks_in_place() {
    let dir = docs_tree();
    let loader = DocumentLoader::new(dir.path(), LoaderConfig::default());
    let store = store();
    let ingestor = ingestor(store.clone());

    let first = ingestor.ingest_dir(&loader).await.unwrap();
    let before = store.len().unwrap();
    let second = ingestor.ingest_dir(&loader).await.unwrap();
    assert_eq!(first.chunks_indexed, second.chunks_indexed);
    assert_eq!(store.len().unwrap(), before);
}

#[tokio::test]
async fn missing_docs_dir_is_an_error() {
    let dir = TempDir::new().unwrap();
    let loader = DocumentLoader::new(dir.path().join("absent"), LoaderConfig::default());
    assert!(ingestor(store()).ingest_dir(&loader).await.is_err());
}

#[tokio::test]
async fn ingested_documents_are_searchable() {
    let dir = docs_tree();
    let loader = DocumentLoader::new(dir.path(), LoaderConfig::default());
    let store = store();
    ingestor(store.clone()).ingest_dir(&loader).await.unwrap();

    let config = RetrievalConfig { broad_threshold: 0.0, refined_threshold: 0.1, ..Default::default() };
    let svc = KnowledgeService::new(store, config).unwrap();
    let (results, context) = svc.search_with_context("ownership borrowing", 3).unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].chunk.metadata.title, "Ownership");
    assert!(context.starts_with("## 1. Ownership (similarity: "));
}

#[tokio::test]
async fn many_documents_with_bounded_concurrency() {
    let store = store();
    let docs: Vec<Document> = (0..25)
        .map(|i| Document::new(format!("doc-{i}"), format!("Doc {i}"), format!("# Doc {i}\n\nbody number {i}")))
        .collect();
    let report = ingestor(store.clone()).with_concurrency(3).ingest(docs).await;
    assert_eq!(report.documents_indexed, 25);
    assert_eq!(report.chunks_indexed, 25);
    assert_eq!(store.len().unwrap(), 25);
}
