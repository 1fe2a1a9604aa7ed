use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use docrag_core::chunker::Chunker;
use docrag_core::document::{DocumentLoader, DocumentStats};
use docrag_core::error::{Error, Result};
use docrag_core::traits::VectorStore;
use docrag_core::types::Document;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestFailure {
    /// Empty when the file could not be loaded at all.
    pub document_id: String,
    pub source_path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub documents_total: usize,
    pub documents_indexed: usize,
    pub chunks_indexed: usize,
    pub failures: Vec<IngestFailure>,
    /// Facet counts and content lengths of the documents handed to the pipeline.
    pub document_stats: DocumentStats,
}

/// Chunks documents and adds them to a store, a few documents at a time.
pub struct Ingestor<S: ?Sized = dyn VectorStore> {
    store: Arc<S>,
    chunker: Arc<Chunker>,
    concurrency: usize,
    show_progress: bool,
}

impl<S: VectorStore + ?Sized + 'static> Ingestor<S> {
    pub fn new(store: Arc<S>, chunker: Chunker) -> Self {
        Self { store, chunker: Arc::new(chunker), concurrency: 4, show_progress: false }
    }

    /// Upper bound on documents processed at once; 0 is treated as 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn store(&self) -> &Arc<S> { &self.store }

    /// Chunk and index a single document, returning the number of chunks added.
    pub fn ingest_document(&self, doc: &Document) -> Result<usize> { index_document(&*self.store, &self.chunker, doc) }

    /// Ingest every document. A failing document is recorded and skipped.
    pub async fn ingest(&self, documents: Vec<Document>) -> IngestReport {
        let mut report = IngestReport {
            documents_total: documents.len(),
            document_stats: DocumentStats::from_documents(&documents),
            ..Default::default()
        };
        if documents.is_empty() {
            return report;
        }
        info!(documents = documents.len(), concurrency = self.concurrency, "ingesting documents");
        let pb = self.progress_bar(documents.len() as u64);

        let mut tasks = stream::iter(documents)
            .map(|doc| {
                let store = Arc::clone(&self.store);
                let chunker = Arc::clone(&self.chunker);
                async move {
                    let id = doc.id.clone();
                    let path = doc.source_path.clone();
                    let outcome = tokio::task::spawn_blocking(move || index_document(&*store, &chunker, &doc))
                        .await
                        .map_err(|e| Error::Operation(format!("ingest task failed: {e}")))
                        .and_then(|r| r);
                    (id, path, outcome)
                }
            })
            .buffer_unordered(self.concurrency);

        while let Some((id, path, outcome)) = tasks.next().await {
            match outcome {
                Ok(chunks) => {
                    debug!(document = %id, chunks, "document indexed");
                    report.documents_indexed += 1;
                    report.chunks_indexed += chunks;
                }
                Err(e) => {
                    warn!(document = %id, path = %path, error = %e, "failed to ingest document");
                    report.failures.push(IngestFailure { document_id: id, source_path: path, error: e.to_string() });
                }
            }
            pb.inc(1);
            pb.set_message(format!("{} chunks", report.chunks_indexed));
        }
        pb.finish_with_message(format!("{} chunks indexed", report.chunks_indexed));

        info!(
            indexed = report.documents_indexed,
            failed = report.failures.len(),
            chunks = report.chunks_indexed,
            "ingestion finished"
        );
        report
    }

    /// Load a docs tree and ingest it; unreadable files count as failures.
    pub async fn ingest_dir(&self, loader: &DocumentLoader) -> Result<IngestReport> {
        let loader = loader.clone();
        let loaded = tokio::task::spawn_blocking(move || loader.load_all())
            .await
            .map_err(|e| Error::Operation(format!("document loading task failed: {e}")))??;
        let load_failures: Vec<IngestFailure> = loaded
            .failures
            .into_iter()
            .map(|(path, error)| IngestFailure { document_id: String::new(), source_path: path.to_string_lossy().to_string(), error })
            .collect();

        let mut report = self.ingest(loaded.documents).await;
        report.documents_total += load_failures.len();
        report.failures.extend(load_failures);
        Ok(report)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

fn index_document<S: VectorStore + ?Sized>(store: &S, chunker: &Chunker, doc: &Document) -> Result<usize> {
    let chunks = chunker.chunk_document(doc);
    if chunks.is_empty() {
        debug!(document = %doc.id, "document produced no chunks");
        return Ok(0);
    }
    store.add(&chunks)?;
    Ok(chunks.len())
}
