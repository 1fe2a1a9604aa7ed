//! Multi-round retrieval and document ingestion on top of a [`VectorStore`].
//!
//! [`KnowledgeService`] runs a broad recall pass and a refined precision pass
//! and merges them; [`Ingestor`] feeds documents through the chunker into the
//! store with bounded concurrency.
//!
//! [`VectorStore`]: docrag_core::traits::VectorStore

pub mod ingest;
pub mod knowledge;

pub use ingest::{IngestFailure, IngestReport, Ingestor};
pub use knowledge::{build_context, KnowledgeService, SearchStats};
