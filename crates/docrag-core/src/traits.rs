use crate::error::Result;
use crate::types::{Chunk, SearchFilter, SearchResult, StoreStats};

/// External embedding function. Must return vectors of `dim()` length, one
/// per input, and the same vector for the same text.
pub trait Embedder: Send + Sync {
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for query"))
    }
}

/// Storage capability consumed by the retrieval service.
///
/// Methods take `&self`; implementations serialize mutation internally so a
/// store can be shared behind an `Arc` by ingestion workers and searchers.
pub trait VectorStore: Send + Sync {
    fn add(&self, chunks: &[Chunk]) -> Result<()>;
    fn search(&self, query: &str, top_k: usize, threshold: f32, filter: &SearchFilter) -> Result<Vec<SearchResult>>;
    fn stats(&self) -> Result<StoreStats>;
    fn clear(&self) -> Result<()>;
    /// Snapshot of every stored chunk in slot order.
    fn chunks(&self) -> Result<Vec<Chunk>>;

    fn len(&self) -> Result<usize> { Ok(self.stats()?.total_chunks) }
    fn is_empty(&self) -> Result<bool> { Ok(self.len()? == 0) }
}
