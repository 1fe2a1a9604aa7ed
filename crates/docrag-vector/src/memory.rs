use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error};

use docrag_core::error::{Error, Result};
use docrag_core::traits::{Embedder, VectorStore};
use docrag_core::types::{Chunk, ChunkId, SearchFilter, SearchResult, StoreStats};

use crate::factory::StoreKind;
use crate::similarity::{cosine_with_norm, l2_norm};

/// Slot-addressed storage. `chunks[i]` and `embeddings[i]` always belong together.
#[derive(Default)]
struct Storage {
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
    slots: HashMap<ChunkId, usize>,
    dim: Option<usize>,
}

/// Brute-force cosine index held entirely in memory.
///
/// Writers take the single write lock only after every vector of a batch has
/// been computed and checked, so a failed `add` leaves the store untouched and
/// readers see a batch either completely or not at all. Re-adding a known
/// chunk id overwrites its slot in place.
pub struct MemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    inner: RwLock<Storage>,
}

impl MemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, inner: RwLock::new(Storage::default()) }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Storage>> {
        self.inner.read().map_err(|_| Error::Operation("vector store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Storage>> {
        self.inner.write().map_err(|_| Error::Operation("vector store lock poisoned".to_string()))
    }

    /// Slot currently holding `id`.
    pub fn slot_of(&self, id: &str) -> Result<Option<usize>> {
        Ok(self.read()?.slots.get(id).copied())
    }

    pub fn get(&self, id: &str) -> Result<Option<Chunk>> {
        let storage = self.read()?;
        Ok(storage.slots.get(id).map(|&slot| storage.chunks[slot].clone()))
    }

    /// Search with an already computed query vector.
    pub fn search_vec(&self, query_vec: &[f32], top_k: usize, threshold: f32, filter: &SearchFilter) -> Result<Vec<SearchResult>> {
        filter.validate()?;
        let storage = self.read()?;
        if top_k == 0 || storage.chunks.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(dim) = storage.dim {
            if query_vec.len() != dim {
                return Err(Error::Embedding(format!(
                    "query vector has dimension {}, index holds dimension {dim}",
                    query_vec.len()
                )));
            }
        }
        let query_norm = l2_norm(query_vec);
        let mut scored: Vec<(usize, f32)> = storage
            .chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| filter.matches(chunk))
            .filter_map(|(slot, _)| cosine_with_norm(query_vec, query_norm, &storage.embeddings[slot]).map(|s| (slot, s)))
            .collect();
        // stable: equal scores keep slot order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        Ok(scored
            .into_iter()
            .filter(|&(_, similarity)| similarity >= threshold)
            .map(|(slot, similarity)| SearchResult { chunk: storage.chunks[slot].clone(), similarity })
            .collect())
    }

    fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(Chunk::embedding_text).collect();
        let vectors = self.embedder.embed_batch(&texts).map_err(|e| Error::Embedding(format!("{e:#}")))?;
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        let dim = vectors[0].len();
        if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
            return Err(Error::Embedding("embedder returned vectors of inconsistent dimension".to_string()));
        }
        Ok(vectors)
    }
}

impl VectorStore for MemoryVectorStore {
    fn add(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let vectors = self.embed_chunks(chunks)?;
        let dim = vectors[0].len();

        let mut storage = self.write()?;
        if let Some(existing) = storage.dim {
            if existing != dim {
                return Err(Error::Embedding(format!("vectors have dimension {dim}, index holds dimension {existing}")));
            }
        }
        storage.dim = Some(dim);

        let (mut appended, mut replaced) = (0usize, 0usize);
        for (chunk, vector) in chunks.iter().zip(vectors) {
            match storage.slots.get(&chunk.id).copied() {
                Some(slot) => {
                    storage.chunks[slot] = chunk.clone();
                    storage.embeddings[slot] = vector;
                    replaced += 1;
                }
                None => {
                    let slot = storage.chunks.len();
                    storage.chunks.push(chunk.clone());
                    storage.embeddings.push(vector);
                    storage.slots.insert(chunk.id.clone(), slot);
                    appended += 1;
                }
            }
        }
        debug!(appended, replaced, total = storage.chunks.len(), "added chunks to memory store");
        Ok(())
    }

    fn search(&self, query: &str, top_k: usize, threshold: f32, filter: &SearchFilter) -> Result<Vec<SearchResult>> {
        filter.validate()?;
        if top_k == 0 || query.trim().is_empty() || self.read()?.chunks.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).map_err(|e| Error::Embedding(format!("{e:#}")))?;
        let results = self.search_vec(&query_vec, top_k, threshold, filter)?;
        debug!(top_k, threshold, hits = results.len(), "memory store search");
        Ok(results)
    }

    fn stats(&self) -> Result<StoreStats> {
        let storage = self.read()?;
        Ok(StoreStats {
            total_chunks: storage.chunks.len(),
            total_embeddings: storage.embeddings.len(),
            embedding_dimension: storage.dim.unwrap_or(0),
            embedder_id: self.embedder.id().to_string(),
            store_type: StoreKind::Memory.to_string(),
        })
    }

    fn clear(&self) -> Result<()> {
        let mut storage = self.write().map_err(|e| {
            error!(error = %e, "failed to clear vector store");
            e
        })?;
        *storage = Storage::default();
        Ok(())
    }

    fn chunks(&self) -> Result<Vec<Chunk>> {
        Ok(self.read()?.chunks.clone())
    }
}
