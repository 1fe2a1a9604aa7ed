use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use docrag_core::config::RetrievalConfig;
use docrag_core::error::Result;
use docrag_core::traits::VectorStore;
use docrag_core::types::{RankedResult, SearchFilter, SearchPass, StoreStats};

/// Store statistics plus a description of the retrieval strategy.
#[derive(Debug, Clone, Serialize)]
pub struct SearchStats {
    pub vector_store: StoreStats,
    pub search_strategy: &'static str,
    pub description: String,
    pub parameters: RetrievalConfig,
}

/// Two-pass retrieval over a shared vector store.
///
/// The broad pass (many candidates, low bar) favors recall, the refined pass
/// (few candidates, high bar) favors precision. Refined hits are merged first
/// so they win over broad hits for the same chunk.
pub struct KnowledgeService<S: ?Sized = dyn VectorStore> {
    store: Arc<S>,
    config: RetrievalConfig,
}

impl<S: VectorStore + ?Sized> KnowledgeService<S> {
    pub fn new(store: Arc<S>, config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &Arc<S> { &self.store }

    pub fn config(&self) -> &RetrievalConfig { &self.config }

    /// Multi-round search with the configured parameters and no filter.
    pub fn multi_round_search(&self, query: &str) -> Result<Vec<RankedResult>> {
        self.multi_round_search_with(query, &self.config, &SearchFilter::none())
    }

    pub fn multi_round_search_with(&self, query: &str, params: &RetrievalConfig, filter: &SearchFilter) -> Result<Vec<RankedResult>> {
        params.validate()?;
        filter.validate()?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        info!(query, "multi-round search");

        let broad = self.store.search(query, params.broad_top_k, params.broad_threshold, filter)?;
        if broad.is_empty() {
            warn!(query, threshold = params.broad_threshold, "no results in broad search");
            return Ok(Vec::new());
        }
        info!(candidates = broad.len(), "broad search finished");

        let refined = self.store.search(query, params.refined_top_k, params.refined_threshold, filter)?;
        info!(results = refined.len(), "refined search finished");

        let mut seen = HashSet::new();
        let mut merged: Vec<RankedResult> = Vec::with_capacity(refined.len() + broad.len());
        for (results, pass) in [(refined, SearchPass::Refined), (broad, SearchPass::Broad)] {
            for result in results {
                if seen.insert(result.chunk.id.clone()) {
                    merged.push(RankedResult::new(result, pass));
                }
            }
        }
        // stable: refined stays ahead of broad on equal scores
        merged.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        info!(unique = merged.len(), "combined search results");
        Ok(merged)
    }

    /// Top `max_results` merged hits and their rendered context block.
    pub fn search_with_context(&self, query: &str, max_results: usize) -> Result<(Vec<RankedResult>, String)> {
        let mut results = self.multi_round_search(query)?;
        if results.is_empty() {
            return Ok((Vec::new(), String::new()));
        }
        results.truncate(max_results);
        let context = build_context(&results);
        Ok((results, context))
    }

    pub fn search_stats(&self) -> Result<SearchStats> {
        Ok(SearchStats {
            vector_store: self.store.stats()?,
            search_strategy: "multi-round",
            description: format!(
                "Broad search (top_k={}, threshold={}) + Refined search (top_k={}, threshold={})",
                self.config.broad_top_k, self.config.broad_threshold, self.config.refined_top_k, self.config.refined_threshold
            ),
            parameters: self.config.clone(),
        })
    }

    pub fn clear(&self) -> Result<()> { self.store.clear() }
}

/// Render ranked results as one delimited section per hit.
pub fn build_context(results: &[RankedResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let chunk = &result.chunk;
            let title = if chunk.metadata.title.is_empty() { "Untitled" } else { chunk.metadata.title.as_str() };
            let source = if chunk.metadata.source_path.is_empty() { "Unknown" } else { chunk.metadata.source_path.as_str() };
            format!(
                "## {}. {} (similarity: {:.3}, {})\nSource: {}\nLanguage: {}\nCategory: {}\n\n{}\n\n---",
                i + 1,
                title,
                result.similarity,
                result.pass,
                source,
                chunk.language,
                chunk.category,
                chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
