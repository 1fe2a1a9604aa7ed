//! Domain types shared by the chunker, the vector stores and the retrieval service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// A parsed source document.
///
/// - `id`: unique document identity (loader ids are derived from the source path)
/// - `content`: body text with front-matter stripped; chunk offsets point into it
/// - `language`/`category`: exact-match facets used by search filters
/// - `source_path`: original path of the file, kept for citation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub language: String,
    pub category: String,
    pub tags: Vec<String>,
    pub source_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            language: "en".to_string(),
            category: "general".to_string(),
            tags: Vec::new(),
            source_path: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = path.into();
        self
    }
}

/// Metadata every chunk inherits from its document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub title: String,
    pub tags: Vec<String>,
    pub source_path: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: Meta,
}

/// A contiguous slice of a document body that is independently indexed.
///
/// `start_pos..end_pos` is a byte range into the owning document's `content`
/// and always slices out exactly `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: String,
    pub content: String,
    pub chunk_index: usize,
    pub start_pos: usize,
    pub end_pos: usize,
    pub language: String,
    pub category: String,
    pub metadata: ChunkMeta,
}

impl Chunk {
    /// Text handed to the embedder: title, tags, category, language and
    /// content joined by spaces.
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.metadata.title,
            self.metadata.tags.join(" "),
            self.category,
            self.language,
            self.content
        )
        .trim()
        .to_string()
    }
}

/// One hit from a single store search. `similarity` is cosine, in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub similarity: f32,
}

/// Which retrieval pass first surfaced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPass {
    Broad,
    Refined,
}

impl fmt::Display for SearchPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broad => f.write_str("broad"),
            Self::Refined => f.write_str("refined"),
        }
    }
}

/// A merged multi-round hit. `pass` explains relevance, it does not affect ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub chunk: Chunk,
    pub similarity: f32,
    pub pass: SearchPass,
}

impl RankedResult {
    pub fn new(result: SearchResult, pass: SearchPass) -> Self {
        Self { chunk: result.chunk, similarity: result.similarity, pass }
    }
}

/// Exact-match metadata filter. Set fields are combined with logical AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub language: Option<String>,
    pub category: Option<String>,
}

impl SearchFilter {
    pub fn none() -> Self { Self::default() }

    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.category.is_none()
    }

    /// Rejects blank filter values instead of silently matching nothing.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("language", &self.language), ("category", &self.category)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(Error::InvalidConfig(format!("{name} filter must not be empty")));
            }
        }
        Ok(())
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.language.as_deref().map_or(true, |l| chunk.language == l)
            && self.category.as_deref().map_or(true, |c| chunk.category == c)
    }
}

/// Read-only store introspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub total_embeddings: usize,
    pub embedding_dimension: usize,
    pub embedder_id: String,
    pub store_type: String,
}
