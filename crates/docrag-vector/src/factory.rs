//! Backend selection by configured name.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use docrag_core::error::Error;
use docrag_core::traits::{Embedder, VectorStore};

use crate::memory::MemoryVectorStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
}

impl StoreKind {
    pub const ALL: &'static [StoreKind] = &[StoreKind::Memory];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        StoreKind::ALL.iter().copied().find(|k| k.as_str() == name).ok_or_else(|| {
            Error::InvalidConfig(format!("Unknown vector store type '{s}' (available: {})", available_types().join(", ")))
        })
    }
}

pub fn available_types() -> Vec<&'static str> {
    StoreKind::ALL.iter().map(|k| k.as_str()).collect()
}

pub fn create_store(kind: StoreKind, embedder: Arc<dyn Embedder>) -> Arc<dyn VectorStore> {
    match kind {
        StoreKind::Memory => Arc::new(MemoryVectorStore::new(embedder)),
    }
}

/// Parse `name` and build the store; unknown names fail before anything is allocated.
pub fn create_store_by_name(name: &str, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn VectorStore>, Error> {
    Ok(create_store(name.parse()?, embedder))
}
