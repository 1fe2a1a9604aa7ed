//! docrag-vector
//!
//! Vector store backends behind `docrag_core::traits::VectorStore`. Only the
//! in-memory brute-force store ships; `factory` maps configured names to
//! backends and rejects unknown ones.

pub mod factory;
pub mod memory;
pub mod similarity;

pub use factory::{available_types, create_store, create_store_by_name, StoreKind};
pub use memory::MemoryVectorStore;
pub use similarity::cosine_similarity;
