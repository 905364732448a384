//! Per-persona memory subsystem.
//!
//! - `store`: bounded short/long-term buffers plus auxiliary memory
//! - `index`: TF-IDF retrieval over everything the persona witnessed
//! - `compression` / `consolidation`: generation-backed summarization

pub mod compression;
pub mod consolidation;
pub mod index;
pub mod store;

pub use compression::{CompressionPlan, CompressionReport};
pub use index::RetrievalIndex;
pub use store::{AddOutcome, NewMemory, PersonaMemory};
