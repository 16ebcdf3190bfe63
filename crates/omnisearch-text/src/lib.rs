//! omnisearch-text
//!
//! Tantivy-based text indexing and the `TantivyBackend` search backend.
pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::{TantivyIndexer, TextFields, TextIndex};
pub use search::TantivyBackend;
