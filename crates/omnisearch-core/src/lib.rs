//! omnisearch-core
//!
//! The search backend contract: result and request types, the error
//! taxonomy, the `SearchBackend` trait with its construction context,
//! datastore-level access scoping, a name-based backend registry,
//! configuration loading and an in-memory reference backend.

pub mod access;
pub mod config;
pub mod context;
pub mod data_processor;
pub mod error;
pub mod memory;
pub mod registry;
pub mod traits;
pub mod types;

pub use access::{Membership, User, Workspace};
pub use context::{BackendContext, BackendOptions};
pub use error::{Error, Result};
pub use registry::BackendRegistry;
pub use traits::{DocumentIndexer, SearchBackend};
pub use types::{sort_results, IndexDocument, QueryPlan, SearchRequest, SearchResult};
