//! Domain types shared by every backend.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

pub type WorkspaceId = String;
pub type DatastoreId = String;
pub type Facets = BTreeMap<String, String>;

pub const DEFAULT_START: i64 = 0;
pub const DEFAULT_SIZE: i64 = 100;

/// One hit returned by `SearchBackend::execute`.
///
/// `pk` + `model_name` identify the entity to rehydrate from the system of
/// record. `score` is backend-specific but higher is always better.
/// `datastore_id` records provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub pk: String,
    pub model_name: String,
    pub score: f32,
    pub datastore_id: DatastoreId,
}

impl SearchResult {
    /// Identity of the underlying entity, ignoring score.
    pub fn key(&self) -> (&str, &str, &str) {
        (self.datastore_id.as_str(), self.model_name.as_str(), self.pk.as_str())
    }
}

/// Score descending, then `key()` ascending.
pub fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key().cmp(&b.key()))
    });
}

/// A document as fed to backends that own an index.
///
/// `facets` values may be hierarchical, using `/` as separator
/// (e.g. `"finance/invoices"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub pk: String,
    pub model_name: String,
    pub datastore_id: DatastoreId,
    pub workspace_id: WorkspaceId,
    pub content: String,
    #[serde(default)]
    pub facets: Facets,
}

impl IndexDocument {
    /// Unique key of the document inside a backend.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.datastore_id, self.model_name, self.pk)
    }
}

/// Arguments of a single `execute` call.
///
/// `start` and `size` stay signed so out-of-range input reaches the backend
/// and is rejected with `InvalidPagination` rather than wrapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub types: Option<BTreeSet<String>>,
    pub datastores: Option<BTreeSet<DatastoreId>>,
    pub start: i64,
    pub size: i64,
    pub facets: Facets,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            types: None,
            datastores: None,
            start: DEFAULT_START,
            size: DEFAULT_SIZE,
            facets: Facets::new(),
        }
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_datastores<I, S>(mut self, datastores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datastores = Some(datastores.into_iter().map(Into::into).collect());
        self
    }

    pub fn window(mut self, start: i64, size: i64) -> Self {
        self.start = start;
        self.size = size;
        self
    }

    pub fn facet(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.facets.insert(name.into(), value.into());
        self
    }
}

/// Validated and authorized form of a `SearchRequest`.
///
/// Produced by `BackendContext::plan`; backends only ever search with this.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub workspace_id: WorkspaceId,
    pub query: String,
    pub match_all: bool,
    /// `None` means every model name is allowed.
    pub types: Option<BTreeSet<String>>,
    /// Effective datastores: workspace ∩ granted ∩ requested.
    pub datastores: BTreeSet<DatastoreId>,
    pub start: usize,
    pub size: usize,
    pub facets: Facets,
}

impl QueryPlan {
    /// True when no datastore is left to search.
    pub fn is_empty_scope(&self) -> bool {
        self.datastores.is_empty()
    }

    pub fn allows(&self, model_name: &str, datastore_id: &str) -> bool {
        self.datastores.contains(datastore_id)
            && self.types.as_ref().map_or(true, |t| t.contains(model_name))
    }

    /// End of the requested window, saturating.
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.size)
    }
}

/// Returns true when `value` equals `filter` or lies beneath it in a
/// `/`-separated hierarchy.
pub fn facet_matches(value: &str, filter: &str) -> bool {
    let value = value.trim_matches('/');
    let filter = filter.trim_matches('/');
    if filter.is_empty() {
        return true;
    }
    value == filter
        || (value.len() > filter.len()
            && value.starts_with(filter)
            && value.as_bytes()[filter.len()] == b'/')
}
