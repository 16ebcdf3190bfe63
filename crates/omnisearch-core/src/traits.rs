use crate::context::BackendContext;
use crate::error::Result;
use crate::types::{IndexDocument, SearchRequest, SearchResult};

/// The one capability every search backend provides.
///
/// Implementations must call `BackendContext::plan` before any I/O and honour
/// the plan: at most `size` results from `[start, start + size)`, only
/// allowed model names and datastores. "No matches" is `Ok(vec![])`.
pub trait SearchBackend: Send + Sync {
    fn context(&self) -> &BackendContext;

    fn execute(&self, request: &SearchRequest) -> Result<Vec<SearchResult>>;

    fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.execute(&SearchRequest::new(query))
    }
}

impl<B: SearchBackend + ?Sized> SearchBackend for Box<B> {
    fn context(&self) -> &BackendContext {
        (**self).context()
    }

    fn execute(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        (**self).execute(request)
    }
}

/// Backends that own their index accept documents through this.
pub trait DocumentIndexer: Send + Sync {
    /// Insert or replace documents by `IndexDocument::key`.
    fn index(&self, docs: &[IndexDocument]) -> anyhow::Result<()>;
}
