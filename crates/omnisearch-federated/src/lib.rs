//! omnisearch-federated
//!
//! A backend that fans a request out to child backends, each owning some
//! datastores, and merges their hits by score.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use omnisearch_core::error::{Error, Result};
use omnisearch_core::traits::SearchBackend;
use omnisearch_core::types::{sort_results, DatastoreId, QueryPlan, SearchRequest, SearchResult};
use omnisearch_core::BackendContext;

/// A child backend and the datastores it serves.
pub struct Route {
    datastores: BTreeSet<DatastoreId>,
    backend: Box<dyn SearchBackend>,
}

impl Route {
    pub fn new<I, S>(datastores: I, backend: Box<dyn SearchBackend>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { datastores: datastores.into_iter().map(Into::into).collect(), backend }
    }
}

pub struct FederatedBackend {
    ctx: BackendContext,
    routes: Vec<Route>,
}

impl FederatedBackend {
    /// Fails with `Configuration` when two routes claim the same datastore.
    pub fn new(ctx: BackendContext, routes: Vec<Route>) -> Result<Self> {
        let mut claimed: BTreeSet<&str> = BTreeSet::new();
        for route in &routes {
            for d in &route.datastores {
                if !claimed.insert(d.as_str()) {
                    return Err(Error::configuration(format!("datastore '{d}' is routed to more than one backend")));
                }
            }
        }
        ctx.options().note_unrecognized("federated", &["max_size"]);
        Ok(Self { ctx, routes })
    }

    /// The top `depth` hits of `route` within `scope`, fetched in pages no
    /// larger than the child's own `max_size`.
    fn collect(route: &Route, plan: &QueryPlan, scope: BTreeSet<DatastoreId>, depth: usize) -> Result<Vec<SearchResult>> {
        let page = route.backend.context().max_size();
        let mut hits = Vec::new();
        while hits.len() < depth {
            let want = page.min(depth - hits.len());
            let child = SearchRequest {
                query: plan.query.clone(),
                types: plan.types.clone(),
                datastores: Some(scope.clone()),
                start: i64::try_from(hits.len())
                    .map_err(|_| Error::InvalidPagination(format!("window end {depth} out of range")))?,
                size: i64::try_from(want).unwrap_or(i64::MAX),
                facets: plan.facets.clone(),
            };
            let batch = route.backend.execute(&child)?;
            let short = batch.len() < want;
            hits.extend(batch);
            if short {
                break;
            }
        }
        debug!(hits = hits.len(), pages = hits.len().div_ceil(page), "federated child returned");
        Ok(hits)
    }
}

impl SearchBackend for FederatedBackend {
    fn context(&self) -> &BackendContext {
        &self.ctx
    }

    /// Every child contributes its top `start + size` hits, paged under its
    /// own cap, before the merged window is cut. A failing child fails the
    /// whole call.
    fn execute(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let plan = self.ctx.plan(request)?;
        let depth = plan.end();
        let mut best: HashMap<(String, String, String), SearchResult> = HashMap::new();
        for route in &self.routes {
            let scope: BTreeSet<DatastoreId> = route.datastores.intersection(&plan.datastores).cloned().collect();
            if scope.is_empty() {
                continue;
            }
            for h in Self::collect(route, &plan, scope, depth)? {
                let key = (h.datastore_id.clone(), h.model_name.clone(), h.pk.clone());
                if best.get(&key).map_or(true, |existing| h.score > existing.score) {
                    best.insert(key, h);
                }
            }
        }
        let mut merged: Vec<SearchResult> = best.into_values().collect();
        sort_results(&mut merged);
        Ok(merged.into_iter().skip(plan.start).take(plan.size).collect())
    }
}
