//! In-memory reference backend.
//!
//! Recognized options:
//! - `documents`: `.jsonl` file or directory loaded at construction
//! - `max_size`: cap on `size` (see `BackendContext`)
//!
//! Query grammar: case-insensitive terms split on anything that is not
//! alphanumeric. An empty query matches everything with score 1.0; a
//! non-empty query without any term is rejected with `InvalidQuery`.
//! Results are ordered by score, then `(datastore_id, model_name, pk)`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::context::BackendContext;
use crate::data_processor::DataProcessor;
use crate::error::{Error, Result};
use crate::traits::{DocumentIndexer, SearchBackend};
use crate::types::{facet_matches, sort_results, IndexDocument, QueryPlan, SearchRequest, SearchResult};

const RECOGNIZED_OPTIONS: &[&str] = &["documents", "max_size"];

pub struct InMemoryBackend {
    ctx: BackendContext,
    docs: RwLock<Vec<IndexDocument>>,
}

impl InMemoryBackend {
    pub fn new(ctx: BackendContext) -> Self {
        Self { ctx, docs: RwLock::new(Vec::new()) }
    }

    pub fn with_documents(ctx: BackendContext, docs: Vec<IndexDocument>) -> Result<Self> {
        let backend = Self::new(ctx);
        backend.upsert(docs)?;
        Ok(backend)
    }

    /// Registry constructor: reads the `documents` option if present.
    pub fn from_context(ctx: BackendContext) -> Result<Self> {
        ctx.options().note_unrecognized("memory", RECOGNIZED_OPTIONS);
        let docs = match ctx.options().get("documents") {
            Some(path) => DataProcessor::new()
                .load(Path::new(path))
                .map_err(|e| Error::configuration(format!("cannot load documents from '{path}': {e:#}")))?,
            None => Vec::new(),
        };
        Self::with_documents(ctx, docs)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_docs()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // A writer that panicked may have left the store half-updated.
    fn read_docs(&self) -> Result<RwLockReadGuard<'_, Vec<IndexDocument>>> {
        self.docs.read().map_err(|_| Error::unavailable("document store lock poisoned"))
    }

    fn write_docs(&self) -> Result<RwLockWriteGuard<'_, Vec<IndexDocument>>> {
        self.docs.write().map_err(|_| Error::unavailable("document store lock poisoned"))
    }

    fn upsert(&self, incoming: Vec<IndexDocument>) -> Result<()> {
        let mut docs = self.write_docs()?;
        let mut positions: HashMap<String, usize> =
            docs.iter().enumerate().map(|(i, d)| (d.key(), i)).collect();
        for doc in incoming {
            let key = doc.key();
            match positions.get(&key).copied() {
                Some(i) => docs[i] = doc,
                None => {
                    positions.insert(key, docs.len());
                    docs.push(doc);
                }
            }
        }
        Ok(())
    }

    fn matches_filters(plan: &QueryPlan, doc: &IndexDocument) -> bool {
        doc.workspace_id == plan.workspace_id
            && plan.allows(&doc.model_name, &doc.datastore_id)
            && plan
                .facets
                .iter()
                .all(|(name, filter)| doc.facets.get(name).is_some_and(|v| facet_matches(v, filter)))
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn score(terms: &[String], content: &str) -> f32 {
    let tokens = tokenize(content);
    if tokens.is_empty() {
        return 0.0;
    }
    let tf = tokens.iter().filter(|t| terms.contains(t)).count();
    tf as f32 / (tokens.len() as f32).sqrt()
}

impl SearchBackend for InMemoryBackend {
    fn context(&self) -> &BackendContext {
        &self.ctx
    }

    fn execute(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let plan = self.ctx.plan(request)?;
        let terms = tokenize(&plan.query);
        if !plan.match_all && terms.is_empty() {
            return Err(Error::invalid_query(format!("'{}' contains no searchable terms", plan.query)));
        }
        if plan.is_empty_scope() {
            return Ok(vec![]);
        }
        let docs = self.read_docs()?;
        let mut hits: Vec<SearchResult> = docs
            .iter()
            .filter(|d| Self::matches_filters(&plan, d))
            .filter_map(|d| {
                let s = if plan.match_all { 1.0 } else { score(&terms, &d.content) };
                (s > 0.0).then(|| SearchResult {
                    pk: d.pk.clone(),
                    model_name: d.model_name.clone(),
                    score: s,
                    datastore_id: d.datastore_id.clone(),
                })
            })
            .collect();
        sort_results(&mut hits);
        debug!(matched = hits.len(), "memory search");
        Ok(hits.into_iter().skip(plan.start).take(plan.size).collect())
    }
}

impl DocumentIndexer for InMemoryBackend {
    fn index(&self, docs: &[IndexDocument]) -> anyhow::Result<()> {
        self.upsert(docs.to_vec())?;
        Ok(())
    }
}
