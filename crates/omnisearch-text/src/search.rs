//! Full-text backend over a `TextIndex`.
//!
//! Recognized options:
//! - `index_dir`: index directory, required by `from_context`
//! - `facets`: comma-separated facet names to filter on; default all
//! - `max_size`: cap on `size`
//!
//! The query is parsed with tantivy's query grammar against `content`; a
//! parse failure is `InvalidQuery`. An empty query matches every document
//! in scope with score 1.0. Type, datastore, workspace and facet filters are
//! constant-score clauses and leave relevance untouched. Results come back
//! by score, ties in index order.

use std::collections::BTreeSet;

use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, BooleanQuery, ConstScoreQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{TantivyDocument, Term};
use tracing::debug;

use omnisearch_core::config::expand_path;
use omnisearch_core::error::{Error, Result};
use omnisearch_core::traits::SearchBackend;
use omnisearch_core::types::{QueryPlan, SearchRequest, SearchResult};
use omnisearch_core::BackendContext;

use crate::index::TextIndex;
use crate::tantivy_utils::facet_path;

const RECOGNIZED_OPTIONS: &[&str] = &["index_dir", "facets", "max_size"];

pub struct TantivyBackend {
	ctx: BackendContext,
	index: TextIndex,
	recognized_facets: Option<BTreeSet<String>>,
}

impl TantivyBackend {
	pub fn new(ctx: BackendContext, index: TextIndex) -> Result<Self> {
		ctx.options().note_unrecognized("text", RECOGNIZED_OPTIONS);
		let recognized_facets = ctx.options().get("facets").map(|raw| {
			raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
		});
		Ok(Self { ctx, index, recognized_facets })
	}

	/// Registry constructor: opens the index named by `index_dir`.
	pub fn from_context(ctx: BackendContext) -> Result<Self> {
		let dir = expand_path(ctx.options().require("index_dir")?);
		let index = TextIndex::open(&dir)
			.map_err(|e| Error::unavailable(format!("cannot open text index at {}: {e}", dir.display())))?;
		Self::new(ctx, index)
	}

	fn facet_recognized(&self, name: &str) -> bool {
		self.recognized_facets.as_ref().map_or(true, |names| names.contains(name))
	}

	fn build_query(&self, plan: &QueryPlan) -> Result<Box<dyn Query>> {
		let f = self.index.fields();
		let text: Box<dyn Query> = if plan.match_all {
			Box::new(ConstScoreQuery::new(Box::new(AllQuery), 1.0))
		} else {
			QueryParser::for_index(self.index.inner(), vec![f.content])
				.parse_query(&plan.query)
				.map_err(|e| Error::invalid_query(format!("'{}': {e}", plan.query)))?
		};
		let mut clauses = vec![
			(Occur::Must, text),
			(Occur::Must, filter(term(f.workspace_id, &plan.workspace_id))),
			(Occur::Must, filter(any_of(f.datastore_id, &plan.datastores))),
		];
		if let Some(types) = &plan.types {
			clauses.push((Occur::Must, filter(any_of(f.model_name, types))));
		}
		for (name, value) in &plan.facets {
			if !self.facet_recognized(name) {
				debug!(facet = %name, "ignoring unrecognized facet");
				continue;
			}
			let facet = Term::from_facet(f.facets, &facet_path(name, value));
			clauses.push((Occur::Must, filter(Box::new(TermQuery::new(facet, IndexRecordOption::Basic)))));
		}
		Ok(Box::new(BooleanQuery::new(clauses)))
	}
}

fn filter(q: Box<dyn Query>) -> Box<dyn Query> { Box::new(ConstScoreQuery::new(q, 0.0)) }

fn term(field: Field, value: &str) -> Box<dyn Query> {
	Box::new(TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic))
}

fn any_of(field: Field, values: &BTreeSet<String>) -> Box<dyn Query> {
	Box::new(BooleanQuery::new(values.iter().map(|v| (Occur::Should, term(field, v))).collect()))
}

fn stored_str(doc: &TantivyDocument, field: Field, name: &str) -> Result<String> {
	doc.get_first(field)
		.and_then(|v| v.as_str())
		.map(str::to_string)
		.ok_or_else(|| Error::unavailable(format!("indexed document is missing stored field '{name}'")))
}

impl SearchBackend for TantivyBackend {
	fn context(&self) -> &BackendContext { &self.ctx }

	fn execute(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
		let plan = self.ctx.plan(request)?;
		let query = self.build_query(&plan)?;
		if plan.is_empty_scope() { return Ok(vec![]); }

		let reader = self.index.inner().reader().map_err(|e| Error::unavailable(e.to_string()))?;
		let searcher = reader.searcher();
		if plan.start >= searcher.num_docs() as usize { return Ok(vec![]); }
		let collector = TopDocs::with_limit(plan.size).and_offset(plan.start);
		let top_docs = searcher.search(&query, &collector).map_err(|e| Error::unavailable(e.to_string()))?;

		let f = self.index.fields();
		let mut results = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(|e| Error::unavailable(e.to_string()))?;
			results.push(SearchResult {
				pk: stored_str(&doc, f.pk, "pk")?,
				model_name: stored_str(&doc, f.model_name, "model_name")?,
				score,
				datastore_id: stored_str(&doc, f.datastore_id, "datastore_id")?,
			});
		}
		debug!(query = %plan.query, returned = results.len(), "text search");
		Ok(results)
	}
}
