use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use omnisearch_core::memory::InMemoryBackend;
use omnisearch_core::{
    BackendContext, BackendOptions, DocumentIndexer, Error, IndexDocument, Membership,
    SearchBackend, SearchRequest, SearchResult, User, Workspace,
};
use omnisearch_federated::{FederatedBackend, Route};
use omnisearch_text::{TantivyBackend, TantivyIndexer, TextIndex};

fn doc(pk: &str, model: &str, datastore: &str, content: &str) -> IndexDocument {
    IndexDocument {
        pk: pk.to_string(),
        model_name: model.to_string(),
        datastore_id: datastore.to_string(),
        workspace_id: "w".to_string(),
        content: content.to_string(),
        facets: Default::default(),
    }
}

fn context(user: User) -> BackendContext {
    context_with(user, BackendOptions::new())
}

fn context_with(user: User, options: BackendOptions) -> BackendContext {
    BackendContext::new(Arc::new(Workspace::new("w", ["d1", "d2", "d3"])), Arc::new(user), options).unwrap()
}

fn member() -> User {
    User::new("u").member_of("w", Membership::all())
}

/// Records calls and fails on demand.
struct Probe {
    ctx: BackendContext,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl SearchBackend for Probe {
    fn context(&self) -> &BackendContext {
        &self.ctx
    }

    fn execute(&self, request: &SearchRequest) -> omnisearch_core::Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::unavailable("probe down"));
        }
        let plan = self.ctx.plan(request)?;
        Ok(plan
            .datastores
            .iter()
            .map(|d| SearchResult { pk: "p".into(), model_name: "probe".into(), score: 0.5, datastore_id: d.clone() })
            .collect())
    }
}

fn memory_store(ctx: BackendContext, datastore: &str, n: usize) -> InMemoryBackend {
    let backend = InMemoryBackend::new(ctx);
    let docs: Vec<IndexDocument> = (0..n)
        .map(|i| doc(&format!("{datastore}-{i}"), "invoice", datastore, &"invoice ".repeat(1 + i % 5)))
        .collect();
    backend.index(&docs).unwrap();
    backend
}

fn memory_child(datastore: &str, n: usize) -> Box<dyn SearchBackend> {
    Box::new(memory_store(context(member()), datastore, n))
}

fn text_child(datastore: &str, n: usize) -> Box<dyn SearchBackend> {
    let index = TextIndex::create_in_ram().unwrap();
    let docs: Vec<IndexDocument> = (0..n)
        .map(|i| doc(&format!("{datastore}-{i}"), if i % 2 == 0 { "invoice" } else { "table" }, datastore, "invoice total"))
        .collect();
    TantivyIndexer::new(index.clone()).index(&docs).unwrap();
    Box::new(TantivyBackend::new(context(member()), index).unwrap())
}

fn federated(user: User) -> FederatedBackend {
    FederatedBackend::new(
        context(user),
        vec![Route::new(["d1"], memory_child("d1", 12)), Route::new(["d2"], memory_child("d2", 12))],
    )
    .unwrap()
}

#[test]
fn merges_children_by_score() {
    let results = federated(member()).search("invoice").unwrap();
    assert_eq!(results.len(), 24);
    let stores: HashSet<_> = results.iter().map(|r| r.datastore_id.as_str()).collect();
    assert_eq!(stores.len(), 2);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn pages_are_exact_windows_of_the_merge() {
    let f = federated(member());
    let all = f.execute(&SearchRequest::new("invoice").window(0, 24)).unwrap();
    let first = f.execute(&SearchRequest::new("invoice").window(0, 10)).unwrap();
    let second = f.execute(&SearchRequest::new("invoice").window(10, 10)).unwrap();
    assert_eq!(first[..], all[..10]);
    assert_eq!(second[..], all[10..20]);
    let seen: HashSet<_> = first.iter().map(|r| r.pk.clone()).collect();
    assert!(second.iter().all(|r| !seen.contains(&r.pk)));
}

#[test]
fn datastore_filter_skips_other_routes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let probe = Probe { ctx: context(member()), calls: Arc::clone(&calls), fail: false };
    let f = FederatedBackend::new(
        context(member()),
        vec![Route::new(["d1"], memory_child("d1", 3)), Route::new(["d2"], Box::new(probe))],
    )
    .unwrap();
    let hits = f.execute(&SearchRequest::new("invoice").with_datastores(["d1"])).unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|r| r.datastore_id == "d1"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn authorization_fails_before_any_child_is_called() {
    let calls = Arc::new(AtomicUsize::new(0));
    let probe = Probe { ctx: context(member()), calls: Arc::clone(&calls), fail: false };
    let f = FederatedBackend::new(context(User::new("outsider")), vec![Route::new(["d1", "d2"], Box::new(probe))]).unwrap();
    assert!(matches!(f.search("invoice"), Err(Error::Authorization(_))));
    assert!(matches!(
        f.execute(&SearchRequest::new("invoice").with_datastores(["d1"])),
        Err(Error::Authorization(_))
    ));
    assert!(matches!(f.execute(&SearchRequest::new("invoice").window(-1, 5)), Err(Error::InvalidPagination(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn deep_windows_page_past_the_child_cap() {
    let direct = memory_store(context(member()), "d1", 1200);
    let f = FederatedBackend::new(context(member()), vec![Route::new(["d1"], memory_child("d1", 1200))]).unwrap();

    let request = SearchRequest::new("invoice").window(995, 10);
    let expected = direct.execute(&request).unwrap();
    assert_eq!(expected.len(), 10);
    assert_eq!(f.execute(&request).unwrap(), expected);

    let beyond_cap = SearchRequest::new("invoice").window(1100, 10);
    assert_eq!(f.execute(&beyond_cap).unwrap(), direct.execute(&beyond_cap).unwrap());
    assert_eq!(f.execute(&beyond_cap).unwrap().len(), 10);

    assert_eq!(f.execute(&SearchRequest::new("invoice").window(1195, 10)).unwrap().len(), 5);
}

#[test]
fn small_child_caps_still_yield_the_full_merge() {
    let capped = || context_with(member(), BackendOptions::new().with("max_size", "7"));
    let f = FederatedBackend::new(
        context(member()),
        vec![
            Route::new(["d1"], Box::new(memory_store(capped(), "d1", 12))),
            Route::new(["d2"], Box::new(memory_store(capped(), "d2", 12))),
        ],
    )
    .unwrap();
    let uncapped = federated(member()).execute(&SearchRequest::new("invoice").window(0, 24)).unwrap();
    let merged = f.execute(&SearchRequest::new("invoice").window(0, 24)).unwrap();
    assert_eq!(merged.len(), 24);
    assert_eq!(merged, uncapped);
    assert_eq!(f.execute(&SearchRequest::new("invoice").window(20, 10)).unwrap()[..], uncapped[20..]);
}

#[test]
fn child_failure_is_not_swallowed() {
    let probe = Probe { ctx: context(member()), calls: Arc::new(AtomicUsize::new(0)), fail: true };
    let f = FederatedBackend::new(
        context(member()),
        vec![Route::new(["d1"], memory_child("d1", 3)), Route::new(["d2"], Box::new(probe))],
    )
    .unwrap();
    let err = f.search("invoice").unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn overlapping_routes_are_rejected() {
    let result = FederatedBackend::new(
        context(member()),
        vec![Route::new(["d1"], memory_child("d1", 1)), Route::new(["d1", "d2"], memory_child("d2", 1))],
    );
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn mixes_text_and_memory_children_with_type_filter() {
    let f = FederatedBackend::new(
        context(member()),
        vec![Route::new(["d1"], memory_child("d1", 4)), Route::new(["d3"], text_child("d3", 6))],
    )
    .unwrap();
    let tables = f.execute(&SearchRequest::new("invoice").with_types(["table"])).unwrap();
    assert_eq!(tables.len(), 3);
    assert!(tables.iter().all(|r| r.model_name == "table" && r.datastore_id == "d3"));
    assert!(f.search("").unwrap().len() <= 100);
}
