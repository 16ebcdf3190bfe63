use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use omnisearch_core::memory::InMemoryBackend;
use omnisearch_core::{
    BackendContext, BackendOptions, BackendRegistry, DocumentIndexer, Error, IndexDocument,
    Membership, SearchBackend, SearchRequest, User, Workspace,
};

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

fn corpus() -> Vec<IndexDocument> {
    let mut docs = Vec::new();
    for i in 0..30 {
        let model = if i % 2 == 0 { "invoice" } else { "table" };
        let datastore = if i % 3 == 0 { "d1" } else { "d2" };
        let repeat = "invoice ".repeat(1 + i % 4);
        docs.push(doc(&i.to_string(), model, datastore, &format!("{repeat} number {i}")));
    }
    let mut owned = doc("owned", "invoice", "d1", "invoice for finance");
    owned.facets.insert("category".into(), "finance/invoices".into());
    docs.push(owned);
    docs.push(doc("secret", "invoice", "d3", "invoice in a private datastore"));
    let mut foreign = doc("foreign", "invoice", "d1", "invoice of another workspace");
    foreign.workspace_id = "other".into();
    docs.push(foreign);
    docs
}

fn user() -> User {
    User::new("u").member_of("w", Membership::only(["d1", "d2"]))
}

fn backend_for(user: User) -> InMemoryBackend {
    let ctx = BackendContext::new(
        Arc::new(Workspace::new("w", ["d1", "d2", "d3"])),
        Arc::new(user),
        BackendOptions::new(),
    )
    .unwrap();
    InMemoryBackend::with_documents(ctx, corpus()).unwrap()
}

#[test]
fn default_search_is_scoped_and_bounded() {
    let backend = backend_for(user());
    let results = backend.search("invoice").unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= 100);
    for r in &results {
        assert!(["d1", "d2"].contains(&r.datastore_id.as_str()), "unexpected {r:?}");
        assert!(["invoice", "table"].contains(&r.model_name.as_str()));
        assert_ne!(r.pk, "secret");
        assert_ne!(r.pk, "foreign");
    }
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn type_and_datastore_filters_hold() {
    let backend = backend_for(user());
    let by_type = backend.execute(&SearchRequest::new("invoice").with_types(["table"])).unwrap();
    assert!(!by_type.is_empty());
    assert!(by_type.iter().all(|r| r.model_name == "table"));

    let by_store = backend.execute(&SearchRequest::new("invoice").with_datastores(["d1"])).unwrap();
    assert!(!by_store.is_empty());
    assert!(by_store.iter().all(|r| r.datastore_id == "d1"));
}

#[test]
fn pages_do_not_overlap() {
    let backend = backend_for(user());
    let first = backend.execute(&SearchRequest::new("invoice").window(0, 10)).unwrap();
    let second = backend.execute(&SearchRequest::new("invoice").window(10, 10)).unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(second.len(), 10);
    let seen: HashSet<_> = first.iter().map(|r| r.pk.clone()).collect();
    assert!(second.iter().all(|r| !seen.contains(&r.pk)));

    let combined = backend.execute(&SearchRequest::new("invoice").window(0, 20)).unwrap();
    assert_eq!(combined[..10], first[..]);
    assert_eq!(combined[10..], second[..]);
}

#[test]
fn bad_pagination_is_rejected() {
    let backend = backend_for(user());
    assert!(matches!(
        backend.execute(&SearchRequest::new("invoice").window(-1, 10)),
        Err(Error::InvalidPagination(_))
    ));
    assert!(matches!(
        backend.execute(&SearchRequest::new("invoice").window(0, 0)),
        Err(Error::InvalidPagination(_))
    ));
}

#[test]
fn size_is_capped_but_deep_starts_are_served() {
    let ctx = BackendContext::new(
        Arc::new(Workspace::new("w", ["d1"])),
        Arc::new(user()),
        BackendOptions::new().with("max_size", "50"),
    )
    .unwrap();
    let docs: Vec<IndexDocument> = (0..120).map(|i| doc(&format!("{i:03}"), "invoice", "d1", "invoice")).collect();
    let backend = InMemoryBackend::with_documents(ctx, docs).unwrap();

    let capped = backend.execute(&SearchRequest::new("invoice").window(0, 500)).unwrap();
    assert_eq!(capped.len(), 50);

    let deep = backend.execute(&SearchRequest::new("invoice").window(100, 10)).unwrap();
    let pks: Vec<&str> = deep.iter().map(|r| r.pk.as_str()).collect();
    assert_eq!(pks, ["100", "101", "102", "103", "104", "105", "106", "107", "108", "109"]);

    let tail = backend.execute(&SearchRequest::new("invoice").window(115, 50)).unwrap();
    assert_eq!(tail.len(), 5);
}

#[test]
fn empty_query_matches_everything_in_scope() {
    let backend = backend_for(user());
    let all = backend.search("").unwrap();
    // 30 generated documents plus "owned"; "secret" and "foreign" are out of scope.
    assert_eq!(all.len(), 31);
    assert!(all.iter().all(|r| r.score == 1.0));
}

#[test]
fn query_without_terms_is_invalid() {
    let backend = backend_for(user());
    assert!(matches!(backend.search("!!! ???"), Err(Error::InvalidQuery(_))));
}

#[test]
fn no_match_is_empty_not_error() {
    let backend = backend_for(user());
    assert!(backend.search("zebra").unwrap().is_empty());
}

#[test]
fn facet_filter_matches_hierarchy() {
    let backend = backend_for(user());
    let hits = backend.execute(&SearchRequest::new("invoice").facet("category", "finance")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].pk, "owned");
}

#[test]
fn outsider_is_denied_and_denied_datastore_is_an_error() {
    let outsider = backend_for(User::new("outsider"));
    assert!(matches!(outsider.search("invoice"), Err(Error::Authorization(_))));

    let backend = backend_for(user());
    assert!(matches!(
        backend.execute(&SearchRequest::new("invoice").with_datastores(["d3"])),
        Err(Error::Authorization(_))
    ));
}

#[test]
fn reindex_replaces_by_key() {
    let backend = backend_for(user());
    let before = backend.len().unwrap();
    backend.index(&[doc("0", "invoice", "d1", "zebra stripes")]).unwrap();
    assert_eq!(backend.len().unwrap(), before);
    let hits = backend.search("zebra").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].pk, "0");
}

#[test]
fn registry_builds_by_name_and_rejects_unknown() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("docs.jsonl");
    let lines: Vec<String> = corpus().iter().map(|d| serde_json::to_string(d).unwrap()).collect();
    fs::write(&path, lines.join("\n")).unwrap();

    let mut registry = BackendRegistry::new();
    registry.register("memory", InMemoryBackend::from_context);

    let ctx = BackendContext::new(
        Arc::new(Workspace::new("w", ["d1", "d2"])),
        Arc::new(user()),
        BackendOptions::new().with("documents", path.to_string_lossy()).with("unknown", "ignored"),
    )
    .unwrap();
    let backend = registry.build("memory", ctx.clone()).expect("memory backend");
    assert_eq!(backend.search("").unwrap().len(), 31);

    assert!(matches!(registry.build("elastic", ctx.clone()), Err(Error::Configuration(_))));

    let missing = ctx.with_options(BackendOptions::new().with("documents", "/nonexistent/docs")).unwrap();
    assert!(matches!(registry.build("memory", missing), Err(Error::Configuration(_))));
}
