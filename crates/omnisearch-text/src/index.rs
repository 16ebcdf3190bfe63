use anyhow::Result;
use std::path::Path;
use tantivy::directory::MmapDirectory;
use tantivy::schema::Field;
use tantivy::{Index, IndexWriter, TantivyDocument, Term};
use tracing::info;

use omnisearch_core::traits::DocumentIndexer;
use omnisearch_core::types::IndexDocument;

use crate::tantivy_utils::{build_schema, facet_path, register_tokenizer};

const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Debug, Clone, Copy)]
pub struct TextFields {
	pub key: Field,
	pub pk: Field,
	pub model_name: Field,
	pub datastore_id: Field,
	pub workspace_id: Field,
	pub content: Field,
	pub facets: Field,
}

/// A tantivy index with the omnisearch schema and analyzer registered.
#[derive(Clone)]
pub struct TextIndex {
	index: Index,
	fields: TextFields,
}

impl TextIndex {
	pub fn create_in_ram() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	/// Open the index in `dir`, creating the directory and an empty index if needed.
	pub fn open_or_create(dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(dir)?;
		let index = Index::open_or_create(MmapDirectory::open(dir)?, build_schema())?;
		Self::from_index(index)
	}

	/// Open an existing index; fails if `dir` holds none.
	pub fn open(dir: &Path) -> Result<Self> {
		Self::from_index(Index::open_in_dir(dir)?)
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let schema = index.schema();
		let fields = TextFields {
			key: schema.get_field("key")?,
			pk: schema.get_field("pk")?,
			model_name: schema.get_field("model_name")?,
			datastore_id: schema.get_field("datastore_id")?,
			workspace_id: schema.get_field("workspace_id")?,
			content: schema.get_field("content")?,
			facets: schema.get_field("facets")?,
		};
		Ok(Self { index, fields })
	}

	pub fn inner(&self) -> &Index { &self.index }

	pub fn fields(&self) -> TextFields { self.fields }

	fn to_document(&self, d: &IndexDocument) -> TantivyDocument {
		let f = self.fields;
		let mut doc = TantivyDocument::default();
		doc.add_text(f.key, d.key());
		doc.add_text(f.pk, &d.pk);
		doc.add_text(f.model_name, &d.model_name);
		doc.add_text(f.datastore_id, &d.datastore_id);
		doc.add_text(f.workspace_id, &d.workspace_id);
		doc.add_text(f.content, &d.content);
		for (name, value) in &d.facets { doc.add_facet(f.facets, facet_path(name, value)); }
		doc
	}
}

/// Writes `IndexDocument`s into a `TextIndex`, replacing existing keys.
pub struct TantivyIndexer {
	index: TextIndex,
}

impl TantivyIndexer {
	pub fn new(index: TextIndex) -> Self { Self { index } }
}

impl DocumentIndexer for TantivyIndexer {
	fn index(&self, docs: &[IndexDocument]) -> Result<()> {
		let mut index_writer: IndexWriter = self.index.inner().writer(WRITER_HEAP_BYTES)?;
		let key = self.index.fields().key;
		for d in docs {
			index_writer.delete_term(Term::from_field_text(key, &d.key()));
			index_writer.add_document(self.index.to_document(d))?;
		}
		index_writer.commit()?;
		info!(documents = docs.len(), "committed text index");
		Ok(())
	}
}
