use tantivy::schema::{Facet, FacetOptions, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const CONTENT_TOKENIZER: &str = "text_with_stopwords";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("key", STRING);
	schema_builder.add_text_field("pk", STRING | STORED);
	schema_builder.add_text_field("model_name", STRING | STORED);
	schema_builder.add_text_field("datastore_id", STRING | STORED);
	schema_builder.add_text_field("workspace_id", STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(CONTENT_TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	schema_builder.add_text_field("content", text_options);
	schema_builder.add_facet_field("facets", FacetOptions::default());
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(CONTENT_TOKENIZER, tokenizer);
}

/// `name` + `/`-separated `value` as one hierarchical facet: `/name/a/b`.
pub fn facet_path(name: &str, value: &str) -> Facet {
	Facet::from_path(std::iter::once(name).chain(value.split('/').filter(|s| !s.is_empty())))
}
