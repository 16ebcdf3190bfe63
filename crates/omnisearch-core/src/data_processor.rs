use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::IndexDocument;

/// Loads `IndexDocument`s from JSON-lines files.
#[derive(Default)]
pub struct DataProcessor {
    limit: Option<usize>,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    /// Stop after reading `limit` files.
    pub fn with_file_limit(limit: usize) -> Self { Self { limit: Some(limit) } }

    /// Accepts a single `.jsonl` file or a directory searched recursively.
    pub fn load(&self, path: &Path) -> Result<Vec<IndexDocument>> {
        if !path.exists() { anyhow::bail!("{} does not exist", path.display()); }
        if path.is_file() { return self.read_jsonl(path); }
        self.process_directory(path)
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<IndexDocument>> {
        let mut files = self.list_jsonl_files(data_dir);
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no .jsonl files found");
            return Ok(vec![]);
        }
        if let Some(limit) = self.limit { files.truncate(limit); }
        let mut docs = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            info!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            docs.extend(self.read_jsonl(file_path)?);
        }
        info!("processed {} files into {} documents", files.len(), docs.len());
        Ok(docs)
    }

    fn read_jsonl(&self, file_path: &Path) -> Result<Vec<IndexDocument>> {
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("failed to read {}", file_path.display()))?;
        let mut docs = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim(); if line.is_empty() { continue; }
            let doc: IndexDocument = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: malformed document", file_path.display(), line_no + 1))?;
            docs.push(doc);
        }
        Ok(docs)
    }

    fn list_jsonl_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("jsonl") { files.push(path.to_path_buf()); }
        }
        files.sort(); files
    }
}
