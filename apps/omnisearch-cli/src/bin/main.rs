use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use omnisearch_core::config::Config;
use omnisearch_core::data_processor::DataProcessor;
use omnisearch_core::memory::InMemoryBackend;
use omnisearch_core::{BackendContext, BackendOptions, BackendRegistry, DocumentIndexer, SearchRequest};
use omnisearch_text::{TantivyBackend, TantivyIndexer, TextIndex};

const INGEST_BATCH: usize = 500;

#[derive(Parser)]
#[command(name = "omnisearch")]
#[command(about = "Index documents and query them through a search backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upsert `.jsonl` documents into the text index
    Ingest {
        /// A `.jsonl` file or a directory of them
        path: PathBuf,
        /// Overrides `data.index_dir`
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },
    /// Run a query as a given user inside a workspace
    Query {
        query: String,
        #[arg(long)]
        workspace: String,
        #[arg(long)]
        user: String,
        /// Restrict to a model name (repeatable)
        #[arg(long = "type")]
        types: Vec<String>,
        /// Restrict to a datastore (repeatable)
        #[arg(long = "datastore")]
        datastores: Vec<String>,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        start: i64,
        /// Defaults to `search.default_size`
        #[arg(long, allow_negative_numbers = true)]
        size: Option<i64>,
        /// Facet filter `name=value` (repeatable)
        #[arg(long = "facet", value_parser = parse_facet)]
        facets: Vec<(String, String)>,
        /// Overrides `backend.kind`
        #[arg(long)]
        backend: Option<String>,
        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn parse_facet(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("omnisearch={level},omnisearch_core={level},omnisearch_text={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config(path: Option<&Path>) -> Result<(Config, PathBuf)> {
    match path {
        Some(p) => {
            let base = p.parent().map(Path::to_path_buf).unwrap_or_default();
            Ok((Config::load_from(p).with_context(|| format!("loading {}", p.display()))?, base))
        }
        None => Ok((Config::load().context("loading config.toml")?, PathBuf::from("."))),
    }
}

fn registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register("text", TantivyBackend::from_context);
    registry.register("memory", InMemoryBackend::from_context);
    registry
}

fn ingest(config: &Config, base: &Path, path: &Path, index_dir: Option<PathBuf>) -> Result<()> {
    let index_dir = index_dir
        .or_else(|| config.index_dir(base))
        .context("no index directory: pass --index-dir or set data.index_dir")?;
    let docs = DataProcessor::new().load(path)?;
    let indexer = TantivyIndexer::new(TextIndex::open_or_create(&index_dir)?);

    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%)")?.progress_chars("#>-"));
    for batch in docs.chunks(INGEST_BATCH) {
        indexer.index(batch)?;
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();
    info!(documents = docs.len(), index = %index_dir.display(), "ingest complete");
    Ok(())
}

/// `backend.options`, with `max_size` from `search.max_size` and, for the
/// text backend, `index_dir` from `data.index_dir` unless given explicitly.
fn backend_options(config: &Config, base: &Path, kind: &str) -> Result<BackendOptions> {
    let mut options = config.backend()?.options();
    if options.get("max_size").is_none() {
        options = options.with("max_size", config.search()?.max_size.to_string());
    }
    if kind == "text" && options.get("index_dir").is_none() {
        if let Some(dir) = config.index_dir(base) {
            options = options.with("index_dir", dir.to_string_lossy());
        }
    }
    Ok(options)
}

fn request_size(config: &Config, size: Option<i64>) -> Result<i64> {
    match size {
        Some(s) => Ok(s),
        None => Ok(i64::try_from(config.search()?.default_size)?),
    }
}

fn query(
    config: &Config,
    base: &Path,
    request: SearchRequest,
    workspace: &str,
    user: &str,
    backend: Option<String>,
    json: bool,
) -> Result<()> {
    let access = config.access()?;
    let workspace = Arc::new(access.workspace(workspace)?);
    let user = Arc::new(access.user(user)?);

    let kind = match backend {
        Some(kind) => kind,
        None => config.backend()?.kind,
    };
    let ctx = BackendContext::new(workspace, user, backend_options(config, base, &kind)?)?;
    let backend = registry().build(&kind, ctx)?;
    let results = backend.execute(&request)?;

    if json {
        for r in &results { println!("{}", serde_json::to_string(r)?); }
    } else {
        println!("Found {} results for \"{}\"", results.len(), request.query);
        for (i, r) in results.iter().enumerate() {
            println!("  {}. score={:.4}  {}:{}  datastore={}", request.start as usize + i + 1, r.score, r.model_name, r.pk, r.datastore_id);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let (config, base) = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { path, index_dir } => ingest(&config, &base, &path, index_dir),
        Commands::Query { query: text, workspace, user, types, datastores, start, size, facets, backend, json } => {
            let mut request = SearchRequest::new(text).window(start, request_size(&config, size)?);
            if !types.is_empty() { request = request.with_types(types); }
            if !datastores.is_empty() { request = request.with_datastores(datastores); }
            for (name, value) in facets { request = request.facet(name, value); }
            query(&config, &base, request, &workspace, &user, backend, json)
        }
    }
}
