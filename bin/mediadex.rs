use anyhow::{Context, Result};
use clap::Parser;
use mediadex::{
    BackendKind, CancellationToken, EngineConfig, FieldSchema, InMemorySource, QueryLimits,
    SearchEngine,
};
use serde_json::json;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "mediadex")]
#[command(about = "Search a media catalogue with the mediadex query language", long_about = None)]
struct Args {
    /// JSON-lines corpus, one record per line with an `id` member
    #[arg(long, env = "MEDIADEX_CORPUS")]
    corpus: Option<PathBuf>,

    /// Query to run; may be repeated. Queries are read from stdin when absent.
    #[arg(long, short = 'q')]
    query: Vec<String>,

    /// Maximum results per query
    #[arg(long, env = "MEDIADEX_RESULTS_LIMIT", default_value = "50")]
    limit: usize,

    /// Backend fallback chain, primary first
    #[arg(
        long,
        env = "MEDIADEX_BACKENDS",
        value_delimiter = ',',
        default_value = "inverted,substring"
    )]
    backends: Vec<String>,

    /// Backends to take out of service before querying
    #[arg(long, value_delimiter = ',')]
    disable: Vec<String>,

    /// Persist the index here and restore it on the next run
    #[arg(long, env = "MEDIADEX_SNAPSHOT_PATH")]
    snapshot_path: Option<PathBuf>,

    /// Source mutations a persisted snapshot may lag before a full rebuild
    #[arg(long, env = "MEDIADEX_STALENESS_THRESHOLD", default_value = "1000")]
    staleness_threshold: u64,

    /// Records per rebuild batch
    #[arg(long, env = "MEDIADEX_BATCH_SIZE", default_value = "100")]
    batch_size: usize,

    /// Longest accepted query, in characters
    #[arg(long, env = "MEDIADEX_MAX_QUERY_LENGTH", default_value = "1024")]
    max_query_length: usize,

    /// Deepest accepted nesting of parentheses and NOT
    #[arg(long, env = "MEDIADEX_MAX_QUERY_DEPTH", default_value = "32")]
    max_query_depth: usize,

    /// Print engine health before running queries
    #[arg(long)]
    health: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Starting mediadex v{}", mediadex::VERSION);

    let backends = args
        .backends
        .iter()
        .map(|name| name.parse::<BackendKind>())
        .collect::<mediadex::Result<Vec<_>>>()?;

    let mut config = EngineConfig::default()
        .with_backends(backends)
        .with_results_limit(args.limit)
        .with_staleness_threshold(args.staleness_threshold)
        .with_rebuild_batch_size(args.batch_size)
        .with_query_limits(QueryLimits {
            max_length: args.max_query_length,
            max_depth: args.max_query_depth,
        });
    if let Some(path) = &args.snapshot_path {
        config = config.with_snapshot_path(path);
    }

    let schema = FieldSchema::media();
    let source = match &args.corpus {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open corpus {}", path.display()))?;
            InMemorySource::from_jsonl(BufReader::new(file), &schema)?
        }
        None => {
            warn!("no corpus given, starting with an empty catalogue");
            InMemorySource::new()
        }
    };

    let engine = SearchEngine::new(config, schema, Arc::new(source))?;
    engine.start(&CancellationToken::new())?;

    for name in &args.disable {
        if !engine.set_backend_available(name, false) {
            warn!(backend = %name, "unknown backend, cannot disable");
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.health {
        writeln!(out, "{}", serde_json::to_string(&engine.health())?)?;
    }

    let queries: Box<dyn Iterator<Item = io::Result<String>>> = if args.query.is_empty() {
        Box::new(io::stdin().lock().lines())
    } else {
        Box::new(args.query.clone().into_iter().map(Ok))
    };

    for query in queries {
        let query = query?;
        let line = match engine.search(&query, engine.config().results_limit) {
            Ok(response) => serde_json::to_value(&response)?,
            Err(e) => json!({ "query": query, "error": e.to_string() }),
        };
        writeln!(out, "{}", line)?;
    }

    Ok(())
}
