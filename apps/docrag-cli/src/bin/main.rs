use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docrag_core::chunker::Chunker;
use docrag_core::config::{expand_path, Config, Settings};
use docrag_core::document::DocumentLoader;
use docrag_core::traits::VectorStore;
use docrag_core::types::SearchFilter;
use docrag_embed::get_default_embedder;
use docrag_retrieval::{build_context, IngestReport, Ingestor, KnowledgeService};
use docrag_vector::create_store_by_name;

const USAGE: &str = "Usage: docrag <command> [args...]

Commands:
  ingest [docs_dir] [--progress]
      Load, chunk and index a docs tree, then print ingest and store stats.
  query [docs_dir] <text...> [--max N] [--language L] [--category C] [--json]
      Ingest the docs tree and print the context block for <text>.

docs_dir defaults to ingest.docs_path from config (APP_INGEST__DOCS_PATH).";

#[derive(Debug, Default)]
struct QueryArgs {
    docs_dir: Option<PathBuf>,
    text: Vec<String>,
    max_results: Option<usize>,
    filter: SearchFilter,
    json: bool,
}

fn usage_exit() -> ! {
    eprintln!("{USAGE}");
    std::process::exit(1)
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || matches!(args[0].as_str(), "-h" | "--help" | "help") {
        usage_exit();
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn flag_value(args: &[String], i: usize, flag: &str) -> anyhow::Result<String> {
    args.get(i + 1).cloned().with_context(|| format!("{flag} requires a value"))
}

fn parse_query_args(args: &[String]) -> anyhow::Result<QueryArgs> {
    let mut parsed = QueryArgs::default();
    let mut positional = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--max" | "-n" => {
                let value = flag_value(args, i, "--max")?;
                parsed.max_results = Some(value.parse().with_context(|| format!("--max expects a number, got '{value}'"))?);
                i += 1;
            }
            "--language" | "-l" => {
                parsed.filter = parsed.filter.language(flag_value(args, i, "--language")?);
                i += 1;
            }
            "--category" | "-c" => {
                parsed.filter = parsed.filter.category(flag_value(args, i, "--category")?);
                i += 1;
            }
            "--json" => parsed.json = true,
            other if other.starts_with('-') => anyhow::bail!("unknown option {other}"),
            other => positional.push(other.to_string()),
        }
        i += 1;
    }
    // A leading positional that names a directory is the docs root.
    if positional.len() > 1 && expand_path(&positional[0]).is_dir() {
        parsed.docs_dir = Some(expand_path(positional.remove(0)));
    }
    parsed.text = positional;
    Ok(parsed)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn VectorStore>> {
    let embedder = Arc::from(get_default_embedder(settings.embedding.dim)?);
    Ok(create_store_by_name(&settings.store.kind, embedder)?)
}

async fn ingest(settings: &Settings, store: Arc<dyn VectorStore>, docs_dir: PathBuf, progress: bool) -> anyhow::Result<IngestReport> {
    let loader = DocumentLoader::new(docs_dir, settings.loader.clone());
    let ingestor = Ingestor::new(store, Chunker::new(settings.chunking.clone())?)
        .with_concurrency(settings.ingest.max_workers)
        .with_progress(progress);
    let report = ingestor
        .ingest_dir(&loader)
        .await
        .with_context(|| format!("failed to ingest {}", loader.root().display()))?;
    for failure in &report.failures {
        eprintln!("skipped {}: {}", failure.source_path, failure.error);
    }
    Ok(report)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();

    match cmd.as_str() {
        "ingest" => {
            let progress = args.iter().any(|a| a == "--progress" || a == "-p");
            let docs_dir = args.iter().find(|a| !a.starts_with('-')).map(expand_path).unwrap_or_else(|| settings.docs_dir());
            info!(docs = %docs_dir.display(), store = %settings.store.kind, "starting ingest");

            let store = build_store(&settings)?;
            let report = ingest(&settings, store.clone(), docs_dir, progress).await?;
            let service = KnowledgeService::new(store, settings.retrieval.clone())?;
            let output = serde_json::json!({ "ingest": report, "search": service.search_stats()? });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "query" => {
            let query = parse_query_args(&args).unwrap_or_else(|e| {
                eprintln!("Error: {e:#}");
                usage_exit()
            });
            if query.text.is_empty() {
                usage_exit();
            }
            let text = query.text.join(" ");
            let docs_dir = query.docs_dir.clone().unwrap_or_else(|| settings.docs_dir());
            let max_results = query.max_results.unwrap_or(settings.retrieval.max_results);

            let store = build_store(&settings)?;
            ingest(&settings, store.clone(), docs_dir, false).await?;
            let service = KnowledgeService::new(store, settings.retrieval.clone())?;

            let (results, context) = if query.filter.is_empty() {
                service.search_with_context(&text, max_results)?
            } else {
                let mut results = service.multi_round_search_with(&text, service.config(), &query.filter)?;
                results.truncate(max_results);
                let context = build_context(&results);
                (results, context)
            };

            if query.json {
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "query": text, "results": results, "context": context }))?);
            } else if results.is_empty() {
                println!("No results for \"{text}\"");
            } else {
                println!("{context}");
            }
        }
        _ => {
            eprintln!("Unknown command: {}", cmd);
            usage_exit();
        }
    }
    Ok(())
}
