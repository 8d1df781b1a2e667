use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use strata_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider, MockEmbeddingProvider};
use strata_retriever::config::PipelineConfig;
use strata_retriever::ingest::{IngestEngine, LocalFileSource};
use strata_retriever::retriever::Retriever;
use strata_retriever::storage::VectorStore;
use strata_retriever::storage::sqlite_store::{STORE_FILE, SqliteVectorStore};

/// Retrieval pipeline for data-engineering corpora.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the vector store database
    #[arg(short, long, default_value = ".strata")]
    store_dir: PathBuf,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Embedding backend
    #[arg(long, default_value = "fastembed")]
    provider: ProviderKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize the vector store
    Init,
    /// Ingest recognized files under a root directory
    Ingest {
        /// Directory to ingest
        root: PathBuf,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Run a similarity query against the store
    Search {
        /// Query text
        query: String,
        /// Maximum number of results (defaults to the configured top_k)
        #[arg(short, long)]
        top_k: Option<usize>,
        /// Also assemble a context string bounded by this many characters
        #[arg(long)]
        context_budget: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show store statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum ProviderKind {
    Fastembed,
    Mock,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fastembed" => Ok(ProviderKind::Fastembed),
            "mock" => Ok(ProviderKind::Mock),
            _ => Err(format!("invalid provider: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct SearchHit {
    id: String,
    score: f32,
    source_path: String,
    chunk_index: usize,
    char_start: usize,
    char_end: usize,
    content: String,
}

#[derive(Serialize)]
struct StoreStats {
    records: usize,
    dimension: usize,
    store_path: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn build_provider(kind: &ProviderKind) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match kind {
        ProviderKind::Fastembed => Ok(Arc::new(
            FastEmbedProvider::create(EmbedConfig::default()).await?,
        )),
        ProviderKind::Mock => Ok(Arc::new(MockEmbeddingProvider::new(384))),
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };
    config.validate()?;

    let provider = build_provider(&args.provider).await?;
    tokio::fs::create_dir_all(&args.store_dir).await?;
    let store = Arc::new(SqliteVectorStore::open(&args.store_dir, provider.dimension()).await?);

    match args.command {
        Commands::Init => {
            println!(
                "Initialized vector store at {} ({} dimensions)",
                args.store_dir.join(STORE_FILE).display(),
                store.dimension()
            );
            Ok(())
        }
        Commands::Ingest { root, format } => {
            let engine = IngestEngine::new(
                config,
                Arc::new(LocalFileSource::new()),
                provider,
                store as Arc<dyn VectorStore>,
            )?;
            let report = engine.run(&root).await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Summary => {
                    println!("Ingest of {} complete:", root.display());
                    println!("  Files processed: {}", report.files_processed);
                    println!("  Chunks written: {}", report.chunks_written);
                    println!("  Failures: {}", report.files_failed.len());
                    for failure in &report.files_failed {
                        println!("    {} -> {}", failure.path.display(), failure.reason);
                    }
                    if report.cancelled {
                        println!("  Run was cancelled before completion");
                    }
                    println!("  Elapsed: {:.2}s", report.elapsed_secs);
                }
            }
            Ok(())
        }
        Commands::Search {
            query,
            top_k,
            context_budget,
            format,
        } => {
            let top_k = top_k.unwrap_or(config.top_k);
            let retriever = Retriever::new(provider, store as Arc<dyn VectorStore>)?;
            let results = retriever.search(&query, top_k).await?;

            let hits: Vec<SearchHit> = results
                .iter()
                .map(|scored| SearchHit {
                    id: scored.record.id.clone(),
                    score: scored.score,
                    source_path: scored.record.metadata.source_path.clone(),
                    chunk_index: scored.record.metadata.chunk_index,
                    char_start: scored.record.metadata.char_start,
                    char_end: scored.record.metadata.char_end,
                    content: scored.record.content.clone(),
                })
                .collect();

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&hits)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} matching chunks:", hits.len());
                    for hit in &hits {
                        println!(
                            "  {:.3} | {} [chunk {}, chars {}-{}]",
                            hit.score, hit.source_path, hit.chunk_index, hit.char_start, hit.char_end
                        );
                        let preview: String = hit.content.chars().take(100).collect();
                        println!("        {preview}");
                    }
                }
            }

            if let Some(budget) = context_budget {
                let context = Retriever::assemble_context(&results, budget);
                println!("--- context ({} chars, {} records) ---", context.text.chars().count(), context.included.len());
                println!("{}", context.text);
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let stats = StoreStats {
                records: store.count().await?,
                dimension: store.dimension(),
                store_path: args.store_dir.join(STORE_FILE),
            };

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
                OutputFormat::Summary => {
                    println!("Store statistics:");
                    println!("  Records: {}", stats.records);
                    println!("  Dimension: {}", stats.dimension);
                    println!("  Database: {}", stats.store_path.display());
                }
            }
            Ok(())
        }
    }
}
