//! Thin CLI over the indexing pipeline and retriever.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use repo_knowledge::config::IndexConfig;
use repo_knowledge::embedding::provider_from_config;
use repo_knowledge::error::Result;
use repo_knowledge::indexer::{Pipeline, PipelineOptions};
use repo_knowledge::retriever::budget::apply_token_budget;
use repo_knowledge::retriever::{Retriever, SearchMode, SearchOptions};
use repo_knowledge::store::{MetadataStore, VectorStore};

#[derive(Parser)]
#[command(name = "repo-knowledge", version, about = "Code indexing and retrieval for agents")]
struct Cli {
    /// Project root (defaults to the current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the data directory and default config.
    Init {
        /// Recreate even if already initialized.
        #[arg(long)]
        force: bool,
    },
    /// Index the repository (incremental by default).
    Index {
        /// Wipe and re-index everything.
        #[arg(long)]
        full: bool,
        /// Generate file/directory/project summaries.
        #[arg(long)]
        summaries: bool,
    },
    /// Search the index.
    Search {
        query: String,
        /// hybrid | vector | keyword | symbol
        #[arg(long, default_value = "hybrid")]
        mode: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Token budget for the formatted output.
        #[arg(long, default_value_t = 4000)]
        budget: usize,
        /// Restrict to one language.
        #[arg(long)]
        language: Option<String>,
        /// Restrict to a file glob (e.g. `src/**`).
        #[arg(long)]
        files: Option<String>,
    },
    /// Show index statistics.
    Stats,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("repo_knowledge=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Command::Init { force } => {
            let config = IndexConfig::initialize(&root, force)?;
            // Create the databases up front so later commands fail fast only
            // on genuine problems.
            let meta = MetadataStore::open(&config.metadata_db_path().to_string_lossy())?;
            meta.close();
            let vectors = VectorStore::open(&config.vectors_dir(), config.embedding_dimensions)?;
            vectors.close();
            println!("initialized {}", config.data_dir.display());
            Ok(())
        }
        Command::Index { full, summaries } => {
            let config = IndexConfig::load(&root)?;
            let meta = MetadataStore::open(&config.metadata_db_path().to_string_lossy())?;
            let vectors = VectorStore::open(&config.vectors_dir(), config.embedding_dimensions)?;
            let mut provider =
                provider_from_config(&config.embedding_model, config.embedding_dimensions)?;

            let bar = ProgressBar::hidden();
            bar.set_style(
                ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_message("embedding");

            let pipeline = Pipeline::new(&config, &meta, &vectors);
            let report = pipeline.run(
                provider.as_mut(),
                PipelineOptions {
                    full,
                    with_summaries: summaries,
                },
                &mut |done, total| {
                    if bar.is_hidden() && total > 0 {
                        bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                        bar.set_length(total as u64);
                    }
                    bar.set_position(done as u64);
                },
            );
            bar.finish_and_clear();

            provider.dispose();
            vectors.close();
            meta.close();

            println!("{}", report?);
            Ok(())
        }
        Command::Search {
            query,
            mode,
            limit,
            budget,
            language,
            files,
        } => {
            let config = IndexConfig::load(&root)?;
            let meta = MetadataStore::open(&config.metadata_db_path().to_string_lossy())?;
            let vectors = VectorStore::open(&config.vectors_dir(), config.embedding_dimensions)?;
            let mut provider =
                provider_from_config(&config.embedding_model, config.embedding_dimensions)?;
            provider.initialize()?;

            let options = SearchOptions {
                mode: SearchMode::from_str_loose(&mode).unwrap_or_default(),
                limit,
                token_budget: budget,
                language_filter: language,
                file_filter: files,
            };
            let retriever = Retriever::new(&meta, &vectors, provider.as_ref());
            let results = retriever.search(&query, &options);
            let results = apply_token_budget(results, options.token_budget, options.limit);

            if results.is_empty() {
                println!("no results");
            }
            for result in &results {
                println!(
                    "{} {}:{}-{} [{}] {:.4}",
                    result.match_type.as_str(),
                    result.file_path,
                    result.start_line,
                    result.end_line,
                    result
                        .language
                        .map(|l| l.as_str())
                        .unwrap_or("unknown"),
                    result.score,
                );
                for line in result.content.lines() {
                    println!("    {line}");
                }
            }

            provider.dispose();
            vectors.close();
            meta.close();
            Ok(())
        }
        Command::Stats => {
            let config = IndexConfig::load(&root)?;
            let meta = MetadataStore::open(&config.metadata_db_path().to_string_lossy())?;
            let stats = meta.stats()?;
            println!("files:        {}", stats.files);
            println!("symbols:      {}", stats.symbols);
            println!("chunks:       {}", stats.chunks);
            println!("edges:        {}", stats.edges);
            println!("dependencies: {}", stats.dependencies);
            for key in [
                repo_knowledge::store::metadata::STATE_LAST_INDEXED,
                repo_knowledge::store::metadata::STATE_LAST_FULL_INDEX,
                repo_knowledge::store::metadata::STATE_EMBEDDING_MODEL,
            ] {
                if let Some(value) = meta.get_state(key)? {
                    println!("{key}: {value}");
                }
            }
            meta.close();
            Ok(())
        }
    }
}
