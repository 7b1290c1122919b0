//! kbase CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use kbase::{
    commands::{
        cmd_answer, cmd_complete, cmd_ingest, cmd_init, cmd_list_documents, cmd_reindex,
        cmd_search, cmd_status, open_library, print_answer, print_completeness, print_documents,
        print_ingest_stats, print_init_report, print_query_results, print_reindex_stats,
        print_status, InitOptions, QueryOptions,
    },
    config::Config,
    error::{Error, Result},
    progress::LogWriterFactory,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "kbase")]
#[command(version, about = "Local knowledge base with semantic search", long_about = None)]
struct Cli {
    /// Path to config file (or the directory holding config.toml)
    #[arg(short, long, global = true, env = "KBASE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config file and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Ingest .txt files or directories of them
    Ingest {
        /// Files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Semantic search over ingested chunks
    Search {
        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum similarity score (-1 to 1)
        #[arg(short, long)]
        min_score: Option<f32>,

        /// Deduplicate results by document
        #[arg(long)]
        dedupe: bool,
    },

    /// Answer a question from retrieved context using the LLM
    Answer {
        /// The question
        query: String,
    },

    /// Check whether the store likely covers a question
    Complete {
        /// The question
        query: String,
    },

    /// List ingested documents
    Docs,

    /// Show system status
    Status,

    /// Rebuild the vector index from stored chunks
    Reindex,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Commands::Init { force } => {
            let base_dir = config_path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir);
            let report = cmd_init(InitOptions { base_dir, force }).await?;
            emit(cli.json, &report, print_init_report)?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "kbase", &mut std::io::stdout());
        }

        Commands::Ingest { paths } => {
            let config = load_config(&config_path)?;
            let library = open_library(&config).await?;
            let stats = cmd_ingest(&config, &library, &paths).await?;
            emit(cli.json, &stats, print_ingest_stats)?;
            library.close().await;

            if !stats.errors.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "{} file(s) could not be ingested",
                    stats.errors.len()
                )));
            }
        }

        Commands::Search {
            query,
            limit,
            min_score,
            dedupe,
        } => {
            let config = load_config(&config_path)?;
            let library = open_library(&config).await?;
            let options = QueryOptions {
                k: limit,
                min_score,
                dedupe_docs: dedupe,
            };
            let results = cmd_search(&config, library, &query, options).await?;
            emit(cli.json, &results, print_query_results)?;
        }

        Commands::Answer { query } => {
            let config = load_config(&config_path)?;
            let library = open_library(&config).await?;
            let result = cmd_answer(&config, library, &query).await?;
            emit(cli.json, &result, print_answer)?;
        }

        Commands::Complete { query } => {
            let config = load_config(&config_path)?;
            let library = open_library(&config).await?;
            let report = cmd_complete(&config, library, &query).await?;
            emit(cli.json, &report, print_completeness)?;
        }

        Commands::Docs => {
            let config = load_config(&config_path)?;
            let library = open_library(&config).await?;
            let documents = cmd_list_documents(&library).await?;
            emit(cli.json, &documents, |docs: &Vec<_>| print_documents(docs))?;
        }

        Commands::Status => {
            let config = load_config(&config_path)?;
            let library = open_library(&config).await?;
            let status = cmd_status(&config, &library).await?;
            emit(cli.json, &status, print_status)?;
        }

        Commands::Reindex => {
            let config = load_config(&config_path)?;
            let library = open_library(&config).await?;
            let stats = cmd_reindex(&library).await?;
            emit(cli.json, &stats, print_reindex_stats)?;
            library.close().await;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(Error::NotInitialized);
    }
    Config::load(path)
}

/// `--config` may name the file itself or the directory holding it
fn resolve_config_path(path: Option<&Path>) -> PathBuf {
    match path {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => path.to_path_buf(),
        Some(dir) => dir.join("config.toml"),
        None => Config::default_config_path(),
    }
}

fn emit<T: Serialize>(json: bool, value: &T, print: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}
