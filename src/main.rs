//! # medsum CLI
//!
//! The `medsum` binary drives the retrieval-augmented summarization
//! pipeline: database initialization, report upload, ingestion
//! (chunk + embed + persist), summarization, and inspection.
//!
//! ## Usage
//!
//! ```bash
//! medsum --config ./config/medsum.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medsum init` | Create the SQLite database and run schema migrations |
//! | `medsum upload <file>` | Register a report document, print its id |
//! | `medsum ingest <id>` | Chunk, embed, and index a document's fragments |
//! | `medsum summarize <id>` | Generate (or regenerate) the document's summary |
//! | `medsum retrieve <id> "<query>"` | Debug: print the retrieved context blob |
//! | `medsum get <id>` | Print a document, its fragments, and its summary |
//!
//! Credentials come from the environment: `OPENAI_API_KEY` /
//! `GEMINI_API_KEY` for generation, `OPENAI_API_KEY` for OpenAI embeddings,
//! `HF_API_KEY` for the optional domain-insight channel. Running without an
//! embedding credential is supported — ingestion reports zero fragments and
//! summarization proceeds without retrieved context.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use medsum::{config, db, get, ingest, migrate, retrieve, store, summarize};

/// medsum — a retrieval-augmented clinical report summarization pipeline.
#[derive(Parser)]
#[command(
    name = "medsum",
    about = "medsum — retrieval-augmented clinical report summarization",
    version,
    long_about = "medsum ingests clinical reports by chunking and embedding them into a \
    SQLite vector store, then generates structured summaries grounded in retrieved \
    fragments, optional domain-model insights, and the report text itself."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/medsum.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (documents,
    /// fragments, fragment_vectors, summaries). Idempotent.
    Init,

    /// Register a report document.
    ///
    /// Records the file's path as the document's storage locator and prints
    /// the new document id. The file is not read until ingestion.
    Upload {
        /// Path to the report file.
        file: PathBuf,

        /// Report category (e.g. radiology, pathology, lab).
        #[arg(long, default_value = "general")]
        category: String,

        /// Patient or subject label.
        #[arg(long)]
        subject: Option<String>,
    },

    /// Ingest a document: chunk, embed, and index its fragments.
    ///
    /// Aborts with zero fragments persisted if the embedding provider
    /// fails; reports zero fragments when the provider is disabled.
    /// Re-ingestion replaces the prior fragment set atomically.
    Ingest {
        /// Document id (from `upload`).
        id: String,
    },

    /// Generate (or regenerate) a document's structured summary.
    ///
    /// Retrieval and domain insights are best-effort; generation and
    /// persistence failures mark the document `failed`. Regeneration
    /// overwrites the prior summary.
    Summarize {
        /// Document id.
        id: String,
    },

    /// Debug: retrieve the context blob for a query against one document.
    Retrieve {
        /// Document id.
        id: String,

        /// Query text to embed and match against the document's fragments.
        query: String,

        /// Similarity floor override (results must score strictly above it).
        #[arg(long)]
        floor: Option<f64>,

        /// Maximum number of fragments to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Print a document, its fragments, and its summary.
    Get {
        /// Document id.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config.db).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("initialized {}", config.db.path.display());
        }
        Commands::Upload {
            file,
            category,
            subject,
        } => {
            let storage_path = std::fs::canonicalize(&file)
                .map_err(|e| anyhow::anyhow!("cannot resolve {}: {}", file.display(), e))?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.display().to_string());

            let pool = db::connect(&config.db).await?;
            let id = store::insert_document(
                &pool,
                subject.as_deref(),
                &filename,
                &category,
                &storage_path.to_string_lossy(),
            )
            .await?;
            pool.close().await;

            println!("uploaded {}", filename);
            println!("  id: {}", id);
        }
        Commands::Ingest { id } => {
            ingest::run_ingest(&config, &id).await?;
        }
        Commands::Summarize { id } => {
            summarize::run_summarize(&config, &id).await?;
        }
        Commands::Retrieve {
            id,
            query,
            floor,
            limit,
        } => {
            retrieve::run_retrieve(&config, &id, &query, floor, limit).await?;
        }
        Commands::Get { id } => {
            get::run_get(&config, &id).await?;
        }
    }

    Ok(())
}
