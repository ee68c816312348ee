//! # docsplit CLI
//!
//! Thin harness over the [`docsplit`] library. Each command reads one
//! document as JSON (`{"content": "<text>" | [LineRecord, ...], "metadata":
//! {...}}`), runs part of the pipeline, and prints JSON to stdout. Logs go to
//! stderr; set `RUST_LOG` to change verbosity.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsplit chunk <doc>` | Segment, merge, and tag; print the chunks |
//! | `docsplit ingest <doc>` | Full pipeline; print the ingestion payload |
//! | `docsplit raw <doc>` | Print the pass-through raw payload |
//! | `docsplit author <doc>` | Resolve and print the document author |
//!
//! ## Examples
//!
//! ```bash
//! docsplit chunk ./page.json
//! docsplit --config ./docsplit.toml ingest ./book.json --team-id acme --user-id u42
//! docsplit author ./book.json --mode cost_saving
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use docsplit::config::{self, Config};
use docsplit::ingest::Pipeline;
use docsplit::models::{AuthorMode, Document};

/// docsplit — heading-aware document segmentation, tagging, and author
/// resolution.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without it, built-in defaults apply.
#[derive(Parser)]
#[command(
    name = "docsplit",
    about = "docsplit — heading-aware document segmentation, tagging, and author resolution",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment, merge, and tag a document.
    ///
    /// Prints the resulting chunks. Does not resolve the author, so no LLM
    /// request is ever made.
    Chunk {
        /// Path to the document JSON file.
        document: PathBuf,
    },

    /// Run the full pipeline and print the ingestion payload.
    Ingest {
        /// Path to the document JSON file.
        document: PathBuf,

        #[arg(long, default_value = "default_team")]
        team_id: String,

        #[arg(long, default_value = "default_user")]
        user_id: String,

        /// Author resolution mode: `cost_saving`, `balanced`, or `accuracy`.
        /// Overrides `[author].mode`.
        #[arg(long)]
        mode: Option<String>,
    },

    /// Print the unprocessed document text and metadata.
    Raw {
        /// Path to the document JSON file.
        document: PathBuf,

        #[arg(long, default_value = "default_team")]
        team_id: String,

        #[arg(long, default_value = "default_user")]
        user_id: String,
    },

    /// Resolve the document author.
    Author {
        /// Path to the document JSON file.
        document: PathBuf,

        /// Author resolution mode. Overrides `[author].mode`.
        #[arg(long)]
        mode: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Chunk { document } => {
            let doc = read_document(&document)?;
            let pipeline = Pipeline::new(&cfg)?;
            print_json(&pipeline.chunk(&doc))?;
        }
        Commands::Ingest {
            document,
            team_id,
            user_id,
            mode,
        } => {
            let doc = read_document(&document)?;
            let pipeline = with_mode(Pipeline::new(&cfg)?, mode)?;
            print_json(&pipeline.ingestion_payload(&doc, &team_id, &user_id))?;
        }
        Commands::Raw {
            document,
            team_id,
            user_id,
        } => {
            let doc = read_document(&document)?;
            let pipeline = Pipeline::new(&cfg)?;
            print_json(&pipeline.raw_payload(&doc, &team_id, &user_id))?;
        }
        Commands::Author { document, mode } => {
            let doc = read_document(&document)?;
            let pipeline = with_mode(Pipeline::new(&cfg)?, mode)?;
            print_json(&pipeline.resolve_author(&doc))?;
        }
    }

    Ok(())
}

fn with_mode(pipeline: Pipeline, mode: Option<String>) -> Result<Pipeline> {
    Ok(match mode {
        Some(mode) => pipeline.with_author_mode(mode.parse::<AuthorMode>()?),
        None => pipeline,
    })
}

fn read_document(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse document JSON: {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
