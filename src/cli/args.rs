//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Document retrieval pipeline
#[derive(Parser)]
#[command(
    name = "ragline",
    version = env!("CARGO_PKG_VERSION"),
    about = "Chunk, embed and search documents",
    long_about = "Ingest documents as overlapping chunks, embed them with a locally trained skip-gram model, and search them by cosine similarity.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ ragline init\n  $ ragline ingest notes.md paper.pdf\n  $ ragline train --all\n  $ ragline reembed --all\n  $ ragline search \"borrow checker\" -k 3"
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .ragline directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .ragline/settings.toml")]
    Config,

    /// Ingest files or inline text
    #[command(
        about = "Chunk, embed and index documents",
        after_help = "Examples:\n  ragline ingest notes.md report.docx\n  ragline ingest --text \"inline document\" --meta source=clipboard"
    )]
    Ingest {
        /// Files to ingest (.txt, .md, .pdf, .docx)
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Ingest this text instead of files
        #[arg(long, conflicts_with = "paths")]
        text: Option<String>,

        /// Extra metadata attached to every record (key=value)
        #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Search indexed chunks
    #[command(about = "Find the chunks most similar to a query")]
    Search {
        /// Query text
        query: String,

        /// Number of results (defaults to search.default_top_k)
        #[arg(short = 'k', long)]
        limit: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Delete documents and their records
    #[command(about = "Remove documents by id")]
    Delete {
        /// Document ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// List ingested documents
    #[command(about = "List ingested documents")]
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Train the embedding model
    #[command(
        about = "Train skip-gram embeddings on stored chunks",
        after_help = "Training publishes a new model generation. Existing records keep their old vectors until `ragline reembed --all` runs."
    )]
    Train {
        /// Documents whose chunks form the corpus
        #[arg(required_unless_present = "all")]
        ids: Vec<String>,

        /// Train on every ingested document
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        /// Epochs (overrides training.epochs)
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Re-encode stored chunks with the current model
    #[command(about = "Refresh document vectors after training")]
    Reembed {
        /// Documents to re-encode
        #[arg(required_unless_present = "all")]
        ids: Vec<String>,

        /// Re-encode every ingested document
        #[arg(long, conflicts_with = "ids")]
        all: bool,
    },

    /// Show pipeline status
    #[command(about = "Show document count, record count and embedding mode")]
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
