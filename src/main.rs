use anyhow::{Result, anyhow};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use ragline::Settings;
use ragline::cli::commands::{documents, init, search, train};
use ragline::cli::{Cli, Commands};
use ragline::logging;
use ragline::retrieval::Retriever;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init needs neither settings nor a retriever
    if let Commands::Init { force } = cli.command {
        return init::run_init(force);
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow!("Configuration error: {e}"))?;

    logging::init_with_config(&settings.logging);

    if let Commands::Config = cli.command {
        return init::run_config(&settings);
    }

    let retriever = Arc::new(Retriever::from_settings(&settings)?);
    let timeout = Duration::from_secs(settings.runtime.request_timeout_secs);

    match cli.command {
        Commands::Init { .. } | Commands::Config => Ok(()),
        Commands::Ingest {
            paths,
            text,
            metadata,
            json,
        } => documents::run_ingest(retriever, paths, text, metadata, json, timeout).await,
        Commands::Search { query, limit, json } => {
            let top_k = limit.unwrap_or(settings.search.default_top_k);
            search::run(retriever, query, top_k, json, timeout).await
        }
        Commands::Delete { ids } => documents::run_delete(retriever, ids, timeout).await,
        Commands::List { json } => documents::run_list(&retriever, json),
        Commands::Train {
            ids,
            all,
            epochs,
            json,
        } => train::run(&retriever, ids, all, epochs, json),
        Commands::Reembed { ids, all } => documents::run_reembed(&retriever, ids, all),
        Commands::Status { json } => init::run_status(&retriever, json),
    }
}
