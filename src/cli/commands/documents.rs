//! Document commands: ingest, delete, list, reembed.

use anyhow::{Context, Result, bail};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::retrieval::Retriever;
use crate::runtime::run_blocking;
use crate::vector::Metadata;

/// Run ingest command over files or inline text.
pub async fn run_ingest(
    retriever: Arc<Retriever>,
    paths: Vec<PathBuf>,
    text: Option<String>,
    metadata: Vec<(String, String)>,
    json: bool,
    timeout: Duration,
) -> Result<()> {
    let extra: Metadata = metadata
        .into_iter()
        .map(|(key, value)| (key, json!(value)))
        .collect();

    let mut ingested = Vec::new();
    if let Some(text) = text {
        let r = Arc::clone(&retriever);
        let id = run_blocking(timeout, move || r.ingest_with_metadata(&text, extra)).await?;
        ingested.push(json!({ "document_id": id }));
    } else if paths.is_empty() {
        bail!("nothing to ingest: pass file paths or --text");
    } else {
        for path in paths {
            let r = Arc::clone(&retriever);
            let extra = extra.clone();
            let source = path.clone();
            let id = run_blocking(timeout, move || r.ingest_file_with_metadata(&source, extra))
                .await
                .with_context(|| format!("failed to ingest {}", path.display()))?;
            ingested.push(json!({ "document_id": id, "path": path }));
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&ingested)?);
    } else {
        for entry in &ingested {
            match entry.get("path") {
                Some(path) => println!(
                    "{}  {}",
                    entry["document_id"].as_str().unwrap_or_default(),
                    path.as_str().unwrap_or_default()
                ),
                None => println!("{}", entry["document_id"].as_str().unwrap_or_default()),
            }
        }
    }
    Ok(())
}

/// Run delete command.
pub async fn run_delete(retriever: Arc<Retriever>, ids: Vec<String>, timeout: Duration) -> Result<()> {
    for id in ids {
        let r = Arc::clone(&retriever);
        let target = id.clone();
        let removed = run_blocking(timeout, move || r.delete(&target)).await?;
        if removed {
            println!("Deleted {id}");
        } else {
            eprintln!("No document with id {id}");
        }
    }
    Ok(())
}

/// Run list command.
pub fn run_list(retriever: &Retriever, json: bool) -> Result<()> {
    let documents = retriever.documents();
    if json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
    } else if documents.is_empty() {
        eprintln!("No documents ingested.");
    } else {
        for doc in documents {
            let source = doc
                .source_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{}  chunks={:<4} mode={:<8} {}",
                doc.document_id,
                doc.chunk_count(),
                doc.embedding_mode.label(),
                source
            );
        }
    }
    Ok(())
}

/// Run reembed command.
pub fn run_reembed(retriever: &Retriever, ids: Vec<String>, all: bool) -> Result<()> {
    if all {
        let count = retriever.reembed_all()?;
        println!("Re-embedded {count} documents ({})", retriever.embedder().mode());
        return Ok(());
    }
    for id in ids {
        if retriever.reembed(&id)? {
            println!("Re-embedded {id}");
        } else {
            eprintln!("No document with id {id}");
        }
    }
    Ok(())
}
