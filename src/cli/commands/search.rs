//! Search command.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::retrieval::Retriever;
use crate::runtime::run_blocking;

const PREVIEW_CHARS: usize = 120;

/// Run search command.
pub async fn run(
    retriever: Arc<Retriever>,
    query: String,
    top_k: usize,
    json: bool,
    timeout: Duration,
) -> Result<()> {
    let r = Arc::clone(&retriever);
    let results = run_blocking(timeout, move || r.search(&query, top_k)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        eprintln!("No results found.");
        return Ok(());
    }
    if retriever.embedder().mode().is_degraded() {
        eprintln!("Warning: no trained model, scores are all zero.");
    }

    for (i, result) in results.iter().enumerate() {
        println!("\n{}. {} (score: {:.3})", i + 1, result.id, result.score);
        if let Some(source) = result.metadata.get("source_path").and_then(|v| v.as_str()) {
            println!("   Source: {source}");
        }
        if let Some(content) = result.metadata.get("content").and_then(|v| v.as_str()) {
            println!("   Preview: {}", preview(content));
        }
    }
    Ok(())
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let cut: String = content.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("short"), "short");
        let long = "é".repeat(200);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }
}
