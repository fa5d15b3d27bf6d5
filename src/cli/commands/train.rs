//! Train command.

use anyhow::{Result, bail};

use crate::retrieval::Retriever;

/// Run train command. Training is not subject to the request timeout.
pub fn run(
    retriever: &Retriever,
    ids: Vec<String>,
    all: bool,
    epochs: Option<usize>,
    json: bool,
) -> Result<()> {
    let ids = if all {
        retriever
            .documents()
            .into_iter()
            .map(|doc| doc.document_id)
            .collect()
    } else {
        ids
    };
    if ids.is_empty() {
        bail!("no documents to train on; ingest some first");
    }

    let summary = retriever.train(&ids, epochs)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Trained generation {}", summary.generation);
    println!("  Vocabulary: {} tokens", summary.vocabulary_size);
    println!("  Pairs:      {}", summary.pairs);
    println!("  Epochs:     {}", summary.epochs);
    if let Some(loss) = summary.final_loss {
        println!("  Final loss: {loss:.4}");
    }
    println!("  Artifacts:  {}", summary.artifact_location.display());
    println!("\nRun `ragline reembed --all` to refresh stored vectors.");
    Ok(())
}
