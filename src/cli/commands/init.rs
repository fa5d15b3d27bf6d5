//! Init, Config and Status commands.

use anyhow::{Result, anyhow, bail};
use std::path::PathBuf;

use crate::config::{CONFIG_DIR, Settings};
use crate::retrieval::Retriever;

/// Run init command - create configuration file.
pub fn run_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at: {}\nUse --force to overwrite",
            config_path.display()
        );
    }

    let path = Settings::init_config_file(force).map_err(|e| anyhow!("{e}"))?;
    println!("Created configuration file at: {}", path.display());
    println!("Edit this file to customize your settings.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Run status command - summarize the pipeline state.
pub fn run_status(retriever: &Retriever, json: bool) -> Result<()> {
    let status = retriever.status()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Documents:      {}", status.documents);
    println!("Records:        {}", status.records);
    println!("Dimension:      {}", status.dimension);
    println!("Embedding mode: {}", status.embedding_mode);
    if status.embedding_mode.is_degraded() {
        println!("\nNo trained model: search scores are all zero.");
        println!("Run `ragline train --all` then `ragline reembed --all`.");
    }
    Ok(())
}
