//! Config command - show the effective configuration.

use std::path::Path;

use anyhow::Result;
use portreaper_core::ConfigStore;

use super::{load_config, Overrides};

pub async fn show(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path, Overrides::default()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    print!("{}", ConfigStore::render(&config)?);
    Ok(())
}
