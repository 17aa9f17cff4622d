//! CLI subcommands.

pub mod config;
pub mod list;
pub mod sweep;

use std::path::Path;

use anyhow::Result;
use portreaper_core::{
    Config, ConfigStore, EncodingDetector, ProcessRunner, SystemCommands, TextEncoding,
};

/// Command line settings that take precedence over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub ports: Vec<u16>,
    pub dry_run: bool,
    pub no_force: bool,
    pub all_states: bool,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if !self.ports.is_empty() {
            config.ports = self.ports;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.no_force {
            config.force_kill = false;
        }
        if self.all_states {
            config.only_listening = false;
        }
    }
}

/// Load the configuration file, then apply the command line on top.
pub async fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<Config> {
    let store = match path {
        Some(path) => ConfigStore::with_path(path),
        None => ConfigStore::discover()?,
    };

    tracing::debug!(path = %store.path().display(), "Using config file");
    let mut config = store.load().await?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Runner decoding with the console encoding of this host.
///
/// The codepage probe itself runs with the platform default encoding.
pub async fn system_runner(commands: SystemCommands) -> ProcessRunner {
    let probe_runner = ProcessRunner::new(TextEncoding::platform_default());
    let encoding = EncodingDetector::new(commands).detect(&probe_runner).await;
    tracing::debug!(encoding = encoding.name(), "Using console encoding");
    ProcessRunner::new(encoding)
}
