//! Configuration service.
//!
//! Loads the root configuration from ~/.config/muse/config.toml.

use muse_core::config::RootConfig;
use muse_core::{MuseError, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::paths::MusePaths;
use crate::storage::AtomicTomlFile;

/// Loads `config.toml`, writing the defaults out on first run.
pub struct ConfigService {
    file: AtomicTomlFile<RootConfig>,
}

impl ConfigService {
    pub fn new(paths: &MusePaths) -> Self {
        Self::with_path(paths.config_file())
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
        }
    }

    /// Strict load: a missing or empty file is the default config, a broken
    /// one is an error.
    pub fn load(&self) -> Result<RootConfig> {
        self.file
            .load()
            .map(Option::unwrap_or_default)
            .map_err(|e| MuseError::config(format!("{}: {e}", self.file.path().display())))
    }

    /// Never fails: a missing file is created with defaults, an unreadable
    /// one is reported and replaced by defaults in memory only.
    pub fn load_or_init(&self) -> RootConfig {
        match self.file.load() {
            Ok(Some(config)) => config,
            Ok(None) => {
                let config = RootConfig::default();
                match self.file.save(&config) {
                    Ok(()) => info!(path = %self.file.path().display(), "Wrote default config"),
                    Err(e) => warn!(error = %e, "Failed to write default config"),
                }
                config
            }
            Err(e) => {
                warn!(
                    path = %self.file.path().display(),
                    error = %e,
                    "Failed to read config, using defaults"
                );
                RootConfig::default()
            }
        }
    }

    pub fn path(&self) -> &PathBuf {
        self.file.path()
    }
}
