//! Unified path management for muse configuration files.
//!
//! This ensures consistency across all platforms (Linux, macOS, Windows).

use std::path::{Path, PathBuf};

const APP_DIR: &str = "muse";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for muse.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/muse/              # Config directory
/// ├── config.toml              # Application configuration
/// ├── secret.json              # API key (mode 600)
/// ├── samples.json             # Sample gallery for the image track
/// └── logs/                    # Application logs
///     └── muse.log.YYYY-MM-DD
///
/// ~/Downloads/                 # Default destination for exports
/// ```
#[derive(Debug, Clone)]
pub struct MusePaths {
    root: PathBuf,
}

impl MusePaths {
    /// Resolves the config directory, or uses `base` when given (tests, `--config-dir`).
    pub fn new(base: Option<&Path>) -> Result<Self, PathError> {
        let root = match base {
            Some(path) => path.to_path_buf(),
            None => dirs::config_dir()
                .ok_or(PathError::HomeDirNotFound)?
                .join(APP_DIR),
        };
        Ok(Self { root })
    }

    pub fn config_dir(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Returns the path to the secrets file.
    ///
    /// # Security Note
    ///
    /// Ensure this file has appropriate permissions (e.g., 600) to prevent
    /// unauthorized access.
    pub fn secret_file(&self) -> PathBuf {
        self.root.join("secret.json")
    }

    pub fn samples_file(&self) -> PathBuf {
        self.root.join("samples.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Export destination: the configured directory, else the platform
    /// download dir, else `~/Downloads`.
    pub fn downloads_dir(configured: Option<&str>) -> Result<PathBuf, PathError> {
        if let Some(dir) = configured.filter(|d| !d.trim().is_empty()) {
            return Ok(expand_home(dir));
        }
        if let Some(dir) = dirs::download_dir() {
            return Ok(dir);
        }
        dirs::home_dir()
            .map(|home| home.join("Downloads"))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Creates the config and logs directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.logs_dir())
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
