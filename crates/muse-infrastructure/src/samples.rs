//! Sample gallery loading (`samples.json`).

use muse_core::config::{Sample, SamplesConfig};
use muse_core::{MuseError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
#[serde(untagged)]
enum SamplesFile {
    Wrapped(SamplesConfig),
    Bare(Vec<Sample>),
}

pub struct SamplesRepository {
    path: PathBuf,
}

impl SamplesRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the gallery. A missing file is an empty gallery; a malformed one
    /// is an error the caller decides how to report.
    pub async fn load(&self) -> Result<Vec<Sample>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let parsed: SamplesFile = serde_json::from_str(&content)?;
        let samples = match parsed {
            SamplesFile::Wrapped(config) => config.samples,
            SamplesFile::Bare(samples) => samples,
        };

        if let Some(bad) = samples.iter().find(|s| s.image_url.trim().is_empty()) {
            return Err(MuseError::config(format!(
                "sample '{}' has no image",
                bad.title
            )));
        }
        Ok(samples)
    }
}
