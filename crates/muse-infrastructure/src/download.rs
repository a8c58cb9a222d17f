//! DownloadService: persists sandbox exports as local files.
//!
//! Every payload is staged as a short-lived blob, written to the downloads
//! directory, and the blob handle is revoked after a grace delay.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use muse_core::sandbox::{DownloadRequest, DownloadSink};
use muse_core::{MuseError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Staged payloads waiting for their grace delay to run out.
#[derive(Clone, Default)]
pub struct BlobRegistry {
    blobs: Arc<Mutex<HashMap<Uuid, Arc<[u8]>>>>,
}

impl BlobRegistry {
    pub fn register(&self, bytes: Vec<u8>) -> (Uuid, Arc<[u8]>) {
        let id = Uuid::new_v4();
        let blob: Arc<[u8]> = bytes.into();
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(id, blob.clone());
        }
        (id, blob)
    }

    pub fn revoke(&self, id: &Uuid) -> bool {
        self.blobs
            .lock()
            .map(|mut blobs| blobs.remove(id).is_some())
            .unwrap_or(false)
    }

    pub fn live(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }
}

pub struct DownloadService {
    directory: PathBuf,
    revoke_delay: Duration,
    registry: BlobRegistry,
}

impl DownloadService {
    pub fn new(directory: impl Into<PathBuf>, revoke_delay: Duration) -> Self {
        Self {
            directory: directory.into(),
            revoke_delay,
            registry: BlobRegistry::default(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn registry(&self) -> &BlobRegistry {
        &self.registry
    }

    fn schedule_revoke(&self, id: Uuid) {
        let registry = self.registry.clone();
        let delay = self.revoke_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if registry.revoke(&id) {
                debug!(%id, "Download blob revoked");
            }
        });
    }
}

#[async_trait]
impl DownloadSink for DownloadService {
    async fn save(&self, request: DownloadRequest) -> Result<PathBuf> {
        let bytes = decode_payload(&request)?;
        let (id, blob) = self.registry.register(bytes);
        self.schedule_revoke(id);

        tokio::fs::create_dir_all(&self.directory).await?;
        let target = unique_target(&self.directory, &request.filename).await;
        tokio::fs::write(&target, &blob[..]).await?;

        info!(
            path = %target.display(),
            mime = %request.mime_type,
            size = blob.len(),
            "Download saved"
        );
        Ok(target)
    }
}

fn decode_payload(request: &DownloadRequest) -> Result<Vec<u8>> {
    if request.binary {
        BASE64_STANDARD
            .decode(request.data.trim())
            .map_err(|e| MuseError::Serialization {
                format: "base64".to_string(),
                message: e.to_string(),
            })
    } else {
        Ok(request.data.as_bytes().to_vec())
    }
}

/// Keeps only the final path component so a sandbox cannot write outside
/// the downloads directory.
fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        "download".to_string()
    } else {
        name
    }
}

/// `scene.obj`, then `scene (1).obj`, `scene (2).obj`, ...
async fn unique_target(directory: &Path, filename: &str) -> PathBuf {
    let name = sanitize_filename(filename);
    let candidate = directory.join(&name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }

    let path = Path::new(&name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter = 1;
    loop {
        let numbered = match &extension {
            Some(ext) => format!("{stem} ({counter}).{ext}"),
            None => format!("{stem} ({counter})"),
        };
        let candidate = directory.join(numbered);
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        counter += 1;
    }
}
