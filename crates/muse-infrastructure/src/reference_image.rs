//! Converts image references (uploads, URLs, generated images) into data URLs.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use muse_core::backend::ReferenceResolver;
use muse_core::context::ImageSource;
use muse_core::{MuseError, Result};
use reqwest::Client;
use std::path::Path;
use tracing::debug;

const FALLBACK_MIME: &str = "image/png";

/// Reads local files and fetches remote URLs; data URLs pass through.
#[derive(Clone, Default)]
pub struct FileAndUrlResolver {
    client: Client,
}

impl FileAndUrlResolver {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MuseError::io(format!("Failed to read image {path}: {e}")))?;
        let mime = mime_for_path(Path::new(path));
        debug!(path, mime = %mime, size = bytes.len(), "Inlined local reference image");
        Ok(to_data_url(&mime, &bytes))
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MuseError::backend(format!("Failed to fetch image {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(MuseError::backend_status(
                response.status().as_u16(),
                format!("Failed to fetch image {url}"),
            ));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .filter(|value| value.starts_with("image/"))
            .unwrap_or_else(|| mime_for_path(Path::new(url.split('?').next().unwrap_or(url))));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MuseError::backend(format!("Failed to read image body {url}: {e}")))?;
        debug!(url, mime = %mime, size = bytes.len(), "Inlined remote reference image");
        Ok(to_data_url(&mime, &bytes))
    }
}

#[async_trait]
impl ReferenceResolver for FileAndUrlResolver {
    async fn to_data_url(&self, source: &ImageSource) -> Result<String> {
        let value = source.as_str().trim();
        if value.starts_with("data:") {
            return Ok(value.to_string());
        }
        if is_remote(value) {
            return self.fetch(value).await;
        }
        // Uploads, and sample images given as plain paths.
        self.read_file(value).await
    }
}

fn is_remote(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn mime_for_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}

fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64_STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_data_url_passes_through() {
        let resolver = FileAndUrlResolver::new();
        let url = "data:image/png;base64,AAAA";
        let resolved = resolver
            .to_data_url(&ImageSource::Generated(url.to_string()))
            .await
            .unwrap();
        assert_eq!(resolved, url);
    }

    #[tokio::test]
    async fn test_upload_is_encoded_with_guessed_mime() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sketch.jpg");
        std::fs::write(&path, b"hello").unwrap();

        let resolver = FileAndUrlResolver::new();
        let resolved = resolver
            .to_data_url(&ImageSource::Upload(path.to_string_lossy().into_owned()))
            .await
            .unwrap();
        assert_eq!(resolved, "data:image/jpeg;base64,aGVsbG8=");
    }

    #[tokio::test]
    async fn test_missing_upload_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gone.png");

        let err = FileAndUrlResolver::new()
            .to_data_url(&ImageSource::Upload(path.to_string_lossy().into_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, MuseError::Io { .. }));
    }

    #[test]
    fn test_unknown_extension_falls_back_to_png() {
        assert_eq!(mime_for_path(Path::new("image.bin")), "image/png");
        assert_eq!(mime_for_path(Path::new("photo.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("notes.txt")), "image/png");
    }
}
