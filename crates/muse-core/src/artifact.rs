//! Generated artifacts and the history entries that carry them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output of one successful image-track submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageArtifact {
    /// Data URI or remote URL of the generated image.
    pub image_url: String,
}

/// Output of one successful object-track submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectArtifact {
    /// Generated 3D scene source, fences already stripped.
    pub source_code: String,
    /// Screenshot of the previous render that was sent along with the request.
    pub screenshot: Option<String>,
    /// Reference image (data URL) that guided the generation, if any.
    pub reference_image: Option<String>,
}

/// A single committed step of a track's history.
///
/// The entry at position `i` was produced with entries `[0..i)` as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry<A> {
    /// Zero-based, dense position in the history.
    pub index: usize,
    /// The prompt exactly as the user submitted it (trimmed).
    pub prompt: String,
    /// What the generation produced.
    pub artifact: A,
    /// Commit time.
    pub created_at: DateTime<Utc>,
}

pub type ImageEntry = SessionEntry<ImageArtifact>;
pub type ObjectEntry = SessionEntry<ObjectArtifact>;
