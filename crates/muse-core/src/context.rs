//! Derivation of the active reference state and follow-up prompt composition.

use serde::{Deserialize, Serialize};

use crate::artifact::{ImageArtifact, ObjectArtifact};
use crate::store::ArtifactStore;

/// Label that introduces the prior-prompt block in a composed prompt.
pub const HISTORY_LABEL: &str = "For context, here are previous messages:";

/// Externally supplied reference for the image track.
///
/// Setting an upload or a URL pins it so the next request uses it even when
/// the track already has history (editing a sample, for example). A commit or a
/// truncation releases the pin and the latest surviving image wins again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSelection {
    /// Path of a user-uploaded file.
    pub upload: Option<String>,
    /// Explicitly provided remote (or data) URL.
    pub url: Option<String>,
    pinned: bool,
}

impl ImageSelection {
    pub fn set_upload(&mut self, path: impl Into<String>) {
        self.upload = Some(path.into());
        self.pinned = true;
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = Some(url.into());
        self.pinned = true;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn unpin(&mut self) {
        self.pinned = false;
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    fn external(&self) -> Option<ImageSource> {
        self.upload
            .clone()
            .map(ImageSource::Upload)
            .or_else(|| self.url.clone().map(ImageSource::Url))
    }
}

/// Where the active reference image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageSource {
    /// Local file the user uploaded.
    Upload(String),
    /// URL the user provided.
    Url(String),
    /// Image produced by the image track.
    Generated(String),
}

impl ImageSource {
    pub fn as_str(&self) -> &str {
        match self {
            ImageSource::Upload(value) | ImageSource::Url(value) | ImageSource::Generated(value) => {
                value
            }
        }
    }
}

/// The artifact treated as "current" for the next request on a track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReferenceState {
    /// Nothing to build on. A valid state, not an error.
    #[default]
    Empty,
    /// Image track reference.
    Image(ImageSource),
    /// Object track reference: latest source and the last captured screenshot.
    Object {
        source_code: String,
        screenshot: Option<String>,
    },
}

impl ReferenceState {
    pub fn is_empty(&self) -> bool {
        matches!(self, ReferenceState::Empty)
    }

    pub fn image(&self) -> Option<&ImageSource> {
        match self {
            ReferenceState::Image(source) => Some(source),
            _ => None,
        }
    }

    pub fn source_code(&self) -> Option<&str> {
        match self {
            ReferenceState::Object { source_code, .. } => Some(source_code),
            _ => None,
        }
    }

    pub fn screenshot(&self) -> Option<&str> {
        match self {
            ReferenceState::Object { screenshot, .. } => screenshot.as_deref(),
            _ => None,
        }
    }
}

/// Stateless helper turning stored history into request context.
pub struct ContextBuilder;

impl ContextBuilder {
    /// Composes the follow-up prompt sent to the backend.
    ///
    /// With an empty chain the prompt is returned verbatim. Otherwise the new
    /// prompt comes first, then the labeled list of prior prompts in order,
    /// then the new prompt again.
    pub fn compose_prompt(chain: &[&str], new_prompt: &str) -> String {
        if chain.is_empty() {
            return new_prompt.to_string();
        }
        format!(
            "{new_prompt}.\n\n{HISTORY_LABEL}\n\n{}\n\n{new_prompt}",
            chain.join("\n")
        )
    }

    /// Active reference for the image track.
    pub fn image_reference(
        store: &ArtifactStore<ImageArtifact>,
        selection: &ImageSelection,
    ) -> ReferenceState {
        let latest = store
            .latest()
            .map(|artifact| ImageSource::Generated(artifact.image_url.clone()));

        let source = if selection.is_pinned() {
            selection.external().or(latest)
        } else {
            latest.or_else(|| selection.external())
        };

        source.map_or(ReferenceState::Empty, ReferenceState::Image)
    }

    /// Active reference for the object track.
    pub fn object_reference(
        store: &ArtifactStore<ObjectArtifact>,
        last_screenshot: Option<&str>,
    ) -> ReferenceState {
        match store.latest() {
            Some(artifact) => ReferenceState::Object {
                source_code: artifact.source_code.clone(),
                screenshot: last_screenshot.map(str::to_string),
            },
            None => ReferenceState::Empty,
        }
    }
}
