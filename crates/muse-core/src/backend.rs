//! Seams to the external generation backend and reference conversion.

use async_trait::async_trait;

use crate::config::Dimensions;
use crate::context::ImageSource;
use crate::error::Result;
use crate::response::ImageReply;

/// One image-track generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub model: String,
    /// Prompt composed from the new prompt and the track's history.
    pub prompt: String,
    /// Active reference image as a data URL. Present means "edit".
    pub reference_image: Option<String>,
}

impl ImageRequest {
    pub fn is_edit(&self) -> bool {
        self.reference_image.is_some()
    }
}

/// One object-track generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRequest {
    pub model: String,
    /// Prompt composed from the new prompt and the track's history.
    pub prompt: String,
    /// Latest committed source code, if any.
    pub prior_source: Option<String>,
    /// Screenshot of the currently rendered prior source.
    pub screenshot: Option<String>,
    /// Image track reference, as a data URL.
    pub reference_image: Option<String>,
    pub dimensions: Dimensions,
}

impl SceneRequest {
    /// A request modifies an existing scene only when both the prior code
    /// and a render of it are available.
    pub fn is_modification(&self) -> bool {
        self.prior_source.is_some() && self.screenshot.is_some()
    }
}

/// Raw scene reply: whatever text the model answered with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneReply {
    pub content: Option<String>,
}

/// The remote service producing images and scene code.
///
/// Implementations return raw replies; interpretation happens in
/// [`crate::response`] so every backend shares one policy.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate_image(&self, request: ImageRequest) -> Result<ImageReply>;

    async fn generate_scene(&self, request: SceneRequest) -> Result<SceneReply>;

    /// Model ids available to the configured account.
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Converts an image reference into a self-contained data URL.
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    async fn to_data_url(&self, source: &ImageSource) -> Result<String>;
}

/// Resolver that only passes data URLs through. Used when nothing better is wired.
pub struct PassthroughResolver;

#[async_trait]
impl ReferenceResolver for PassthroughResolver {
    async fn to_data_url(&self, source: &ImageSource) -> Result<String> {
        let value = source.as_str();
        if value.starts_with("data:") {
            Ok(value.to_string())
        } else {
            Err(crate::error::MuseError::internal(format!(
                "cannot inline reference without a resolver: {value}"
            )))
        }
    }
}
