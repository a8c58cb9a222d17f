//! Configuration models.
//!
//! `RootConfig` lives in `config.toml`, `SecretConfig` in `secret.json` and the
//! sample gallery in `samples.json`. Loading and persistence are handled by
//! the infrastructure layer.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_SCENE_MODEL: &str = "google/gemini-2.5-pro";
pub const PREFERRED_IMAGE_MODEL: &str = "google/gemini-2.5-flash-image-preview";
pub const DEFAULT_SCREENSHOT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REVOKE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_DIMENSION: f64 = 5.0;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_scene_model() -> String {
    DEFAULT_SCENE_MODEL.to_string()
}

fn default_preferred_image_model() -> String {
    PREFERRED_IMAGE_MODEL.to_string()
}

fn default_model_filter() -> Vec<String> {
    vec!["gemini".into(), "gpt-4".into(), "claude".into()]
}

fn default_app_title() -> String {
    "Muse".to_string()
}

fn default_referer() -> String {
    "https://github.com/ynishi/muse".to_string()
}

fn default_screenshot_timeout_ms() -> u64 {
    DEFAULT_SCREENSHOT_TIMEOUT_MS
}

fn default_revoke_delay_ms() -> u64 {
    DEFAULT_REVOKE_DELAY_MS
}

fn default_dimension() -> f64 {
    DEFAULT_DIMENSION
}

/// Target bounding box (in scene units) for generated 3D objects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(default = "default_dimension")]
    pub x: f64,
    #[serde(default = "default_dimension")]
    pub y: f64,
    #[serde(default = "default_dimension")]
    pub z: f64,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            x: DEFAULT_DIMENSION,
            y: DEFAULT_DIMENSION,
            z: DEFAULT_DIMENSION,
        }
    }
}

impl Dimensions {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Remote generation backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// OpenAI-compatible API root, e.g. `https://openrouter.ai/api/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used for every 3D scene request.
    #[serde(default = "default_scene_model")]
    pub scene_model: String,
    /// Image model auto-selected when the catalog contains it.
    #[serde(default = "default_preferred_image_model")]
    pub preferred_image_model: String,
    /// Keywords a model id must contain to show up in the catalog.
    #[serde(default = "default_model_filter")]
    pub model_filter: Vec<String>,
    /// Sent as `X-Title` on image requests.
    #[serde(default = "default_app_title")]
    pub app_title: String,
    /// Sent as `HTTP-Referer` on image requests.
    #[serde(default = "default_referer")]
    pub referer: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            scene_model: default_scene_model(),
            preferred_image_model: default_preferred_image_model(),
            model_filter: default_model_filter(),
            app_title: default_app_title(),
            referer: default_referer(),
        }
    }
}

/// Sandbox round-trip settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxSettings {
    #[serde(default = "default_screenshot_timeout_ms")]
    pub screenshot_timeout_ms: u64,
    #[serde(default)]
    pub dimensions: Dimensions,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            screenshot_timeout_ms: default_screenshot_timeout_ms(),
            dimensions: Dimensions::default(),
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadSettings {
    /// Where exported files land. `None` means the platform download dir.
    #[serde(default)]
    pub directory: Option<String>,
    /// Grace delay before a temporary download handle is released.
    #[serde(default = "default_revoke_delay_ms")]
    pub revoke_delay_ms: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            directory: None,
            revoke_delay_ms: default_revoke_delay_ms(),
        }
    }
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub sandbox: SandboxSettings,
    #[serde(default)]
    pub downloads: DownloadSettings,
}

/// Contents of `secret.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretConfig {
    /// API key for the OpenAI-compatible backend.
    #[serde(default)]
    pub api_key: String,
    /// Overrides `backend.base_url` from `config.toml` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl SecretConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// A ready-made starting point for the image track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub title: String,
    #[serde(rename = "image", alias = "imageUrl", alias = "image_url")]
    pub image_url: String,
    pub prompt: String,
}

/// Contents of `samples.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplesConfig {
    #[serde(default)]
    pub samples: Vec<Sample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: RootConfig = toml::from_str("").unwrap();
        assert_eq!(config, RootConfig::default());
        assert_eq!(config.backend.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.sandbox.screenshot_timeout_ms, 10_000);
        assert_eq!(config.sandbox.dimensions, Dimensions::new(5.0, 5.0, 5.0));
        assert_eq!(config.downloads.revoke_delay_ms, 1_000);
    }

    #[test]
    fn test_partial_toml() {
        let config: RootConfig = toml::from_str(
            r#"
            [backend]
            scene_model = "anthropic/claude-sonnet-4"

            [sandbox.dimensions]
            y = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.scene_model, "anthropic/claude-sonnet-4");
        assert_eq!(config.backend.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.sandbox.dimensions, Dimensions::new(5.0, 2.5, 5.0));
    }

    #[test]
    fn test_samples_accept_image_key() {
        let samples: SamplesConfig = serde_json::from_str(
            r#"{"samples":[{"title":"Chair","image":"https://x/chair.png","prompt":"make it red"}]}"#,
        )
        .unwrap();
        assert_eq!(samples.samples.len(), 1);
        assert_eq!(samples.samples[0].image_url, "https://x/chair.png");
    }

    #[test]
    fn test_secret_without_key() {
        let secret: SecretConfig = serde_json::from_str("{}").unwrap();
        assert!(!secret.has_api_key());
        assert!(secret.base_url.is_none());
    }
}
