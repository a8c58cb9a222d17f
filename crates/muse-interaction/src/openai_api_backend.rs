//! OpenAIApiBackend - Chat Completions client for image and scene generation.
//!
//! Talks to any OpenAI-compatible endpoint (OpenRouter by default).
//! Configuration priority: ~/.config/muse/secret.json > environment variables

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

use muse_core::backend::{GenerationBackend, ImageRequest, SceneReply, SceneRequest};
use muse_core::config::{BackendSettings, RootConfig, SecretConfig};
use muse_core::response::ImageReply;
use muse_core::{MuseError, Result};

use crate::prompts::PromptTemplates;

pub const API_KEY_ENV: &str = "MUSE_API_KEY";
pub const BASE_URL_ENV: &str = "MUSE_BASE_URL";

/// Backend implementation that talks to an OpenAI-compatible HTTP API.
pub struct OpenAIApiBackend {
    client: Client,
    api_key: String,
    base_url: String,
    app_title: String,
    referer: String,
    max_tokens: Option<u32>,
    templates: PromptTemplates,
}

impl OpenAIApiBackend {
    /// Creates a backend for `base_url` using the given API key.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        settings: &BackendSettings,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_title: settings.app_title.clone(),
            referer: settings.referer.clone(),
            max_tokens: None,
            templates: PromptTemplates::new()?,
        })
    }

    /// Builds a backend from the stored secret, falling back to environment variables.
    ///
    /// Priority:
    /// 1. secret.json (`api_key`, `base_url`)
    /// 2. Environment variables (MUSE_API_KEY, MUSE_BASE_URL)
    /// 3. `backend.base_url` from config.toml for the endpoint
    pub fn from_secret(secret: Option<&SecretConfig>, config: &RootConfig) -> Result<Self> {
        let api_key = secret
            .filter(|s| s.has_api_key())
            .map(|s| s.api_key.clone())
            .or_else(|| env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| {
                MuseError::config(format!(
                    "API key not found in ~/.config/muse/secret.json or {API_KEY_ENV}"
                ))
            })?;

        let base_url = secret
            .and_then(|s| s.base_url.clone())
            .or_else(|| env::var(BASE_URL_ENV).ok())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| config.backend.base_url.clone());

        Self::new(api_key, base_url, &config.backend)
    }

    /// Sets the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_image_messages(&self, request: &ImageRequest) -> Result<Vec<ChatMessage>> {
        let mut content = vec![MessageContent::text(self.templates.image_text(request)?)];
        if let Some(reference) = &request.reference_image {
            content.push(MessageContent::image(reference));
        }
        Ok(vec![ChatMessage::new("user", content)])
    }

    fn build_scene_messages(&self, request: &SceneRequest) -> Result<Vec<ChatMessage>> {
        let system = ChatMessage::new(
            "system",
            vec![MessageContent::text(self.templates.scene_system())],
        );

        let mut content = vec![MessageContent::text(self.templates.scene_text(request)?)];
        if request.is_modification() {
            if let Some(screenshot) = &request.screenshot {
                content.push(MessageContent::image(screenshot));
            }
        }
        if let Some(reference) = &request.reference_image {
            content.push(MessageContent::text(self.templates.reference_note()));
            content.push(MessageContent::image(reference));
        }

        Ok(vec![system, ChatMessage::new("user", content)])
    }

    async fn send_request(
        &self,
        body: &ChatCompletionRequest,
        attribution: bool,
    ) -> Result<ResponseMessage> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json");
        if attribution {
            builder = builder
                .header("HTTP-Referer", &self.referer)
                .header("X-Title", &self.app_title);
        }

        debug!(model = %body.model, %url, "Sending chat completion request");
        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|err| MuseError::backend(format!("API request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            if let Some(delay) = parse_retry_after(response.headers().get("retry-after")) {
                warn!(
                    status = status.as_u16(),
                    retry_after_secs = delay.as_secs(),
                    "Backend asked to retry later"
                );
            }
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| MuseError::backend(format!("Failed to parse API response: {err}")))?;

        first_message(parsed)
    }
}

#[async_trait]
impl GenerationBackend for OpenAIApiBackend {
    async fn generate_image(&self, request: ImageRequest) -> Result<ImageReply> {
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: self.build_image_messages(&request)?,
            max_tokens: self.max_tokens,
        };
        let message = self.send_request(&body, true).await?;
        Ok(image_reply(message))
    }

    async fn generate_scene(&self, request: SceneRequest) -> Result<SceneReply> {
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: self.build_scene_messages(&request)?,
            max_tokens: self.max_tokens,
        };
        let message = self.send_request(&body, false).await?;
        Ok(SceneReply {
            content: message.content,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|err| MuseError::backend(format!("Model list request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, body_text));
        }

        let parsed: ModelListResponse = response
            .json()
            .await
            .map_err(|err| MuseError::backend(format!("Failed to parse model list: {err}")))?;
        Ok(parsed.data.into_iter().map(|model| model.id).collect())
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<MessageContent>,
}

impl ChatMessage {
    fn new(role: &str, content: Vec<MessageContent>) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }
}

enum MessageContent {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl MessageContent {
    fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

// Custom serialization for MessageContent
impl Serialize for MessageContent {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;

        match self {
            MessageContent::Text { text } => {
                map.serialize_entry("type", "text")?;
                map.serialize_entry("text", text)?;
            }
            MessageContent::ImageUrl { image_url } => {
                map.serialize_entry("type", "image_url")?;
                map.serialize_entry("image_url", image_url)?;
            }
        }

        map.end()
    }
}

#[derive(Serialize, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Default)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    images: Vec<ResponseImage>,
}

/// Image part of a reply: either a URL (usually a data URL) or raw base64.
#[derive(Deserialize)]
struct ResponseImage {
    image_url: Option<ImageUrl>,
    b64_json: Option<String>,
}

impl ResponseImage {
    fn into_url(self) -> Option<String> {
        if let Some(image_url) = self.image_url {
            return Some(image_url.url);
        }
        self.b64_json
            .filter(|b64| !b64.is_empty())
            .map(|b64| format!("data:image/png;base64,{b64}"))
    }
}

#[derive(Deserialize)]
struct ModelListResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn first_message(response: ChatCompletionResponse) -> Result<ResponseMessage> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| MuseError::backend("No message received from API"))
}

fn image_reply(message: ResponseMessage) -> ImageReply {
    ImageReply {
        inline_image: message
            .images
            .into_iter()
            .next()
            .and_then(ResponseImage::into_url),
        text: message.content,
    }
}

fn map_http_error(status: StatusCode, body: String) -> MuseError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    MuseError::backend_status(
        status.as_u16(),
        format!("API request failed ({}): {message}", status.as_u16()),
    )
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use muse_core::config::Dimensions;

    fn backend() -> OpenAIApiBackend {
        OpenAIApiBackend::new("key", "https://example.test/api/v1/", &BackendSettings::default())
            .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(backend().base_url(), "https://example.test/api/v1");
    }

    #[test]
    fn test_message_content_serialization() {
        let message = ChatMessage::new(
            "user",
            vec![
                MessageContent::text("hello"),
                MessageContent::image("data:image/png;base64,AA=="),
            ],
        );
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "hello");
        assert_eq!(value["content"][1]["type"], "image_url");
        assert_eq!(value["content"][1]["image_url"]["url"], "data:image/png;base64,AA==");
    }

    #[test]
    fn test_max_tokens_only_sent_when_set() {
        let backend = backend();
        let request = ImageRequest {
            model: "m".into(),
            prompt: "a cat".into(),
            reference_image: None,
        };
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: backend.build_image_messages(&request).unwrap(),
            max_tokens: backend.max_tokens,
        };
        assert!(serde_json::to_value(&body).unwrap().get("max_tokens").is_none());

        let backend = backend.with_max_tokens(512);
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: backend.build_image_messages(&request).unwrap(),
            max_tokens: backend.max_tokens,
        };
        assert_eq!(serde_json::to_value(&body).unwrap()["max_tokens"], 512);
    }

    #[test]
    fn test_image_edit_attaches_reference() {
        let backend = backend();
        let request = ImageRequest {
            model: "m".into(),
            prompt: "make it blue".into(),
            reference_image: Some("data:image/png;base64,AA==".into()),
        };
        let messages = backend.build_image_messages(&request).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.len(), 2);
    }

    #[test]
    fn test_scene_messages_screenshot_and_reference() {
        let backend = backend();
        let request = SceneRequest {
            model: "m".into(),
            prompt: "taller".into(),
            prior_source: Some("scene.add(a);".into()),
            screenshot: Some("data:image/png;base64,U0NSRUVO".into()),
            reference_image: Some("data:image/png;base64,UkVG".into()),
            dimensions: Dimensions::default(),
        };
        let messages = backend.build_scene_messages(&request).unwrap();
        let value = serde_json::to_value(&messages).unwrap();
        assert_eq!(value[0]["role"], "system");
        let parts = value[1]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,U0NSRUVO");
        assert_eq!(parts[3]["image_url"]["url"], "data:image/png;base64,UkVG");
    }

    #[test]
    fn test_parse_images_reply() {
        let raw = r#"{"choices":[{"message":{"content":"here you go","images":[{"type":"image_url","image_url":{"url":"data:image/png;base64,AAA"}}]}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let reply = image_reply(first_message(parsed).unwrap());
        assert_eq!(reply.inline_image.as_deref(), Some("data:image/png;base64,AAA"));
        assert_eq!(reply.text.as_deref(), Some("here you go"));
    }

    #[test]
    fn test_parse_b64_json_reply() {
        let raw = r#"{"choices":[{"message":{"content":null,"images":[{"b64_json":"QkFTRTY0"}]}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let reply = image_reply(first_message(parsed).unwrap());
        assert_eq!(reply.inline_image.as_deref(), Some("data:image/png;base64,QkFTRTY0"));
        assert!(reply.text.is_none());
    }

    #[test]
    fn test_no_choices_is_backend_error() {
        let parsed: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        let err = first_message(parsed).err().unwrap();
        assert!(err.is_backend());
    }

    #[test]
    fn test_map_http_error_extracts_message() {
        let err = map_http_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"invalid key","code":401}}"#.to_string(),
        );
        assert_eq!(
            err,
            MuseError::backend_status(401, "API request failed (401): invalid key")
        );

        let err = map_http_error(StatusCode::BAD_GATEWAY, "upstream down".to_string());
        assert_eq!(
            err,
            MuseError::backend_status(502, "API request failed (502): upstream down")
        );
    }

    #[test]
    fn test_parse_retry_after() {
        let header = HeaderValue::from_static("7");
        assert_eq!(parse_retry_after(Some(&header)), Some(Duration::from_secs(7)));
        let header = HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&header)), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn test_from_secret_prefers_secret_values() {
        let secret = SecretConfig {
            api_key: "sk-secret".into(),
            base_url: Some("https://proxy.test/v1".into()),
        };
        let backend = OpenAIApiBackend::from_secret(Some(&secret), &RootConfig::default()).unwrap();
        assert_eq!(backend.base_url(), "https://proxy.test/v1");
        assert_eq!(backend.api_key, "sk-secret");
    }
}
