//! Interpretation of raw backend replies into artifacts.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MuseError, Result};

/// Number of characters of stray text quoted in a `NoImageProduced` error.
pub const EXCERPT_CHARS: usize = 200;

static DATA_IMAGE_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"data:image/[A-Za-z0-9.+-]+;base64,[A-Za-z0-9+/=]+")
        .expect("valid data URI regex")
});

static LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^```(?:js|javascript)?\s*").expect("valid fence regex"));

static TRAILING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```\s*$").expect("valid fence regex"));

/// The parts of an image-generation reply the session model cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageReply {
    /// Inline image payload (`images[0].image_url.url`), if the backend sent one.
    pub inline_image: Option<String>,
    /// Free-text content of the reply.
    pub text: Option<String>,
}

/// Applies the image response policy.
///
/// Priority: inline payload, then a data URI embedded in the text. Text with
/// no image is reported with an excerpt; no content at all is an empty reply.
pub fn interpret_image_reply(reply: ImageReply) -> Result<String> {
    if let Some(url) = reply.inline_image.filter(|url| !url.trim().is_empty()) {
        return Ok(url);
    }

    let text = reply.text.unwrap_or_default();
    if let Some(found) = DATA_IMAGE_URI.find(&text) {
        return Ok(found.as_str().to_string());
    }

    if text.trim().is_empty() {
        return Err(MuseError::EmptyResponse);
    }

    Err(MuseError::NoImageProduced {
        excerpt: text.chars().take(EXCERPT_CHARS).collect(),
    })
}

/// Strips one leading code fence (optionally tagged `js`/`javascript`) and one
/// trailing fence, then trims. Unfenced text only gets trimmed.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_leading = LEADING_FENCE.replace(trimmed, "");
    let without_trailing = TRAILING_FENCE.replace(&without_leading, "");
    without_trailing.trim().to_string()
}

/// Applies the 3D response policy: fences stripped, empty is an error.
pub fn interpret_scene_reply(content: Option<String>) -> Result<String> {
    let code = strip_code_fences(content.as_deref().unwrap_or_default());
    if code.is_empty() {
        return Err(MuseError::EmptyResponse);
    }
    Ok(code)
}
