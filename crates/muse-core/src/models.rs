//! Model catalog filtering and recommendations.

use serde::Serialize;

/// A model id as offered to the user, with an optional recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelOption {
    pub id: String,
    pub recommendation: Option<&'static str>,
}

impl ModelOption {
    /// `id` plus the recommendation suffix, e.g. `x (Recommended for 3D)`.
    pub fn label(&self) -> String {
        match self.recommendation {
            Some(note) => format!("{} ({note})", self.id),
            None => self.id.clone(),
        }
    }
}

/// Models usable by the session, filtered from what the backend reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    models: Vec<String>,
}

impl ModelCatalog {
    /// Keeps ids containing any of `keywords` (case-insensitive), in backend order.
    pub fn from_ids(ids: impl IntoIterator<Item = String>, keywords: &[String]) -> Self {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let models = ids
            .into_iter()
            .filter(|id| {
                let lower = id.to_lowercase();
                keywords.iter().any(|keyword| lower.contains(keyword))
            })
            .collect();
        Self { models }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.iter().any(|model| model == id)
    }

    pub fn options(&self) -> Vec<ModelOption> {
        self.models
            .iter()
            .map(|id| ModelOption {
                id: id.clone(),
                recommendation: recommendation_for(id),
            })
            .collect()
    }

    /// Image model to select when the user has not picked one: the preferred
    /// id if offered, else the first model.
    pub fn default_image_model(&self, preferred: &str) -> Option<&str> {
        self.models
            .iter()
            .find(|model| model.eq_ignore_ascii_case(preferred))
            .or_else(|| self.models.first())
            .map(String::as_str)
    }
}

fn recommendation_for(id: &str) -> Option<&'static str> {
    let lower = id.to_lowercase();
    if lower.contains("image-preview") {
        Some("Recommended for Images")
    } else if lower.contains("gemini-2.5-pro") {
        Some("Recommended for 3D")
    } else {
        None
    }
}
