//! One request/response cycle per track: validate, snapshot, call the
//! backend, then commit or roll back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use muse_core::artifact::{ImageArtifact, ObjectArtifact};
use muse_core::backend::{GenerationBackend, ImageRequest, ReferenceResolver, SceneRequest};
use muse_core::config::{DEFAULT_SCENE_MODEL, DEFAULT_SCREENSHOT_TIMEOUT_MS, RootConfig};
use muse_core::context::{ContextBuilder, ImageSource};
use muse_core::notice::{Notice, Notifier};
use muse_core::response::{interpret_image_reply, interpret_scene_reply};
use muse_core::{MuseError, Result, Track};
use muse_execution::SandboxChannel;

use crate::session::SessionState;

/// Knobs the orchestrator reads from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Model used for every object-track request.
    pub scene_model: String,
    /// Upper bound for the pre-generation screenshot round-trip.
    pub screenshot_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            scene_model: DEFAULT_SCENE_MODEL.to_string(),
            screenshot_timeout: Duration::from_millis(DEFAULT_SCREENSHOT_TIMEOUT_MS),
        }
    }
}

impl From<&RootConfig> for OrchestratorSettings {
    fn from(config: &RootConfig) -> Self {
        Self {
            scene_model: config.backend.scene_model.clone(),
            screenshot_timeout: Duration::from_millis(config.sandbox.screenshot_timeout_ms),
        }
    }
}

/// Drives submissions for both tracks.
///
/// The session lock is only taken for short, synchronous sections; backend
/// calls and sandbox round-trips happen with no lock held, so the other
/// track (and deletes) keep working while a request is in flight.
pub struct GenerationOrchestrator {
    state: Arc<RwLock<SessionState>>,
    backend: Arc<dyn GenerationBackend>,
    resolver: Arc<dyn ReferenceResolver>,
    sandbox: Arc<SandboxChannel>,
    notifier: Notifier,
    settings: OrchestratorSettings,
}

impl GenerationOrchestrator {
    pub fn new(
        state: Arc<RwLock<SessionState>>,
        backend: Arc<dyn GenerationBackend>,
        resolver: Arc<dyn ReferenceResolver>,
        sandbox: Arc<SandboxChannel>,
        notifier: Notifier,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            state,
            backend,
            resolver,
            sandbox,
            notifier,
            settings,
        }
    }

    /// Submits `raw_prompt` on `track` and returns the committed index.
    ///
    /// Every failure is also reported through the notifier; the track is
    /// back to `Idle` whenever this returns.
    pub async fn submit(&self, track: Track, raw_prompt: &str) -> Result<usize> {
        let result = match track {
            Track::Image => self.submit_image(raw_prompt).await,
            Track::Object => self.submit_object(raw_prompt).await,
        };
        if let Err(err) = &result {
            self.notifier.error(err);
        }
        result
    }

    async fn submit_image(&self, raw_prompt: &str) -> Result<usize> {
        let prompt = raw_prompt.trim();
        if prompt.is_empty() {
            return Err(MuseError::EmptyPrompt);
        }

        let (model, composed, reference) = {
            let mut state = self.state.write().await;
            let model = state
                .image
                .model
                .clone()
                .filter(|model| !model.trim().is_empty())
                .ok_or(MuseError::NoModelSelected { track: Track::Image })?;
            state.image.track.begin(Track::Image, prompt)?;
            let composed =
                ContextBuilder::compose_prompt(&state.image.track.store.prompt_chain(), prompt);
            (model, composed, state.image.reference())
        };

        let reference_image = self.inline_reference(reference.image()).await;
        let request = ImageRequest {
            model,
            prompt: composed,
            reference_image,
        };

        let outcome = match self.backend.generate_image(request).await {
            Ok(reply) => interpret_image_reply(reply),
            Err(err) => Err(err),
        };

        let mut state = self.state.write().await;
        match outcome {
            Ok(image_url) => {
                let index = state.image.track.commit(prompt, ImageArtifact { image_url });
                state.image.selection.unpin();
                drop(state);
                info!(index, "Image entry committed");
                self.notifier.notify(Notice::success("Image generated successfully"));
                Ok(index)
            }
            Err(err) => {
                state.image.track.roll_back(raw_prompt, &err);
                drop(state);
                warn!(error = %err, "Image generation rolled back");
                Err(err)
            }
        }
    }

    async fn submit_object(&self, raw_prompt: &str) -> Result<usize> {
        let prompt = raw_prompt.trim();
        if prompt.is_empty() {
            return Err(MuseError::EmptyPrompt);
        }

        let (composed, prior_source, image_reference, dimensions) = {
            let mut state = self.state.write().await;
            state.object.track.begin(Track::Object, prompt)?;
            let composed =
                ContextBuilder::compose_prompt(&state.object.track.store.prompt_chain(), prompt);
            let prior_source = state
                .object
                .track
                .store
                .latest()
                .map(|artifact| artifact.source_code.clone());
            (
                composed,
                prior_source,
                state.image.reference(),
                state.object.dimensions,
            )
        };

        let screenshot = if prior_source.is_some() {
            self.capture_screenshot().await
        } else {
            None
        };
        let reference_image = self.inline_reference(image_reference.image()).await;

        let request = SceneRequest {
            model: self.settings.scene_model.clone(),
            prompt: composed,
            prior_source,
            screenshot: screenshot.clone(),
            reference_image: reference_image.clone(),
            dimensions,
        };

        let outcome = match self.backend.generate_scene(request).await {
            Ok(reply) => interpret_scene_reply(reply.content),
            Err(err) => Err(err),
        };

        let code = match outcome {
            Ok(code) => code,
            Err(err) => {
                self.state
                    .write()
                    .await
                    .object
                    .track
                    .roll_back(raw_prompt, &err);
                warn!(error = %err, "3D generation rolled back");
                return Err(err);
            }
        };

        let index = {
            let mut state = self.state.write().await;
            let index = state.object.track.record(
                prompt,
                ObjectArtifact {
                    source_code: code.clone(),
                    screenshot,
                    reference_image,
                },
            );
            // The capture belongs to the code being replaced.
            state.object.last_screenshot = None;
            index
        };
        info!(index, "3D entry committed");

        // Still `Submitting` here: a delete cannot slip in before the new
        // code is on screen.
        let launched = self.sandbox.launch(code, dimensions).await;
        {
            let mut state = self.state.write().await;
            state.object.track.finish();
            match &launched {
                Ok(Some(instance)) => state.object.viewer.ensure(*instance),
                Ok(None) => debug!(index, "Sandbox launch superseded"),
                Err(_) => state.object.viewer.detach(),
            }
        }
        if let Err(err) = launched {
            warn!(error = %err, "Failed to launch sandbox for committed code");
            self.notifier.error(&err);
        }

        self.notifier
            .notify(Notice::success("3D object generated successfully"));
        Ok(index)
    }

    /// Screenshot of what the current sandbox shows, if one answers in time.
    async fn capture_screenshot(&self) -> Option<String> {
        if self.sandbox.current_instance().await.is_none() {
            return None;
        }
        match self
            .sandbox
            .capture_screenshot(self.settings.screenshot_timeout)
            .await
        {
            Ok(data_url) => {
                self.state.write().await.object.last_screenshot = Some(data_url.clone());
                Some(data_url)
            }
            Err(err) => {
                warn!(error = %err, "Failed to capture screenshot");
                None
            }
        }
    }

    /// Reference image as a data URL. Conversion failures only cost the reference.
    async fn inline_reference(&self, source: Option<&ImageSource>) -> Option<String> {
        let source = source?;
        match self.resolver.to_data_url(source).await {
            Ok(data_url) => Some(data_url),
            Err(err) => {
                warn!(error = %err, "Failed to convert reference image");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod orchestrator_test;
