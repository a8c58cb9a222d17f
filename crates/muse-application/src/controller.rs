//! SessionController: the single entry point for user actions.
//!
//! It owns the session state, the orchestrator and the sandbox channel, and
//! runs the event pump that applies sandbox events to the viewer.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use muse_core::backend::{GenerationBackend, ReferenceResolver};
use muse_core::config::{Dimensions, RootConfig, Sample};
use muse_core::models::{ModelCatalog, ModelOption};
use muse_core::notice::{Notice, Notifier};
use muse_core::sandbox::{
    DownloadRequest, DownloadSink, SandboxCommand, SandboxEvent, SandboxLauncher, SandboxMessage,
};
use muse_core::{MuseError, Result, Track};
use muse_execution::{Disposition, SandboxChannel, SandboxEvents};

use crate::orchestrator::{GenerationOrchestrator, OrchestratorSettings};
use crate::session::SessionState;

/// External collaborators the controller is wired with.
pub struct ControllerDeps {
    pub backend: Arc<dyn GenerationBackend>,
    pub resolver: Arc<dyn ReferenceResolver>,
    pub launcher: Arc<dyn SandboxLauncher>,
    pub downloads: Arc<dyn DownloadSink>,
    pub notifier: Notifier,
}

pub struct SessionController {
    state: Arc<RwLock<SessionState>>,
    orchestrator: GenerationOrchestrator,
    sandbox: Arc<SandboxChannel>,
    backend: Arc<dyn GenerationBackend>,
    downloads: Arc<dyn DownloadSink>,
    notifier: Notifier,
    model_filter: Vec<String>,
    preferred_image_model: String,
}

impl SessionController {
    /// Builds a controller and returns the sandbox event stream it expects
    /// to be fed with (see [`SessionController::spawn_event_pump`]).
    pub fn new(config: &RootConfig, deps: ControllerDeps) -> (Self, SandboxEvents) {
        let state = Arc::new(RwLock::new(SessionState::new(config.sandbox.dimensions)));
        let (channel, events) = SandboxChannel::new(deps.launcher);
        let sandbox = Arc::new(channel);
        let orchestrator = GenerationOrchestrator::new(
            state.clone(),
            deps.backend.clone(),
            deps.resolver,
            sandbox.clone(),
            deps.notifier.clone(),
            OrchestratorSettings::from(config),
        );
        let controller = Self {
            state,
            orchestrator,
            sandbox,
            backend: deps.backend,
            downloads: deps.downloads,
            notifier: deps.notifier,
            model_filter: config.backend.model_filter.clone(),
            preferred_image_model: config.backend.preferred_image_model.clone(),
        };
        (controller, events)
    }

    /// Applies every sandbox event to the session until the stream ends.
    pub fn spawn_event_pump(self: &Arc<Self>, mut events: SandboxEvents) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = events.recv().await {
                if let Err(err) = controller.handle_sandbox_message(message).await {
                    warn!(error = %err, "Failed to handle sandbox event");
                }
            }
            debug!("Sandbox event pump stopped");
        })
    }

    /// Read access to the session for rendering.
    pub async fn state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().await
    }

    // ============================================================================
    // Submissions
    // ============================================================================

    pub async fn submit(&self, track: Track, raw_prompt: &str) -> Result<usize> {
        self.orchestrator.submit(track, raw_prompt).await
    }

    /// Submits whatever is currently in the track's prompt input.
    pub async fn submit_draft(&self, track: Track) -> Result<usize> {
        let draft = self.state.read().await.draft(track).to_string();
        self.submit(track, &draft).await
    }

    pub async fn set_draft(&self, track: Track, text: impl Into<String>) {
        self.state.write().await.set_draft(track, text);
    }

    // ============================================================================
    // History
    // ============================================================================

    /// Drops entries `index..` on `track` and recomputes its reference state.
    ///
    /// On the object track the viewer follows: the latest surviving code gets
    /// a fresh sandbox, an empty history detaches it.
    pub async fn delete_from(&self, track: Track, index: i64) -> Result<()> {
        let result = match track {
            Track::Image => self.delete_image_from(index).await,
            Track::Object => self.delete_object_from(index).await,
        };
        if let Err(err) = &result {
            self.notifier.error(err);
        }
        result
    }

    async fn delete_image_from(&self, index: i64) -> Result<()> {
        let mut state = self.state.write().await;
        if state.image.track.is_submitting() {
            return Err(MuseError::AlreadyInProgress { track: Track::Image });
        }
        state.image.track.store.truncate_from(index)?;
        state.image.selection.unpin();
        info!(index, remaining = state.image.track.store.len(), "Image history truncated");
        Ok(())
    }

    async fn delete_object_from(&self, index: i64) -> Result<()> {
        let (survivor, dimensions) = {
            let mut state = self.state.write().await;
            if state.object.track.is_submitting() {
                return Err(MuseError::AlreadyInProgress { track: Track::Object });
            }
            state.object.track.store.truncate_from(index)?;
            state.object.last_screenshot = None;
            state.object.viewer.detach();
            info!(index, remaining = state.object.track.store.len(), "3D history truncated");
            (
                state
                    .object
                    .track
                    .store
                    .latest()
                    .map(|artifact| artifact.source_code.clone()),
                state.object.dimensions,
            )
        };

        match survivor {
            Some(code) => {
                if let Some(instance) = self.sandbox.launch(code, dimensions).await? {
                    self.state.write().await.object.viewer.ensure(instance);
                }
            }
            None => self.sandbox.detach().await,
        }
        Ok(())
    }

    // ============================================================================
    // Image reference and models
    // ============================================================================

    pub async fn set_upload(&self, path: impl Into<String>) {
        let mut state = self.state.write().await;
        state.image.selection.clear();
        state.image.selection.set_upload(path);
    }

    pub async fn set_image_url(&self, url: impl Into<String>) {
        let url = url.into();
        let mut state = self.state.write().await;
        state.image.selection.clear();
        if !url.trim().is_empty() {
            state.image.selection.set_url(url.trim());
        }
    }

    pub async fn clear_image_reference(&self) {
        self.state.write().await.image.selection.clear();
    }

    pub async fn set_image_model(&self, model: Option<String>) {
        self.state.write().await.image.model = model.filter(|m| !m.trim().is_empty());
    }

    pub async fn set_dimensions(&self, dimensions: Dimensions) {
        self.state.write().await.object.dimensions = dimensions;
    }

    pub async fn set_samples(&self, samples: Vec<Sample>) {
        self.state.write().await.samples = samples;
    }

    /// Uses sample `index` as the image reference and pre-fills the prompt.
    pub async fn select_sample(&self, index: usize) -> Result<Sample> {
        let mut state = self.state.write().await;
        let sample = state
            .samples
            .get(index)
            .cloned()
            .ok_or(MuseError::OutOfRange {
                index: index as i64,
                len: state.samples.len(),
            })?;
        state.image.selection.clear();
        state.image.selection.set_url(sample.image_url.clone());
        state.image.track.draft = sample.prompt.clone();
        Ok(sample)
    }

    /// Reloads the model catalog and auto-selects an image model if none is set.
    ///
    /// Failure keeps the previous catalog.
    pub async fn refresh_models(&self) -> Result<Vec<ModelOption>> {
        let ids = match self.backend.list_models().await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "Failed to load models");
                return Err(err);
            }
        };
        let catalog = ModelCatalog::from_ids(ids, &self.model_filter);

        let mut state = self.state.write().await;
        if state.image.model.is_none() {
            state.image.model = catalog
                .default_image_model(&self.preferred_image_model)
                .map(str::to_string);
        }
        let options = catalog.options();
        info!(count = options.len(), selected = ?state.image.model, "Model catalog loaded");
        state.catalog = catalog;
        Ok(options)
    }

    // ============================================================================
    // Viewer controls
    // ============================================================================

    pub async fn reset_camera(&self) -> Result<()> {
        self.sandbox.send(SandboxCommand::ResetCamera).await
    }

    /// Flips auto-rotate and returns the new setting.
    pub async fn toggle_auto_rotate(&self) -> Result<bool> {
        let value = !self.state.read().await.object.viewer.auto_rotate;
        self.sandbox
            .send(SandboxCommand::ToggleAutoRotate { value })
            .await?;
        self.state.write().await.object.viewer.auto_rotate = value;
        Ok(value)
    }

    /// Flips wireframe rendering and returns the new setting.
    pub async fn toggle_wireframe(&self) -> Result<bool> {
        let value = !self.state.read().await.object.viewer.wireframe;
        self.sandbox
            .send(SandboxCommand::ToggleWireframe { value })
            .await?;
        self.state.write().await.object.viewer.wireframe = value;
        Ok(value)
    }

    /// Asks the sandbox for an OBJ export; the file arrives as a `DOWNLOAD` event.
    pub async fn export_obj(&self) -> Result<()> {
        if !self.state.read().await.object.viewer.export_enabled() {
            return Err(MuseError::ChannelClosed(
                "nothing to export in the current scene".to_string(),
            ));
        }
        self.sandbox.send(SandboxCommand::ExportObj).await
    }

    // ============================================================================
    // Sandbox events
    // ============================================================================

    /// Applies one sandbox event. Events from any instance other than the
    /// current one are dropped without touching the session.
    pub async fn handle_sandbox_message(&self, message: SandboxMessage) -> Result<()> {
        if self.sandbox.accept(&message).await? == Disposition::Stale {
            return Ok(());
        }
        let source = message.source;

        match message.event {
            SandboxEvent::Ready => {
                self.state.write().await.object.viewer.ensure(source);
            }
            SandboxEvent::Error { message } => {
                {
                    let mut state = self.state.write().await;
                    state.object.viewer.ensure(source);
                    state.object.viewer.last_error = Some(message.clone());
                }
                warn!(instance = %source, %message, "Sandbox reported an error");
                self.notifier.error(&MuseError::SandboxRuntime(message));
            }
            SandboxEvent::ObjectsReady { count } => {
                {
                    let mut state = self.state.write().await;
                    state.object.viewer.ensure(source);
                    state.object.viewer.object_count = count;
                }
                if count > 0 {
                    self.notifier.notify(Notice::success(format!(
                        "3D scene ready for export ({count} objects)"
                    )));
                }
            }
            SandboxEvent::SizeUpdate { x, y, z } => {
                let mut state = self.state.write().await;
                state.object.viewer.ensure(source);
                state.object.viewer.size = Some(Dimensions::new(x, y, z));
            }
            SandboxEvent::Screenshot { data_url } => {
                self.state.write().await.object.last_screenshot = Some(data_url);
            }
            SandboxEvent::Download {
                data,
                filename,
                mime_type,
                binary,
            } => {
                let request = DownloadRequest {
                    data,
                    filename: filename.clone(),
                    mime_type,
                    binary,
                };
                match self.downloads.save(request).await {
                    Ok(path) => {
                        info!(path = %path.display(), "Export saved");
                        self.notifier
                            .notify(Notice::success(format!("{filename} downloaded successfully")));
                    }
                    Err(err) => {
                        warn!(error = %err, "Export failed");
                        self.notifier
                            .notify(Notice::danger("Download failed", err.to_string()));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;
