//! Hand-written doubles shared by the application tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use muse_core::backend::{
    GenerationBackend, ImageRequest, ReferenceResolver, SceneReply, SceneRequest,
};
use muse_core::context::ImageSource;
use muse_core::response::ImageReply;
use muse_core::sandbox::{
    DownloadRequest, DownloadSink, InstanceSpec, SandboxCommand, SandboxHandle, SandboxLauncher,
    SandboxMessage,
};
use muse_core::{MuseError, Result};

pub const GENERATED_IMAGE: &str = "data:image/png;base64,R0VORVJBVEVE";
pub const FENCED_CUBE: &str = "```js\nscene.add(new THREE.Mesh(geometry, material));\n```";
pub const CUBE_CODE: &str = "scene.add(new THREE.Mesh(geometry, material));";

/// Pauses a backend call until the test lets it go.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct MockBackend {
    pub image_replies: Mutex<VecDeque<Result<ImageReply>>>,
    pub scene_replies: Mutex<VecDeque<Result<SceneReply>>>,
    pub image_requests: Mutex<Vec<ImageRequest>>,
    pub scene_requests: Mutex<Vec<SceneRequest>>,
    pub models: Mutex<Option<Result<Vec<String>>>>,
    pub image_gate: Option<Arc<Gate>>,
}

impl MockBackend {
    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            image_gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push_image(&self, reply: Result<ImageReply>) {
        self.image_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_scene(&self, reply: Result<SceneReply>) {
        self.scene_replies.lock().unwrap().push_back(reply);
    }

    pub fn set_models(&self, models: Result<Vec<String>>) {
        *self.models.lock().unwrap() = Some(models);
    }

    pub fn image_requests(&self) -> Vec<ImageRequest> {
        self.image_requests.lock().unwrap().clone()
    }

    pub fn scene_requests(&self) -> Vec<SceneRequest> {
        self.scene_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate_image(&self, request: ImageRequest) -> Result<ImageReply> {
        self.image_requests.lock().unwrap().push(request);
        if let Some(gate) = &self.image_gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        let queued = self.image_replies.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            Ok(ImageReply {
                inline_image: Some(GENERATED_IMAGE.to_string()),
                text: None,
            })
        })
    }

    async fn generate_scene(&self, request: SceneRequest) -> Result<SceneReply> {
        self.scene_requests.lock().unwrap().push(request);
        let queued = self.scene_replies.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            Ok(SceneReply {
                content: Some(FENCED_CUBE.to_string()),
            })
        })
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        self.models
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Resolves every reference to a recognisable data URL, or always fails.
#[derive(Default)]
pub struct MockResolver {
    pub fail: bool,
    pub seen: Mutex<Vec<ImageSource>>,
}

impl MockResolver {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ReferenceResolver for MockResolver {
    async fn to_data_url(&self, source: &ImageSource) -> Result<String> {
        self.seen.lock().unwrap().push(source.clone());
        if self.fail {
            return Err(MuseError::backend("unreachable reference"));
        }
        let value = source.as_str();
        if value.starts_with("data:") {
            Ok(value.to_string())
        } else {
            Ok(format!("data:image/png;base64,{}", value.len()))
        }
    }
}

/// Launcher whose instances never answer; commands are kept for inspection.
#[derive(Default)]
pub struct SilentLauncher {
    pub commands: Mutex<Vec<mpsc::UnboundedReceiver<SandboxCommand>>>,
    pub gate: Option<Arc<Gate>>,
}

impl SilentLauncher {
    /// Every launch waits for `gate` to be released.
    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SandboxLauncher for SilentLauncher {
    async fn launch(
        &self,
        spec: InstanceSpec,
        _events: mpsc::UnboundedSender<SandboxMessage>,
    ) -> Result<SandboxHandle> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.commands.lock().unwrap().push(rx);
        Ok(SandboxHandle::new(spec.id, tx))
    }
}

/// Download sink that records what it was asked to save.
#[derive(Default)]
pub struct MemoryDownloads {
    pub saved: Mutex<Vec<DownloadRequest>>,
    pub fail: bool,
}

#[async_trait]
impl DownloadSink for MemoryDownloads {
    async fn save(&self, request: DownloadRequest) -> Result<PathBuf> {
        if self.fail {
            return Err(MuseError::io("disk full"));
        }
        let path = PathBuf::from("/downloads").join(&request.filename);
        self.saved.lock().unwrap().push(request);
        Ok(path)
    }
}
