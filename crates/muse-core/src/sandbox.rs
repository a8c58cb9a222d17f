//! Host/sandbox message protocol.
//!
//! Commands flow from the host to one sandbox instance, events flow back.
//! Both are tagged by `type` on the wire:
//!
//! ```json
//! {"type":"RUN_CODE","code":"..."}
//! {"type":"SIZE_UPDATE","x":1.0,"y":2.0,"z":0.5}
//! ```

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Dimensions;
use crate::error::{MuseError, Result};

/// Host → sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SandboxCommand {
    /// Execute generated scene code. Only valid after `READY`.
    RunCode { code: String },
    ResetCamera,
    ToggleAutoRotate { value: bool },
    ToggleWireframe { value: bool },
    /// Ask for a Wavefront OBJ export, answered with `DOWNLOAD`.
    ExportObj,
    /// Ask for a render capture, answered with `SCREENSHOT`.
    GetScreenshot,
}

impl SandboxCommand {
    /// Wire tag of the command.
    pub fn kind(&self) -> &'static str {
        match self {
            SandboxCommand::RunCode { .. } => "RUN_CODE",
            SandboxCommand::ResetCamera => "RESET_CAMERA",
            SandboxCommand::ToggleAutoRotate { .. } => "TOGGLE_AUTO_ROTATE",
            SandboxCommand::ToggleWireframe { .. } => "TOGGLE_WIREFRAME",
            SandboxCommand::ExportObj => "EXPORT_OBJ",
            SandboxCommand::GetScreenshot => "GET_SCREENSHOT",
        }
    }
}

/// Sandbox → host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SandboxEvent {
    /// The instance is initialised and accepts `RUN_CODE`.
    Ready,
    /// Executing the code failed.
    Error { message: String },
    /// Number of objects added to the scene. `0` disables export.
    ObjectsReady { count: u32 },
    /// Bounding box of the rendered scene.
    SizeUpdate { x: f64, y: f64, z: f64 },
    Screenshot {
        #[serde(rename = "dataUrl")]
        data_url: String,
    },
    /// A file to save locally. `data` is base64 when `binary` is set.
    Download {
        data: String,
        filename: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(default)]
        binary: bool,
    },
}

/// Identity of one sandbox instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event together with the instance that emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxMessage {
    pub source: InstanceId,
    pub event: SandboxEvent,
}

/// Sending half to one live sandbox instance.
///
/// Dropping the handle closes the command stream, which tears the instance down.
#[derive(Debug)]
pub struct SandboxHandle {
    id: InstanceId,
    commands: mpsc::UnboundedSender<SandboxCommand>,
}

impl SandboxHandle {
    pub fn new(id: InstanceId, commands: mpsc::UnboundedSender<SandboxCommand>) -> Self {
        Self { id, commands }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn send(&self, command: SandboxCommand) -> Result<()> {
        let kind = command.kind();
        self.commands.send(command).map_err(|_| {
            MuseError::ChannelClosed(format!("instance {} dropped {kind}", self.id))
        })
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Parameters for one sandbox instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceSpec {
    pub id: InstanceId,
    /// Target bounding box the generated scene was asked to fill.
    pub dimensions: Dimensions,
}

/// Creates isolated sandbox instances.
///
/// Each launched instance reports on `events`, tagging every message with
/// its own id. The first event must be `READY`.
#[async_trait]
pub trait SandboxLauncher: Send + Sync {
    async fn launch(
        &self,
        spec: InstanceSpec,
        events: mpsc::UnboundedSender<SandboxMessage>,
    ) -> Result<SandboxHandle>;
}

/// A `DOWNLOAD` payload on its way to the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub data: String,
    pub filename: String,
    pub mime_type: String,
    /// `data` is base64 and must be decoded before saving.
    pub binary: bool,
}

/// Saves exported files. The only way anything is written on the user's behalf.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Returns where the file ended up.
    async fn save(&self, request: DownloadRequest) -> Result<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_format() {
        let run = serde_json::to_value(SandboxCommand::RunCode { code: "x".into() }).unwrap();
        assert_eq!(run, json!({"type": "RUN_CODE", "code": "x"}));

        let rotate = serde_json::to_value(SandboxCommand::ToggleAutoRotate { value: true }).unwrap();
        assert_eq!(rotate, json!({"type": "TOGGLE_AUTO_ROTATE", "value": true}));

        let shot = serde_json::to_value(SandboxCommand::GetScreenshot).unwrap();
        assert_eq!(shot, json!({"type": "GET_SCREENSHOT"}));
        assert_eq!(SandboxCommand::ExportObj.kind(), "EXPORT_OBJ");
    }

    #[test]
    fn test_event_wire_format() {
        let event: SandboxEvent = serde_json::from_value(json!({
            "type": "DOWNLOAD",
            "data": "aGVsbG8=",
            "filename": "scene.obj",
            "mimeType": "text/plain",
            "binary": true
        }))
        .unwrap();
        assert_eq!(
            event,
            SandboxEvent::Download {
                data: "aGVsbG8=".into(),
                filename: "scene.obj".into(),
                mime_type: "text/plain".into(),
                binary: true,
            }
        );

        let shot: SandboxEvent =
            serde_json::from_value(json!({"type": "SCREENSHOT", "dataUrl": "data:image/png;base64,AA=="}))
                .unwrap();
        assert!(matches!(shot, SandboxEvent::Screenshot { .. }));

        let count: SandboxEvent =
            serde_json::from_value(json!({"type": "OBJECTS_READY", "count": 0})).unwrap();
        assert_eq!(count, SandboxEvent::ObjectsReady { count: 0 });
    }

    #[test]
    fn test_unknown_event_rejected() {
        let parsed = serde_json::from_value::<SandboxEvent>(json!({"type": "HELLO"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_handle_send_after_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SandboxHandle::new(InstanceId::new(), tx);
        drop(rx);
        assert!(handle.is_closed());
        assert!(matches!(
            handle.send(SandboxCommand::ResetCamera),
            Err(MuseError::ChannelClosed(_))
        ));
    }
}
