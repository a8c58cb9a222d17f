//! In-process sandbox actor.
//!
//! Each instance is a tokio task that owns its [`SceneRuntime`] and talks to
//! the host only through the command/event channels.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use muse_core::Result;
use muse_core::config::Dimensions;
use muse_core::sandbox::{
    InstanceId, InstanceSpec, SandboxCommand, SandboxEvent, SandboxHandle, SandboxLauncher,
    SandboxMessage,
};

use crate::runtime::{HeadlessRuntime, SceneRuntime};

/// Builds the runtime for a fresh instance.
pub type RuntimeFactory = Arc<dyn Fn(Dimensions) -> Box<dyn SceneRuntime> + Send + Sync>;

/// Launches [`SandboxActor`]s on the current tokio runtime.
#[derive(Clone)]
pub struct LocalSandboxLauncher {
    factory: RuntimeFactory,
}

impl LocalSandboxLauncher {
    /// Launcher backed by [`HeadlessRuntime`].
    pub fn headless() -> Self {
        Self::with_factory(Arc::new(|dimensions| {
            Box::new(HeadlessRuntime::new(dimensions)) as Box<dyn SceneRuntime>
        }))
    }

    pub fn with_factory(factory: RuntimeFactory) -> Self {
        Self { factory }
    }
}

impl Default for LocalSandboxLauncher {
    fn default() -> Self {
        Self::headless()
    }
}

#[async_trait]
impl SandboxLauncher for LocalSandboxLauncher {
    async fn launch(
        &self,
        spec: InstanceSpec,
        events: mpsc::UnboundedSender<SandboxMessage>,
    ) -> Result<SandboxHandle> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let actor = SandboxActor {
            id: spec.id,
            runtime: (self.factory)(spec.dimensions),
            commands: command_rx,
            events,
        };
        tokio::spawn(actor.run());
        Ok(SandboxHandle::new(spec.id, command_tx))
    }
}

/// One isolated sandbox instance.
pub struct SandboxActor {
    id: InstanceId,
    runtime: Box<dyn SceneRuntime>,
    commands: mpsc::UnboundedReceiver<SandboxCommand>,
    events: mpsc::UnboundedSender<SandboxMessage>,
}

impl SandboxActor {
    /// Announces `READY`, then serves commands until the host drops its handle.
    pub async fn run(mut self) {
        if !self.emit(SandboxEvent::Ready) {
            return;
        }

        while let Some(command) = self.commands.recv().await {
            debug!(instance = %self.id, command = command.kind(), "Sandbox command");
            let keep_going = match command {
                SandboxCommand::RunCode { code } => self.run_code(&code),
                SandboxCommand::ResetCamera => {
                    self.runtime.reset_camera();
                    true
                }
                SandboxCommand::ToggleAutoRotate { value } => {
                    self.runtime.set_auto_rotate(value);
                    true
                }
                SandboxCommand::ToggleWireframe { value } => {
                    self.runtime.set_wireframe(value);
                    true
                }
                SandboxCommand::ExportObj => match self.runtime.export_obj() {
                    Ok(export) => self.emit(SandboxEvent::Download {
                        data: export.data,
                        filename: export.filename,
                        mime_type: export.mime_type,
                        binary: export.binary,
                    }),
                    Err(message) => self.emit(SandboxEvent::Error { message }),
                },
                SandboxCommand::GetScreenshot => match self.runtime.screenshot() {
                    Ok(data_url) => self.emit(SandboxEvent::Screenshot { data_url }),
                    Err(message) => self.emit(SandboxEvent::Error { message }),
                },
            };
            if !keep_going {
                break;
            }
        }

        debug!(instance = %self.id, "Sandbox instance stopped");
    }

    fn run_code(&mut self, code: &str) -> bool {
        match self.runtime.run(code) {
            Ok(report) => {
                self.emit(SandboxEvent::ObjectsReady {
                    count: report.object_count,
                }) && self.emit(SandboxEvent::SizeUpdate {
                    x: report.size.x,
                    y: report.size.y,
                    z: report.size.z,
                })
            }
            Err(message) => {
                warn!(instance = %self.id, %message, "Scene code failed");
                self.emit(SandboxEvent::Error { message })
            }
        }
    }

    /// Returns false once the host has stopped listening.
    fn emit(&self, event: SandboxEvent) -> bool {
        self.events
            .send(SandboxMessage {
                source: self.id,
                event,
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn launch() -> (SandboxHandle, mpsc::UnboundedReceiver<SandboxMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let spec = InstanceSpec {
            id: InstanceId::new(),
            dimensions: Dimensions::new(1.0, 2.0, 3.0),
        };
        let handle = LocalSandboxLauncher::headless().launch(spec, tx).await.unwrap();
        (handle, rx)
    }

    #[tokio::test]
    async fn test_ready_is_first_event() {
        let (handle, mut rx) = launch().await;
        let first = rx.recv().await.unwrap();
        assert_eq!(first.source, handle.id());
        assert_eq!(first.event, SandboxEvent::Ready);
    }

    #[tokio::test]
    async fn test_run_code_reports_objects_and_size() {
        let (handle, mut rx) = launch().await;
        rx.recv().await.unwrap();

        handle
            .send(SandboxCommand::RunCode {
                code: "scene.add(a);\nscene.add(b);".into(),
            })
            .unwrap();
        assert_eq!(
            rx.recv().await.unwrap().event,
            SandboxEvent::ObjectsReady { count: 2 }
        );
        assert_eq!(
            rx.recv().await.unwrap().event,
            SandboxEvent::SizeUpdate {
                x: 1.0,
                y: 2.0,
                z: 3.0
            }
        );
    }

    #[tokio::test]
    async fn test_bad_code_reports_error() {
        let (handle, mut rx) = launch().await;
        rx.recv().await.unwrap();

        handle
            .send(SandboxCommand::RunCode {
                code: "window.location = 'x'".into(),
            })
            .unwrap();
        assert!(matches!(
            rx.recv().await.unwrap().event,
            SandboxEvent::Error { .. }
        ));
    }

    #[tokio::test]
    async fn test_export_and_screenshot() {
        let (handle, mut rx) = launch().await;
        rx.recv().await.unwrap();

        handle
            .send(SandboxCommand::RunCode {
                code: "scene.add(mesh);".into(),
            })
            .unwrap();
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        handle.send(SandboxCommand::GetScreenshot).unwrap();
        assert!(matches!(
            rx.recv().await.unwrap().event,
            SandboxEvent::Screenshot { .. }
        ));

        handle.send(SandboxCommand::ExportObj).unwrap();
        match rx.recv().await.unwrap().event {
            SandboxEvent::Download {
                filename, binary, ..
            } => {
                assert_eq!(filename, "scene.obj");
                assert!(!binary);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_actor() {
        let (handle, mut rx) = launch().await;
        rx.recv().await.unwrap();
        drop(handle);
        assert!(rx.recv().await.is_none());
    }
}
