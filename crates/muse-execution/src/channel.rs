//! Host side of the sandbox protocol.
//!
//! The channel owns the single "current" sandbox instance. Launching replaces
//! it; the old instance is dropped and anything it still says is stale.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info};

use muse_core::config::Dimensions;
use muse_core::sandbox::{
    InstanceId, InstanceSpec, SandboxCommand, SandboxEvent, SandboxHandle, SandboxLauncher,
    SandboxMessage,
};
use muse_core::{MuseError, Result};

/// Receiving end for events from every instance the channel launches.
pub type SandboxEvents = mpsc::UnboundedReceiver<SandboxMessage>;

/// What [`SandboxChannel::accept`] decided about an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Came from the current instance.
    Current,
    /// Came from a replaced or detached instance. Must be ignored.
    Stale,
}

struct LiveInstance {
    id: InstanceId,
    handle: Option<SandboxHandle>,
    ready: bool,
    queued: Vec<SandboxCommand>,
    screenshot_waiters: Vec<oneshot::Sender<String>>,
}

impl LiveInstance {
    fn flush(&mut self) -> Result<()> {
        let Some(handle) = self.handle.as_ref() else {
            return Ok(());
        };
        if !self.ready {
            return Ok(());
        }
        for command in self.queued.drain(..) {
            handle.send(command)?;
        }
        Ok(())
    }

    fn send(&mut self, command: SandboxCommand) -> Result<()> {
        match (&self.handle, self.ready) {
            (Some(handle), true) => handle.send(command),
            _ => {
                self.queued.push(command);
                Ok(())
            }
        }
    }
}

/// Bidirectional command/event channel to the current sandbox instance.
pub struct SandboxChannel {
    launcher: Arc<dyn SandboxLauncher>,
    events: mpsc::UnboundedSender<SandboxMessage>,
    current: Mutex<Option<LiveInstance>>,
}

impl SandboxChannel {
    /// Creates a channel and the event stream its instances report on.
    pub fn new(launcher: Arc<dyn SandboxLauncher>) -> (Self, SandboxEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                launcher,
                events,
                current: Mutex::new(None),
            },
            rx,
        )
    }

    /// Starts a fresh instance for `code`, replacing the current one.
    ///
    /// `RUN_CODE` is queued until the new instance reports `READY`. Returns
    /// `None` when another launch or a detach replaced this instance before
    /// the launcher finished.
    pub async fn launch(
        &self,
        code: impl Into<String>,
        dimensions: Dimensions,
    ) -> Result<Option<InstanceId>> {
        let id = InstanceId::new();
        {
            let mut current = self.current.lock().await;
            *current = Some(LiveInstance {
                id,
                handle: None,
                ready: false,
                queued: vec![SandboxCommand::RunCode { code: code.into() }],
                screenshot_waiters: Vec::new(),
            });
        }

        let launched = self
            .launcher
            .launch(InstanceSpec { id, dimensions }, self.events.clone())
            .await;

        let mut current = self.current.lock().await;
        let Some(instance) = current.as_mut().filter(|instance| instance.id == id) else {
            // Replaced while starting up. The new handle is dropped here.
            debug!(instance = %id, "Sandbox superseded during launch");
            return Ok(None);
        };

        match launched {
            Ok(handle) => {
                instance.handle = Some(handle);
                instance.flush()?;
                info!(instance = %id, "Sandbox instance launched");
                Ok(Some(id))
            }
            Err(err) => {
                *current = None;
                Err(err)
            }
        }
    }

    /// Drops the current instance, if any.
    pub async fn detach(&self) {
        if let Some(instance) = self.current.lock().await.take() {
            debug!(instance = %instance.id, "Sandbox detached");
        }
    }

    pub async fn current_instance(&self) -> Option<InstanceId> {
        self.current.lock().await.as_ref().map(|instance| instance.id)
    }

    /// True when an instance is attached, launched and has said `READY`.
    pub async fn is_live(&self) -> bool {
        self.current
            .lock()
            .await
            .as_ref()
            .is_some_and(|instance| instance.ready && instance.handle.is_some())
    }

    /// Sends a command to the current instance, queueing it until `READY`.
    pub async fn send(&self, command: SandboxCommand) -> Result<()> {
        let mut current = self.current.lock().await;
        let instance = current
            .as_mut()
            .ok_or_else(|| MuseError::ChannelClosed("no sandbox attached".to_string()))?;
        instance.send(command)
    }

    /// Requests a screenshot from the current instance and waits up to `timeout`.
    pub async fn capture_screenshot(&self, timeout: Duration) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        {
            let mut current = self.current.lock().await;
            let instance = current
                .as_mut()
                .ok_or_else(|| MuseError::ChannelClosed("no sandbox attached".to_string()))?;
            instance.screenshot_waiters.retain(|waiter| !waiter.is_closed());
            instance.screenshot_waiters.push(tx);
            instance.send(SandboxCommand::GetScreenshot)?;
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(data_url)) => Ok(data_url),
            Ok(Err(_)) => Err(MuseError::ChannelClosed(
                "sandbox replaced before answering GET_SCREENSHOT".to_string(),
            )),
            Err(_) => Err(MuseError::ChannelTimeout {
                operation: "GET_SCREENSHOT",
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Correlates an incoming message with the current instance.
    ///
    /// Handles the protocol-level events itself (`READY` flushes queued
    /// commands, `SCREENSHOT` resolves waiters) and tells the caller whether
    /// the message may touch session state.
    pub async fn accept(&self, message: &SandboxMessage) -> Result<Disposition> {
        let mut current = self.current.lock().await;
        let Some(instance) = current
            .as_mut()
            .filter(|instance| instance.id == message.source)
        else {
            debug!(source = %message.source, event = ?message.event, "Ignoring stale sandbox event");
            return Ok(Disposition::Stale);
        };

        match &message.event {
            SandboxEvent::Ready => {
                instance.ready = true;
                instance.flush()?;
            }
            SandboxEvent::Screenshot { data_url } => {
                for waiter in instance.screenshot_waiters.drain(..) {
                    let _ = waiter.send(data_url.clone());
                }
            }
            _ => {}
        }
        Ok(Disposition::Current)
    }
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;
