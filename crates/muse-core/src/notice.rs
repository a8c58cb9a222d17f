//! Non-blocking user notifications.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{ErrorCategory, MuseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Danger,
}

/// A toast-style message `{ title, body }` shown without interrupting the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn success(body: impl Into<String>) -> Self {
        Self {
            title: "Success".to_string(),
            body: body.into(),
            level: NoticeLevel::Success,
        }
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            level: NoticeLevel::Info,
        }
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            level: NoticeLevel::Warning,
        }
    }

    pub fn danger(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            level: NoticeLevel::Danger,
        }
    }

    /// Validation problems are warnings, everything else is danger.
    pub fn from_error(error: &MuseError) -> Self {
        let level = match error.category() {
            ErrorCategory::Validation | ErrorCategory::ChannelTimeout => NoticeLevel::Warning,
            _ => NoticeLevel::Danger,
        };
        Self {
            title: error.title().to_string(),
            body: error.to_string(),
            level,
        }
    }
}

/// Fire-and-forget notification sink.
///
/// Sending never fails from the caller's point of view: a closed receiver
/// just means nobody is listening any more.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<Notice>) -> Self {
        Self { tx }
    }

    /// Creates a notifier and the receiving end the UI drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn notify(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }

    pub fn error(&self, error: &MuseError) {
        self.notify(Notice::from_error(error));
    }
}
