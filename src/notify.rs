//! User-facing notifications. The presentation layer subscribes to this
//! channel; headless runs get them as structured log lines.

use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotifyLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotifyLevel::Success,
            title: title.into(),
            description: Some(description.into()),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotifyLevel::Error,
            title: title.into(),
            description: Some(description.into()),
        }
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotifyLevel::Info,
            title: title.into(),
            description: Some(description.into()),
        }
    }
}

pub async fn run_notification_sink(mut rx: mpsc::Receiver<Notification>) {
    while let Some(n) = rx.recv().await {
        let description = n.description.as_deref().unwrap_or("");
        match n.level {
            NotifyLevel::Error => error!(title = %n.title, description, "notification"),
            _ => info!(title = %n.title, description, "notification"),
        }
    }
    info!("notification channel closed, sink shutting down");
}
