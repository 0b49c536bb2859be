//! Events broadcast by the panel

use crate::device::Device;
use crate::settings::UserSettings;
use serde::Serialize;
use std::sync::Arc;

/// Severity of a transient user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Events emitted by the panel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelEvent {
    /// The device mirror received a new snapshot
    DevicesChanged { devices: Arc<Vec<Device>> },
    /// User settings changed locally or remotely
    SettingsChanged { settings: UserSettings },
    /// Transient message for the user (e.g. a failed write)
    Notification {
        level: NotificationLevel,
        message: String,
    },
}

impl PanelEvent {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Notification {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Notification {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}
