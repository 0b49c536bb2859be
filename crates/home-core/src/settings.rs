//! User preferences kept in a single remote document

use crate::config::PanelConfig;
use crate::device::DeviceType;
use crate::error::HomeError;
use crate::events::PanelEvent;
use crate::merge::decode_with_defaults;
use crate::schema::DeviceSchema;
use crate::sync::{spawn_document_watch, TaskSlot, WatchFlow};
use docstore::{DocPath, DocumentStore, FieldUpdates};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

pub const SETTINGS_UPDATED: &str = "Settings updated successfully";
pub const SETTINGS_UPDATE_FAILED: &str = "Error updating settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub dark_mode: bool,
    pub notifications: bool,
    /// Applied to every door when changed
    pub auto_lock: bool,
    pub temperature_unit: TemperatureUnit,
    /// Default light brightness (0-100)
    pub brightness: u8,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            notifications: true,
            auto_lock: true,
            temperature_unit: TemperatureUnit::Celsius,
            brightness: 80,
        }
    }
}

/// A change to one setting.
///
/// Wire form is `{"field": "<name>", "value": <value>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum SettingChange {
    DarkMode(bool),
    Notifications(bool),
    AutoLock(bool),
    TemperatureUnit(TemperatureUnit),
    Brightness(u8),
}

impl SettingChange {
    /// Document field name
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::DarkMode(_) => "darkMode",
            Self::Notifications(_) => "notifications",
            Self::AutoLock(_) => "autoLock",
            Self::TemperatureUnit(_) => "temperatureUnit",
            Self::Brightness(_) => "brightness",
        }
    }

    /// Value as stored; brightness is clamped to 100
    #[must_use]
    pub fn value(&self) -> Value {
        match self {
            Self::DarkMode(v) | Self::Notifications(v) | Self::AutoLock(v) => Value::Bool(*v),
            Self::TemperatureUnit(TemperatureUnit::Celsius) => Value::from("C"),
            Self::TemperatureUnit(TemperatureUnit::Fahrenheit) => Value::from("F"),
            Self::Brightness(v) => Value::from((*v).min(100)),
        }
    }

    pub fn apply_to(&self, settings: &mut UserSettings) {
        match *self {
            Self::DarkMode(v) => settings.dark_mode = v,
            Self::Notifications(v) => settings.notifications = v,
            Self::AutoLock(v) => settings.auto_lock = v,
            Self::TemperatureUnit(v) => settings.temperature_unit = v,
            Self::Brightness(v) => settings.brightness = v.min(100),
        }
    }
}

/// Cached user settings, kept in sync with the settings document
pub struct SettingsStore {
    store: Arc<dyn DocumentStore>,
    path: DocPath,
    devices_path: DocPath,
    door_ids: Vec<String>,
    state_tx: Arc<watch::Sender<UserSettings>>,
    state_rx: watch::Receiver<UserSettings>,
    events: broadcast::Sender<PanelEvent>,
    task: TaskSlot,
}

impl SettingsStore {
    /// Subscribe to the settings document, creating it with defaults if absent
    pub fn start(
        store: Arc<dyn DocumentStore>,
        schema: &DeviceSchema,
        events: broadcast::Sender<PanelEvent>,
        config: &PanelConfig,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(UserSettings::default());
        let state_tx = Arc::new(state_tx);
        let path = config.settings_doc.clone();

        let handler_store = Arc::clone(&store);
        let handler_tx = Arc::clone(&state_tx);
        let handler_path = path.clone();
        let task = spawn_document_watch(Arc::clone(&store), path.clone(), config.reconnect_delay, move |snapshot| {
            let store = Arc::clone(&handler_store);
            let state_tx = Arc::clone(&handler_tx);
            let path = handler_path.clone();
            async move {
                match snapshot.data {
                    None => match write_defaults(store.as_ref(), &path).await {
                        Ok(_) => WatchFlow::Continue,
                        Err(e) => {
                            tracing::error!("Failed to create settings at {}: {}", path, e);
                            WatchFlow::Resubscribe
                        }
                    },
                    Some(document) => {
                        let settings = decode_with_defaults(&UserSettings::default(), &document, &[]);
                        state_tx.send_if_modified(|current| {
                            let changed = *current != settings;
                            *current = settings;
                            changed
                        });
                        WatchFlow::Continue
                    }
                }
            }
        });

        Self {
            store,
            path,
            devices_path: config.devices_doc.clone(),
            door_ids: schema.ids_of_type(DeviceType::Door).map(String::from).collect(),
            state_tx,
            state_rx,
            events,
            task: TaskSlot::new(task),
        }
    }

    /// Cached settings; defaults until the first snapshot
    #[must_use]
    pub fn current(&self) -> UserSettings {
        self.state_rx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UserSettings> {
        self.state_rx.clone()
    }

    /// Write one setting and notify the outcome.
    ///
    /// `autoLock` is also copied onto every door.
    pub async fn update(&self, change: SettingChange) -> Result<UserSettings, HomeError> {
        match self.write(&change).await {
            Ok(()) => {
                self.state_tx.send_modify(|settings| change.apply_to(settings));
                tracing::info!("Setting {} = {}", change.field(), change.value());
                let _ = self.events.send(PanelEvent::success(SETTINGS_UPDATED));
                Ok(self.current())
            }
            Err(e) => {
                tracing::error!("Failed to update setting {}: {}", change.field(), e);
                let _ = self.events.send(PanelEvent::error(SETTINGS_UPDATE_FAILED));
                Err(e)
            }
        }
    }

    async fn write(&self, change: &SettingChange) -> Result<(), HomeError> {
        self.store
            .update(&self.path, FieldUpdates::new().set(change.field(), change.value()))
            .await?;

        if let SettingChange::AutoLock(enabled) = change {
            if !self.door_ids.is_empty() {
                let mut doors = FieldUpdates::new();
                for id in &self.door_ids {
                    doors.push(format!("{id}.autoLock"), *enabled);
                }
                self.store.update(&self.devices_path, doors).await?;
                tracing::debug!("Applied autoLock={} to {} doors", enabled, self.door_ids.len());
            }
        }
        Ok(())
    }

    pub async fn stop(&self) {
        self.task.stop().await;
        tracing::debug!("Settings store stopped");
    }
}

/// Create the settings document with defaults unless it already exists.
///
/// Returns `true` when the document was written.
async fn write_defaults(store: &dyn DocumentStore, path: &DocPath) -> Result<bool, HomeError> {
    if store.get(path).await?.is_some() {
        tracing::debug!("Settings already exist at {}", path);
        return Ok(false);
    }

    let Value::Object(document) = serde_json::to_value(UserSettings::default())? else {
        return Err(HomeError::Json(serde::ser::Error::custom(
            "settings did not serialize to an object",
        )));
    };
    tracing::info!("Creating default settings at {}", path);
    store.set(path, document).await?;
    Ok(true)
}
