//! Single entry point for user-initiated device changes

use crate::activity::{ActivityLog, ActivityLogEntry, NewActivity};
use crate::auth::{Authenticator, ANONYMOUS_USER};
use crate::device::{Device, DeviceAttributes};
use crate::error::HomeError;
use crate::events::PanelEvent;
use crate::mirror::MirrorState;
use chrono::Utc;
use docstore::{DocPath, DocumentStore, FieldUpdates};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Field name to new value
pub type FieldChanges = Map<String, Value>;

pub const TOGGLE_ACTION: &str = "toggle";
pub const BRIGHTNESS_ACTION: &str = "brightness_change";
pub const UPDATE_ACTION: &str = "device_update";

/// Fields that callers may never set
const IMMUTABLE_FIELDS: &[&str] = &["id", "type", "lastUpdated"];

/// Result of a mutation request
#[derive(Debug, Clone)]
pub enum MutationOutcome {
    /// Written and logged
    Applied(ActivityLogEntry),
    /// Device not in the mirror; nothing was written
    Skipped,
}

impl MutationOutcome {
    #[must_use]
    pub fn entry(&self) -> Option<&ActivityLogEntry> {
        match self {
            Self::Applied(entry) => Some(entry),
            Self::Skipped => None,
        }
    }
}

/// Applies partial field changes to one device and records them in the
/// activity log.
///
/// The device's current values come from the mirror. The mirror itself is
/// never updated here; it catches up through its own subscription.
pub struct MutationGateway {
    store: Arc<dyn DocumentStore>,
    devices_path: DocPath,
    mirror: watch::Receiver<MirrorState>,
    activity: ActivityLog,
    auth: Arc<dyn Authenticator>,
    events: broadcast::Sender<PanelEvent>,
}

impl MutationGateway {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        devices_path: DocPath,
        mirror: watch::Receiver<MirrorState>,
        activity: ActivityLog,
        auth: Arc<dyn Authenticator>,
        events: broadcast::Sender<PanelEvent>,
    ) -> Self {
        Self {
            store,
            devices_path,
            mirror,
            activity,
            auth,
            events,
        }
    }

    fn current_device(&self, device_id: &str) -> Option<Device> {
        self.mirror
            .borrow()
            .devices()?
            .iter()
            .find(|d| d.id == device_id)
            .cloned()
    }

    fn skip(&self, device_id: &str) -> MutationOutcome {
        let loading = !self.mirror.borrow().is_ready();
        tracing::warn!(
            "Ignoring change to {}: {}",
            device_id,
            if loading { "devices still loading" } else { "unknown device" }
        );
        MutationOutcome::Skipped
    }

    /// Flip the device's `status`
    pub async fn toggle(&self, device_id: &str) -> Result<MutationOutcome, HomeError> {
        let Some(device) = self.current_device(device_id) else {
            return Ok(self.skip(device_id));
        };
        let mut changes = FieldChanges::new();
        changes.insert("status".to_string(), Value::Bool(!device.status));
        self.apply(device_id, changes, TOGGLE_ACTION).await
    }

    /// Set a light's brightness, clamped to 100
    pub async fn set_brightness(&self, device_id: &str, level: u8) -> Result<MutationOutcome, HomeError> {
        let mut changes = FieldChanges::new();
        changes.insert("brightness".to_string(), Value::from(level.min(100)));
        self.apply(device_id, changes, BRIGHTNESS_ACTION).await
    }

    /// Set a single field
    pub async fn set_value(
        &self,
        device_id: &str,
        field: &str,
        value: Value,
    ) -> Result<MutationOutcome, HomeError> {
        let mut changes = FieldChanges::new();
        changes.insert(field.to_string(), value);
        self.apply(device_id, changes, UPDATE_ACTION).await
    }

    /// Set several fields at once
    pub async fn update(&self, device_id: &str, changes: FieldChanges) -> Result<MutationOutcome, HomeError> {
        self.apply(device_id, changes, UPDATE_ACTION).await
    }

    /// Write `changes` to the device and append one activity entry.
    ///
    /// Update and log are separate writes. The log is only attempted after
    /// the update succeeded, so a failure in between leaves the device
    /// changed without an entry.
    pub async fn apply(
        &self,
        device_id: &str,
        changes: FieldChanges,
        action: &str,
    ) -> Result<MutationOutcome, HomeError> {
        let Some(device) = self.current_device(device_id) else {
            return Ok(self.skip(device_id));
        };
        if changes.is_empty() {
            return Err(HomeError::EmptyUpdate(device_id.to_string()));
        }

        let previous = validate(&device, &changes)?;

        let mut updates = FieldUpdates::new();
        for (field, value) in &changes {
            updates.push(format!("{device_id}.{field}"), value.clone());
        }
        updates.push(
            format!("{device_id}.lastUpdated"),
            serde_json::to_value(Utc::now())?,
        );

        if let Err(e) = self.store.update(&self.devices_path, updates).await {
            tracing::error!("Failed to update {}: {}", device_id, e);
            self.notify_error(format!("Error updating {}", device.name));
            return Err(e.into());
        }

        let user_id = self
            .auth
            .current_user()
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());
        let entry = self
            .activity
            .append(NewActivity {
                device_id: device.id.clone(),
                device_name: device.name.clone(),
                action: action.to_string(),
                previous_state: Value::Object(previous),
                new_state: Value::Object(changes),
                user_id,
            })
            .await
            .map_err(|e| {
                tracing::error!("Updated {} but failed to log '{}': {}", device_id, action, e);
                self.notify_error(format!("Error logging change to {}", device.name));
                e
            })?;

        tracing::info!("Applied '{}' to {}", action, device_id);
        Ok(MutationOutcome::Applied(entry))
    }

    fn notify_error(&self, message: String) {
        // No receivers is fine
        let _ = self.events.send(PanelEvent::error(message));
    }
}

/// Check `changes` against the device's type and value ranges.
///
/// Returns the previous values of the changed fields.
fn validate(device: &Device, changes: &FieldChanges) -> Result<Map<String, Value>, HomeError> {
    let fields = device.to_fields()?;
    let mut previous = Map::new();

    for (field, value) in changes {
        let current = fields
            .get(field)
            .filter(|_| !IMMUTABLE_FIELDS.contains(&field.as_str()))
            .ok_or_else(|| HomeError::UnknownField {
                device_id: device.id.clone(),
                field: field.clone(),
            })?;
        previous.insert(field.clone(), current.clone());

        let mut candidate = fields.clone();
        candidate.insert(field.clone(), value.clone());
        let invalid = |reason: String| HomeError::InvalidValue {
            device_id: device.id.clone(),
            field: field.clone(),
            reason,
        };
        let updated: Device =
            serde_json::from_value(Value::Object(candidate)).map_err(|e| invalid(e.to_string()))?;
        check_ranges(&updated.attributes).map_err(|reason| invalid(reason.to_string()))?;
    }

    Ok(previous)
}

fn check_ranges(attributes: &DeviceAttributes) -> Result<(), &'static str> {
    match attributes {
        DeviceAttributes::Light { brightness, .. } if *brightness > 100 => {
            Err("brightness must be between 0 and 100")
        }
        DeviceAttributes::Fan { speed, .. } if *speed > 3 => Err("speed must be between 0 and 3"),
        DeviceAttributes::Tv { volume, .. } if *volume > 100 => {
            Err("volume must be between 0 and 100")
        }
        _ => Ok(()),
    }
}
