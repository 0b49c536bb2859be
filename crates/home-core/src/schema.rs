//! Known-device schema: seed document and typed decoding

use crate::device::{Device, DeviceType};
use crate::merge::decode_with_defaults;
use chrono::{DateTime, Utc};
use docstore::Document;
use serde_json::Value;

/// Keys taken from the schema, never from the remote document
const PROTECTED_FIELDS: &[&str] = &["id", "type"];

/// Field name used before `lastUpdated` by earlier panel versions
const LEGACY_TIMESTAMP_FIELD: &str = "lastChanged";

/// Ordered list of known devices with their default field values
#[derive(Debug, Clone)]
pub struct DeviceSchema {
    devices: Vec<Device>,
}

impl DeviceSchema {
    /// Create a schema from default device values
    #[must_use]
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    /// The default home: two lights, two doors, irrigation, fan, AC and TV
    #[must_use]
    pub fn default_home() -> Self {
        Self::new(vec![
            Device::new("hallLight", "Hall Light", "Hall", DeviceType::Light),
            Device::new("kitchenLight", "Kitchen Light", "Kitchen", DeviceType::Light),
            Device::new("mainGate", "Main Gate", "Entrance", DeviceType::Door),
            Device::new("balconyDoor", "Balcony Door", "Balcony", DeviceType::Door),
            Device::new(
                "irrigationSystem",
                "Irrigation System",
                "Backyard",
                DeviceType::Irrigation,
            ),
            Device::new("livingRoomFan", "Living Room Fan", "Living Room", DeviceType::Fan),
            Device::new("bedroomAc", "Bedroom AC", "Bedroom", DeviceType::Ac),
            Device::new("livingRoomTv", "Living Room TV", "Living Room", DeviceType::Tv),
        ])
    }

    #[must_use]
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Ids of every device of the given type
    pub fn ids_of_type(&self, device_type: DeviceType) -> impl Iterator<Item = &str> {
        self.devices
            .iter()
            .filter(move |d| d.device_type() == device_type)
            .map(|d| d.id.as_str())
    }

    /// Build the device collection document: one entry per device, keyed by
    /// id, with every default field and `lastUpdated` set to `now`
    pub fn seed_document(&self, now: DateTime<Utc>) -> Result<Document, serde_json::Error> {
        let mut document = Document::new();
        for device in &self.devices {
            let mut fields = Device {
                last_updated: Some(now),
                ..device.clone()
            }
            .to_fields()?;
            fields.remove("id");
            document.insert(device.id.clone(), Value::Object(fields));
        }
        Ok(document)
    }

    /// Decode the device collection document into the typed device list.
    ///
    /// Every schema device is returned, in schema order, even if the document
    /// lacks its entry. Missing or malformed fields fall back to the schema
    /// default; keys not in the schema are ignored.
    #[must_use]
    pub fn decode(&self, document: &Document) -> Vec<Device> {
        self.devices
            .iter()
            .map(|default| match document.get(&default.id) {
                Some(Value::Object(remote)) => {
                    let mut remote = remote.clone();
                    if !remote.contains_key("lastUpdated") {
                        if let Some(legacy) = remote.remove(LEGACY_TIMESTAMP_FIELD) {
                            remote.insert("lastUpdated".to_string(), legacy);
                        }
                    }
                    decode_with_defaults(default, &remote, PROTECTED_FIELDS)
                }
                Some(other) => {
                    tracing::warn!(
                        "Device entry {} is not an object ({}), using defaults",
                        default.id,
                        other
                    );
                    default.clone()
                }
                None => {
                    tracing::debug!("Device {} missing from document, using defaults", default.id);
                    default.clone()
                }
            })
            .collect()
    }
}

impl Default for DeviceSchema {
    fn default() -> Self {
        Self::default_home()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceAttributes;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_seed_then_decode_yields_every_device() {
        let schema = DeviceSchema::default_home();
        let now = Utc::now();
        let document = schema.seed_document(now).unwrap();
        assert_eq!(document.len(), schema.len());
        assert!(document["hallLight"].get("id").is_none());
        assert_eq!(document["hallLight"]["brightness"], json!(100));

        let devices = schema.decode(&document);
        assert_eq!(devices.len(), schema.len());
        for (decoded, default) in devices.iter().zip(schema.devices()) {
            assert_eq!(decoded.id, default.id);
            assert_eq!(decoded.attributes, default.attributes);
            assert_eq!(decoded.last_updated, Some(now));
        }
    }

    #[test]
    fn test_partial_entry_gets_defaults() {
        let schema = DeviceSchema::default_home();
        let devices = schema.decode(&doc(json!({
            "hallLight": {"status": true},
            "mainGate": {"status": true, "isLocked": false}
        })));

        let hall = &devices[0];
        assert!(hall.status);
        assert_eq!(hall.name, "Hall Light");
        assert_eq!(hall.brightness(), Some(100));

        let gate = devices.iter().find(|d| d.id == "mainGate").unwrap();
        assert_eq!(
            gate.attributes,
            DeviceAttributes::Door {
                is_locked: false,
                auto_lock: false
            }
        );

        let kitchen = devices.iter().find(|d| d.id == "kitchenLight").unwrap();
        assert!(!kitchen.status);
    }

    #[test]
    fn test_type_and_id_come_from_schema() {
        let schema = DeviceSchema::default_home();
        let devices = schema.decode(&doc(json!({
            "hallLight": {"type": "door", "id": "other", "brightness": 40}
        })));
        assert_eq!(devices[0].id, "hallLight");
        assert_eq!(devices[0].device_type(), DeviceType::Light);
        assert_eq!(devices[0].brightness(), Some(40));
    }

    #[test]
    fn test_legacy_last_changed_is_accepted() {
        let schema = DeviceSchema::default_home();
        let devices = schema.decode(&doc(json!({
            "hallLight": {"status": true, "lastChanged": "2024-02-02T10:00:00Z"}
        })));
        assert_eq!(
            devices[0].last_updated.map(|t| t.to_rfc3339()),
            Some("2024-02-02T10:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_unknown_and_malformed_entries() {
        let schema = DeviceSchema::default_home();
        let devices = schema.decode(&doc(json!({
            "garageLight": {"status": true},
            "livingRoomFan": {"mode": "turbo", "speed": 2},
            "bedroomAc": "broken"
        })));
        assert_eq!(devices.len(), schema.len());
        assert!(devices.iter().all(|d| d.id != "garageLight"));

        let fan = devices.iter().find(|d| d.id == "livingRoomFan").unwrap();
        assert_eq!(
            fan.attributes,
            DeviceAttributes::Fan {
                speed: 2,
                mode: crate::device::FanMode::Normal
            }
        );
        let ac = devices.iter().find(|d| d.id == "bedroomAc").unwrap();
        assert_eq!(ac, schema.get("bedroomAc").unwrap());
    }
}
