//! Controllable device representation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Device kinds shown on the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Light,
    Door,
    Irrigation,
    Fan,
    Ac,
    Tv,
}

/// Fan operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanMode {
    #[default]
    Normal,
    Oscillate,
    Timer,
}

/// Air conditioner operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcMode {
    #[default]
    Cool,
    Heat,
    Fan,
    Auto,
}

/// Irrigation watering window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationSchedule {
    /// Start time in HH:MM format
    pub start_time: String,
    /// End time in HH:MM format
    pub end_time: String,
    /// Days of week (1=Monday, ..., 7=Sunday)
    pub days: Vec<u8>,
}

impl Default for IrrigationSchedule {
    fn default() -> Self {
        Self {
            start_time: "06:00".to_string(),
            end_time: "07:00".to_string(),
            days: vec![1, 2, 3, 4, 5, 6, 7],
        }
    }
}

/// Type-specific device fields. The `type` tag selects the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum DeviceAttributes {
    Light {
        /// Brightness percentage (0-100)
        brightness: u8,
        #[serde(default)]
        color: Option<String>,
    },
    Door {
        is_locked: bool,
        auto_lock: bool,
    },
    Irrigation {
        moisture_level: f64,
        schedule: IrrigationSchedule,
    },
    Fan {
        /// Speed step (0-3)
        speed: u8,
        mode: FanMode,
    },
    Ac {
        /// Target temperature in degrees Celsius
        temperature: f64,
        mode: AcMode,
        fan_speed: u8,
    },
    Tv {
        volume: u8,
        channel: u32,
        source: String,
    },
}

impl DeviceAttributes {
    /// Factory defaults for a device type
    #[must_use]
    pub fn default_for(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::Light => Self::Light {
                brightness: 100,
                color: None,
            },
            DeviceType::Door => Self::Door {
                is_locked: true,
                auto_lock: false,
            },
            DeviceType::Irrigation => Self::Irrigation {
                moisture_level: 0.0,
                schedule: IrrigationSchedule::default(),
            },
            DeviceType::Fan => Self::Fan {
                speed: 0,
                mode: FanMode::default(),
            },
            DeviceType::Ac => Self::Ac {
                temperature: 24.0,
                mode: AcMode::default(),
                fan_speed: 1,
            },
            DeviceType::Tv => Self::Tv {
                volume: 20,
                channel: 1,
                source: "hdmi1".to_string(),
            },
        }
    }

    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        match self {
            Self::Light { .. } => DeviceType::Light,
            Self::Door { .. } => DeviceType::Door,
            Self::Irrigation { .. } => DeviceType::Irrigation,
            Self::Fan { .. } => DeviceType::Fan,
            Self::Ac { .. } => DeviceType::Ac,
            Self::Tv { .. } => DeviceType::Tv,
        }
    }
}

/// A device as stored in the device collection document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Stable identifier, also the key in the device document
    pub id: String,
    /// Display name
    pub name: String,
    /// On/open/running
    pub status: bool,
    /// Room or area
    pub location: String,
    /// Time of the last mutation
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub attributes: DeviceAttributes,
}

impl Device {
    /// Create a switched-off device with factory defaults for its type
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        device_type: DeviceType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: false,
            location: location.into(),
            last_updated: None,
            attributes: DeviceAttributes::default_for(device_type),
        }
    }

    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        self.attributes.device_type()
    }

    /// Brightness for lights, `None` for other types
    #[must_use]
    pub fn brightness(&self) -> Option<u8> {
        match self.attributes {
            DeviceAttributes::Light { brightness, .. } => Some(brightness),
            _ => None,
        }
    }

    /// Wire representation as a flat field map (camelCase keys, `type` tag)
    pub fn to_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            _ => Err(serde::ser::Error::custom("device did not serialize to an object")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_light_wire_format() {
        let device = Device::new("hallLight", "Hall Light", "Hall", DeviceType::Light);
        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "hallLight",
                "name": "Hall Light",
                "status": false,
                "location": "Hall",
                "lastUpdated": null,
                "type": "light",
                "brightness": 100,
                "color": null
            })
        );
    }

    #[test]
    fn test_door_from_wire() {
        let device: Device = serde_json::from_value(json!({
            "id": "mainGate",
            "name": "Main Gate",
            "status": true,
            "location": "Entrance",
            "lastUpdated": "2024-03-01T08:00:00Z",
            "type": "door",
            "isLocked": false,
            "autoLock": true
        }))
        .unwrap();
        assert_eq!(device.device_type(), DeviceType::Door);
        assert_eq!(
            device.attributes,
            DeviceAttributes::Door {
                is_locked: false,
                auto_lock: true
            }
        );
        assert!(device.last_updated.is_some());
        assert_eq!(device.brightness(), None);
    }

    #[test]
    fn test_ac_fields_are_camel_case() {
        let device = Device::new("bedroomAc", "Bedroom AC", "Bedroom", DeviceType::Ac);
        let fields = device.to_fields().unwrap();
        assert_eq!(fields["type"], json!("ac"));
        assert_eq!(fields["fanSpeed"], json!(1));
        assert_eq!(fields["mode"], json!("cool"));
    }
}
