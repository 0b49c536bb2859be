//! Home control core for Casita Panel
//!
//! Keeps a typed mirror of the remote device document, applies partial
//! device mutations with an append-only activity log, and serves activity
//! reports, user settings and authentication on top of a [`DocumentStore`].
//!
//! [`DocumentStore`]: docstore::DocumentStore

pub mod activity;
pub mod auth;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod gateway;
pub mod merge;
pub mod mirror;
pub mod panel;
pub mod reports;
pub mod schema;
pub mod settings;
mod sync;
#[cfg(test)]
mod testing;

pub use activity::{ActivityLog, ActivityLogEntry, ActivityQuery, NewActivity};
pub use auth::{AuthError, Authenticator, InMemoryAuthenticator};
pub use config::PanelConfig;
pub use device::{Device, DeviceAttributes, DeviceType};
pub use error::HomeError;
pub use events::{NotificationLevel, PanelEvent};
pub use gateway::{FieldChanges, MutationGateway, MutationOutcome};
pub use mirror::{MirrorState, StateMirror};
pub use panel::HomePanel;
pub use reports::StatusSample;
pub use schema::DeviceSchema;
pub use settings::{SettingChange, SettingsStore, TemperatureUnit, UserSettings};
