//! Home panel facade wiring mirror, gateway, settings and events together

use crate::activity::{ActivityLog, ActivityLogEntry, ActivityQuery};
use crate::auth::Authenticator;
use crate::config::PanelConfig;
use crate::error::HomeError;
use crate::events::PanelEvent;
use crate::gateway::MutationGateway;
use crate::mirror::StateMirror;
use crate::reports::{self, StatusSample};
use crate::schema::DeviceSchema;
use crate::settings::SettingsStore;
use crate::sync::TaskSlot;
use chrono::Utc;
use docstore::DocumentStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of the panel event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The running home panel
pub struct HomePanel {
    config: PanelConfig,
    schema: Arc<DeviceSchema>,
    activity: ActivityLog,
    mirror: StateMirror,
    gateway: MutationGateway,
    settings: SettingsStore,
    auth: Arc<dyn Authenticator>,
    event_tx: broadcast::Sender<PanelEvent>,
    forwarder: TaskSlot,
}

impl HomePanel {
    /// Start the panel with the default home schema
    pub fn start(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn Authenticator>,
        config: PanelConfig,
    ) -> Self {
        Self::with_schema(store, auth, DeviceSchema::default_home(), config)
    }

    /// Start the panel for a custom set of devices
    pub fn with_schema(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn Authenticator>,
        schema: DeviceSchema,
        config: PanelConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let schema = Arc::new(schema);
        let activity = ActivityLog::new(Arc::clone(&store), config.activity_collection.clone());

        let mirror = StateMirror::start(
            Arc::clone(&store),
            Arc::clone(&schema),
            activity.clone(),
            &config,
        );
        let gateway = MutationGateway::new(
            Arc::clone(&store),
            config.devices_doc.clone(),
            mirror.subscribe(),
            activity.clone(),
            Arc::clone(&auth),
            event_tx.clone(),
        );
        let settings = SettingsStore::start(store, &schema, event_tx.clone(), &config);
        let forwarder = spawn_forwarder(&mirror, &settings, event_tx.clone());

        tracing::info!(
            "Home panel started with {} devices ({} / {})",
            schema.len(),
            config.devices_doc,
            config.settings_doc
        );

        Self {
            config,
            schema,
            activity,
            mirror,
            gateway,
            settings,
            auth,
            event_tx,
            forwarder: TaskSlot::new(forwarder),
        }
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn schema(&self) -> &DeviceSchema {
        &self.schema
    }

    pub fn mirror(&self) -> &StateMirror {
        &self.mirror
    }

    pub fn gateway(&self) -> &MutationGateway {
        &self.gateway
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn auth(&self) -> &dyn Authenticator {
        self.auth.as_ref()
    }

    /// Subscribe to panel events
    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.event_tx.subscribe()
    }

    /// Status samples of a device over the configured report window
    pub async fn status_history(&self, device_id: &str) -> Result<Vec<StatusSample>, HomeError> {
        reports::status_history(&self.activity, device_id, Utc::now(), self.config.report_window)
            .await
    }

    pub async fn query_activity(&self, query: &ActivityQuery) -> Result<Vec<ActivityLogEntry>, HomeError> {
        self.activity.query(query).await
    }

    /// Stop every background task. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.forwarder.stop().await;
        self.mirror.stop().await;
        self.settings.stop().await;
        tracing::info!("Home panel stopped");
    }
}

/// Republish mirror and settings changes as panel events.
///
/// Ends when either source is gone.
fn spawn_forwarder(
    mirror: &StateMirror,
    settings: &SettingsStore,
    event_tx: broadcast::Sender<PanelEvent>,
) -> JoinHandle<()> {
    let mut devices_rx = mirror.subscribe();
    let mut settings_rx = settings.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = devices_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let devices = devices_rx.borrow_and_update().devices();
                    if let Some(devices) = devices {
                        let _ = event_tx.send(PanelEvent::DevicesChanged { devices });
                    }
                }
                changed = settings_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let settings = settings_rx.borrow_and_update().clone();
                    let _ = event_tx.send(PanelEvent::SettingsChanged { settings });
                }
            }
        }
        tracing::debug!("Panel event forwarder finished");
    })
}
