//! Local read-only mirror of the remote device document

use crate::activity::{ActivityLog, NewActivity};
use crate::auth::SYSTEM_USER;
use crate::config::PanelConfig;
use crate::device::Device;
use crate::error::HomeError;
use crate::schema::DeviceSchema;
use crate::sync::{spawn_document_watch, TaskSlot, WatchFlow};
use chrono::Utc;
use docstore::{DocPath, DocumentStore};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// What the mirror currently knows
#[derive(Debug, Clone, Default)]
pub enum MirrorState {
    /// No snapshot received yet
    #[default]
    Loading,
    /// Devices decoded from the latest snapshot
    Ready(Arc<Vec<Device>>),
}

impl MirrorState {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    #[must_use]
    pub fn devices(&self) -> Option<Arc<Vec<Device>>> {
        match self {
            Self::Loading => None,
            Self::Ready(devices) => Some(Arc::clone(devices)),
        }
    }
}

/// Write the seed document if (and only if) the device document is missing.
///
/// Returns `true` when the document was created. Also logs an
/// `initialization` activity entry from the system user.
pub async fn seed_devices(
    store: &dyn DocumentStore,
    path: &DocPath,
    schema: &DeviceSchema,
    activity: &ActivityLog,
) -> Result<bool, HomeError> {
    if store.get(path).await?.is_some() {
        tracing::debug!("Devices already initialized at {}", path);
        return Ok(false);
    }

    tracing::info!("Initializing {} devices at {}", schema.len(), path);
    let document = schema.seed_document(Utc::now())?;
    store.set(path, document.clone()).await?;

    activity
        .append(NewActivity {
            device_id: SYSTEM_USER.to_string(),
            device_name: "System".to_string(),
            action: "initialization".to_string(),
            previous_state: Value::Null,
            new_state: Value::Object(document),
            user_id: SYSTEM_USER.to_string(),
        })
        .await?;
    Ok(true)
}

/// Keeps a typed device list in sync with the remote device document.
///
/// The subscription lives in a background task that is aborted on
/// [`StateMirror::stop`] or drop. A failed seed write drops the
/// subscription, so the next one sees the missing document again and
/// retries after the reconnect delay.
pub struct StateMirror {
    state_rx: watch::Receiver<MirrorState>,
    task: TaskSlot,
}

impl StateMirror {
    /// Subscribe to the device document and start mirroring it
    pub fn start(
        store: Arc<dyn DocumentStore>,
        schema: Arc<DeviceSchema>,
        activity: ActivityLog,
        config: &PanelConfig,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(MirrorState::Loading);
        let state_tx = Arc::new(state_tx);
        let path = config.devices_doc.clone();
        let seed_store = Arc::clone(&store);

        let task = spawn_document_watch(store, path.clone(), config.reconnect_delay, move |snapshot| {
            let store = Arc::clone(&seed_store);
            let schema = Arc::clone(&schema);
            let activity = activity.clone();
            let state_tx = Arc::clone(&state_tx);
            let path = path.clone();
            async move {
                match snapshot.data {
                    None => match seed_devices(store.as_ref(), &path, &schema, &activity).await {
                        Ok(_) => WatchFlow::Continue,
                        Err(e) => {
                            tracing::error!("Failed to initialize devices at {}: {}", path, e);
                            WatchFlow::Resubscribe
                        }
                    },
                    Some(document) => {
                        let devices = schema.decode(&document);
                        tracing::debug!("Device snapshot with {} devices", devices.len());
                        state_tx.send_replace(MirrorState::Ready(Arc::new(devices)));
                        WatchFlow::Continue
                    }
                }
            }
        });

        Self {
            state_rx,
            task: TaskSlot::new(task),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> MirrorState {
        self.state_rx.borrow().clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state_rx.borrow().is_ready()
    }

    /// All devices, or `None` while loading
    #[must_use]
    pub fn devices(&self) -> Option<Arc<Vec<Device>>> {
        self.state_rx.borrow().devices()
    }

    /// One device from the latest snapshot
    #[must_use]
    pub fn device(&self, id: &str) -> Option<Device> {
        self.devices()?.iter().find(|d| d.id == id).cloned()
    }

    /// Watch the mirror state
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MirrorState> {
        self.state_rx.clone()
    }

    /// Wait for the first snapshot. Returns `None` if the mirror stopped
    /// before one arrived. There is no built-in timeout.
    pub async fn wait_ready(&self) -> Option<Arc<Vec<Device>>> {
        let mut rx = self.state_rx.clone();
        let state = rx.wait_for(MirrorState::is_ready).await.ok()?;
        state.devices()
    }

    /// Cancel the subscription and wait until the background task is gone.
    /// No state is published after this returns.
    pub async fn stop(&self) {
        self.task.stop().await;
        tracing::debug!("Device mirror stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityQuery;
    use crate::testing::FaultyStore;
    use docstore::{FieldUpdates, MemoryStore};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn config() -> PanelConfig {
        PanelConfig {
            reconnect_delay: Duration::from_millis(10),
            ..PanelConfig::default()
        }
    }

    fn setup(store: Arc<dyn DocumentStore>) -> (StateMirror, ActivityLog) {
        let config = config();
        let activity = ActivityLog::new(Arc::clone(&store), config.activity_collection.clone());
        let mirror = StateMirror::start(
            store,
            Arc::new(DeviceSchema::default_home()),
            activity.clone(),
            &config,
        );
        (mirror, activity)
    }

    #[tokio::test]
    async fn test_seeds_missing_document() {
        let store = Arc::new(MemoryStore::new());
        let (mirror, activity) = setup(store.clone());

        let devices = tokio::time::timeout(WAIT, mirror.wait_ready())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(devices.len(), DeviceSchema::default_home().len());
        assert!(devices.iter().all(|d| d.last_updated.is_some()));

        let stored = store
            .get(&config().devices_doc)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["hallLight"]["brightness"], json!(100));

        let log = activity.query(&ActivityQuery::new()).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, "initialization");
        assert_eq!(log[0].user_id, SYSTEM_USER);
    }

    #[tokio::test]
    async fn test_existing_document_is_not_overwritten() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                &config().devices_doc,
                json!({"hallLight": {"status": true, "brightness": 30}})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();

        let (mirror, activity) = setup(store.clone());
        tokio::time::timeout(WAIT, mirror.wait_ready())
            .await
            .unwrap()
            .unwrap();

        let hall = mirror.device("hallLight").unwrap();
        assert!(hall.status);
        assert_eq!(hall.brightness(), Some(30));
        assert_eq!(mirror.device("kitchenLight").unwrap().brightness(), Some(100));

        let stored = store.get(&config().devices_doc).await.unwrap().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(activity.query(&ActivityQuery::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_changes_are_mirrored() {
        let store = Arc::new(MemoryStore::new());
        let (mirror, _) = setup(store.clone());
        tokio::time::timeout(WAIT, mirror.wait_ready())
            .await
            .unwrap()
            .unwrap();

        let mut rx = mirror.subscribe();
        rx.borrow_and_update();
        store
            .update(
                &config().devices_doc,
                FieldUpdates::new().set("mainGate.status", true),
            )
            .await
            .unwrap();

        tokio::time::timeout(WAIT, rx.changed()).await.unwrap().unwrap();
        assert!(mirror.device("mainGate").unwrap().status);
    }

    #[tokio::test]
    async fn test_stop_cancels_subscription() {
        let store = Arc::new(MemoryStore::new());
        let (mirror, _) = setup(store.clone());
        tokio::time::timeout(WAIT, mirror.wait_ready())
            .await
            .unwrap()
            .unwrap();
        let mut rx = mirror.subscribe();
        rx.borrow_and_update();

        mirror.stop().await;
        assert_eq!(store.subscriber_count(&config().devices_doc), 0);

        store
            .update(
                &config().devices_doc,
                FieldUpdates::new().set("mainGate.status", true),
            )
            .await
            .unwrap();
        // Sender is gone: no further publications
        assert!(rx.changed().await.is_err());
        assert!(!rx.borrow().devices().unwrap()[2].status);
    }

    #[tokio::test]
    async fn test_reconnects_after_subscription_error() {
        let store = Arc::new(FaultyStore::with_failing_subscriptions(2));
        let (mirror, _) = setup(store.clone());

        let devices = tokio::time::timeout(WAIT, mirror.wait_ready())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(devices.len(), DeviceSchema::default_home().len());
        assert_eq!(store.failing_subscriptions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_seed_is_retried() {
        let store = Arc::new(FaultyStore::with_failing_sets(1));
        let (mirror, activity) = setup(store.clone());

        let devices = tokio::time::timeout(WAIT, mirror.wait_ready())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(devices.len(), DeviceSchema::default_home().len());
        assert_eq!(store.failing_sets.load(Ordering::SeqCst), 0);
        assert!(store.get(&config().devices_doc).await.unwrap().is_some());

        let log = activity.query(&ActivityQuery::new()).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, "initialization");
    }

    #[tokio::test]
    async fn test_stays_loading_without_snapshot() {
        let store = Arc::new(FaultyStore::with_failing_subscriptions(usize::MAX));
        let (mirror, _) = setup(store);

        assert!(tokio::time::timeout(Duration::from_millis(100), mirror.wait_ready())
            .await
            .is_err());
        assert!(!mirror.is_ready());
        assert!(mirror.device("hallLight").is_none());
    }
}
