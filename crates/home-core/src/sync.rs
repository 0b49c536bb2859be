//! Standing document subscription with reconnect

use docstore::{DocPath, DocumentStore, Snapshot};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// What the watch loop does after a snapshot was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchFlow {
    /// Keep reading the current subscription
    Continue,
    /// Drop the subscription and subscribe again after the reconnect delay
    Resubscribe,
}

/// Subscribe to `path` and feed every snapshot to `handler`, in order.
///
/// Subscription errors, closed subscriptions and handlers asking for
/// [`WatchFlow::Resubscribe`] are followed by a new subscription after
/// `reconnect_delay`. The task runs until aborted.
pub(crate) fn spawn_document_watch<F, Fut>(
    store: Arc<dyn DocumentStore>,
    path: DocPath,
    reconnect_delay: Duration,
    handler: F,
) -> JoinHandle<()>
where
    F: Fn(Snapshot) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WatchFlow> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match store.subscribe(&path) {
                Ok(mut subscription) => {
                    while let Some(event) = subscription.next().await {
                        match event {
                            Ok(snapshot) => {
                                if handler(snapshot).await == WatchFlow::Resubscribe {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Subscription to {} failed: {}", path, e);
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to subscribe to {}: {}", path, e);
                }
            }

            tracing::info!("Reconnecting to {} in {:?}", path, reconnect_delay);
            tokio::time::sleep(reconnect_delay).await;
        }
    })
}

/// Background task that can be stopped through a shared reference.
///
/// Aborted on drop.
pub(crate) struct TaskSlot(Mutex<Option<JoinHandle<()>>>);

impl TaskSlot {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self(Mutex::new(Some(handle)))
    }

    fn take(&self) -> Option<JoinHandle<()>> {
        match self.0.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Abort the task and wait until it is gone. Later calls return at once.
    pub async fn stop(&self) {
        if let Some(handle) = self.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.take() {
            handle.abort();
        }
    }
}
