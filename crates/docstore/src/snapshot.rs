//! Point-in-time document reads delivered to subscribers

use crate::error::StoreError;
use crate::path::DocPath;
use crate::Document;
use tokio::sync::mpsc;

/// A point-in-time read of one document
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: DocPath,
    /// `None` when the document does not exist
    pub data: Option<Document>,
}

impl Snapshot {
    #[must_use]
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }
}

/// Item delivered on a subscription
pub type SnapshotResult = Result<Snapshot, StoreError>;

/// A standing subscription to one document.
///
/// The first item is the document's state at subscription time; every later
/// item reflects a change. Dropping the subscription cancels it: the store
/// stops delivering to it on its next change.
pub struct Subscription {
    path: DocPath,
    rx: mpsc::UnboundedReceiver<SnapshotResult>,
}

impl Subscription {
    /// Create a subscription fed by the given channel
    #[must_use]
    pub fn new(path: DocPath, rx: mpsc::UnboundedReceiver<SnapshotResult>) -> Self {
        Self { path, rx }
    }

    /// Create a subscription together with the sender that feeds it
    #[must_use]
    pub fn channel(path: DocPath) -> (mpsc::UnboundedSender<SnapshotResult>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(path, rx))
    }

    /// Path this subscription watches
    #[must_use]
    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// Wait for the next snapshot. Returns `None` once the store side closed.
    pub async fn next(&mut self) -> Option<SnapshotResult> {
        self.rx.recv().await
    }
}
