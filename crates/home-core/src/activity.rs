//! Append-only activity log of device state transitions

use crate::error::HomeError;
use chrono::{DateTime, Utc};
use docstore::{Direction, DocumentStore, Query, QueryDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One recorded state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    /// Store-assigned id
    #[serde(default)]
    pub id: String,
    pub device_id: String,
    pub device_name: String,
    pub action: String,
    /// Values of the changed fields before the mutation
    pub previous_state: Value,
    /// Values of the changed fields after the mutation
    pub new_state: Value,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
}

/// Entry to append; the log assigns id and timestamp
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub device_id: String,
    pub device_name: String,
    pub action: String,
    pub previous_state: Value,
    pub new_state: Value,
    pub user_id: String,
}

/// Filter for [`ActivityLog::query`].
///
/// Defaults to every entry, newest first. `since` and `until` are inclusive
/// and may be combined freely.
#[derive(Debug, Clone)]
pub struct ActivityQuery {
    pub device_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub newest_first: bool,
}

impl Default for ActivityQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityQuery {
    #[must_use]
    pub fn new() -> Self {
        Self {
            device_id: None,
            since: None,
            until: None,
            newest_first: true,
        }
    }

    /// Only entries of one device
    #[must_use]
    pub fn device(mut self, device_id: &str) -> Self {
        self.device_id = Some(device_id.to_string());
        self
    }

    /// Entries at or after `time`
    #[must_use]
    pub fn since(mut self, time: DateTime<Utc>) -> Self {
        self.since = Some(time);
        self
    }

    /// Entries at or before `time`
    #[must_use]
    pub fn until(mut self, time: DateTime<Utc>) -> Self {
        self.until = Some(time);
        self
    }

    /// Chronological order
    #[must_use]
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    fn to_store_query(&self, collection: &str) -> Result<Query, HomeError> {
        let mut query = Query::collection(collection);
        if let Some(device_id) = &self.device_id {
            query = query.where_eq("deviceId", device_id.as_str());
        }
        if let Some(since) = self.since {
            query = query.where_gte("timestamp", serde_json::to_value(since)?);
        }
        if let Some(until) = self.until {
            query = query.where_lte("timestamp", serde_json::to_value(until)?);
        }
        let direction = if self.newest_first {
            Direction::Descending
        } else {
            Direction::Ascending
        };
        Ok(query.order_by("timestamp", direction))
    }
}

/// The activity log collection
#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Append an entry stamped with the current time
    pub async fn append(&self, activity: NewActivity) -> Result<ActivityLogEntry, HomeError> {
        let mut entry = ActivityLogEntry {
            id: String::new(),
            device_id: activity.device_id,
            device_name: activity.device_name,
            action: activity.action,
            previous_state: activity.previous_state,
            new_state: activity.new_state,
            timestamp: Utc::now(),
            user_id: activity.user_id,
        };

        let mut document = match serde_json::to_value(&entry)? {
            Value::Object(document) => document,
            _ => {
                return Err(HomeError::Json(serde::ser::Error::custom(
                    "activity entry is not an object",
                )))
            }
        };
        document.remove("id");

        entry.id = self.store.add(&self.collection, document).await?;
        tracing::debug!(
            "Logged '{}' on {} by {} ({})",
            entry.action,
            entry.device_id,
            entry.user_id,
            entry.id
        );
        Ok(entry)
    }

    /// Fetch entries matching `query`.
    ///
    /// A single malformed entry fails the whole fetch.
    pub async fn query(&self, query: &ActivityQuery) -> Result<Vec<ActivityLogEntry>, HomeError> {
        let documents = self
            .store
            .query(&query.to_store_query(&self.collection)?)
            .await?;
        documents.into_iter().map(decode_entry).collect()
    }
}

fn decode_entry(document: QueryDocument) -> Result<ActivityLogEntry, HomeError> {
    let QueryDocument { id, mut data } = document;
    data.insert("id".to_string(), Value::String(id.clone()));
    serde_json::from_value(Value::Object(data)).map_err(|e| HomeError::MalformedRecord {
        id,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use docstore::{DocPath, MemoryStore};
    use serde_json::json;

    fn activity(device_id: &str, action: &str) -> NewActivity {
        NewActivity {
            device_id: device_id.to_string(),
            device_name: device_id.to_string(),
            action: action.to_string(),
            previous_state: json!({"status": false}),
            new_state: json!({"status": true}),
            user_id: "anonymous".to_string(),
        }
    }

    /// Store an entry with a fixed timestamp
    async fn insert_at(store: &MemoryStore, device_id: &str, at: DateTime<Utc>) {
        let document = json!({
            "deviceId": device_id,
            "deviceName": device_id,
            "action": "toggle",
            "previousState": {"status": false},
            "newState": {"status": true},
            "timestamp": at,
            "userId": "u1"
        });
        store
            .add("activityLogs", document.as_object().cloned().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_append_assigns_id_and_timestamp() {
        let store = Arc::new(MemoryStore::new());
        let log = ActivityLog::new(store.clone(), "activityLogs");

        let before = Utc::now();
        let entry = log.append(activity("hallLight", "toggle")).await.unwrap();
        assert!(!entry.id.is_empty());
        assert!(entry.timestamp >= before);

        let stored = store
            .get(&DocPath::new("activityLogs", entry.id.clone()))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.get("id").is_none());
        assert_eq!(stored["deviceId"], json!("hallLight"));
    }

    #[tokio::test]
    async fn test_unbounded_query_is_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let log = ActivityLog::new(store.clone(), "activityLogs");
        let base = Utc::now() - Duration::hours(5);
        for hours in [2, 0, 4, 1] {
            insert_at(&store, "hallLight", base + Duration::hours(hours)).await;
        }

        let entries = log.query(&ActivityQuery::new()).await.unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_bounded_query_is_inclusive() {
        let store = Arc::new(MemoryStore::new());
        let log = ActivityLog::new(store.clone(), "activityLogs");
        let t1 = Utc::now() - Duration::days(3);
        let t2 = t1 + Duration::days(1);
        for at in [t1 - Duration::seconds(1), t1, t2, t2 + Duration::seconds(1)] {
            insert_at(&store, "mainGate", at).await;
        }

        let both = log
            .query(&ActivityQuery::new().since(t1).until(t2))
            .await
            .unwrap();
        let stamps: Vec<_> = both.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![t2, t1]);

        let start_only = log.query(&ActivityQuery::new().since(t1)).await.unwrap();
        assert_eq!(start_only.len(), 3);
        let end_only = log.query(&ActivityQuery::new().until(t1)).await.unwrap();
        assert_eq!(end_only.len(), 2);

        let empty = log
            .query(&ActivityQuery::new().since(t2 + Duration::days(1)).until(t2 + Duration::days(2)))
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_device_filter() {
        let store = Arc::new(MemoryStore::new());
        let log = ActivityLog::new(store.clone(), "activityLogs");
        log.append(activity("hallLight", "toggle")).await.unwrap();
        log.append(activity("mainGate", "toggle")).await.unwrap();

        let entries = log
            .query(&ActivityQuery::new().device("mainGate"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].device_id, "mainGate");
    }

    #[tokio::test]
    async fn test_malformed_entry_fails_query() {
        let store = Arc::new(MemoryStore::new());
        let log = ActivityLog::new(store.clone(), "activityLogs");
        log.append(activity("hallLight", "toggle")).await.unwrap();
        store
            .add(
                "activityLogs",
                json!({"deviceId": 7, "timestamp": "2024-01-01T00:00:00Z"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();

        let result = log.query(&ActivityQuery::new()).await;
        assert!(matches!(result, Err(HomeError::MalformedRecord { .. })));
    }
}
