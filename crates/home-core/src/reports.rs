//! Status history report for one boolean device

use crate::activity::{ActivityLog, ActivityQuery};
use crate::error::HomeError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;

/// One point of a binary status chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSample {
    pub timestamp: DateTime<Utc>,
    /// 1 = open/on, 0 = closed/off
    pub value: u8,
}

impl StatusSample {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.value == 1
    }

    /// Chart label for the sample
    #[must_use]
    pub fn label(&self) -> &'static str {
        if self.is_open() {
            "Open"
        } else {
            "Closed"
        }
    }
}

/// Status samples of `device_id` within `window` before `now`, oldest first.
///
/// Entries whose new state has no `status` field (e.g. brightness changes)
/// are skipped. An entry whose `status` is not a boolean fails the fetch.
pub async fn status_history(
    log: &ActivityLog,
    device_id: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Vec<StatusSample>, HomeError> {
    let query = ActivityQuery::new()
        .device(device_id)
        .since(now - window)
        .until(now)
        .oldest_first();

    let entries = log.query(&query).await?;
    let mut samples = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.new_state.get("status") {
            None => continue,
            Some(Value::Bool(open)) => samples.push(StatusSample {
                timestamp: entry.timestamp,
                value: u8::from(*open),
            }),
            Some(other) => {
                return Err(HomeError::MalformedRecord {
                    id: entry.id,
                    reason: format!("status must be a boolean, got {other}"),
                })
            }
        }
    }

    tracing::debug!("Built {} status samples for {}", samples.len(), device_id);
    Ok(samples)
}
