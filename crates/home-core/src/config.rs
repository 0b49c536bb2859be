//! Runtime configuration from environment variables

use crate::error::HomeError;
use docstore::DocPath;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;
pub const DEFAULT_REPORT_WINDOW_DAYS: i64 = 7;

/// File name of the persisted store inside the data directory
pub const STORE_FILE_NAME: &str = "panel.json";

#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Directory holding the persisted store
    pub data_dir: PathBuf,
    /// HTTP listen address
    pub listen_addr: SocketAddr,
    /// Document holding every device, keyed by device id
    pub devices_doc: DocPath,
    /// Collection receiving activity log entries
    pub activity_collection: String,
    /// Singleton user settings document
    pub settings_doc: DocPath,
    /// Pause before re-subscribing after a subscription error
    pub reconnect_delay: Duration,
    /// Length of the status history report window
    pub report_window: chrono::Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            devices_doc: DocPath::new("devices", "status"),
            activity_collection: "activityLogs".to_string(),
            settings_doc: DocPath::new("settings", "userSettings"),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            report_window: chrono::Duration::days(DEFAULT_REPORT_WINDOW_DAYS),
        }
    }
}

impl PanelConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, HomeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset or blank keys use defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HomeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        let addr = get("PANEL_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        config.listen_addr = addr
            .trim()
            .parse()
            .map_err(|_| HomeError::Config(format!("PANEL_ADDR is not a socket address: {addr}")))?;

        if let Some(ms) = get("RECONNECT_DELAY_MS") {
            let ms = ms.trim().parse::<u64>().map_err(|_| {
                HomeError::Config(format!("RECONNECT_DELAY_MS must be an integer: {ms}"))
            })?;
            config.reconnect_delay = Duration::from_millis(ms);
        }

        if let Some(days) = get("REPORT_WINDOW_DAYS") {
            let days = days
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|d| *d > 0)
                .ok_or_else(|| {
                    HomeError::Config(format!("REPORT_WINDOW_DAYS must be a positive integer: {days}"))
                })?;
            config.report_window = chrono::Duration::days(days);
        }

        Ok(config)
    }

    /// Path of the persisted store file
    #[must_use]
    pub fn store_file(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }
}
