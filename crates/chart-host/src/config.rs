// File: crates/chart-host/src/config.rs
// Summary: Host-wide options (timings, endpoints, session) with serde-friendly defaults.

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Server paths for the four chart endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub refresh: String,
    pub data: String,
    pub hyperlink: String,
    pub export: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            refresh: "/chart/refresh".to_string(),
            data: "/chart/data".to_string(),
            hyperlink: "/chart/hyperlink".to_string(),
            export: "/chart/export".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostOptions {
    /// Debounce window applied before a refresh request is issued.
    pub debounce_ms: u64,
    /// Delay before an increment-style animation link refreshes its target.
    pub increment_link_delay_ms: u64,
    /// Trial watermark redraw period.
    pub watermark_interval_ms: u64,
    pub show_loading: bool,
    pub session_id: String,
    pub endpoints: Endpoints,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            increment_link_delay_ms: 500,
            watermark_interval_ms: 1000,
            show_loading: true,
            session_id: String::new(),
            endpoints: Endpoints::default(),
        }
    }
}

impl HostOptions {
    /// Parse options from JSON; absent fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn increment_link_delay(&self) -> Duration {
        Duration::from_millis(self.increment_link_delay_ms)
    }

    pub fn watermark_interval(&self) -> Duration {
        Duration::from_millis(self.watermark_interval_ms.max(1))
    }
}
