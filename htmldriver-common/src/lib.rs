//! Common types and utilities shared across htmldriver crates.
//!
//! This crate defines the driver settings model and the observability
//! helpers used throughout the workspace. It is intentionally lightweight so
//! that every crate can depend on it without heavy transitive costs.
//!
//! # Overview
//!
//! - [`DriverSettings`]: HTTP and session knobs for a driver instance
//! - [`TimeoutSettings`]: WebDriver-style timeouts (page load, implicit wait, script)
//! - [`observability`]: Centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use htmldriver_common::DriverSettings;
//!
//! let mut settings = DriverSettings::default();
//! settings.max_redirects = 5;
//! assert_eq!(settings.timeouts.page_load_ms, 30_000);
//! ```
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub mod observability;

/// User agent sent when the settings do not override it.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; htmldriver/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Settings for a driver session.
///
/// Every field has a default, so partial configuration files deserialize
/// cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// `User-Agent` header for every request.
    pub user_agent: String,
    /// Optional `Accept-Language` header.
    pub accept_language: Option<String>,
    /// Maximum number of redirects followed for a single navigation.
    pub max_redirects: usize,
    /// Response bodies larger than this are rejected.
    pub max_body_bytes: usize,
    /// Retries for requests that fail before a response arrives.
    pub http_retries: usize,
    /// Initial session timeouts.
    pub timeouts: TimeoutSettings,
    /// Extra headers sent with every request.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: None,
            max_redirects: 20,
            max_body_bytes: 8 * 1024 * 1024,
            http_retries: 0,
            timeouts: TimeoutSettings::default(),
            default_headers: BTreeMap::new(),
        }
    }
}

/// Session timeouts, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub connect_ms: u64,
    pub page_load_ms: u64,
    pub implicit_wait_ms: u64,
    pub script_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            page_load_ms: 30_000,
            implicit_wait_ms: 0,
            script_ms: 0,
        }
    }
}

impl TimeoutSettings {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn implicit_wait(&self) -> Duration {
        Duration::from_millis(self.implicit_wait_ms)
    }

    pub fn script(&self) -> Duration {
        Duration::from_millis(self.script_ms)
    }
}
