// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MksError, Result};

/// mDNS service type MKS WiFi modules advertise.
pub const DEFAULT_SERVICE_TYPE: &str = "_mkswifi._tcp.local.";

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Machine profile whose metadata the bridge reads and writes.
    pub machine_id: String,
    /// Discovery timing and browse settings.
    pub discovery: DiscoveryConfig,
    /// Addresses registered as manual printers at startup.
    pub manual_printers: Vec<String>,
    /// JSON file with the screenshot presets (optional).
    pub screenshot_presets: Option<PathBuf>,
    /// Plugin manifest carrying the version string (optional).
    pub plugin_manifest: Option<PathBuf>,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            machine_id: "default".into(),
            discovery: DiscoveryConfig::default(),
            manual_printers: Vec::new(),
            screenshot_presets: None,
            plugin_manifest: None,
            log_filter: "info".into(),
        }
    }
}

impl AppConfig {
    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.machine_id.trim().is_empty() {
            return Err(MksError::Config("machine_id must not be empty".into()));
        }
        self.discovery.validate()
    }
}

/// Timing of the discovery scheduler and the services it browses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Period of the discovery timer (default 10 s).
    pub poll_interval_ms: u64,
    /// Quiet time required after a network change before a (re)start.
    pub grace_period_ms: u64,
    /// mDNS service types to browse.
    pub service_types: Vec<String>,
    /// Capacity of the scheduler's command and event queues.
    pub queue_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            grace_period_ms: 250,
            service_types: vec![DEFAULT_SERVICE_TYPE.into()],
            queue_capacity: 64,
        }
    }
}

impl DiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(MksError::Config("poll_interval_ms must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(MksError::Config("queue_capacity must be positive".into()));
        }
        if self.service_types.iter().any(|s| !s.ends_with(".local.")) {
            return Err(MksError::Config(
                "service types must be fully qualified, e.g. _mkswifi._tcp.local.".into(),
            ));
        }
        Ok(())
    }
}
