// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the MKS WiFi bridge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metadata::{MetadataStore, keys};

/// Prefix used for the keys of manually added printers.
pub const MANUAL_KEY_PREFIX: &str = "manual:";

/// Where a printer record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrinterSource {
    /// Resolved from an mDNS advertisement.
    Discovered,
    /// Entered by the user as an explicit address.
    Manual,
}

/// Logical connection state the network layer keeps per printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// A printer known to the network layer, either discovered or manual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterRecord {
    /// Stable identifier: the mDNS full name, or `manual:<address>`.
    pub key: String,
    /// IP address or host name, optionally with `:port`.
    pub address: String,
    pub source: PrinterSource,
    /// Display name (mDNS instance name, or the address for manual entries).
    pub name: String,
    pub port: Option<u16>,
    /// When this printer was last advertised or (re)added.
    pub last_seen: DateTime<Utc>,
    pub connection: ConnectionState,
}

impl PrinterRecord {
    /// Build a manual record for `address`.
    ///
    /// A trailing numeric `:port` is split off into [`PrinterRecord::port`];
    /// the address string itself is kept as entered.
    pub fn manual(address: &str) -> Self {
        Self::manual_with_key(&manual_key(address), address)
    }

    /// Build a manual record registered under a caller-chosen `key`.
    pub fn manual_with_key(key: &str, address: &str) -> Self {
        let address = address.trim();
        let (host, port) = split_host_port(address);
        Self {
            key: key.to_string(),
            address: address.to_string(),
            source: PrinterSource::Manual,
            name: host.to_string(),
            port,
            last_seen: Utc::now(),
            connection: ConnectionState::Disconnected,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.source == PrinterSource::Manual
    }
}

/// Key under which a manual printer with this address is registered.
pub fn manual_key(address: &str) -> String {
    format!("{MANUAL_KEY_PREFIX}{}", address.trim())
}

/// Split `host:port` into its parts.  Bare hosts, IPv6 literals without
/// brackets, and non-numeric suffixes yield `None` for the port.
pub fn split_host_port(address: &str) -> (&str, Option<u16>) {
    if let Some(rest) = address.strip_prefix('[') {
        // [v6]:port
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host, port);
        }
        return (address, None);
    }
    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (address, None),
        },
        _ => (address, None),
    }
}

/// Lifecycle states of the discovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No discovery source attached yet.
    Idle,
    /// Discovery source attached and asked to start.
    Starting,
    /// Discovery source confirmed the search is running.
    Active,
}

/// The printer binding of one machine profile, as read from its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineBinding {
    pub network_key: Option<String>,
    pub auth_id: Option<String>,
    pub auth_key: Option<String>,
}

impl MachineBinding {
    /// Read the binding fields from a machine's metadata store.
    pub fn load(store: &dyn MetadataStore) -> Result<Self> {
        let meta = store.metadata()?;
        Ok(Self {
            network_key: meta.get(keys::NETWORK_KEY).cloned(),
            auth_id: meta.get(keys::AUTH_ID).cloned(),
            auth_key: meta.get(keys::AUTH_KEY).cloned(),
        })
    }

    pub fn is_bound(&self) -> bool {
        self.network_key.is_some()
    }

    pub fn has_credentials(&self) -> bool {
        self.auth_id.is_some() || self.auth_key.is_some()
    }
}
