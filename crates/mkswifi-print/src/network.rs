// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contract between the bridge and the layer that actually talks to the
// network: browsing, manual entries, and per-printer connection state.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::debug;

use mkswifi_core::error::Result;
use mkswifi_core::types::PrinterRecord;

/// Low-level notifications emitted by a network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The browse request was accepted and the search is running.
    SearchStarted,
    /// A printer appeared, disappeared, or changed.
    PrinterListChanged,
}

/// Sending half of the bounded event queue handed to a network layer.
pub type NetworkEventSink = mpsc::Sender<NetworkEvent>;

/// Deliver `event` without blocking.
///
/// A full queue means the consumer already has changes pending and will
/// re-read the printer list anyway, so the event is dropped.
pub fn emit(sink: Option<&NetworkEventSink>, event: NetworkEvent) {
    let Some(sink) = sink else {
        return;
    };
    match sink.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            debug!(?event, "network event queue full, change already pending");
        }
        Err(mpsc::error::TrySendError::Closed(event)) => {
            debug!(?event, "network event queue closed");
        }
    }
}

/// Operations the bridge needs from the device-discovery layer.
///
/// All methods take `&self`; implementations guard their own state because
/// callbacks arrive on listener threads while registry calls come from the
/// host.
pub trait NetworkLayer: Send + Sync {
    /// Route this layer's events into `sink`, replacing any previous sink.
    fn connect_events(&self, sink: NetworkEventSink);

    fn start_discovery(&self) -> Result<()>;

    /// Restart enumeration of advertised printers.
    fn refresh_discovery(&self) -> Result<()>;

    /// Register `address` as a manual printer under `key`, or under the
    /// address-derived key when `key` is `None`.  An existing manual entry
    /// with the same key takes the new address.
    fn add_manual_printer(&self, address: &str, key: Option<&str>) -> Result<()>;

    /// Remove manual entries matching `key`, and `address` when given.
    fn remove_manual_printer(&self, key: &str, address: Option<&str>) -> Result<()>;

    /// Drop the live connection to the printer with `key`.
    fn disconnect(&self, key: &str) -> Result<()>;

    /// Re-evaluate which printer should be connected for the bound machine.
    fn recheck_connections(&self) -> Result<()>;

    /// All known printers in insertion order, one per key.
    fn printers(&self) -> Vec<PrinterRecord>;
}

/// Place where the host installs its network layer once it exists.
///
/// Until then [`get`](Self::get) returns `None` and discovery stays idle.
#[derive(Clone, Default)]
pub struct NetworkSlot {
    layer: Arc<RwLock<Option<Arc<dyn NetworkLayer>>>>,
}

impl NetworkSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, layer: Arc<dyn NetworkLayer>) {
        *self.layer.write().unwrap_or_else(PoisonError::into_inner) = Some(layer);
    }

    pub fn get(&self) -> Option<Arc<dyn NetworkLayer>> {
        self.layer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
