// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// MKS WiFi Print: mDNS printer discovery, the discovery scheduler, the
// printer registry, and per-machine metadata storage.  This crate bridges
// between the core domain types defined in `mkswifi-core` and the network
// layer that finds the printers.

pub mod discovery;
pub mod manifest;
pub mod network;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod store;
pub mod table;

#[cfg(test)]
mod fake_network;

pub use discovery::MdnsNetworkLayer;
pub use manifest::{PluginManifest, ScreenshotCatalog};
pub use network::{NetworkEvent, NetworkLayer, NetworkSlot};
pub use registry::PrinterRegistry;
pub use scheduler::{DiscoveryScheduler, SchedulerHandle};
pub use session::DiscoverySession;
pub use settings::MachineSettings;
pub use store::SqliteMetadataStore;
