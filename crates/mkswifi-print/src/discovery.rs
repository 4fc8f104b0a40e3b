// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mDNS service discovery for MKS WiFi printers on the local network.
//
// We browse for the configured service types (by default
// `_mkswifi._tcp.local.`) using the `mdns-sd` crate.  Resolved services are
// folded into a shared `PrinterTable` next to the manual entries, and every
// visible change is reported on the event sink.

use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tracing::{debug, info, warn};

use mkswifi_core::config::DEFAULT_SERVICE_TYPE;
use mkswifi_core::error::{MksError, Result};
use mkswifi_core::metadata::{MetadataStore, keys};
use mkswifi_core::types::{ConnectionState, PrinterRecord, PrinterSource};

use crate::network::{NetworkEvent, NetworkEventSink, NetworkLayer, emit};
use crate::table::PrinterTable;

type SharedTable = Arc<Mutex<PrinterTable>>;
type SharedSink = Arc<Mutex<Option<NetworkEventSink>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Network layer backed by an `mdns-sd` daemon.
///
/// Wraps a `ServiceDaemon` that browses every configured service type.
/// Listener threads and host calls share the printer table; the machine's
/// metadata store tells [`recheck_connections`](NetworkLayer::recheck_connections)
/// which printer is bound.
pub struct MdnsNetworkLayer {
    daemon: ServiceDaemon,
    service_types: Vec<String>,
    table: SharedTable,
    sink: SharedSink,
    browsing: Mutex<bool>,
    store: Arc<dyn MetadataStore>,
}

impl MdnsNetworkLayer {
    /// Create the layer and spawn the mDNS daemon thread.
    ///
    /// Browsing does not begin until [`start_discovery`](NetworkLayer::start_discovery).
    /// An empty `service_types` list falls back to the default type.
    pub fn new(service_types: Vec<String>, store: Arc<dyn MetadataStore>) -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| MksError::Discovery(format!("failed to start mDNS daemon: {e}")))?;
        let service_types = if service_types.is_empty() {
            vec![DEFAULT_SERVICE_TYPE.to_string()]
        } else {
            service_types
        };
        Ok(Self {
            daemon,
            service_types,
            table: Arc::new(Mutex::new(PrinterTable::new())),
            sink: Arc::new(Mutex::new(None)),
            browsing: Mutex::new(false),
            store,
        })
    }

    pub fn service_types(&self) -> &[String] {
        &self.service_types
    }

    pub fn is_browsing(&self) -> bool {
        *lock(&self.browsing)
    }

    /// Shut down the mDNS daemon entirely.
    ///
    /// After calling this the layer only serves its manual entries.
    pub fn shutdown(&self) -> Result<()> {
        *lock(&self.browsing) = false;
        let _status_rx = self
            .daemon
            .shutdown()
            .map_err(|e| MksError::Discovery(format!("daemon shutdown: {e}")))?;
        info!("mDNS daemon shut down");
        Ok(())
    }

    fn changed(&self) {
        emit(lock(&self.sink).as_ref(), NetworkEvent::PrinterListChanged);
    }

    fn browse(&self) -> Result<()> {
        let mut browsing = lock(&self.browsing);
        if *browsing {
            debug!("printer discovery already running");
            return Ok(());
        }

        for service_type in &self.service_types {
            let receiver = self
                .daemon
                .browse(service_type)
                .map_err(|e| MksError::Discovery(format!("browse {service_type}: {e}")))?;
            spawn_listener(
                service_type.clone(),
                receiver,
                Arc::clone(&self.table),
                Arc::clone(&self.sink),
            )?;
        }

        *browsing = true;
        info!(service_types = ?self.service_types, "mDNS printer discovery started");
        Ok(())
    }

    fn stop_browse(&self) -> Result<()> {
        let mut browsing = lock(&self.browsing);
        if !*browsing {
            return Ok(());
        }
        for service_type in &self.service_types {
            self.daemon
                .stop_browse(service_type)
                .map_err(|e| MksError::Discovery(format!("stop browse {service_type}: {e}")))?;
        }
        *browsing = false;
        info!("mDNS printer discovery stopped");
        Ok(())
    }
}

impl NetworkLayer for MdnsNetworkLayer {
    fn connect_events(&self, sink: NetworkEventSink) {
        *lock(&self.sink) = Some(sink);
    }

    fn start_discovery(&self) -> Result<()> {
        self.browse()
    }

    fn refresh_discovery(&self) -> Result<()> {
        self.stop_browse()?;
        self.browse()
    }

    fn add_manual_printer(&self, address: &str, key: Option<&str>) -> Result<()> {
        let added = lock(&self.table).add_manual(address, key);
        if added {
            info!(address, "manual printer added");
            self.changed();
        }
        Ok(())
    }

    fn remove_manual_printer(&self, key: &str, address: Option<&str>) -> Result<()> {
        let removed = lock(&self.table).remove_manual(key, address);
        if removed > 0 {
            info!(key, removed, "manual printer removed");
            self.changed();
        }
        Ok(())
    }

    fn disconnect(&self, key: &str) -> Result<()> {
        let changed = lock(&self.table).set_connection(key, ConnectionState::Disconnected);
        if changed {
            info!(key, "printer disconnected");
            self.changed();
        }
        Ok(())
    }

    fn recheck_connections(&self) -> Result<()> {
        let bound = self.store.get(keys::NETWORK_KEY)?;
        let changed = lock(&self.table).recheck(bound.as_deref());
        if changed {
            debug!(bound = bound.as_deref(), "printer connections re-evaluated");
            self.changed();
        }
        Ok(())
    }

    fn printers(&self) -> Vec<PrinterRecord> {
        lock(&self.table).snapshot()
    }
}

// -- internal helpers -------------------------------------------------------

/// Spawn a thread that drains the receiver produced by `ServiceDaemon::browse`
/// and keeps the shared printer table current.
fn spawn_listener(
    service_type: String,
    receiver: mdns_sd::Receiver<ServiceEvent>,
    table: SharedTable,
    sink: SharedSink,
) -> Result<()> {
    std::thread::Builder::new()
        .name(format!("mdns-{service_type}"))
        .spawn(move || {
            // Runs until the search is stopped or the daemon shuts down.
            while let Ok(event) = receiver.recv() {
                match event {
                    ServiceEvent::SearchStarted(stype) => {
                        debug!(service_type = %stype, "mDNS search started");
                        emit(lock(&sink).as_ref(), NetworkEvent::SearchStarted);
                    }
                    ServiceEvent::ServiceFound(stype, fullname) => {
                        debug!(service_type = %stype, name = %fullname, "service found");
                    }
                    ServiceEvent::ServiceResolved(info) => {
                        let Some(record) = service_info_to_record(&info, &service_type) else {
                            warn!(fullname = %info.get_fullname(), "resolved service has no address");
                            continue;
                        };
                        info!(name = %record.name, address = %record.address, "printer resolved");
                        if lock(&table).upsert_discovered(record) {
                            emit(lock(&sink).as_ref(), NetworkEvent::PrinterListChanged);
                        }
                    }
                    ServiceEvent::ServiceRemoved(stype, fullname) => {
                        info!(service_type = %stype, name = %fullname, "printer removed");
                        if lock(&table).remove_discovered(&fullname) {
                            emit(lock(&sink).as_ref(), NetworkEvent::PrinterListChanged);
                        }
                    }
                    ServiceEvent::SearchStopped(stype) => {
                        debug!(service_type = %stype, "mDNS search stopped");
                        break;
                    }
                }
            }
        })
        .map_err(|e| MksError::Discovery(format!("spawn mDNS listener: {e}")))?;
    Ok(())
}

fn service_info_to_record(info: &ServiceInfo, service_type: &str) -> Option<PrinterRecord> {
    discovered_record(
        info.get_fullname(),
        service_type,
        info.get_addresses().iter().copied(),
        info.get_port(),
    )
}

/// Build a discovered record from the parts of a resolved service.
///
/// IPv4 addresses are preferred.  Returns `None` when no address resolved.
fn discovered_record(
    fullname: &str,
    service_type: &str,
    addresses: impl IntoIterator<Item = IpAddr>,
    port: u16,
) -> Option<PrinterRecord> {
    let addresses: Vec<IpAddr> = addresses.into_iter().collect();
    let ip = addresses
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addresses.first())
        .copied()?;

    Some(PrinterRecord {
        key: fullname.to_string(),
        address: ip.to_string(),
        source: PrinterSource::Discovered,
        name: instance_name(fullname, service_type).to_string(),
        port: Some(port),
        last_seen: Utc::now(),
        connection: ConnectionState::Disconnected,
    })
}

/// Strip the service type from an mDNS full name: `Ender._mkswifi._tcp.local.`
/// becomes `Ender`.
fn instance_name<'a>(fullname: &'a str, service_type: &str) -> &'a str {
    fullname
        .strip_suffix(service_type)
        .and_then(|s| s.strip_suffix('.'))
        .filter(|s| !s.is_empty())
        .unwrap_or(fullname)
}
