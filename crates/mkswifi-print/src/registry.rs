// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer registry: the sorted view of every known printer, manual printer
// edits, and the machine-to-printer binding.
//
// Printer records live in the network layer; manual edits are forwarded to
// it as commands.  The binding lives in the machine's metadata store, and
// every change of the bound key drops the stored credentials in the same
// batch.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use mkswifi_core::error::Result;
use mkswifi_core::metadata::{MetadataEdit, MetadataStore, keys};
use mkswifi_core::types::{MachineBinding, PrinterRecord};

use crate::network::NetworkLayer;
use crate::session::DiscoverySession;

/// Every key the feature persists, removed together when it is switched off.
///
/// `mks_network_key` is in this list for profiles written before the binding
/// was tracked on its own; those only lose their key through this path.
const FEATURE_KEYS: [&str; 8] = [
    keys::SUPPORT,
    keys::MAX_FILENAME_LEN,
    keys::SCREENSHOT_INDEX,
    keys::SIMAGE,
    keys::GIMAGE,
    keys::NETWORK_KEY,
    keys::AUTH_ID,
    keys::AUTH_KEY,
];

pub struct PrinterRegistry {
    session: Arc<DiscoverySession>,
    store: Arc<dyn MetadataStore>,
}

impl PrinterRegistry {
    pub fn new(session: Arc<DiscoverySession>, store: Arc<dyn MetadataStore>) -> Self {
        Self { session, store }
    }

    fn network(&self) -> Option<Arc<dyn NetworkLayer>> {
        let network = self.session.network();
        if network.is_none() {
            debug!("no discovery source attached");
        }
        network
    }

    // -- Printer list --------------------------------------------------------

    /// All known printers sorted by address.
    ///
    /// Recomputed on every call.  The sort is stable, so printers sharing an
    /// address keep the network layer's insertion order.
    pub fn list_printers(&self) -> Vec<PrinterRecord> {
        let Some(network) = self.session.network() else {
            return Vec::new();
        };
        let mut printers = network.printers();
        printers.sort_by(|a, b| a.address.cmp(&b.address));
        printers
    }

    // -- Manual printers -----------------------------------------------------

    pub fn add_manual_printer(&self, address: &str) {
        let address = address.trim();
        if address.is_empty() {
            return;
        }
        let Some(network) = self.network() else {
            return;
        };
        info!(address, "adding manual printer");
        if let Err(e) = network.add_manual_printer(address, None) {
            warn!(address, error = %e, "failed to add manual printer");
        }
    }

    pub fn remove_manual_printer(&self, key: &str, address: &str) {
        let key = key.trim();
        let address = address.trim();
        if key.is_empty() && address.is_empty() {
            return;
        }
        let Some(network) = self.network() else {
            return;
        };
        info!(key, address, "removing manual printer");
        let address = (!address.is_empty()).then_some(address);
        if let Err(e) = network.remove_manual_printer(key, address) {
            warn!(key, error = %e, "failed to remove manual printer");
        }
    }

    /// Replace the manual entry `key` (if any) with `address` (if any).
    ///
    /// The new entry is registered under `key`, so repeated edits through
    /// the same key keep a single record.
    pub fn set_manual_printer(&self, key: &str, address: &str) {
        let key = key.trim();
        let address = address.trim();
        if key.is_empty() && address.is_empty() {
            return;
        }
        let Some(network) = self.network() else {
            return;
        };
        if !key.is_empty() {
            debug!(key, "replacing manual printer");
            if let Err(e) = network.remove_manual_printer(key, None) {
                warn!(key, error = %e, "failed to remove replaced manual printer");
            }
        }
        if !address.is_empty() {
            let key = (!key.is_empty()).then_some(key);
            if let Err(e) = network.add_manual_printer(address, key) {
                warn!(address, error = %e, "failed to add manual printer");
            }
        }
    }

    // -- Machine binding -----------------------------------------------------

    pub fn binding(&self) -> Result<MachineBinding> {
        MachineBinding::load(self.store.as_ref())
    }

    /// Bind the machine to the printer `key`, dropping stored credentials.
    ///
    /// The key is stored as given; an empty key still counts as a binding
    /// until [`disconnect`](Self::disconnect) or
    /// [`unbind_machine`](Self::unbind_machine) removes it.  The network
    /// layer is asked to re-check its connections afterwards.
    #[instrument(skip(self))]
    pub fn bind_machine(&self, key: &str) -> Result<()> {
        let previous = self.binding()?;

        self.store.apply(&[
            MetadataEdit::set(keys::NETWORK_KEY, key),
            MetadataEdit::remove(keys::AUTH_ID),
            MetadataEdit::remove(keys::AUTH_KEY),
        ])?;

        if previous.is_bound() {
            info!(previous = previous.network_key.as_deref(), "network key changed, credentials dropped");
        } else {
            info!("network key set for the first time");
        }

        if let Some(network) = self.network() {
            if let Err(e) = network.recheck_connections() {
                warn!(error = %e, "failed to re-check printer connections");
            }
        }
        Ok(())
    }

    /// Switch the feature off for this machine, wiping all of its settings.
    #[instrument(skip(self))]
    pub fn unbind_machine(&self) -> Result<()> {
        let edits: Vec<_> = FEATURE_KEYS.iter().map(|&k| MetadataEdit::remove(k)).collect();
        self.store.apply(&edits)?;
        info!("MKS WiFi support disabled, machine settings wiped");
        Ok(())
    }

    /// Clear the local binding and drop the network layer's connection to
    /// `key`.  The local binding is cleared even if `key` is not the bound
    /// printer.
    #[instrument(skip(self))]
    pub fn disconnect(&self, key: &str) -> Result<()> {
        if self.binding()?.is_bound() {
            self.store.apply(&binding_cleared())?;
        }
        debug!(key, "disconnecting printer");
        if let Some(network) = self.network() {
            if let Err(e) = network.disconnect(key) {
                warn!(key, error = %e, "failed to disconnect printer");
            }
        }
        Ok(())
    }
}

fn binding_cleared() -> Vec<MetadataEdit> {
    vec![
        MetadataEdit::remove(keys::NETWORK_KEY),
        MetadataEdit::remove(keys::AUTH_ID),
        MetadataEdit::remove(keys::AUTH_KEY),
    ]
}
