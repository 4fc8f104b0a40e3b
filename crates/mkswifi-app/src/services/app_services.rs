// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: opens the machine metadata store, prepares the mDNS
// network layer, and hands out the registry, settings, and scheduler built
// on top of them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use mkswifi_core::AppConfig;
use mkswifi_core::error::Result;
use mkswifi_core::metadata::{InMemoryMetadataStore, MetadataStore};
use mkswifi_print::manifest::{CUSTOM_LABEL, PluginManifest, ScreenshotCatalog};
use mkswifi_print::network::{NetworkLayer, NetworkSlot};
use mkswifi_print::registry::PrinterRegistry;
use mkswifi_print::scheduler::SchedulerHandle;
use mkswifi_print::session::DiscoverySession;
use mkswifi_print::settings::MachineSettings;
use mkswifi_print::{MdnsNetworkLayer, SqliteMetadataStore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::data_dir;

const APP_NAME: &str = "mkswifi";
const METADATA_DB: &str = "metadata.db";

/// Shared application services.
///
/// All fields are cheaply cloneable (Arc-wrapped) so that the struct can be
/// passed into tasks without lifetime issues.
#[derive(Clone)]
pub struct AppServices {
    data_dir: PathBuf,
    config: Arc<Mutex<AppConfig>>,
    store: Arc<dyn MetadataStore>,
    slot: NetworkSlot,
    mdns: Option<Arc<MdnsNetworkLayer>>,
    session: Arc<DiscoverySession>,
    registry: Arc<PrinterRegistry>,
    settings: Arc<MachineSettings>,
    catalog: Arc<ScreenshotCatalog>,
    manifest: Arc<PluginManifest>,
}

#[allow(dead_code)]
impl AppServices {
    /// Initialise all services from the config in the default data directory.
    pub fn init() -> Result<Self> {
        let dir = data_dir::data_dir();
        let config = load_config(&dir).unwrap_or_default();
        Self::init_with(dir, config)
    }

    /// Open the metadata store and the mDNS layer for `config`.
    ///
    /// An unopenable database falls back to in-memory metadata and a missing
    /// multicast stack leaves discovery idle; neither fails initialisation.
    pub fn init_with(dir: PathBuf, config: AppConfig) -> Result<Self> {
        config.validate()?;
        info!(path = %dir.display(), machine_id = %config.machine_id, "initialising app services");

        let store: Arc<dyn MetadataStore> =
            match SqliteMetadataStore::open(dir.join(METADATA_DB), &config.machine_id) {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!(error = %e, "metadata database unavailable, using in-memory fallback");
                    Arc::new(InMemoryMetadataStore::new())
                }
            };

        let mdns = match MdnsNetworkLayer::new(config.discovery.service_types.clone(), Arc::clone(&store)) {
            Ok(layer) => Some(Arc::new(layer)),
            Err(e) => {
                warn!("mDNS discovery unavailable: {e}");
                None
            }
        };
        let network = mdns.clone().map(|layer| layer as Arc<dyn NetworkLayer>);

        let mut services = Self::assemble(dir, config, store, network);
        services.mdns = mdns;
        info!("app services initialised");
        Ok(services)
    }

    /// Wire the services around an existing store and network layer.
    ///
    /// Manual printers from the config are registered on `network` before it
    /// is installed.
    pub fn assemble(
        data_dir: PathBuf,
        config: AppConfig,
        store: Arc<dyn MetadataStore>,
        network: Option<Arc<dyn NetworkLayer>>,
    ) -> Self {
        let slot = NetworkSlot::new();
        if let Some(network) = network {
            for address in &config.manual_printers {
                if let Err(e) = network.add_manual_printer(address, None) {
                    warn!(address = %address, error = %e, "failed to register configured manual printer");
                }
            }
            slot.install(network);
        }

        let session = Arc::new(DiscoverySession::new(
            config.discovery.grace_period(),
            Instant::now(),
        ));
        let registry = PrinterRegistry::new(Arc::clone(&session), Arc::clone(&store));
        let settings = MachineSettings::new(Arc::clone(&store));
        let catalog = config
            .screenshot_presets
            .as_deref()
            .map(ScreenshotCatalog::load)
            .unwrap_or_default();
        let manifest = config
            .plugin_manifest
            .as_deref()
            .map(PluginManifest::load)
            .unwrap_or_default();

        Self {
            data_dir,
            config: Arc::new(Mutex::new(config)),
            store,
            slot,
            mdns: None,
            session,
            registry: Arc::new(registry),
            settings: Arc::new(settings),
            catalog: Arc::new(catalog),
            manifest: Arc::new(manifest),
        }
    }

    // -- Discovery -----------------------------------------------------------

    /// Spawn the discovery scheduler on the current runtime.
    pub fn spawn_scheduler(&self) -> (SchedulerHandle, JoinHandle<()>) {
        let discovery = self.config().discovery;
        SchedulerHandle::spawn(Arc::clone(&self.session), self.slot.clone(), &discovery)
    }

    pub fn session(&self) -> &Arc<DiscoverySession> {
        &self.session
    }

    /// Stop the mDNS daemon, if one was started.
    pub fn shutdown_network(&self) {
        if let Some(mdns) = &self.mdns {
            if let Err(e) = mdns.shutdown() {
                warn!(error = %e, "mDNS shutdown failed");
            }
        }
    }

    // -- Printers and machine settings ---------------------------------------

    pub fn registry(&self) -> &PrinterRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn screenshot_catalog(&self) -> &ScreenshotCatalog {
        &self.catalog
    }

    /// Store the preset `label` as this machine's screenshot settings.
    ///
    /// "Custom" and unknown labels only reset the index; the user's own
    /// image sizes stay.
    pub fn apply_screenshot_preset(&self, label: &str) -> Result<()> {
        let Some(option) = self
            .catalog
            .options()
            .into_iter()
            .filter(|o| o.label != CUSTOM_LABEL)
            .find(|o| o.label == label)
        else {
            return self.settings.set_screenshot_index("0");
        };
        let preset = self.catalog.settings_for(label);
        self.settings.set_screenshot_index(&option.index.to_string())?;
        self.settings.set_simage(&preset.simage)?;
        self.settings.set_gimage(&preset.gimage)?;
        info!(label, index = option.index, "screenshot preset applied");
        Ok(())
    }

    /// User agent for HTTP requests to printers.
    pub fn user_agent(&self) -> String {
        self.manifest
            .user_agent(APP_NAME, env!("CARGO_PKG_VERSION"))
    }

    // -- Config Persistence --------------------------------------------------

    /// Get a clone of the current config.
    pub fn config(&self) -> AppConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Update and persist the config.
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        config.validate()?;
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config.clone();
        persist_config(&self.data_dir, config)
    }

    /// Path to the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

// -- Config file persistence -------------------------------------------------

const CONFIG_FILE: &str = "config.json";

/// Read the persisted config.  `None` when the file is missing or invalid.
pub fn load_config(data_dir: &Path) -> Option<AppConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            None
        }
    }
}

fn persist_config(data_dir: &Path, config: &AppConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}
