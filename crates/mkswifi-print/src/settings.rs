// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-machine MKS WiFi settings stored in the machine's metadata.

use std::sync::Arc;

use tracing::{debug, info};

use mkswifi_core::error::Result;
use mkswifi_core::metadata::{MetadataStore, keys};

/// Default screenshot preset index: "Custom".
pub const DEFAULT_SCREENSHOT_INDEX: &str = "0";

/// Typed access to the feature settings of one machine profile.
///
/// Getters return an empty string for a missing entry.  Setters given an
/// empty value remove the entry instead of storing `""`.
pub struct MachineSettings {
    store: Arc<dyn MetadataStore>,
}

impl MachineSettings {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    fn read(&self, key: &str) -> Result<String> {
        Ok(self.store.get(key)?.unwrap_or_default())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            debug!(key, "clearing machine setting");
            self.store.remove_entry(key)
        } else {
            debug!(key, value, "storing machine setting");
            self.store.set_entry(key, value)
        }
    }

    // -- Feature switch ------------------------------------------------------

    pub fn plugin_enabled(&self) -> Result<bool> {
        self.store.contains(keys::SUPPORT)
    }

    /// Mark the feature as enabled.  An existing marker is left untouched.
    pub fn enable_plugin(&self) -> Result<()> {
        if self.plugin_enabled()? {
            return Ok(());
        }
        self.store.set_entry(keys::SUPPORT, "true")?;
        info!("MKS WiFi support enabled");
        Ok(())
    }

    // -- Addressing ----------------------------------------------------------

    /// Whether an IP address has been entered for this machine.
    pub fn wifi_support_enabled(&self) -> Result<bool> {
        self.store.contains(keys::CURRENT_IP)
    }

    pub fn current_ip(&self) -> Result<String> {
        self.read(keys::CURRENT_IP)
    }

    pub fn set_current_ip(&self, ip: &str) -> Result<()> {
        self.write(keys::CURRENT_IP, ip)
    }

    /// Key of the bound printer, or `""` when unbound.
    pub fn stored_key(&self) -> Result<String> {
        self.read(keys::NETWORK_KEY)
    }

    // -- Uploads -------------------------------------------------------------

    pub fn max_filename_len(&self) -> Result<String> {
        self.read(keys::MAX_FILENAME_LEN)
    }

    pub fn set_max_filename_len(&self, len: &str) -> Result<()> {
        self.write(keys::MAX_FILENAME_LEN, len)
    }

    // -- Screenshots ---------------------------------------------------------

    pub fn supports_screenshot(&self) -> Result<bool> {
        let meta = self.store.metadata()?;
        Ok(meta.contains_key(keys::SIMAGE) || meta.contains_key(keys::GIMAGE))
    }

    pub fn screenshot_index(&self) -> Result<String> {
        Ok(self
            .store
            .get(keys::SCREENSHOT_INDEX)?
            .unwrap_or_else(|| DEFAULT_SCREENSHOT_INDEX.to_string()))
    }

    pub fn set_screenshot_index(&self, index: &str) -> Result<()> {
        self.write(keys::SCREENSHOT_INDEX, index)
    }

    pub fn simage(&self) -> Result<String> {
        self.read(keys::SIMAGE)
    }

    pub fn set_simage(&self, value: &str) -> Result<()> {
        self.write(keys::SIMAGE, value)
    }

    pub fn gimage(&self) -> Result<String> {
        self.read(keys::GIMAGE)
    }

    pub fn set_gimage(&self, value: &str) -> Result<()> {
        self.write(keys::GIMAGE, value)
    }
}

#[cfg(test)]
mod tests {
    use mkswifi_core::metadata::InMemoryMetadataStore;

    use super::*;

    fn settings() -> (MachineSettings, Arc<InMemoryMetadataStore>) {
        let store = Arc::new(InMemoryMetadataStore::new());
        (MachineSettings::new(store.clone()), store)
    }

    #[test]
    fn enable_plugin_writes_marker_once() {
        let (settings, store) = settings();
        assert!(!settings.plugin_enabled().expect("enabled"));

        store.set_entry(keys::SUPPORT, "legacy").expect("seed");
        settings.enable_plugin().expect("enable");
        assert_eq!(store.get(keys::SUPPORT).expect("get").as_deref(), Some("legacy"));

        store.remove_entry(keys::SUPPORT).expect("clear");
        settings.enable_plugin().expect("enable");
        assert_eq!(store.get(keys::SUPPORT).expect("get").as_deref(), Some("true"));
    }

    #[test]
    fn empty_value_removes_entry() {
        let (settings, store) = settings();
        settings.set_current_ip("192.168.1.40").expect("set ip");
        assert!(settings.wifi_support_enabled().expect("wifi"));
        assert_eq!(settings.current_ip().expect("ip"), "192.168.1.40");

        settings.set_current_ip("").expect("clear ip");
        assert!(!settings.wifi_support_enabled().expect("wifi"));
        assert!(!store.contains(keys::CURRENT_IP).expect("contains"));
        assert_eq!(settings.current_ip().expect("ip"), "");
    }

    #[test]
    fn blank_value_is_stored_verbatim() {
        let (settings, store) = settings();
        settings.set_current_ip("  ").expect("set ip");
        assert_eq!(store.get(keys::CURRENT_IP).expect("get").as_deref(), Some("  "));
        assert_eq!(settings.current_ip().expect("ip"), "  ");

        settings.set_simage(" 100 ").expect("set simage");
        assert_eq!(settings.simage().expect("simage"), " 100 ");
    }

    #[test]
    fn screenshot_settings() {
        let (settings, _) = settings();
        assert_eq!(settings.screenshot_index().expect("index"), "0");
        assert!(!settings.supports_screenshot().expect("supports"));

        settings.set_gimage("200").expect("gimage");
        assert!(settings.supports_screenshot().expect("supports"));
        assert_eq!(settings.gimage().expect("gimage"), "200");
        assert_eq!(settings.simage().expect("simage"), "");

        settings.set_screenshot_index("3").expect("index");
        assert_eq!(settings.screenshot_index().expect("index"), "3");
    }

    #[test]
    fn filename_length_and_stored_key() {
        let store = Arc::new(InMemoryMetadataStore::from_entries([(keys::NETWORK_KEY, "A")]));
        let settings = MachineSettings::new(store);
        assert_eq!(settings.stored_key().expect("key"), "A");

        assert_eq!(settings.max_filename_len().expect("len"), "");
        settings.set_max_filename_len("30").expect("set len");
        assert_eq!(settings.max_filename_len().expect("len"), "30");
    }
}
