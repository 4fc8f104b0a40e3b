// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Static JSON files shipped next to the bridge: the screenshot preset
// catalog and the plugin manifest.  Both are optional; a missing or broken
// file degrades to an empty catalog or an unknown version.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use mkswifi_core::error::Result;

/// Label of the catch-all option that keeps the user's own values.
pub const CUSTOM_LABEL: &str = "Custom";

/// Version reported when the manifest cannot be read.
pub const UNKNOWN_VERSION: &str = "0.0";

/// A screenshot preset for one printer model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotPreset {
    pub label: String,
    pub index: i64,
    #[serde(deserialize_with = "string_or_number")]
    pub simage: String,
    #[serde(deserialize_with = "string_or_number")]
    pub gimage: String,
}

/// One entry of the preset picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenshotOption {
    pub label: String,
    pub index: i64,
}

/// The image settings a preset applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScreenshotSettings {
    pub simage: String,
    pub gimage: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScreenshotCatalog {
    /// Sorted by `index`.
    presets: Vec<ScreenshotPreset>,
}

impl ScreenshotCatalog {
    pub fn new(mut presets: Vec<ScreenshotPreset>) -> Self {
        presets.sort_by_key(|p| p.index);
        Self { presets }
    }

    /// Read the catalog from a JSON array of presets.
    ///
    /// Any failure is logged and yields an empty catalog.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match read_json::<Vec<ScreenshotPreset>>(path) {
            Ok(presets) => {
                debug!(path = %path.display(), count = presets.len(), "screenshot presets loaded");
                Self::new(presets)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not load screenshot presets");
                Self::default()
            }
        }
    }

    pub fn presets(&self) -> &[ScreenshotPreset] {
        &self.presets
    }

    /// Picker entries: "Custom" first, then every preset by index.
    pub fn options(&self) -> Vec<ScreenshotOption> {
        std::iter::once(ScreenshotOption {
            label: CUSTOM_LABEL.to_string(),
            index: 0,
        })
        .chain(self.presets.iter().map(|p| ScreenshotOption {
            label: p.label.clone(),
            index: p.index,
        }))
        .collect()
    }

    /// Image settings of the preset labelled `label`.
    ///
    /// With duplicate labels the preset with the highest index wins.  An
    /// unknown label yields empty settings.
    pub fn settings_for(&self, label: &str) -> ScreenshotSettings {
        self.presets
            .iter()
            .rev()
            .find(|p| p.label == label)
            .map(|p| ScreenshotSettings {
                simage: p.simage.clone(),
                gimage: p.gimage.clone(),
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ManifestFile {
    version: String,
}

/// Version information of the bridge, read from its `plugin.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginManifest {
    version: String,
}

impl Default for PluginManifest {
    fn default() -> Self {
        Self {
            version: UNKNOWN_VERSION.to_string(),
        }
    }
}

impl PluginManifest {
    /// Read the manifest.  Any failure is logged and yields version "0.0".
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match read_json::<ManifestFile>(path) {
            Ok(file) => Self {
                version: file.version,
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not get plugin version information");
                Self::default()
            }
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// HTTP user agent sent to printers, e.g. `Cura/5.6 MKSWifiPlugin/1.2`.
    pub fn user_agent(&self, app_name: &str, app_version: &str) -> String {
        format!("{app_name}/{app_version} MKSWifiPlugin/{}", self.version)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Preset files in the wild carry image sizes both as strings and as numbers.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn json_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn options_start_with_custom_and_follow_index_order() {
        let file = json_file(
            r#"[
                {"label": "Robin Nano", "index": 2, "simage": "100", "gimage": "200"},
                {"label": "TFT35", "index": 1, "simage": 50, "gimage": 60}
            ]"#,
        );
        let catalog = ScreenshotCatalog::load(file.path());

        let labels: Vec<_> = catalog.options().into_iter().map(|o| (o.label, o.index)).collect();
        assert_eq!(
            labels,
            [
                ("Custom".to_string(), 0),
                ("TFT35".to_string(), 1),
                ("Robin Nano".to_string(), 2),
            ]
        );
    }

    #[test]
    fn settings_for_known_and_unknown_labels() {
        let catalog = ScreenshotCatalog::new(vec![ScreenshotPreset {
            label: "TFT35".into(),
            index: 1,
            simage: "50".into(),
            gimage: "60".into(),
        }]);

        assert_eq!(
            catalog.settings_for("TFT35"),
            ScreenshotSettings {
                simage: "50".into(),
                gimage: "60".into(),
            }
        );
        assert_eq!(catalog.settings_for("Custom"), ScreenshotSettings::default());
    }

    #[test]
    fn numeric_image_sizes_are_read_as_strings() {
        let file = json_file(r#"[{"label": "A", "index": 1, "simage": 50, "gimage": "60"}]"#);
        let catalog = ScreenshotCatalog::load(file.path());
        assert_eq!(catalog.settings_for("A").simage, "50");
    }

    #[test]
    fn broken_catalog_is_empty() {
        let file = json_file("{ not json");
        assert!(ScreenshotCatalog::load(file.path()).presets().is_empty());
        assert_eq!(
            ScreenshotCatalog::load("/nonexistent/screenshot.json").options().len(),
            1
        );
    }

    #[test]
    fn manifest_version_and_user_agent() {
        let file = json_file(r#"{"name": "MKS WiFi", "version": "1.2.3"}"#);
        let manifest = PluginManifest::load(file.path());
        assert_eq!(manifest.version(), "1.2.3");
        assert_eq!(
            manifest.user_agent("Cura", "5.6.0"),
            "Cura/5.6.0 MKSWifiPlugin/1.2.3"
        );
    }

    #[test]
    fn missing_manifest_reports_unknown_version() {
        let manifest = PluginManifest::load("/nonexistent/plugin.json");
        assert_eq!(manifest.version(), "0.0");
        assert_eq!(manifest.user_agent("app", "1"), "app/1 MKSWifiPlugin/0.0");
    }
}
