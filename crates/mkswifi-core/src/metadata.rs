// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-machine key/value metadata contract.
//
// The host owns one metadata store per machine profile.  Everything in the
// bridge that persists state (printer binding, credentials, screenshot and
// filename settings) goes through this trait so the rules around it can be
// exercised without a running host.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;

/// Metadata keys read and written by the bridge.
pub mod keys {
    /// Key of the printer bound to this machine.
    pub const NETWORK_KEY: &str = "mks_network_key";
    pub const AUTH_ID: &str = "network_authentication_id";
    pub const AUTH_KEY: &str = "network_authentication_key";
    /// Last IP address entered for this machine.
    pub const CURRENT_IP: &str = "mks_current_ip";
    pub const MAX_FILENAME_LEN: &str = "mks_max_filename_len";
    pub const SCREENSHOT_INDEX: &str = "mks_screenshot_index";
    pub const SIMAGE: &str = "mks_simage";
    pub const GIMAGE: &str = "mks_gimage";
    /// Presence marks the feature as enabled for this machine.
    pub const SUPPORT: &str = "mks_support";
}

/// A single write against a metadata store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataEdit {
    Set { key: String, value: String },
    Remove { key: String },
}

impl MetadataEdit {
    pub fn set(key: &str, value: impl Into<String>) -> Self {
        Self::Set {
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn remove(key: &str) -> Self {
        Self::Remove {
            key: key.to_string(),
        }
    }
}

/// Key/value persistence for one machine profile.
///
/// Writes must be visible to the next read.  [`apply`](Self::apply) commits a
/// whole batch or nothing; the binding rules rely on that to change the key
/// and drop credentials together.
pub trait MetadataStore: Send + Sync {
    /// Snapshot of every entry.
    fn metadata(&self) -> Result<BTreeMap<String, String>>;

    /// Apply all edits atomically, in order.
    fn apply(&self, edits: &[MetadataEdit]) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.metadata()?.remove(key))
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.metadata()?.contains_key(key))
    }

    fn set_entry(&self, key: &str, value: &str) -> Result<()> {
        self.apply(&[MetadataEdit::set(key, value)])
    }

    fn remove_entry(&self, key: &str) -> Result<()> {
        self.apply(&[MetadataEdit::remove(key)])
    }
}

/// Metadata store kept in process memory.
///
/// Used by tests and as the fallback when the on-disk store cannot be opened.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            entries: Mutex::new(map),
        }
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn metadata(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn apply(&self, edits: &[MetadataEdit]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for edit in edits {
            match edit {
                MetadataEdit::Set { key, value } => {
                    entries.insert(key.clone(), value.clone());
                }
                MetadataEdit::Remove { key } => {
                    entries.remove(key);
                }
            }
        }
        Ok(())
    }
}
