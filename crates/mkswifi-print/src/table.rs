// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Insertion-ordered printer table shared by network layer implementations.
//
// One record per key.  Discovered and manual records live side by side; a
// discovered advertisement for a key that is already present updates that
// record in place instead of adding a second one.

use mkswifi_core::types::{ConnectionState, PrinterRecord, PrinterSource};

#[derive(Debug, Default, Clone)]
pub struct PrinterTable {
    records: Vec<PrinterRecord>,
}

impl PrinterTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.records.iter().position(|r| r.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&PrinterRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn snapshot(&self) -> Vec<PrinterRecord> {
        self.records.clone()
    }

    /// Insert or refresh an advertised printer.  Returns `true` when the
    /// visible list changed.
    ///
    /// An existing record keeps its source and connection state; only its
    /// address, port, and name follow the advertisement.
    pub fn upsert_discovered(&mut self, record: PrinterRecord) -> bool {
        match self.position(&record.key) {
            Some(idx) => {
                let existing = &mut self.records[idx];
                let changed = existing.address != record.address
                    || existing.port != record.port
                    || existing.name != record.name;
                existing.address = record.address;
                existing.port = record.port;
                existing.name = record.name;
                existing.last_seen = record.last_seen;
                changed
            }
            None => {
                self.records.push(PrinterRecord {
                    source: PrinterSource::Discovered,
                    ..record
                });
                true
            }
        }
    }

    /// Drop an advertised printer that went away.  Manual entries stay.
    pub fn remove_discovered(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(idx) if self.records[idx].source == PrinterSource::Discovered => {
                self.records.remove(idx);
                true
            }
            _ => false,
        }
    }

    /// Register a manual address under `key` (or `manual:<address>`).
    /// Returns `true` when the visible list changed.
    ///
    /// A manual record already holding the key is updated in place.
    pub fn add_manual(&mut self, address: &str, key: Option<&str>) -> bool {
        if address.trim().is_empty() {
            return false;
        }
        let record = match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => PrinterRecord::manual_with_key(key, address),
            None => PrinterRecord::manual(address),
        };
        match self.position(&record.key) {
            Some(idx) => {
                let existing = &mut self.records[idx];
                let changed = existing.address != record.address;
                existing.last_seen = record.last_seen;
                if changed && existing.is_manual() {
                    existing.address = record.address;
                    existing.port = record.port;
                    existing.name = record.name;
                    return true;
                }
                false
            }
            None => {
                self.records.push(record);
                true
            }
        }
    }

    /// Remove manual records whose key equals `key` or whose address equals
    /// `address`.  Empty selectors match nothing.  Returns the number removed.
    pub fn remove_manual(&mut self, key: &str, address: Option<&str>) -> usize {
        let key = key.trim();
        let address = address.map(str::trim).filter(|a| !a.is_empty());
        let before = self.records.len();
        self.records.retain(|r| {
            let selected = (!key.is_empty() && r.key == key)
                || address.is_some_and(|a| r.address == a);
            !(r.is_manual() && selected)
        });
        before - self.records.len()
    }

    pub fn set_connection(&mut self, key: &str, state: ConnectionState) -> bool {
        match self.position(key) {
            Some(idx) if self.records[idx].connection != state => {
                self.records[idx].connection = state;
                true
            }
            _ => false,
        }
    }

    /// Connect the printer bound to the machine and disconnect every other.
    pub fn recheck(&mut self, bound_key: Option<&str>) -> bool {
        let mut changed = false;
        for record in &mut self.records {
            let wanted = if bound_key == Some(record.key.as_str()) {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            };
            if record.connection != wanted {
                record.connection = wanted;
                changed = true;
            }
        }
        changed
    }
}
