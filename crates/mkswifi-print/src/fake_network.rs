// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process network layer for tests: records every call and keeps printers
// in a `PrinterTable` without touching the network.

use std::sync::{Mutex, PoisonError};

use mkswifi_core::error::{MksError, Result};
use mkswifi_core::types::{ConnectionState, PrinterRecord};

use crate::network::{NetworkEvent, NetworkEventSink, NetworkLayer, emit};
use crate::table::PrinterTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start,
    Refresh,
    AddManual(String, Option<String>),
    RemoveManual(String, Option<String>),
    Disconnect(String),
    Recheck,
}

#[derive(Default)]
pub struct FakeNetwork {
    table: Mutex<PrinterTable>,
    calls: Mutex<Vec<Call>>,
    sink: Mutex<Option<NetworkEventSink>>,
    fail_start: bool,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A layer whose `start_discovery` always fails.
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn with_printers(records: impl IntoIterator<Item = PrinterRecord>) -> Self {
        let fake = Self::new();
        {
            let mut table = fake.table.lock().unwrap_or_else(PoisonError::into_inner);
            for record in records {
                table.upsert_discovered(record);
            }
        }
        fake
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn has_sink(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn connection_of(&self, key: &str) -> Option<ConnectionState> {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|r| r.connection)
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn changed(&self) {
        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        emit(sink.as_ref(), NetworkEvent::PrinterListChanged);
    }
}

impl NetworkLayer for FakeNetwork {
    fn connect_events(&self, sink: NetworkEventSink) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    fn start_discovery(&self) -> Result<()> {
        self.record(Call::Start);
        if self.fail_start {
            return Err(MksError::Discovery("multicast unavailable".into()));
        }
        Ok(())
    }

    fn refresh_discovery(&self) -> Result<()> {
        self.record(Call::Refresh);
        Ok(())
    }

    fn add_manual_printer(&self, address: &str, key: Option<&str>) -> Result<()> {
        self.record(Call::AddManual(address.to_string(), key.map(str::to_string)));
        let added = self
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_manual(address, key);
        if added {
            self.changed();
        }
        Ok(())
    }

    fn remove_manual_printer(&self, key: &str, address: Option<&str>) -> Result<()> {
        self.record(Call::RemoveManual(
            key.to_string(),
            address.map(str::to_string),
        ));
        let removed = self
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_manual(key, address);
        if removed > 0 {
            self.changed();
        }
        Ok(())
    }

    fn disconnect(&self, key: &str) -> Result<()> {
        self.record(Call::Disconnect(key.to_string()));
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_connection(key, ConnectionState::Disconnected);
        Ok(())
    }

    fn recheck_connections(&self) -> Result<()> {
        self.record(Call::Recheck);
        Ok(())
    }

    fn printers(&self) -> Vec<PrinterRecord> {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }
}
