// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Discovery session: lifecycle state, the attached network layer, and the
// timestamp of the last low-level change.
//
// The scheduler is the only writer.  The registry reads the attached layer
// from here; no attached layer means discovery has not started yet.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use mkswifi_core::types::SessionState;

use crate::network::NetworkLayer;

/// Quiet time required after a network change before discovery may restart.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(250);

struct Inner {
    state: SessionState,
    network: Option<Arc<dyn NetworkLayer>>,
    last_event: Instant,
}

pub struct DiscoverySession {
    inner: RwLock<Inner>,
    grace_period: Duration,
}

impl DiscoverySession {
    /// Create an idle session.  The last-event clock starts at `now`, so the
    /// first restart also waits out one grace period.
    pub fn new(grace_period: Duration, now: Instant) -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: SessionState::Idle,
                network: None,
                last_event: now,
            }),
            grace_period,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.read().state
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn last_event(&self) -> Instant {
        self.read().last_event
    }

    /// The attached network layer, if discovery has been started.
    pub fn network(&self) -> Option<Arc<dyn NetworkLayer>> {
        self.read().network.clone()
    }

    /// Whether strictly more than the grace period passed since the last
    /// low-level change.
    pub fn grace_elapsed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_event()) > self.grace_period
    }

    pub fn record_event(&self, now: Instant) {
        self.write().last_event = now;
    }

    /// Idle -> Starting with `network` attached.  Returns `false` if a
    /// session already exists.
    pub(crate) fn attach(&self, network: Arc<dyn NetworkLayer>) -> bool {
        let mut inner = self.write();
        if inner.state != SessionState::Idle {
            return false;
        }
        inner.network = Some(network);
        inner.state = SessionState::Starting;
        true
    }

    /// Starting -> Active.  Returns `true` on the transition.
    pub(crate) fn mark_active(&self) -> bool {
        let mut inner = self.write();
        if inner.state == SessionState::Starting {
            inner.state = SessionState::Active;
            return true;
        }
        false
    }
}
