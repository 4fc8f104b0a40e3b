// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Discovery scheduler.
//
// Decides when it is safe to (re)start printer enumeration and turns
// low-level network events into "printer list changed" notifications.
//
// A restart is only allowed once the network has been quiet for the grace
// period.  Notifications go out on a `watch` channel carrying a generation
// counter: every event bumps it, and consumers re-read the registry lazily,
// which is where bursts coalesce.
//
// The timer is stopped on every tick and nothing in here rearms it; after
// the first tick that gets past the grace period, further polling only
// happens when the host calls `rearm_timer`.

use std::future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mkswifi_core::config::DiscoveryConfig;
use mkswifi_core::error::{MksError, Result};
use mkswifi_core::types::SessionState;

use crate::network::{NetworkEvent, NetworkEventSink, NetworkSlot};
use crate::session::DiscoverySession;

/// What a single timer tick ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A network change happened within the grace period.
    Deferred,
    /// No session existed; one was created and started.
    Started,
    /// The running session was asked to re-enumerate.
    Refreshed,
    /// No network layer is installed yet.
    Unavailable,
}

pub struct DiscoveryScheduler {
    session: Arc<DiscoverySession>,
    slot: NetworkSlot,
    /// Handed to the network layer when a session is created.
    events: NetworkEventSink,
    changes: watch::Sender<u64>,
    poll_interval: Duration,
    timer_deadline: Option<Instant>,
}

impl DiscoveryScheduler {
    /// Create a scheduler with its timer armed to fire one interval after
    /// `now`.
    pub fn new(
        session: Arc<DiscoverySession>,
        slot: NetworkSlot,
        events: NetworkEventSink,
        poll_interval: Duration,
        now: Instant,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            session,
            slot,
            events,
            changes,
            poll_interval,
            timer_deadline: Some(now + poll_interval),
        }
    }

    pub fn session(&self) -> &Arc<DiscoverySession> {
        &self.session
    }

    /// Receiver of the printer-list generation counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn generation(&self) -> u64 {
        *self.changes.borrow()
    }

    pub fn timer_deadline(&self) -> Option<Instant> {
        self.timer_deadline
    }

    pub fn arm_timer(&mut self, now: Instant) {
        self.timer_deadline = Some(now + self.poll_interval);
        debug!(interval_ms = self.poll_interval.as_millis(), "discovery timer armed");
    }

    /// Create and start a discovery session.  No-op when one already exists
    /// or when no network layer is installed yet.
    pub fn start(&mut self) {
        if self.session.state() != SessionState::Idle {
            debug!("printer discovery already running");
            return;
        }
        let Some(network) = self.slot.get() else {
            debug!("network layer not available yet, discovery stays idle");
            return;
        };

        info!("starting printer discovery");
        network.connect_events(self.events.clone());
        if !self.session.attach(Arc::clone(&network)) {
            return;
        }
        if let Err(e) = network.start_discovery() {
            // The session stays attached; the next tick refreshes it, which
            // retries the browse.
            warn!(error = %e, "network layer failed to start discovery");
        }
        self.notify();
    }

    /// Timer callback.  Stops the timer, then starts or refreshes discovery
    /// if the network has been quiet for the grace period.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        self.timer_deadline = None;

        if !self.session.grace_elapsed(now) {
            debug!(
                grace_ms = self.session.grace_period().as_millis(),
                "network changed recently, skipping discovery restart"
            );
            return TickOutcome::Deferred;
        }

        match self.session.network() {
            None => {
                self.start();
                if self.session.state() == SessionState::Idle {
                    TickOutcome::Unavailable
                } else {
                    TickOutcome::Started
                }
            }
            Some(network) => {
                debug!("refreshing printer discovery");
                if let Err(e) = network.refresh_discovery() {
                    warn!(error = %e, "network layer failed to refresh discovery");
                }
                TickOutcome::Refreshed
            }
        }
    }

    pub fn on_network_event(&mut self, event: NetworkEvent, now: Instant) {
        match event {
            NetworkEvent::SearchStarted => {
                if self.session.mark_active() {
                    info!("printer discovery active");
                }
            }
            NetworkEvent::PrinterListChanged => self.on_low_level_change(now),
        }
    }

    /// A printer appeared, disappeared, or changed.
    pub fn on_low_level_change(&mut self, now: Instant) {
        self.session.record_event(now);
        self.notify();
    }

    /// Ask consumers to re-read the printer list.
    pub fn reset(&self) {
        debug!("reset the list of found printers");
        self.notify();
    }

    fn notify(&self) {
        self.changes.send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Messages accepted by the scheduler task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    Start,
    /// Run a tick now, as if the timer fired.
    Tick,
    RearmTimer,
    Reset,
    Shutdown,
}

/// Cloneable handle to a scheduler running on its own task.
///
/// Commands and network events are queued in bounded channels and handled
/// one at a time, in arrival order.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
    changes: watch::Receiver<u64>,
    session: Arc<DiscoverySession>,
}

impl SchedulerHandle {
    /// Spawn the scheduler task on the current Tokio runtime.
    pub fn spawn(
        session: Arc<DiscoverySession>,
        slot: NetworkSlot,
        config: &DiscoveryConfig,
    ) -> (Self, JoinHandle<()>) {
        let (event_tx, event_rx) = mpsc::channel(config.queue_capacity);
        let (command_tx, command_rx) = mpsc::channel(config.queue_capacity);

        let scheduler = DiscoveryScheduler::new(
            Arc::clone(&session),
            slot,
            event_tx,
            config.poll_interval(),
            Instant::now(),
        );
        let changes = scheduler.subscribe();
        let task = tokio::spawn(run(scheduler, command_rx, event_rx));

        (
            Self {
                commands: command_tx,
                changes,
                session,
            },
            task,
        )
    }

    pub fn session(&self) -> &Arc<DiscoverySession> {
        &self.session
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.clone()
    }

    pub async fn start(&self) -> Result<()> {
        self.send(SchedulerCommand::Start).await
    }

    pub async fn tick(&self) -> Result<()> {
        self.send(SchedulerCommand::Tick).await
    }

    pub async fn rearm_timer(&self) -> Result<()> {
        self.send(SchedulerCommand::RearmTimer).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(SchedulerCommand::Reset).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SchedulerCommand::Shutdown).await
    }

    async fn send(&self, command: SchedulerCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| MksError::SchedulerStopped)
    }
}

async fn run(
    mut scheduler: DiscoveryScheduler,
    mut commands: mpsc::Receiver<SchedulerCommand>,
    mut events: mpsc::Receiver<NetworkEvent>,
) {
    info!("discovery scheduler running");
    loop {
        let deadline = scheduler.timer_deadline();
        tokio::select! {
            command = commands.recv() => match command {
                Some(SchedulerCommand::Start) => scheduler.start(),
                Some(SchedulerCommand::Tick) => {
                    let outcome = scheduler.tick(Instant::now());
                    debug!(?outcome, "manual tick");
                }
                Some(SchedulerCommand::RearmTimer) => scheduler.arm_timer(Instant::now()),
                Some(SchedulerCommand::Reset) => scheduler.reset(),
                Some(SchedulerCommand::Shutdown) | None => break,
            },
            Some(event) = events.recv() => scheduler.on_network_event(event, Instant::now()),
            () = timer(deadline) => {
                let outcome = scheduler.tick(Instant::now());
                debug!(?outcome, "discovery timer fired");
            }
        }
    }
    info!("discovery scheduler stopped");
}

async fn timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_network::{Call, FakeNetwork};
    use crate::network::NetworkLayer;
    use crate::session::DEFAULT_GRACE_PERIOD;

    const POLL: Duration = Duration::from_secs(10);

    struct Fixture {
        scheduler: DiscoveryScheduler,
        network: Arc<FakeNetwork>,
        slot: NetworkSlot,
        t0: Instant,
        _events: mpsc::Receiver<NetworkEvent>,
    }

    fn fixture_with(network: FakeNetwork, installed: bool) -> Fixture {
        let t0 = Instant::now();
        let network = Arc::new(network);
        let slot = NetworkSlot::new();
        if installed {
            slot.install(network.clone());
        }
        let session = Arc::new(DiscoverySession::new(DEFAULT_GRACE_PERIOD, t0));
        let (tx, rx) = mpsc::channel(16);
        let scheduler = DiscoveryScheduler::new(session, slot.clone(), tx, POLL, t0);
        Fixture {
            scheduler,
            network,
            slot,
            t0,
            _events: rx,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(FakeNetwork::new(), true)
    }

    #[test]
    fn tick_within_grace_period_changes_nothing() {
        let mut f = fixture();
        let event_at = f.t0 + Duration::from_secs(1);
        f.scheduler.on_low_level_change(event_at);

        let outcome = f.scheduler.tick(event_at + DEFAULT_GRACE_PERIOD);

        assert_eq!(outcome, TickOutcome::Deferred);
        assert_eq!(f.scheduler.session().state(), SessionState::Idle);
        assert!(f.network.calls().is_empty());
    }

    #[test]
    fn tick_after_grace_period_starts_session() {
        let mut f = fixture();
        let event_at = f.t0 + Duration::from_secs(1);
        f.scheduler.on_low_level_change(event_at);

        let outcome = f
            .scheduler
            .tick(event_at + DEFAULT_GRACE_PERIOD + Duration::from_millis(1));

        assert_eq!(outcome, TickOutcome::Started);
        assert_eq!(f.scheduler.session().state(), SessionState::Starting);
        assert_eq!(f.network.calls(), vec![Call::Start]);
        assert!(f.network.has_sink());
    }

    #[test]
    fn tick_refreshes_active_session() {
        let mut f = fixture();
        f.scheduler.start();
        f.scheduler
            .on_network_event(NetworkEvent::SearchStarted, f.t0);
        assert_eq!(f.scheduler.session().state(), SessionState::Active);

        let outcome = f.scheduler.tick(f.t0 + Duration::from_secs(1));

        assert_eq!(outcome, TickOutcome::Refreshed);
        assert_eq!(f.network.calls(), vec![Call::Start, Call::Refresh]);
        assert_eq!(f.scheduler.session().state(), SessionState::Active);
    }

    #[test]
    fn tick_within_grace_period_leaves_active_session_alone() {
        let mut f = fixture();
        f.scheduler.start();
        f.scheduler
            .on_network_event(NetworkEvent::SearchStarted, f.t0);
        let event_at = f.t0 + Duration::from_secs(1);
        f.scheduler.on_low_level_change(event_at);

        let outcome = f.scheduler.tick(event_at + DEFAULT_GRACE_PERIOD);

        assert_eq!(outcome, TickOutcome::Deferred);
        assert_eq!(f.network.calls(), vec![Call::Start]);
        assert_eq!(f.scheduler.session().state(), SessionState::Active);

        let outcome = f
            .scheduler
            .tick(event_at + DEFAULT_GRACE_PERIOD + Duration::from_millis(1));
        assert_eq!(outcome, TickOutcome::Refreshed);
        assert_eq!(f.network.calls(), vec![Call::Start, Call::Refresh]);
    }

    #[test]
    fn start_is_idempotent() {
        let mut f = fixture();
        f.scheduler.start();
        f.scheduler.start();

        assert_eq!(f.network.count(&Call::Start), 1);
        assert_eq!(f.scheduler.session().state(), SessionState::Starting);
    }

    #[test]
    fn missing_network_layer_is_not_an_error() {
        let mut f = fixture_with(FakeNetwork::new(), false);
        f.scheduler.start();
        assert_eq!(f.scheduler.session().state(), SessionState::Idle);

        let later = f.t0 + Duration::from_secs(1);
        assert_eq!(f.scheduler.tick(later), TickOutcome::Unavailable);

        f.slot.install(f.network.clone());
        assert_eq!(f.scheduler.tick(later), TickOutcome::Started);
        assert_eq!(f.scheduler.session().state(), SessionState::Starting);
    }

    #[test]
    fn failed_start_is_absorbed_and_retried_by_refresh() {
        let mut f = fixture_with(FakeNetwork::failing_start(), true);
        f.scheduler.start();
        assert_eq!(f.scheduler.session().state(), SessionState::Starting);

        let outcome = f.scheduler.tick(f.t0 + Duration::from_secs(1));
        assert_eq!(outcome, TickOutcome::Refreshed);
        assert_eq!(f.network.calls(), vec![Call::Start, Call::Refresh]);
    }

    #[test]
    fn tick_stops_the_timer_and_rearm_restores_it() {
        let mut f = fixture();
        assert_eq!(f.scheduler.timer_deadline(), Some(f.t0 + POLL));

        f.scheduler.tick(f.t0 + Duration::from_millis(10));
        assert_eq!(f.scheduler.timer_deadline(), None);

        let later = f.t0 + Duration::from_secs(3);
        f.scheduler.arm_timer(later);
        assert_eq!(f.scheduler.timer_deadline(), Some(later + POLL));
    }

    #[test]
    fn every_low_level_change_emits() {
        let mut f = fixture();
        let rx = f.scheduler.subscribe();
        for ms in 0..3 {
            f.scheduler
                .on_low_level_change(f.t0 + Duration::from_millis(ms));
        }
        assert_eq!(*rx.borrow(), 3);
        assert_eq!(
            f.scheduler.session().last_event(),
            f.t0 + Duration::from_millis(2)
        );
    }

    #[test]
    fn start_and_reset_notify_consumers() {
        let mut f = fixture();
        f.scheduler.start();
        assert_eq!(f.scheduler.generation(), 1);
        f.scheduler.reset();
        assert_eq!(f.scheduler.generation(), 2);
    }

    // -- actor -----------------------------------------------------------------

    fn spawn_with(
        network: Arc<FakeNetwork>,
        config: DiscoveryConfig,
    ) -> (SchedulerHandle, JoinHandle<()>) {
        let slot = NetworkSlot::new();
        slot.install(network);
        let session = Arc::new(DiscoverySession::new(config.grace_period(), Instant::now()));
        SchedulerHandle::spawn(session, slot, &config)
    }

    async fn next_change(rx: &mut watch::Receiver<u64>) {
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("change notification in time")
            .expect("scheduler alive");
    }

    #[tokio::test]
    async fn actor_processes_commands_in_order() {
        let network = Arc::new(FakeNetwork::new());
        let (handle, task) = spawn_with(network.clone(), DiscoveryConfig::default());
        let mut rx = handle.subscribe();

        handle.start().await.expect("start");
        next_change(&mut rx).await;
        handle.start().await.expect("second start");
        handle.reset().await.expect("reset");
        next_change(&mut rx).await;

        assert_eq!(network.count(&Call::Start), 1);
        assert_eq!(handle.session().state(), SessionState::Starting);

        handle.shutdown().await.expect("shutdown");
        task.await.expect("task joined");
        assert!(matches!(handle.start().await, Err(MksError::SchedulerStopped)));
    }

    #[tokio::test]
    async fn actor_forwards_network_events() {
        let network = Arc::new(FakeNetwork::new());
        let (handle, task) = spawn_with(network.clone(), DiscoveryConfig::default());
        let mut rx = handle.subscribe();

        handle.start().await.expect("start");
        next_change(&mut rx).await;
        let before = handle.session().last_event();

        // The fake emits PrinterListChanged through the connected sink.
        network.add_manual_printer("10.0.0.5", None).expect("add");
        next_change(&mut rx).await;

        assert!(handle.session().last_event() > before);
        handle.shutdown().await.expect("shutdown");
        task.await.expect("task joined");
    }

    #[tokio::test]
    async fn timer_fires_once_until_rearmed() {
        let network = Arc::new(FakeNetwork::new());
        let config = DiscoveryConfig {
            poll_interval_ms: 20,
            grace_period_ms: 0,
            ..DiscoveryConfig::default()
        };
        let (handle, task) = spawn_with(network.clone(), config);
        let mut rx = handle.subscribe();

        // First timer tick creates the session.
        next_change(&mut rx).await;
        assert_eq!(network.calls(), vec![Call::Start]);

        // The timer was stopped by that tick: nothing else happens.
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(network.calls(), vec![Call::Start]);

        handle.rearm_timer().await.expect("rearm");
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(network.calls(), vec![Call::Start, Call::Refresh]);

        handle.shutdown().await.expect("shutdown");
        task.await.expect("task joined");
    }
}
