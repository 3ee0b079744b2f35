//! Order tracking.
//!
//! [`OrderTracker`] polls the order and its delivery on a fixed cadence and
//! keeps the last successfully fetched snapshot of each. Poll failures are
//! absorbed: consumers always see the last known good state, never an error.
//!
//! State machine: `Idle -> Polling -> Stopped`. `Stopped` is terminal and is
//! reached through [`OrderTracker::stop`], by dropping the tracker, or when a
//! polled order reaches a terminal status.

mod poller;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{OrderError, TrackerError};
use crate::gateway::{DeliveryGateway, OrderGateway};
use crate::models::delivery::Delivery;
use crate::models::order::Order;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Idle,
    Polling,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyTracking,
    Restarted,
}

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub stop_on_terminal: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(4),
            stop_on_terminal: true,
        }
    }
}

impl From<&Config> for TrackerConfig {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            request_timeout: config.request_timeout,
            stop_on_terminal: true,
        }
    }
}

/// What the presentation layer sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingSnapshot {
    pub state: TrackerState,
    pub order_id: Option<i64>,
    pub order: Option<Order>,
    pub delivery: Option<Delivery>,
    pub cycles_completed: u64,
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl TrackingSnapshot {
    fn idle() -> Self {
        Self {
            state: TrackerState::Idle,
            order_id: None,
            order: None,
            delivery: None,
            cycles_completed: 0,
            last_polled_at: None,
        }
    }
}

/// Read-only view of a tracker's snapshots.
#[derive(Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<TrackingSnapshot>,
}

impl SnapshotReader {
    pub fn current(&self) -> TrackingSnapshot {
        self.rx.borrow().clone()
    }

    /// Yields the current snapshot, then every change.
    pub fn stream(&self) -> WatchStream<TrackingSnapshot> {
        WatchStream::new(self.rx.clone())
    }

    /// Resolves once the tracker has stopped, with the final snapshot.
    pub async fn stopped(&mut self) -> TrackingSnapshot {
        let last = self
            .rx
            .wait_for(|snapshot| snapshot.state == TrackerState::Stopped)
            .await
            .map(|snapshot| snapshot.clone());

        last.unwrap_or_else(|_| self.current())
    }
}

struct Control {
    state: TrackerState,
    order_id: Option<i64>,
    generation: u64,
    applied_order_seq: u64,
    applied_delivery_seq: u64,
    task: Option<JoinHandle<()>>,
}

pub(crate) struct Shared {
    orders: Arc<dyn OrderGateway>,
    deliveries: Arc<dyn DeliveryGateway>,
    config: TrackerConfig,
    metrics: Metrics,
    control: Mutex<Control>,
    snapshot_tx: watch::Sender<TrackingSnapshot>,
}

pub struct OrderTracker {
    shared: Arc<Shared>,
}

impl OrderTracker {
    pub fn new(
        orders: Arc<dyn OrderGateway>,
        deliveries: Arc<dyn DeliveryGateway>,
        config: TrackerConfig,
        metrics: Metrics,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(TrackingSnapshot::idle());

        Self {
            shared: Arc::new(Shared {
                orders,
                deliveries,
                config,
                metrics,
                control: Mutex::new(Control {
                    state: TrackerState::Idle,
                    order_id: None,
                    generation: 0,
                    applied_order_seq: 0,
                    applied_delivery_seq: 0,
                    task: None,
                }),
                snapshot_tx,
            }),
        }
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            rx: self.shared.snapshot_tx.subscribe(),
        }
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    pub fn state(&self) -> TrackerState {
        self.shared.lock_control().state
    }

    /// Starts polling `order_id`; the first cycle runs immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, order_id: i64) -> Result<StartOutcome, TrackerError> {
        let mut control = self.shared.lock_control();

        let outcome = match control.state {
            TrackerState::Stopped => return Err(TrackerError::Stopped),
            TrackerState::Polling if control.order_id == Some(order_id) => {
                return Ok(StartOutcome::AlreadyTracking);
            }
            TrackerState::Polling => StartOutcome::Restarted,
            TrackerState::Idle => StartOutcome::Started,
        };

        if let Some(task) = control.task.take() {
            task.abort();
        }

        control.generation += 1;
        control.state = TrackerState::Polling;
        control.order_id = Some(order_id);
        control.applied_order_seq = 0;
        control.applied_delivery_seq = 0;

        self.shared.snapshot_tx.send_modify(|snapshot| {
            if snapshot.order_id != Some(order_id) {
                snapshot.order = None;
                snapshot.delivery = None;
                snapshot.cycles_completed = 0;
                snapshot.last_polled_at = None;
            }
            snapshot.order_id = Some(order_id);
            snapshot.state = TrackerState::Polling;
        });

        let generation = control.generation;
        control.task = Some(tokio::spawn(poller::run_poll_loop(
            self.shared.clone(),
            generation,
            order_id,
        )));

        if outcome == StartOutcome::Started {
            self.shared.metrics.active_trackers.inc();
        }
        info!(order_id, ?outcome, "order tracking started");

        Ok(outcome)
    }

    /// Starts tracking an order just returned by `create()`, showing it until
    /// the first successful poll replaces it.
    pub fn track_placed(&self, order: Order) -> Result<StartOutcome, TrackerError> {
        let outcome = self.start(order.id)?;

        let control = self.shared.lock_control();
        if control.state == TrackerState::Polling
            && control.order_id == Some(order.id)
            && control.applied_order_seq == 0
        {
            self.shared.snapshot_tx.send_modify(|snapshot| {
                if snapshot.order.is_none() {
                    snapshot.order = Some(order);
                }
            });
        }

        Ok(outcome)
    }

    /// Stops polling for good. Results of polls still in flight are discarded.
    pub fn stop(&self) {
        let mut control = self.shared.lock_control();
        if control.state == TrackerState::Stopped {
            return;
        }

        let was_polling = control.state == TrackerState::Polling;
        control.state = TrackerState::Stopped;
        control.generation += 1;
        if let Some(task) = control.task.take() {
            task.abort();
        }

        self.shared
            .snapshot_tx
            .send_modify(|snapshot| snapshot.state = TrackerState::Stopped);

        if was_polling {
            self.shared.metrics.active_trackers.dec();
            info!(order_id = ?control.order_id, "order tracking stopped");
        }
    }
}

impl Drop for OrderTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn discard(control: &Control, generation: u64) -> bool {
        control.state != TrackerState::Polling || control.generation != generation
    }

    pub(crate) fn apply_order(&self, generation: u64, seq: u64, result: Result<Order, OrderError>) {
        let mut control = self.lock_control();
        if Self::discard(&control, generation) {
            debug!(seq, "discarding order poll result after stop or restart");
            self.metrics
                .stale_responses_total
                .with_label_values(&["order"])
                .inc();
            return;
        }

        match result {
            Ok(order) if seq < control.applied_order_seq => {
                debug!(
                    order_id = order.id,
                    seq,
                    applied = control.applied_order_seq,
                    "discarding out-of-order order snapshot"
                );
                self.metrics
                    .stale_responses_total
                    .with_label_values(&["order"])
                    .inc();
            }
            Ok(order) => {
                control.applied_order_seq = seq;
                self.snapshot_tx
                    .send_modify(|snapshot| snapshot.order = Some(order));
            }
            Err(err) => {
                warn!(order_id = ?control.order_id, seq, error = %err, "order poll failed");
            }
        }
    }

    pub(crate) fn apply_delivery(
        &self,
        generation: u64,
        seq: u64,
        result: Result<Option<Delivery>, OrderError>,
    ) {
        let mut control = self.lock_control();
        if Self::discard(&control, generation) {
            debug!(seq, "discarding delivery poll result after stop or restart");
            self.metrics
                .stale_responses_total
                .with_label_values(&["delivery"])
                .inc();
            return;
        }

        match result {
            Ok(Some(_)) if seq < control.applied_delivery_seq => {
                debug!(
                    seq,
                    applied = control.applied_delivery_seq,
                    "discarding out-of-order delivery snapshot"
                );
                self.metrics
                    .stale_responses_total
                    .with_label_values(&["delivery"])
                    .inc();
            }
            Ok(Some(delivery)) => {
                control.applied_delivery_seq = seq;
                self.snapshot_tx
                    .send_modify(|snapshot| snapshot.delivery = Some(delivery));
            }
            // A delivery that was seen once is kept through later absent reads.
            Ok(None) => {
                if self.snapshot_tx.borrow().delivery.is_some() {
                    debug!(seq, "delivery absent after being observed; keeping last snapshot");
                }
            }
            Err(err) => {
                warn!(order_id = ?control.order_id, seq, error = %err, "delivery poll failed");
            }
        }
    }

    /// Bookkeeping after a cycle. Returns `false` once the loop should exit.
    pub(crate) fn cycle_finished(&self, generation: u64) -> bool {
        let mut control = self.lock_control();
        if Self::discard(&control, generation) {
            return false;
        }

        let mut terminal = false;
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.cycles_completed += 1;
            snapshot.last_polled_at = Some(Utc::now());
            terminal = snapshot
                .order
                .as_ref()
                .is_some_and(|order| order.status.is_terminal());
        });

        if !(terminal && self.config.stop_on_terminal) {
            return true;
        }

        control.state = TrackerState::Stopped;
        control.generation += 1;
        // The loop exits on its own; aborting here would cancel the caller.
        control.task.take();
        self.snapshot_tx
            .send_modify(|snapshot| snapshot.state = TrackerState::Stopped);
        self.metrics.active_trackers.dec();
        info!(order_id = ?control.order_id, "order reached a terminal status; tracking finished");

        false
    }
}
