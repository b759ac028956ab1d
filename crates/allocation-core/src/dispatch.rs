//! Dispatch loop
//!
//! Pulls sessions off the wait queue one at a time and hands each to the
//! allocation engine. When the queue is empty, or the session just taken could
//! not be assigned and went back to the queue, the loop sleeps for the idle
//! interval; nothing wakes it early except cancellation.
//!
//! ```text
//!            ┌──────── assigned ────────┐
//!            ▼                          │
//!   Running ──dequeue──▶ Draining ──────┘
//!      ▲        │            │
//!      │   empty / error  requeued
//!      │        ▼            │
//!      └──── PollingIdle ◀───┘   (sleep, cancellable)
//!
//!   cancel (top of cycle or during sleep) ──▶ Stopped
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::allocation::AllocationEngine;
use crate::types::{AssignmentOutcome, AssignmentStatus};

/// Observable state of the dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Between cycles, about to dequeue
    Running,
    /// An item was dequeued and is being allocated
    Draining,
    /// Queue was empty, waiting for the idle interval
    PollingIdle,
    /// Cancelled; the loop has returned
    Stopped,
}

/// Running totals kept by the loop
#[derive(Debug, Default)]
struct DispatchStats {
    cycles: AtomicU64,
    idle_polls: AtomicU64,
    dequeue_errors: AtomicU64,
    assigned: AtomicU64,
    requeued: AtomicU64,
    no_agents_online: AtomicU64,
    no_capacity: AtomicU64,
}

/// Point-in-time copy of the loop counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispatchCounters {
    pub cycles: u64,
    pub idle_polls: u64,
    pub dequeue_errors: u64,
    pub assigned: u64,
    pub requeued: u64,
    pub no_agents_online: u64,
    pub no_capacity: u64,
    pub discarded: u64,
}

impl DispatchStats {
    fn record(&self, status: AssignmentStatus) {
        let counter = match status {
            AssignmentStatus::Assigned => &self.assigned,
            AssignmentStatus::Requeued => &self.requeued,
            AssignmentStatus::NoAgentsOnline => &self.no_agents_online,
            AssignmentStatus::NoCapacity => &self.no_capacity,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, discarded: u64) -> DispatchCounters {
        DispatchCounters {
            cycles: self.cycles.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
            dequeue_errors: self.dequeue_errors.load(Ordering::Relaxed),
            assigned: self.assigned.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            no_agents_online: self.no_agents_online.load(Ordering::Relaxed),
            no_capacity: self.no_capacity.load(Ordering::Relaxed),
            discarded,
        }
    }
}

/// Single-consumer loop driving the allocation engine
pub struct DispatchLoop {
    engine: Arc<AllocationEngine>,
    idle_interval: Duration,
    state: watch::Sender<DispatchState>,
    stats: DispatchStats,
}

impl DispatchLoop {
    pub fn new(engine: Arc<AllocationEngine>, idle_interval: Duration) -> Self {
        let (state, _) = watch::channel(DispatchState::Stopped);
        Self {
            engine,
            idle_interval,
            state,
            stats: DispatchStats::default(),
        }
    }

    /// Subscribe to state transitions
    pub fn subscribe(&self) -> watch::Receiver<DispatchState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> DispatchState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> DispatchCounters {
        self.stats.snapshot(self.engine.queue().discarded_entries())
    }

    /// Run until `cancel` fires.
    ///
    /// Only an assignment starts the next cycle straight away. An empty queue,
    /// a queue read error and every requeued outcome wait out the idle
    /// interval first.
    ///
    /// Cancellation is checked before every dequeue and raced against the idle
    /// sleep. An allocation already in progress always runs to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("🚀 Dispatch loop started (idle interval {:?}, max {} sessions per agent)",
              self.idle_interval, self.engine.max_concurrent());

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_once().await {
                Some(outcome) if outcome.status.is_assigned() => continue,
                Some(outcome) => {
                    debug!("⏳ Session {} {}, backing off for {:?}",
                           outcome.session_id, outcome.status, self.idle_interval);
                }
                None => {}
            }

            self.set_state(DispatchState::PollingIdle);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.idle_interval) => {}
            }
        }

        self.set_state(DispatchState::Stopped);
        info!("🛑 Dispatch loop stopped");
    }

    /// One cycle without the idle wait.
    ///
    /// Returns `None` when there was nothing to allocate, including when the
    /// queue could not be read.
    pub async fn run_once(&self) -> Option<AssignmentOutcome> {
        self.set_state(DispatchState::Running);
        self.stats.cycles.fetch_add(1, Ordering::Relaxed);

        let item = match self.engine.queue().dequeue().await {
            Ok(Some(item)) => item,
            Ok(None) => {
                trace!("Queue empty, idling");
                self.stats.idle_polls.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                error!("Failed to dequeue: {}", e);
                self.stats.dequeue_errors.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        self.set_state(DispatchState::Draining);
        let outcome = self.engine.allocate(item).await;
        self.stats.record(outcome.status);
        debug!("Cycle finished: session {} {}", outcome.session_id, outcome.status);

        Some(outcome)
    }

    fn set_state(&self, state: DispatchState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            trace!("Dispatch state {:?} -> {:?}", previous, state);
        }
    }
}
