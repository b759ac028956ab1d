//! Allocation engine: match one waiting session to one agent
//!
//! For every dequeued session the engine runs the same fixed sequence:
//!
//! ```text
//!   directory ──err/timeout──────────────▶ Requeued
//!      │
//!      ├──empty────────────────────────▶ NoAgentsOnline
//!      ▼
//!   reserve slot (increment-if-below)
//!      ├──every agent full─────────────▶ NoCapacity
//!      ▼
//!   sink.bind ──err/timeout──▶ release slot ──▶ Requeued
//!      │
//!      ▼
//!   Assigned
//! ```
//!
//! Every non-assigned outcome puts the session back at the tail of the wait
//! queue, so it loses its original position.
//!
//! The slot is taken with an atomic increment-if-below-ceiling before the
//! sink is called and given back if the bind fails, so an agent cannot be
//! pushed past the ceiling by another dispatcher checking the same counter at
//! the same time.
//!
//! While a bind is in flight the engine remembers the reserved slot. A
//! resolution arriving in that window can only release slots of sessions that
//! were already bound; it never takes the reserved one. A stale or duplicate
//! resolution therefore leaves the counter where "increment after a successful
//! bind" would. Reservations are process local: a second engine sharing the
//! same counter store does not see them.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use crate::capacity::CapacityTracker;
use crate::config::{EngineConfig, SelectionPolicy};
use crate::error::{AllocationError, Result};
use crate::integration::{AgentDirectory, AssignmentSink};
use crate::queue::WaitQueue;
use crate::types::{AgentSnapshot, AssignmentOutcome, AssignmentStatus, QueueItem};

/// Decides and executes the assignment of a single session
pub struct AllocationEngine {
    queue: WaitQueue,
    capacity: CapacityTracker,
    directory: Arc<dyn AgentDirectory>,
    sink: Arc<dyn AssignmentSink>,
    config: EngineConfig,
    /// Slots taken per agent whose bind has not returned yet
    in_flight: DashMap<String, u32>,
}

/// Marks one reserved slot as in flight until dropped
struct InFlight<'a> {
    slots: &'a DashMap<String, u32>,
    agent_id: String,
}

impl<'a> InFlight<'a> {
    fn hold(slots: &'a DashMap<String, u32>, agent_id: &str) -> Self {
        *slots.entry(agent_id.to_string()).or_insert(0) += 1;
        Self { slots, agent_id: agent_id.to_string() }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.slots.remove_if_mut(&self.agent_id, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }
}

impl AllocationEngine {
    pub fn new(
        queue: WaitQueue,
        capacity: CapacityTracker,
        directory: Arc<dyn AgentDirectory>,
        sink: Arc<dyn AssignmentSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            queue,
            capacity,
            directory,
            sink,
            config,
            in_flight: DashMap::new(),
        }
    }

    pub fn max_concurrent(&self) -> u32 {
        self.config.max_concurrent
    }

    pub fn queue(&self) -> &WaitQueue {
        &self.queue
    }

    pub fn capacity(&self) -> &CapacityTracker {
        &self.capacity
    }

    /// Try to assign `item` to an agent, requeueing it on every failure path.
    ///
    /// Never returns an error: collaborator and storage failures are logged
    /// and turned into a requeue.
    pub async fn allocate(&self, item: QueueItem) -> AssignmentOutcome {
        let agents = match self.fetch_agents().await {
            Ok(agents) => agents,
            Err(e) => {
                warn!("📒 Agent directory unavailable for session {}: {}", item.session_id, e);
                return self.requeue(item, AssignmentStatus::Requeued).await;
            }
        };

        if agents.is_empty() {
            info!("😴 No agents online for session {}", item.session_id);
            return self.requeue(item, AssignmentStatus::NoAgentsOnline).await;
        }

        let (agent, _in_flight) = match self.reserve_agent(&agents).await {
            Ok(Some(reserved)) => reserved,
            Ok(None) => {
                info!("🚦 All {} online agents at capacity ({}) for session {}",
                      agents.len(), self.config.max_concurrent, item.session_id);
                return self.requeue(item, AssignmentStatus::NoCapacity).await;
            }
            Err(e) => {
                warn!("🧮 Capacity store unavailable for session {}: {}", item.session_id, e);
                return self.requeue(item, AssignmentStatus::Requeued).await;
            }
        };

        match self.bind(&item.session_id, &agent.agent_id).await {
            Ok(()) => {
                info!("✅ Assigned session {} (customer {}) to agent {} ({})",
                      item.session_id, item.customer_id, agent.agent_id, agent.display_name);
                AssignmentOutcome::assigned(item.session_id, agent.agent_id)
            }
            Err(e) => {
                warn!("❌ Failed to bind session {} to agent {}: {}",
                      item.session_id, agent.agent_id, e);
                self.release_reservation(&agent.agent_id).await;
                self.requeue(item, AssignmentStatus::Requeued).await
            }
        }
    }

    /// Give back one slot after an external "session resolved" event.
    ///
    /// Idempotent at zero, so duplicate notifications are harmless. Slots
    /// reserved for binds still in flight are never released.
    pub async fn release_session(&self, agent_id: &str) -> Result<u32> {
        let reserved = self.in_flight_slots(agent_id);
        let value = self.capacity.decrement_above(agent_id, reserved).await?;
        info!("🔓 Session resolved for agent {} (capacity now {})", agent_id, value);
        Ok(value)
    }

    async fn fetch_agents(&self) -> Result<Vec<AgentSnapshot>> {
        let agents = with_timeout(
            self.config.directory_timeout(),
            "agent directory",
            self.directory.list_available_agents(),
        )
        .await?;

        let total = agents.len();
        let available: Vec<AgentSnapshot> = agents.into_iter().filter(|a| a.is_available).collect();
        debug!("📒 Directory returned {} agents ({} available)", total, available.len());
        Ok(available)
    }

    /// Reserved slots on `agent_id` whose bind has not returned
    pub fn in_flight_slots(&self, agent_id: &str) -> u32 {
        self.in_flight.get(agent_id).map(|count| *count).unwrap_or(0)
    }

    /// Reserve a slot on the first eligible agent according to the policy
    async fn reserve_agent(&self, agents: &[AgentSnapshot]) -> Result<Option<(AgentSnapshot, InFlight<'_>)>> {
        let ceiling = self.config.max_concurrent;

        let candidates: Vec<&AgentSnapshot> = match self.config.selection_policy {
            SelectionPolicy::FirstFit => agents.iter().collect(),
            SelectionPolicy::LeastLoaded => {
                let mut loads = Vec::with_capacity(agents.len());
                for agent in agents {
                    loads.push((self.capacity.get(&agent.agent_id).await?, agent));
                }
                // Stable sort keeps directory order among equally loaded agents
                loads.sort_by_key(|(load, _)| *load);
                loads.into_iter().map(|(_, agent)| agent).collect()
            }
        };

        for agent in candidates {
            if self.capacity.try_acquire(&agent.agent_id, ceiling).await? {
                let held = InFlight::hold(&self.in_flight, &agent.agent_id);
                return Ok(Some((agent.clone(), held)));
            }
            debug!("Agent {} at capacity, trying next", agent.agent_id);
        }

        Ok(None)
    }

    async fn bind(&self, session_id: &str, agent_id: &str) -> Result<()> {
        with_timeout(
            self.config.assignment_timeout(),
            "assignment sink",
            self.sink.bind(session_id, agent_id),
        )
        .await
    }

    async fn release_reservation(&self, agent_id: &str) {
        if let Err(e) = self.capacity.decrement(agent_id).await {
            // The reserved slot stays counted although nothing is bound to it.
            error!("🚨 Failed to release reserved slot on agent {}: {} (counter is now one too high)",
                   agent_id, e);
        }
    }

    async fn requeue(&self, item: QueueItem, status: AssignmentStatus) -> AssignmentOutcome {
        let session_id = item.session_id.clone();
        match self.queue.enqueue(&item).await {
            Ok(()) => debug!("🔁 Session {} requeued at tail ({})", session_id, status),
            Err(e) => error!("🚨 Failed to requeue session {} after {}: {} (session dropped)",
                             session_id, status, e),
        }
        AssignmentOutcome::waiting(status, session_id)
    }
}

async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AllocationError::timeout(format!("{} did not answer within {:?}", what, limit))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use crate::store::InMemoryStore;

    struct FixedDirectory(Vec<AgentSnapshot>);

    #[async_trait]
    impl AgentDirectory for FixedDirectory {
        async fn list_available_agents(&self) -> Result<Vec<AgentSnapshot>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        bound: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl AssignmentSink for RecordingSink {
        async fn bind(&self, session_id: &str, agent_id: &str) -> Result<()> {
            if self.fail {
                return Err(AllocationError::assignment("rejected"));
            }
            self.bound.lock().push((session_id.to_string(), agent_id.to_string()));
            Ok(())
        }
    }

    fn engine(agents: Vec<AgentSnapshot>, sink: Arc<RecordingSink>, config: EngineConfig) -> AllocationEngine {
        let store = Arc::new(InMemoryStore::new());
        AllocationEngine::new(
            WaitQueue::new(store.clone()),
            CapacityTracker::new(store),
            Arc::new(FixedDirectory(agents)),
            sink,
            config,
        )
    }

    #[tokio::test]
    async fn first_fit_prefers_directory_order() {
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(
            vec![AgentSnapshot::available("a1", "Ana"), AgentSnapshot::available("a2", "Ben")],
            sink.clone(),
            EngineConfig::default(),
        );

        let outcome = engine.allocate(QueueItem::new("s1", "c1", "wa")).await;
        assert_eq!(outcome, AssignmentOutcome::assigned("s1", "a1"));
        let outcome = engine.allocate(QueueItem::new("s2", "c2", "wa")).await;
        assert_eq!(outcome.agent_id.as_deref(), Some("a1"));
        let outcome = engine.allocate(QueueItem::new("s3", "c3", "wa")).await;
        assert_eq!(outcome.agent_id.as_deref(), Some("a2"));

        assert_eq!(engine.capacity().get("a1").await.unwrap(), 2);
        assert_eq!(engine.capacity().get("a2").await.unwrap(), 1);
        assert_eq!(sink.bound.lock().len(), 3);
    }

    #[tokio::test]
    async fn least_loaded_spreads_sessions() {
        let sink = Arc::new(RecordingSink::default());
        let config = EngineConfig {
            selection_policy: SelectionPolicy::LeastLoaded,
            ..EngineConfig::default()
        };
        let engine = engine(
            vec![AgentSnapshot::available("a1", "Ana"), AgentSnapshot::available("a2", "Ben")],
            sink,
            config,
        );

        engine.allocate(QueueItem::new("s1", "c1", "wa")).await;
        let second = engine.allocate(QueueItem::new("s2", "c2", "wa")).await;

        assert_eq!(second.agent_id.as_deref(), Some("a2"));
    }

    #[tokio::test]
    async fn unavailable_snapshots_are_ignored() {
        let sink = Arc::new(RecordingSink::default());
        let mut away = AgentSnapshot::available("a1", "Ana");
        away.is_available = false;
        let engine = engine(vec![away], sink, EngineConfig::default());

        let outcome = engine.allocate(QueueItem::new("s1", "c1", "wa")).await;
        assert_eq!(outcome.status, AssignmentStatus::NoAgentsOnline);
        assert_eq!(engine.queue().size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn sink_failure_leaves_counter_untouched() {
        let sink = Arc::new(RecordingSink { fail: true, ..Default::default() });
        let engine = engine(vec![AgentSnapshot::available("a1", "Ana")], sink, EngineConfig::default());

        let outcome = engine.allocate(QueueItem::new("s1", "c1", "wa")).await;

        assert_eq!(outcome.status, AssignmentStatus::Requeued);
        assert_eq!(outcome.agent_id, None);
        assert_eq!(engine.capacity().get("a1").await.unwrap(), 0);
        let queued = engine.queue().drain_all().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].session_id, "s1");
    }
}
