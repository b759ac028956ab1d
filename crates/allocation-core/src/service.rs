//! Allocation service facade
//!
//! Owns the wait queue, capacity tracker, engine and dispatch loop, and exposes
//! the operations a host process needs: ingress, resolution, the loop itself
//! and read-only inspection.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::allocation::AllocationEngine;
use crate::capacity::CapacityTracker;
use crate::config::AllocationConfig;
use crate::dispatch::{DispatchCounters, DispatchLoop, DispatchState};
use crate::error::Result;
use crate::integration::{AgentDirectory, AssignmentSink};
use crate::queue::{QueueStats, WaitQueue};
use crate::store::{CounterStore, InMemoryStore, QueueStore};
use crate::types::{AssignmentOutcome, EnqueueOutcome, QueueItem};

/// Entry point for hosting the allocation engine
pub struct AllocationService {
    config: AllocationConfig,
    queue: WaitQueue,
    capacity: CapacityTracker,
    engine: Arc<AllocationEngine>,
    dispatcher: DispatchLoop,
}

impl AllocationService {
    /// Build the service on top of the given substrate and collaborators.
    ///
    /// Fails if the configuration is invalid or either store does not pass its
    /// health check; the engine never starts against an unreachable substrate.
    pub async fn new(
        config: AllocationConfig,
        queue_store: Arc<dyn QueueStore>,
        counter_store: Arc<dyn CounterStore>,
        directory: Arc<dyn AgentDirectory>,
        sink: Arc<dyn AssignmentSink>,
    ) -> Result<Self> {
        config.validate()?;

        let queue = WaitQueue::new(queue_store);
        let capacity = CapacityTracker::new(counter_store);

        if let Err(e) = queue.health_check().await {
            error!("❌ Queue store unavailable at startup: {}", e);
            return Err(e);
        }
        if let Err(e) = capacity.health_check().await {
            error!("❌ Counter store unavailable at startup: {}", e);
            return Err(e);
        }

        let engine = Arc::new(AllocationEngine::new(
            queue.clone(),
            capacity.clone(),
            directory,
            sink,
            config.engine.clone(),
        ));
        let dispatcher = DispatchLoop::new(engine.clone(), config.dispatch.idle_interval());

        info!("✅ Allocation service ready (max_concurrent={}, policy={:?})",
              config.engine.max_concurrent, config.engine.selection_policy);

        Ok(Self {
            config,
            queue,
            capacity,
            engine,
            dispatcher,
        })
    }

    /// Build the service on a fresh process-local substrate
    pub async fn in_memory(
        config: AllocationConfig,
        directory: Arc<dyn AgentDirectory>,
        sink: Arc<dyn AssignmentSink>,
    ) -> Result<Self> {
        let store = Arc::new(InMemoryStore::new());
        Self::new(config, store.clone(), store, directory, sink).await
    }

    /// Add a session to the wait queue unless it is already waiting
    pub async fn enqueue_session(&self, item: QueueItem) -> Result<EnqueueOutcome> {
        let outcome = self.queue.enqueue_unique(&item).await?;
        if outcome == EnqueueOutcome::Queued {
            info!("📥 Session {} queued (customer {}, channel {})",
                  item.session_id, item.customer_id, item.channel);
        }
        Ok(outcome)
    }

    /// Release one slot on the agent that handled a resolved session
    pub async fn notify_session_resolved(&self, agent_id: &str) -> Result<()> {
        self.engine.release_session(agent_id).await.map(|_| ())
    }

    /// Run the dispatch loop until `cancel` fires
    pub async fn run_dispatch_loop(&self, cancel: CancellationToken) {
        self.dispatcher.run(cancel).await
    }

    /// Run a single dispatch cycle without idling
    pub async fn dispatch_once(&self) -> Option<AssignmentOutcome> {
        self.dispatcher.run_once().await
    }

    pub async fn inspect_queue_depth(&self) -> Result<usize> {
        self.queue.size().await
    }

    pub async fn inspect_agent_capacity(&self, agent_id: &str) -> Result<u32> {
        self.capacity.get(agent_id).await
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        self.queue.stats().await
    }

    /// Waiting sessions, head to tail
    pub async fn queued_sessions(&self) -> Result<Vec<QueueItem>> {
        self.queue.drain_all().await
    }

    /// Probe both stores
    pub async fn health_check(&self) -> Result<()> {
        self.queue.health_check().await?;
        self.capacity.health_check().await
    }

    pub fn dispatch_state(&self) -> DispatchState {
        self.dispatcher.state()
    }

    pub fn subscribe_dispatch_state(&self) -> watch::Receiver<DispatchState> {
        self.dispatcher.subscribe()
    }

    pub fn dispatch_stats(&self) -> DispatchCounters {
        self.dispatcher.stats()
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }
}
