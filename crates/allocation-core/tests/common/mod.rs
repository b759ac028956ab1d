//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chat_allocation_core::prelude::*;
use chat_allocation_core::store::Decremented;
use parking_lot::Mutex;
use tokio::sync::Notify;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("chat_allocation_core=debug")
        .with_test_writer()
        .try_init();
}

/// Directory whose answer can be changed between cycles
#[derive(Default)]
pub struct ScriptedDirectory {
    agents: Mutex<Vec<AgentSnapshot>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedDirectory {
    pub fn with_agents(ids: &[&str]) -> Arc<Self> {
        let directory = Self::default();
        directory.set_agents(ids);
        Arc::new(directory)
    }

    pub fn set_agents(&self, ids: &[&str]) {
        *self.agents.lock() = ids
            .iter()
            .map(|id| AgentSnapshot::available(*id, format!("Agent {}", id)))
            .collect();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentDirectory for ScriptedDirectory {
    async fn list_available_agents(&self) -> Result<Vec<AgentSnapshot>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AllocationError::directory("directory returned 503"));
        }
        Ok(self.agents.lock().clone())
    }
}

/// Sink that records every successful bind and can reject the next N calls
#[derive(Default)]
pub struct RecordingSink {
    bindings: Mutex<Vec<(String, String)>>,
    failures_left: AtomicUsize,
    yield_before_bind: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn set_yield_before_bind(&self, yield_first: bool) {
        self.yield_before_bind.store(yield_first, Ordering::SeqCst);
    }

    pub fn bindings(&self) -> Vec<(String, String)> {
        self.bindings.lock().clone()
    }

    pub fn bound_to(&self, agent_id: &str) -> usize {
        self.bindings.lock().iter().filter(|(_, a)| a == agent_id).count()
    }
}

#[async_trait]
impl AssignmentSink for RecordingSink {
    async fn bind(&self, session_id: &str, agent_id: &str) -> Result<()> {
        if self.yield_before_bind.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let rejected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(AllocationError::assignment("assign_agent returned 500"));
        }

        self.bindings.lock().push((session_id.to_string(), agent_id.to_string()));
        Ok(())
    }
}

/// Sink that parks inside `bind` until the test opens it
#[derive(Default)]
pub struct GatedSink {
    entered: Notify,
    gate: Notify,
}

impl GatedSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Resolves once a bind call is parked at the gate
    pub async fn wait_until_binding(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl AssignmentSink for GatedSink {
    async fn bind(&self, _session_id: &str, _agent_id: &str) -> Result<()> {
        self.entered.notify_one();
        self.gate.notified().await;
        Ok(())
    }
}

/// In-memory store with switchable failures
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    queue_down: AtomicBool,
    counters_down: AtomicBool,
    health_down: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_queue_down(&self, down: bool) {
        self.queue_down.store(down, Ordering::SeqCst);
    }

    pub fn set_counters_down(&self, down: bool) {
        self.counters_down.store(down, Ordering::SeqCst);
    }

    pub fn set_health_down(&self, down: bool) {
        self.health_down.store(down, Ordering::SeqCst);
    }

    fn check_queue(&self) -> Result<()> {
        if self.queue_down.load(Ordering::SeqCst) {
            return Err(AllocationError::storage("queue backend unreachable"));
        }
        Ok(())
    }

    fn check_counters(&self) -> Result<()> {
        if self.counters_down.load(Ordering::SeqCst) {
            return Err(AllocationError::storage("counter backend unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for FlakyStore {
    async fn push_back(&self, entry: String) -> Result<()> {
        self.check_queue()?;
        self.inner.push_back(entry).await
    }

    async fn pop_front(&self) -> Result<Option<String>> {
        self.check_queue()?;
        self.inner.pop_front().await
    }

    async fn scan(&self) -> Result<Vec<String>> {
        self.check_queue()?;
        self.inner.scan().await
    }

    async fn len(&self) -> Result<usize> {
        self.check_queue()?;
        QueueStore::len(&self.inner).await
    }

    async fn health_check(&self) -> Result<()> {
        if self.health_down.load(Ordering::SeqCst) {
            return Err(AllocationError::storage("PING failed"));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<u32> {
        self.check_counters()?;
        self.inner.get(key).await
    }

    async fn increment(&self, key: &str) -> Result<u32> {
        self.check_counters()?;
        self.inner.increment(key).await
    }

    async fn decrement_above(&self, key: &str, floor: u32) -> Result<Decremented> {
        self.check_counters()?;
        self.inner.decrement_above(key, floor).await
    }

    async fn increment_if_below(&self, key: &str, ceiling: u32) -> Result<Option<u32>> {
        self.check_counters()?;
        self.inner.increment_if_below(key, ceiling).await
    }
}

pub fn config_with_ceiling(max_concurrent: u32) -> AllocationConfig {
    let mut config = AllocationConfig::default();
    config.engine.max_concurrent = max_concurrent;
    config
}

pub async fn service_on(
    store: Arc<FlakyStore>,
    config: AllocationConfig,
    directory: Arc<ScriptedDirectory>,
    sink: Arc<RecordingSink>,
) -> AllocationService {
    AllocationService::new(config, store.clone(), store, directory, sink)
        .await
        .expect("service construction")
}

pub async fn queued_ids(service: &AllocationService) -> Vec<String> {
    service
        .queued_sessions()
        .await
        .expect("queue readable")
        .into_iter()
        .map(|item| item.session_id)
        .collect()
}
