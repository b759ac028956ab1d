//! Per-agent active session counters
//!
//! The tracker only guarantees that a counter never goes negative. The
//! ceiling is engine policy and is passed in by the caller of
//! [`CapacityTracker::try_acquire`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::store::CounterStore;

/// Keyed counter of sessions bound to each agent
#[derive(Clone)]
pub struct CapacityTracker {
    store: Arc<dyn CounterStore>,
}

impl CapacityTracker {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Sessions currently bound to the agent, 0 for an unknown agent
    pub async fn get(&self, agent_id: &str) -> Result<u32> {
        self.store.get(agent_id).await
    }

    /// Atomic `+1` with no upper bound
    pub async fn increment(&self, agent_id: &str) -> Result<u32> {
        let value = self.store.increment(agent_id).await?;
        debug!("➕ Agent {} capacity now {}", agent_id, value);
        Ok(value)
    }

    /// Atomic `-1`, clamped at zero.
    ///
    /// A decrement at zero is a duplicate or out-of-order resolution; it is
    /// logged and otherwise ignored.
    pub async fn decrement(&self, agent_id: &str) -> Result<u32> {
        let result = self.store.decrement_clamped(agent_id).await?;
        if result.clamped {
            warn!("🧮 Agent {} capacity already 0, ignoring decrement", agent_id);
        } else {
            debug!("➖ Agent {} capacity now {}", agent_id, result.value);
        }
        Ok(result.value)
    }

    /// Atomic `-1` that leaves at least `floor` sessions counted.
    ///
    /// A decrement that would go below the floor is ignored like one at zero.
    pub async fn decrement_above(&self, agent_id: &str, floor: u32) -> Result<u32> {
        let result = self.store.decrement_above(agent_id, floor).await?;
        if result.clamped {
            warn!("🧮 Agent {} capacity {} with {} slot(s) reserved, ignoring decrement",
                  agent_id, result.value, floor);
        } else {
            debug!("➖ Agent {} capacity now {}", agent_id, result.value);
        }
        Ok(result.value)
    }

    /// Take one slot if the agent is below `ceiling`.
    ///
    /// Returns false without changing anything when the agent is full.
    pub async fn try_acquire(&self, agent_id: &str, ceiling: u32) -> Result<bool> {
        match self.store.increment_if_below(agent_id, ceiling).await? {
            Some(value) => {
                debug!("🔒 Reserved slot on agent {} ({}/{})", agent_id, value, ceiling);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }
}
