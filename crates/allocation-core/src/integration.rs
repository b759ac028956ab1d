//! Interfaces to the external systems the engine depends on
//!
//! Both collaborators live outside this process and may be slow, stale or
//! down. The engine wraps every call in a timeout and treats any failure as a
//! reason to requeue.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::AgentSnapshot;

/// Read-only source of currently available agents
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Agents in stable directory order. Availability is taken as given.
    async fn list_available_agents(&self) -> Result<Vec<AgentSnapshot>>;
}

/// System of record that binds a session to an agent
#[async_trait]
pub trait AssignmentSink: Send + Sync {
    async fn bind(&self, session_id: &str, agent_id: &str) -> Result<()>;
}
