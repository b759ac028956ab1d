//! Shared value types for the allocation engine

use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat session waiting for an agent
///
/// The serialized form is what the wait queue keeps in its substrate, so the
/// field names follow the upstream webhook vocabulary (`room_id`, `timestamp`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(rename = "room_id")]
    pub session_id: String,
    pub customer_id: String,
    pub channel: String,
    #[serde(rename = "timestamp")]
    pub enqueued_at: DateTime<Utc>,
}

impl QueueItem {
    /// Create an item stamped with the current time
    pub fn new(
        session_id: impl Into<String>,
        customer_id: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            customer_id: customer_id.into(),
            channel: channel.into(),
            enqueued_at: Utc::now(),
        }
    }

    pub fn dedupe_key(&self) -> DedupeKey<'_> {
        DedupeKey {
            session_id: &self.session_id,
            channel: &self.channel,
            customer_id: &self.customer_id,
        }
    }
}

/// Identity of a queued session for duplicate suppression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupeKey<'a> {
    pub session_id: &'a str,
    pub channel: &'a str,
    pub customer_id: &'a str,
}

impl<'a> DedupeKey<'a> {
    pub fn new(session_id: &'a str, channel: &'a str, customer_id: &'a str) -> Self {
        Self { session_id, channel, customer_id }
    }

    pub fn matches(&self, item: &QueueItem) -> bool {
        item.dedupe_key() == *self
    }
}

impl fmt::Display for DedupeKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.session_id, self.channel, self.customer_id)
    }
}

/// Point-in-time view of one agent from the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub display_name: String,
    pub is_available: bool,
}

impl AgentSnapshot {
    pub fn available(agent_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            display_name: display_name.into(),
            is_available: true,
        }
    }
}

/// Result category of one allocation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Session bound to an agent and counted
    Assigned,
    /// A collaborator failed; session went back to the tail
    Requeued,
    /// Directory returned no agents; session went back to the tail
    NoAgentsOnline,
    /// Every listed agent is at the ceiling; session went back to the tail
    NoCapacity,
}

impl AssignmentStatus {
    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Assigned => "assigned",
            Self::Requeued => "requeued",
            Self::NoAgentsOnline => "no_agents_online",
            Self::NoCapacity => "no_capacity",
        };
        f.write_str(s)
    }
}

/// Outcome of one allocation engine invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentOutcome {
    pub status: AssignmentStatus,
    pub session_id: String,
    pub agent_id: Option<String>,
}

impl AssignmentOutcome {
    pub fn assigned(session_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            status: AssignmentStatus::Assigned,
            session_id: session_id.into(),
            agent_id: Some(agent_id.into()),
        }
    }

    pub fn waiting(status: AssignmentStatus, session_id: impl Into<String>) -> Self {
        Self {
            status,
            session_id: session_id.into(),
            agent_id: None,
        }
    }
}

/// What happened to an enqueue request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    Queued,
    AlreadyQueued,
}
