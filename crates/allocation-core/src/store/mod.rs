//! Persistence substrate primitives
//!
//! The wait queue and the capacity tracker never touch a concrete store; they
//! go through the two traits below. Any ordered-list plus keyed-counter backend
//! satisfies them. [`InMemoryStore`] is the bundled implementation.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::InMemoryStore;

/// Ordered list of encoded queue entries
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append an entry at the tail
    async fn push_back(&self, entry: String) -> Result<()>;

    /// Remove and return the head, `None` when empty
    async fn pop_front(&self) -> Result<Option<String>>;

    /// Read every entry head to tail without removing anything
    async fn scan(&self) -> Result<Vec<String>>;

    /// Number of entries currently stored
    async fn len(&self) -> Result<usize>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Result of a clamped decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decremented {
    /// Counter value after the operation
    pub value: u32,
    /// True when the counter was already at its floor and nothing changed
    pub clamped: bool,
}

/// Keyed non-negative counters with per-key atomic updates
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value, zero for unknown keys
    async fn get(&self, key: &str) -> Result<u32>;

    /// Atomic `+1`, returns the new value
    async fn increment(&self, key: &str) -> Result<u32>;

    /// Atomic `-1` that never goes below zero
    async fn decrement_clamped(&self, key: &str) -> Result<Decremented> {
        self.decrement_above(key, 0).await
    }

    /// Atomic `-1` that never goes below `floor`
    async fn decrement_above(&self, key: &str, floor: u32) -> Result<Decremented>;

    /// Atomic `+1` only while the value is below `ceiling`.
    ///
    /// Returns the new value on success, `None` when the counter was already
    /// at or above the ceiling.
    async fn increment_if_below(&self, key: &str, ceiling: u32) -> Result<Option<u32>>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
