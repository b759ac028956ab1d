//! # Chat Session Allocation Engine
//!
//! This crate routes customer chat sessions to human agents. Sessions wait in a
//! FIFO queue with duplicate suppression; a single dispatch loop pulls them off
//! one at a time and binds each to an agent that is below its concurrent
//! session ceiling.
//!
//! ## Architecture
//!
//! - [`queue`]: FIFO wait queue with dedupe on `(session, channel, customer)`
//! - [`capacity`]: per-agent active session counters, never negative
//! - [`allocation`]: selects an agent and executes the bind, requeueing on failure
//! - [`dispatch`]: cancellable loop that drives the engine
//! - [`integration`]: traits for the external agent directory and assignment sink
//! - [`store`]: persistence substrate traits and the in-memory backend
//! - [`service`]: facade wiring everything together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chat_allocation_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(directory: Arc<dyn AgentDirectory>, sink: Arc<dyn AssignmentSink>) -> Result<()> {
//! let service = Arc::new(
//!     AllocationService::in_memory(AllocationConfig::default(), directory, sink).await?,
//! );
//!
//! service.enqueue_session(QueueItem::new("room-1", "alice@example.com", "wa")).await?;
//!
//! let cancel = CancellationToken::new();
//! let runner = service.clone();
//! let handle = tokio::spawn({
//!     let cancel = cancel.clone();
//!     async move { runner.run_dispatch_loop(cancel).await }
//! });
//!
//! cancel.cancel();
//! handle.await.ok();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod config;
pub mod types;

pub mod store;
pub mod queue;
pub mod capacity;
pub mod integration;
pub mod allocation;
pub mod dispatch;
pub mod service;

pub use error::{AllocationError, Result};
pub use config::AllocationConfig;
pub use service::AllocationService;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{AllocationConfig, AllocationError, AllocationService, Result};

    pub use crate::config::{DispatchConfig, EngineConfig, SelectionPolicy, DEFAULT_MAX_CONCURRENT};

    pub use crate::types::{
        AgentSnapshot, AssignmentOutcome, AssignmentStatus, DedupeKey, EnqueueOutcome, QueueItem,
    };

    pub use crate::queue::{QueueStats, WaitQueue};
    pub use crate::capacity::CapacityTracker;
    pub use crate::allocation::AllocationEngine;
    pub use crate::dispatch::{DispatchCounters, DispatchLoop, DispatchState};
    pub use crate::integration::{AgentDirectory, AssignmentSink};
    pub use crate::store::{CounterStore, InMemoryStore, QueueStore};

    pub use async_trait::async_trait;
    pub use tokio_util::sync::CancellationToken;
}
