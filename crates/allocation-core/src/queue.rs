//! FIFO wait queue with duplicate suppression
//!
//! Sessions that cannot be assigned yet wait here in strict arrival order.
//! Entries are kept in the substrate as JSON documents; anything that no
//! longer decodes is dropped on the way out rather than handed to the engine.
//!
//! Duplicate detection is a linear scan of the current contents. Depth is
//! expected to stay small (bounded by online agents times their ceiling); an
//! unbounded backlog makes [`WaitQueue::contains`] the bottleneck.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::store::QueueStore;
use crate::types::{DedupeKey, EnqueueOutcome, QueueItem};

/// Ordered, deduplicated collection of pending sessions
#[derive(Clone)]
pub struct WaitQueue {
    store: Arc<dyn QueueStore>,
    discarded: Arc<AtomicU64>,
}

/// Queue statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub depth: usize,
    pub oldest_wait_seconds: u64,
    pub average_wait_seconds: u64,
}

impl WaitQueue {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            discarded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append an item at the tail.
    ///
    /// No duplicate check happens here; requeues from the dispatch loop go
    /// through this path because the item was just removed from the queue.
    pub async fn enqueue(&self, item: &QueueItem) -> Result<()> {
        let entry = serde_json::to_string(item)?;
        self.store.push_back(entry).await?;
        debug!("📥 Enqueued session {} (customer {}, channel {})",
               item.session_id, item.customer_id, item.channel);
        Ok(())
    }

    /// Append an item unless its dedupe key is already waiting
    pub async fn enqueue_unique(&self, item: &QueueItem) -> Result<EnqueueOutcome> {
        let key = item.dedupe_key();
        if self.contains(key).await? {
            info!("📞 Session {} already queued, not enqueuing again", key);
            return Ok(EnqueueOutcome::AlreadyQueued);
        }

        self.enqueue(item).await?;
        Ok(EnqueueOutcome::Queued)
    }

    /// Remove and return the head, `None` when the queue is empty.
    ///
    /// Entries that fail to decode are discarded and the next head is tried.
    pub async fn dequeue(&self) -> Result<Option<QueueItem>> {
        loop {
            let Some(entry) = self.store.pop_front().await? else {
                trace!("Wait queue empty");
                return Ok(None);
            };

            match serde_json::from_str::<QueueItem>(&entry) {
                Ok(item) => {
                    debug!("📤 Dequeued session {}", item.session_id);
                    return Ok(Some(item));
                }
                Err(e) => {
                    self.discarded.fetch_add(1, Ordering::Relaxed);
                    warn!("🗑️ Discarding malformed queue entry ({}): {}", e, entry);
                }
            }
        }
    }

    /// Whether an item with this dedupe key is currently waiting
    pub async fn contains(&self, key: DedupeKey<'_>) -> Result<bool> {
        let entries = self.store.scan().await?;
        Ok(entries
            .iter()
            .filter_map(|entry| serde_json::from_str::<QueueItem>(entry).ok())
            .any(|item| key.matches(&item)))
    }

    /// Number of waiting entries
    pub async fn size(&self) -> Result<usize> {
        self.store.len().await
    }

    /// Copy of every decodable item, head to tail. Does not remove anything.
    pub async fn drain_all(&self) -> Result<Vec<QueueItem>> {
        let entries = self.store.scan().await?;
        Ok(entries
            .iter()
            .filter_map(|entry| serde_json::from_str(entry).ok())
            .collect())
    }

    /// Malformed entries dropped by [`WaitQueue::dequeue`] since construction
    pub fn discarded_entries(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let items = self.drain_all().await?;
        let now = Utc::now();
        let waits: Vec<u64> = items
            .iter()
            .map(|item| now.signed_duration_since(item.enqueued_at).num_seconds().max(0) as u64)
            .collect();

        let (oldest, average) = if waits.is_empty() {
            (0, 0)
        } else {
            let total: u64 = waits.iter().sum();
            (waits.iter().copied().max().unwrap_or(0), total / waits.len() as u64)
        };

        Ok(QueueStats {
            depth: self.size().await?,
            oldest_wait_seconds: oldest,
            average_wait_seconds: average,
        })
    }

    pub(crate) async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }
}
