//! In-memory substrate: a locked deque plus a sharded counter map

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::{CounterStore, Decremented, QueueStore};
use crate::error::Result;

/// Process-local queue and counter store
///
/// Queue operations serialize on one mutex. Counter updates go through the
/// `DashMap` entry API, which holds the shard lock for the read-modify-write,
/// so operations on the same key are atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    queue: Mutex<VecDeque<String>>,
    counters: DashMap<String, u32>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn push_back(&self, entry: String) -> Result<()> {
        self.queue.lock().push_back(entry);
        Ok(())
    }

    async fn pop_front(&self) -> Result<Option<String>> {
        Ok(self.queue.lock().pop_front())
    }

    async fn scan(&self) -> Result<Vec<String>> {
        Ok(self.queue.lock().iter().cloned().collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.queue.lock().len())
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<u32> {
        Ok(self.counters.get(key).map(|v| *v).unwrap_or(0))
    }

    async fn increment(&self, key: &str) -> Result<u32> {
        let mut value = self.counters.entry(key.to_string()).or_insert(0);
        *value = value.saturating_add(1);
        Ok(*value)
    }

    async fn decrement_above(&self, key: &str, floor: u32) -> Result<Decremented> {
        match self.counters.get_mut(key) {
            Some(mut value) if *value > floor => {
                *value -= 1;
                Ok(Decremented { value: *value, clamped: false })
            }
            Some(value) => Ok(Decremented { value: *value, clamped: true }),
            None => Ok(Decremented { value: 0, clamped: true }),
        }
    }

    async fn increment_if_below(&self, key: &str, ceiling: u32) -> Result<Option<u32>> {
        let mut value = self.counters.entry(key.to_string()).or_insert(0);
        if *value < ceiling {
            *value += 1;
            Ok(Some(*value))
        } else {
            Ok(None)
        }
    }
}
