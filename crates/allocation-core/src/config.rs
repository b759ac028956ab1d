use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, Result};

/// Default per-agent session ceiling
pub const DEFAULT_MAX_CONCURRENT: u32 = 2;

/// Allocation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AllocationConfig {
    /// Agent selection and collaborator timeouts
    pub engine: EngineConfig,

    /// Dispatch loop pacing
    pub dispatch: DispatchConfig,
}

/// Allocation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum concurrent sessions per agent
    pub max_concurrent: u32,

    /// How an eligible agent is picked from the directory listing
    pub selection_policy: SelectionPolicy,

    /// Agent directory call timeout (milliseconds)
    pub directory_timeout_ms: u64,

    /// Assignment sink call timeout (milliseconds)
    pub assignment_timeout_ms: u64,
}

/// Agent selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First agent in directory order with spare capacity
    FirstFit,
    /// Agent with the lowest counter; ties keep directory order
    LeastLoaded,
}

/// Dispatch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Wait between polls when the queue is empty (milliseconds)
    pub idle_interval_ms: u64,
}

impl AllocationConfig {
    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_concurrent == 0 {
            return Err(AllocationError::config("max_concurrent must be greater than 0"));
        }

        if self.engine.directory_timeout_ms == 0 {
            return Err(AllocationError::config("directory_timeout_ms must be greater than 0"));
        }

        if self.engine.assignment_timeout_ms == 0 {
            return Err(AllocationError::config("assignment_timeout_ms must be greater than 0"));
        }

        if self.dispatch.idle_interval_ms == 0 {
            return Err(AllocationError::config(
                "idle_interval_ms must be greater than 0 (the loop would spin)",
            ));
        }

        Ok(())
    }
}

impl EngineConfig {
    pub fn directory_timeout(&self) -> Duration {
        Duration::from_millis(self.directory_timeout_ms)
    }

    pub fn assignment_timeout(&self) -> Duration {
        Duration::from_millis(self.assignment_timeout_ms)
    }
}

impl DispatchConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            selection_policy: SelectionPolicy::FirstFit,
            directory_timeout_ms: 10_000, // 10 seconds
            assignment_timeout_ms: 10_000, // 10 seconds
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            idle_interval_ms: 5_000, // 5 seconds
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AllocationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.max_concurrent, 2);
        assert_eq!(config.engine.selection_policy, SelectionPolicy::FirstFit);
        assert_eq!(config.dispatch.idle_interval(), Duration::from_secs(5));
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        let mut config = AllocationConfig::default();
        config.engine.max_concurrent = 0;
        assert!(matches!(config.validate(), Err(AllocationError::Config(_))));
    }

    #[test]
    fn zero_idle_interval_is_rejected() {
        let mut config = AllocationConfig::default();
        config.dispatch.idle_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_document_falls_back_to_defaults() {
        let config: AllocationConfig = serde_json::from_str(
            r#"{"engine": {"max_concurrent": 3, "selection_policy": "least_loaded"}}"#,
        )
        .unwrap();

        assert_eq!(config.engine.max_concurrent, 3);
        assert_eq!(config.engine.selection_policy, SelectionPolicy::LeastLoaded);
        assert_eq!(config.engine.directory_timeout_ms, 10_000);
        assert_eq!(config.dispatch.idle_interval_ms, 5_000);
    }
}
