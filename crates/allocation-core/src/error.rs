use thiserror::Error;

/// Allocation engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Persistence substrate failure (queue or counter store)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Agent directory unreachable or returned an error
    #[error("Agent directory error: {0}")]
    Directory(String),

    /// Assignment sink rejected or failed to bind the session
    #[error("Assignment error: {0}")]
    Assignment(String),

    /// External call exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Queue entry could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AllocationError {
    /// Create a new Storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new Directory error
    pub fn directory<S: Into<String>>(msg: S) -> Self {
        Self::Directory(msg.into())
    }

    /// Create a new Assignment error
    pub fn assignment<S: Into<String>>(msg: S) -> Self {
        Self::Assignment(msg.into())
    }

    /// Create a new Timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether retrying the same operation later can succeed.
    ///
    /// Decode and configuration failures are permanent; everything that comes
    /// from a collaborator or the substrate is worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Directory(_) | Self::Assignment(_) | Self::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for AllocationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Result type for allocation operations
pub type Result<T> = std::result::Result<T, AllocationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_failures_are_transient() {
        assert!(AllocationError::storage("down").is_transient());
        assert!(AllocationError::timeout("slow").is_transient());
        assert!(!AllocationError::config("bad").is_transient());
    }

    #[test]
    fn json_errors_become_decode_errors() {
        let err: AllocationError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AllocationError::Decode(_)));
        assert!(!err.is_transient());
    }
}
