//! Error types for configuration loading and driven mutations
//!
//! The optimistic operations themselves never fail: unknown ids, timeouts and
//! exhausted retries all resolve into a terminal update state. Errors only
//! surface where the caller asks for something that can genuinely fail, such
//! as reading a configuration file or awaiting a full mutation cycle.

use std::fmt;

use crate::cache::optimistic::types::UpdateId;

/// Recovery hint attached to an [`OptimistError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryHint {
    /// Issue the mutation again from scratch
    Retry,
    /// Refetch authoritative data; the optimistic value is gone
    Refetch,
    /// Fix the configuration and rebuild the manager
    Reconfigure,
    /// Nothing the caller can do
    Fatal,
}

/// Error type for the optimist crate
#[derive(Debug)]
pub enum OptimistError {
    /// Configuration values are inconsistent
    InvalidConfiguration(String),
    /// Configuration file could not be read
    Io(std::io::Error),
    /// JSON configuration could not be parsed
    Json(serde_json::Error),
    /// TOML configuration could not be parsed
    Toml(toml::de::Error),
    /// The mutation kept failing and the update was rolled back
    MutationFailed {
        id: UpdateId,
        attempts: u32,
        message: String,
    },
    /// Retries are exhausted but rollback is disabled, so the update is still pending
    RetriesExhausted { id: UpdateId, attempts: u32 },
    /// The update reached a terminal state (timeout or external rollback) before
    /// the mutation settled
    UpdateNotPending(UpdateId),
}

impl fmt::Display for OptimistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimistError::InvalidConfiguration(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
            OptimistError::Io(e) => write!(f, "I/O error: {}", e),
            OptimistError::Json(e) => write!(f, "JSON error: {}", e),
            OptimistError::Toml(e) => write!(f, "TOML error: {}", e),
            OptimistError::MutationFailed {
                id,
                attempts,
                message,
            } => write!(
                f,
                "Update {} rolled back after {} attempts: {}",
                id, attempts, message
            ),
            OptimistError::RetriesExhausted { id, attempts } => write!(
                f,
                "Update {} exhausted {} attempts with rollback disabled",
                id, attempts
            ),
            OptimistError::UpdateNotPending(id) => {
                write!(f, "Update {} is no longer pending", id)
            }
        }
    }
}

impl std::error::Error for OptimistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OptimistError::Io(e) => Some(e),
            OptimistError::Json(e) => Some(e),
            OptimistError::Toml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OptimistError {
    fn from(error: std::io::Error) -> Self {
        OptimistError::Io(error)
    }
}

impl From<serde_json::Error> for OptimistError {
    fn from(error: serde_json::Error) -> Self {
        OptimistError::Json(error)
    }
}

impl From<toml::de::Error> for OptimistError {
    fn from(error: toml::de::Error) -> Self {
        OptimistError::Toml(error)
    }
}

impl OptimistError {
    /// Create invalid configuration error
    #[inline]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> RecoveryHint {
        match self {
            Self::InvalidConfiguration(_) | Self::Json(_) | Self::Toml(_) => {
                RecoveryHint::Reconfigure
            }
            Self::Io(_) => RecoveryHint::Fatal,
            Self::MutationFailed { .. } | Self::UpdateNotPending(_) => RecoveryHint::Refetch,
            Self::RetriesExhausted { .. } => RecoveryHint::Retry,
        }
    }

    /// Check if issuing the mutation again is sensible
    pub fn retryable(&self) -> bool {
        matches!(
            self.recovery_hint(),
            RecoveryHint::Retry | RecoveryHint::Refetch
        )
    }
}

/// Result type for fallible optimist operations
pub type OptimistResult<T> = Result<T, OptimistError>;
