//! Error types for the rule engine and its storage collaborators.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by a storage collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed rule or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A record with the same id already exists.
    #[error("already exists: {0}")]
    Conflict(String),

    /// The backing store failed (connection, query, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The call did not complete within the configured deadline.
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure surfaced by [`RuleEngine`](crate::engine::RuleEngine).
///
/// Record processing never returns this; only suggestion generation does.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A recognized action whose configuration cannot be executed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed {action} action: {reason}")]
pub struct ActionError {
    pub action: String,
    pub reason: String,
}

impl ActionError {
    pub fn new(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            reason: reason.into(),
        }
    }
}
