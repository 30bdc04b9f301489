//! Error types.
//!
//! `StoreError` is what a `DocumentStore` backend reports. `QueueError` is
//! what every queue-facing operation returns; producer-facing calls propagate
//! it, the scheduler routes it to the configured `ErrorHandler`.

use thiserror::Error;

use super::item::ItemType;

/// Failure reported by a document store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend cannot be reached right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored document does not have the expected shape.
    #[error("corrupt document: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum QueueError {
    /// No store has been configured for this queue.
    #[error("no store configured")]
    StoreUnavailable,

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Dispatch-time: the claimed item's type has no worker.
    #[error("no worker registered for type={0}")]
    NoWorkerRegistered(ItemType),

    /// A worker produced an outcome outside Completed/Retry/Rejected.
    #[error("unknown outcome: {0:?}")]
    UnknownOutcome(String),

    #[error("priority must be within 1..=10, got {0}")]
    InvalidPriority(u8),

    #[error("message filter must be a JSON object, got {0}")]
    InvalidMessageFilter(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A worker failed without producing an outcome.
    #[error("worker failed: {0}")]
    Worker(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl QueueError {
    /// Convenience for worker implementations.
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker(message.into())
    }

    /// Errors the caller cannot fix by retrying the same call.
    pub fn is_permanent(&self) -> bool {
        !matches!(
            self,
            QueueError::StoreUnavailable | QueueError::Store(StoreError::Unavailable(_))
        )
    }
}
