//! Error types for lookup operations.

use thiserror::Error;

use crate::fingerprint::Fingerprint;

/// A lookup key is structurally invalid.
///
/// Raised synchronously before the key reaches the in-flight gate and
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The key is empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The key is present but malformed.
    #[error("invalid {field}: {message}")]
    Malformed { field: &'static str, message: String },
}

/// Failure of the network collaborator call itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The collaborator gave up waiting for the remote side.
    #[error("timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The call was rejected or could not be completed.
    #[error("transport failure: {message}")]
    Failed { message: String },

    /// The collaborator does not implement the operation.
    #[error("operation not supported: {operation}")]
    Unsupported { operation: &'static str },
}

impl TransportError {
    /// Convenience constructor for [`TransportError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Why a single batch member could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ItemFailure {
    /// The response had no element for this item.
    #[error("missing from response")]
    Missing,

    /// A response element was present but the item policy rejected it.
    #[error("rejected by item policy")]
    Rejected,
}

/// Errors surfaced to a lookup caller.
///
/// The type is `Clone` so a single settled result can be handed to every
/// caller sharing the same in-flight operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The key failed validation.
    #[error("invalid lookup key: {0}")]
    Validation(#[from] ValidationError),

    /// This item could not be resolved; sibling items are unaffected.
    #[error("lookup of {fingerprint} failed: {reason}")]
    ItemFailed {
        fingerprint: Fingerprint,
        reason: ItemFailure,
    },

    /// The bulk transport call failed for the whole batch.
    #[error("batch failed: {reason}")]
    BatchFailed { reason: TransportError },

    /// The source does not provide the requested operation.
    #[error("operation not supported: {operation}")]
    Unsupported { operation: &'static str },

    /// The batch was dropped before delivering a result (runtime shutdown).
    #[error("lookup cancelled before a result was delivered")]
    Cancelled,
}

/// Result type for lookup operations.
pub type LookupResult<T> = Result<T, LookupError>;

/// Invalid loader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}
