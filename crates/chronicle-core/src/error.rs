//! Recorder error taxonomy.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type returned by recorders.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Required store configuration is missing or invalid. Raised before any
    /// I/O is attempted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Optimistic concurrency conflict: the `(originator_id,
    /// originator_version)` pair has already been committed by another
    /// writer. Expected and recoverable — reload the aggregate, reapply the
    /// command, retry.
    #[error("version conflict on aggregate {originator_id}: version {version} already recorded")]
    VersionConflict {
        /// The aggregate that had the conflict.
        originator_id: Uuid,
        /// The version that was already taken.
        version: i64,
    },

    /// Backend connectivity, throttling, or permission failure, or a record
    /// whose shape could not be decoded. Carries the store identifier for
    /// diagnostics.
    #[error("unable to access store {store}: {message}")]
    Access {
        /// Identifier of the affected store.
        store: String,
        /// Backend-reported failure detail.
        message: String,
    },

    /// Capability gap: the recorder variant does not provide this operation.
    /// Variants lacking a capability must fail loudly with this, never return
    /// an empty or partial result.
    #[error("operation not supported by this recorder: {operation}")]
    Unsupported {
        /// Name of the unsupported operation.
        operation: &'static str,
    },
}
