//! Session error types.

use thiserror::Error;

/// Errors from session lifecycle and query operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A debug session is already active for this surface.
    #[error("a debug session is already active")]
    AlreadyRunning,

    /// The debugger process failed to start.
    #[error("debugger failed to start: {0}")]
    SpawnFailed(String),

    /// The session has ended; the subprocess is gone.
    #[error("session is closed")]
    Closed,

    /// The debugger is running and not accepting commands.
    #[error("debugger is not accepting commands")]
    NotReady,

    /// The debugger answered a query with an explicit failure.
    #[error("query failed: {key}")]
    QueryFailed {
        /// The correlation key of the failed query.
        key: String,
    },

    /// A command could not be encoded.
    #[error(transparent)]
    Encode(#[from] jgdb_core::CoreError),
}
