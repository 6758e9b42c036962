//! Bridge core error types.

use thiserror::Error;

/// Errors from packet decoding and command encoding.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Packet payload was not valid JSON or did not match the envelope.
    #[error("malformed packet payload: {0}")]
    MalformedPacket(String),

    /// Packet named an operation this bridge does not know.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// Remote-call arguments could not be serialized.
    #[error("could not encode arguments for {function}: {message}")]
    EncodeFailed {
        /// The remote function whose arguments failed to serialize.
        function: String,
        /// The serialization error message.
        message: String,
    },
}
