//! Error types.
//!
//! Every caller-facing error carries a numeric protocol code (`code()`), so
//! results can be reported as `(success, code)` pairs the service understands.

use thiserror::Error;

use crate::codes;
use crate::stream::LocalStreamId;

/// Structured failure reported by the transport collaborator.
///
/// Either an error answer from the service (`code` + `ex` on the wire) or a
/// local core failure such as a timeout or a closed connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{code}] {message}")]
pub struct TransportError {
    pub code: u32,
    pub message: String,
}

impl TransportError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new(codes::CORE_TIMEOUT, "request timed out")
    }

    pub fn closed() -> Self {
        Self::new(codes::CORE_CONNECTION_CLOSED, "connection closed")
    }
}

/// Msgpack encode/decode failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        source: rmp_serde::encode::Error,
    },

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        source: rmp_serde::decode::Error,
    },
}

/// Errors returned by the session client.
#[derive(Debug, Error)]
pub enum RtvtError {
    /// The transport never reached the connected state.
    #[error("connection failed: {0}")]
    Connection(TransportError),

    /// The service rejected the credentials.
    #[error("authentication rejected (code {code})")]
    AuthRejected { code: u32 },

    /// A request failed without invalidating the session.
    #[error("{method} failed: {source}")]
    Request {
        method: &'static str,
        source: TransportError,
    },

    #[error("voice frame must be {expected} bytes, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    #[error("stream {0} is not registered")]
    UnknownStream(LocalStreamId),

    #[error("session is not active")]
    NotConnected,

    /// A newer login replaced the connection this operation started on.
    #[error("superseded by connection version {current}")]
    Superseded { current: u64 },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl RtvtError {
    /// Protocol code for this error.
    pub fn code(&self) -> u32 {
        match self {
            RtvtError::Connection(e) => e.code,
            RtvtError::AuthRejected { code } => *code,
            RtvtError::Request { source, .. } => source.code,
            RtvtError::FrameLength { .. } => codes::VOICE_LENGTH_ERROR,
            RtvtError::UnknownStream(_) => codes::STREAM_ERROR,
            RtvtError::NotConnected | RtvtError::Superseded { .. } => {
                codes::CORE_INVALID_CONNECTION
            }
            RtvtError::Codec(CodecError::Encode { .. }) => codes::CORE_UNKNOWN_ERROR,
            RtvtError::Codec(CodecError::Decode { .. }) => codes::CORE_DECODING,
        }
    }
}
