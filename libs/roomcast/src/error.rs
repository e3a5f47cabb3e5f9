//! Error taxonomy for membership, encoding, and dispatch.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the registry and the broadcast engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Room identifiers must be non-empty.
    #[error("invalid room name")]
    InvalidRoomName,

    #[error("room `{room}` not found")]
    RoomNotFound { room: String },

    /// The encoder rejected the packet; nothing was dispatched.
    #[error("encoding failed: {0}")]
    EncodingFailed(#[from] EncodeError),

    /// A single connection's write failed. Only ever reported through the
    /// notification stream, never returned from a broadcast.
    #[error("dispatch to `{connection_id}` failed: {source}")]
    DispatchFailed {
        connection_id: String,
        #[source]
        source: DispatchError,
    },
}

/// Failure writing an encoded packet to one connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("connection closed")]
    Closed,
    #[error("outbound queue full")]
    Backpressure,
    #[error("write timed out")]
    Timeout,
    #[error("{0}")]
    Io(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unserializable payload: {0}")]
    Serialize(String),
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for EncodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("remote fan-out failed: {0}")]
pub struct TransportError(pub String);
