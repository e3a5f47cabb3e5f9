//! Packet encoding handoff.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::EncodeError;

/// A logical message before encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    /// Namespace identity, stamped by the engine before encoding.
    pub nsp: String,
    pub event: String,
    pub data: Value,
}

impl Packet {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            nsp: String::new(),
            event: event.into(),
            data,
        }
    }
}

/// One transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Transport-ready frames for one packet, shared by every recipient.
#[derive(Debug, Clone)]
pub struct EncodedPacket {
    frames: Arc<[Frame]>,
}

impl EncodedPacket {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// True if both values share the same encoded frames.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.frames, &other.frames)
    }
}

/// Serializes a [`Packet`] into transport frames.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, packet: &Packet) -> Result<Vec<Frame>, EncodeError>;
}

/// Encodes a packet as a single JSON text frame: `{"nsp","event","data"}`.
pub struct JsonEncoder;

#[async_trait]
impl Encoder for JsonEncoder {
    async fn encode(&self, packet: &Packet) -> Result<Vec<Frame>, EncodeError> {
        Ok(vec![Frame::Text(serde_json::to_string(packet)?)])
    }
}
