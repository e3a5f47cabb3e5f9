//! Cross-process fan-out seam.
//!
//! The engine delivers to local participants itself, then hands the same
//! encoded packet to a [`RemoteFanout`] so peers can deliver to theirs.

use async_trait::async_trait;

use crate::encoder::EncodedPacket;
use crate::error::TransportError;
use crate::options::BroadcastOptions;

#[async_trait]
pub trait RemoteFanout: Send + Sync {
    /// Publish an already-encoded packet with the selection that produced it.
    async fn publish(&self, packet: &EncodedPacket, opts: &BroadcastOptions) -> Result<(), TransportError>;

    /// Number of server processes reachable through this transport,
    /// including this one.
    async fn server_count(&self) -> Result<usize, TransportError>;
}
