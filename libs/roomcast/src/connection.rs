//! Connection-layer seams: resolving an ID to a live handle and writing to it.
//!
//! The core never owns connections. [`LocalConnections`] and
//! [`ChannelConnection`] are the in-process realization used by the gateway.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::encoder::EncodedPacket;
use crate::error::DispatchError;
use crate::options::BroadcastFlags;

/// Outcome of a write that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Written,
    /// A volatile packet the connection could not take right away.
    Dropped,
}

/// A live, writable connection.
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    fn id(&self) -> &str;

    async fn write(&self, packet: &EncodedPacket, flags: &BroadcastFlags) -> Result<Delivery, DispatchError>;

    /// Ask the owning connection layer to disconnect. `close` also closes
    /// the underlying transport.
    async fn disconnect(&self, close: bool);
}

/// Resolves connection IDs to live handles.
pub trait ConnectionLookup: Send + Sync {
    fn resolve(&self, connection_id: &str) -> Option<Arc<dyn ConnectionHandle>>;

    fn is_live(&self, connection_id: &str) -> bool {
        self.resolve(connection_id).is_some()
    }
}

/// Table of connections reachable from this process.
pub struct LocalConnections {
    connections: DashMap<String, Arc<dyn ConnectionHandle>>,
}

impl LocalConnections {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn insert(&self, connection: Arc<dyn ConnectionHandle>) {
        self.connections.insert(connection.id().to_string(), connection);
    }

    pub fn remove(&self, connection_id: &str) -> Option<Arc<dyn ConnectionHandle>> {
        self.connections.remove(connection_id).map(|(_, conn)| conn)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for LocalConnections {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionLookup for LocalConnections {
    fn resolve(&self, connection_id: &str) -> Option<Arc<dyn ConnectionHandle>> {
        self.connections.get(connection_id).map(|entry| entry.value().clone())
    }

    fn is_live(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }
}

/// Messages delivered to a [`ChannelConnection`]'s writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    Packet { packet: EncodedPacket, compress: bool },
    Disconnect { close: bool },
}

/// Connection handle backed by a bounded queue drained by the socket task.
///
/// Writes never wait: a full queue fails the write with
/// [`DispatchError::Backpressure`], or drops the packet when it is volatile.
/// Disconnect requests bypass the queue, so a full queue cannot hold them up.
pub struct ChannelConnection {
    id: String,
    tx: mpsc::Sender<Outbound>,
    disconnect: watch::Sender<Option<bool>>,
}

impl ChannelConnection {
    pub fn new(id: impl Into<String>, buffer: usize) -> (Self, OutboundReceiver) {
        let (tx, packets) = mpsc::channel(buffer.max(1));
        let (disconnect, disconnect_rx) = watch::channel(None);
        let conn = Self {
            id: id.into(),
            tx,
            disconnect,
        };
        let rx = OutboundReceiver {
            packets,
            disconnect: Some(disconnect_rx),
            finished: false,
        };
        (conn, rx)
    }
}

/// Receiving half of a [`ChannelConnection`].
///
/// A pending disconnect is returned before any queued packet; after it,
/// `recv` yields `None`.
pub struct OutboundReceiver {
    packets: mpsc::Receiver<Outbound>,
    disconnect: Option<watch::Receiver<Option<bool>>>,
    finished: bool,
}

impl OutboundReceiver {
    pub async fn recv(&mut self) -> Option<Outbound> {
        if self.finished {
            return None;
        }
        if let Some(close) = self.pending_disconnect() {
            return Some(self.finish(close));
        }

        let Some(disconnect) = self.disconnect.as_mut() else {
            return self.packets.recv().await;
        };
        let changed = tokio::select! {
            biased;
            changed = disconnect.changed() => changed,
            packet = self.packets.recv() => return packet,
        };

        if changed.is_err() {
            // The handle is gone; only queued packets remain.
            self.disconnect = None;
        }
        match self.pending_disconnect() {
            Some(close) => Some(self.finish(close)),
            None => self.packets.recv().await,
        }
    }

    fn pending_disconnect(&mut self) -> Option<bool> {
        self.disconnect.as_mut().and_then(|rx| *rx.borrow_and_update())
    }

    fn finish(&mut self, close: bool) -> Outbound {
        self.finished = true;
        Outbound::Disconnect { close }
    }
}

#[async_trait]
impl ConnectionHandle for ChannelConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn write(&self, packet: &EncodedPacket, flags: &BroadcastFlags) -> Result<Delivery, DispatchError> {
        let outbound = Outbound::Packet {
            packet: packet.clone(),
            compress: flags.compress,
        };
        match self.tx.try_send(outbound) {
            Ok(()) => Ok(Delivery::Written),
            Err(TrySendError::Full(_)) if flags.volatile => {
                tracing::trace!(connection_id = %self.id, "dropping volatile packet");
                Ok(Delivery::Dropped)
            }
            Err(TrySendError::Full(_)) => Err(DispatchError::Backpressure),
            Err(TrySendError::Closed(_)) => Err(DispatchError::Closed),
        }
    }

    async fn disconnect(&self, close: bool) {
        self.disconnect.send_replace(Some(close));
    }
}
