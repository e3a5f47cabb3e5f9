//! Broadcast engine: encode once, resolve participants, dispatch in order.

use std::sync::Arc;
use std::time::Duration;

use crate::config::FanoutConfig;
use crate::connection::{ConnectionHandle, ConnectionLookup, Delivery};
use crate::encoder::{EncodedPacket, Encoder, Packet};
use crate::error::{DispatchError, Error, Result};
use crate::events::{EventSink, FanoutEvent};
use crate::options::BroadcastOptions;
use crate::registry::RoomRegistry;
use crate::resolver;
use crate::transport::RemoteFanout;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    /// Connections written to, in dispatch order.
    pub recipients: Vec<String>,
    /// Connections whose write failed or timed out.
    pub failed: Vec<String>,
    /// Connections that skipped a volatile packet because they were busy.
    pub dropped: Vec<String>,
}

/// Local broadcast core for one namespace.
///
/// Delivers to locally reachable participants and, when a [`RemoteFanout`]
/// is attached, hands the same encoded packet to it for other processes.
pub struct BroadcastEngine {
    namespace: String,
    write_timeout: Duration,
    registry: Arc<RoomRegistry>,
    connections: Arc<dyn ConnectionLookup>,
    encoder: Arc<dyn Encoder>,
    sink: Arc<dyn EventSink>,
    remote: Option<Arc<dyn RemoteFanout>>,
}

impl BroadcastEngine {
    pub fn new(
        config: &FanoutConfig,
        registry: Arc<RoomRegistry>,
        connections: Arc<dyn ConnectionLookup>,
        encoder: Arc<dyn Encoder>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            namespace: config.namespace.clone(),
            write_timeout: config.write_timeout,
            registry,
            connections,
            encoder,
            sink,
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteFanout>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Encode `packet` once and write it to every selected live connection.
    ///
    /// Only an encoding failure is returned as an error; per-connection write
    /// failures are reported through the sink and the returned report.
    pub async fn broadcast(&self, mut packet: Packet, opts: &BroadcastOptions) -> Result<BroadcastReport> {
        packet.nsp = self.namespace.clone();
        self.sink.notify(&FanoutEvent::BroadcastStarted {
            namespace: self.namespace.clone(),
            packet: packet.clone(),
            options: opts.clone(),
        });

        let encoded = match self.encoder.encode(&packet).await {
            Ok(frames) => EncodedPacket::new(frames),
            Err(err) => {
                tracing::warn!(namespace = %self.namespace, event = %packet.event, %err, "failed to encode broadcast");
                return Err(Error::EncodingFailed(err));
            }
        };

        let targets = resolver::resolve_connections(&self.registry, opts, self.connections.as_ref());

        let mut report = BroadcastReport::default();
        for conn in targets {
            let connection_id = conn.id().to_string();
            self.sink.notify(&FanoutEvent::PacketSending {
                connection_id: connection_id.clone(),
            });

            match self.write(conn.as_ref(), &encoded, opts).await {
                Ok(Delivery::Written) => {
                    self.sink.notify(&FanoutEvent::PacketSent {
                        connection_id: connection_id.clone(),
                    });
                    report.sent += 1;
                    report.recipients.push(connection_id);
                }
                Ok(Delivery::Dropped) => {
                    self.sink.notify(&FanoutEvent::PacketDropped {
                        connection_id: connection_id.clone(),
                    });
                    report.dropped.push(connection_id);
                }
                Err(error) => {
                    self.sink.notify(&FanoutEvent::DispatchFailed {
                        connection_id: connection_id.clone(),
                        error,
                    });
                    report.failed.push(connection_id);
                }
            }
        }

        if !opts.flags.local {
            if let Some(remote) = &self.remote {
                if let Err(err) = remote.publish(&encoded, opts).await {
                    self.sink.notify(&FanoutEvent::RemotePublishFailed {
                        reason: err.to_string(),
                    });
                }
            }
        }

        self.sink.notify(&FanoutEvent::BroadcastComplete {
            sent: report.sent,
            recipients: report.recipients.clone(),
        });
        Ok(report)
    }

    async fn write(
        &self,
        conn: &dyn ConnectionHandle,
        encoded: &EncodedPacket,
        opts: &BroadcastOptions,
    ) -> std::result::Result<Delivery, DispatchError> {
        match tokio::time::timeout(self.write_timeout, conn.write(encoded, &opts.flags)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(DispatchError::Timeout),
        }
    }

    /// IDs of the live connections `opts` selects, without dispatching.
    pub fn connection_ids(&self, opts: &BroadcastOptions) -> Vec<String> {
        resolver::resolve_ids(&self.registry, opts, self.connections.as_ref())
    }

    /// Live handles of the connections `opts` selects.
    pub fn fetch_connections(&self, opts: &BroadcastOptions) -> Vec<Arc<dyn ConnectionHandle>> {
        resolver::resolve_connections(&self.registry, opts, self.connections.as_ref())
    }

    /// Join every selected connection to `rooms`. All names are validated
    /// before any membership changes. Returns the number of connections.
    pub fn add_connections<S: AsRef<str>>(&self, opts: &BroadcastOptions, rooms: &[S]) -> Result<usize> {
        if rooms.iter().any(|room| room.as_ref().is_empty()) {
            return Err(Error::InvalidRoomName);
        }
        let ids = self.connection_ids(opts);
        for id in &ids {
            self.registry.add_all(id, rooms)?;
        }
        Ok(ids.len())
    }

    /// Remove every selected connection from `rooms`. Returns the number of
    /// connections.
    pub fn del_connections<S: AsRef<str>>(&self, opts: &BroadcastOptions, rooms: &[S]) -> usize {
        let ids = self.connection_ids(opts);
        for id in &ids {
            for room in rooms {
                // The room may already have been pruned by an earlier removal.
                let _ = self.registry.remove(id, room.as_ref());
            }
        }
        ids.len()
    }

    /// Ask every selected connection to disconnect. Returns the number of
    /// connections asked.
    ///
    /// Each request is bounded by the write timeout; a connection that does
    /// not acknowledge in time is skipped.
    pub async fn disconnect_connections(&self, opts: &BroadcastOptions, close: bool) -> usize {
        let targets = self.fetch_connections(opts);
        for conn in &targets {
            if tokio::time::timeout(self.write_timeout, conn.disconnect(close))
                .await
                .is_err()
            {
                tracing::warn!(connection_id = %conn.id(), "disconnect request timed out");
            }
        }
        targets.len()
    }

    /// Number of server processes serving this namespace.
    pub async fn server_count(&self) -> usize {
        let Some(remote) = &self.remote else {
            return 1;
        };
        match remote.server_count().await {
            Ok(count) => count.max(1),
            Err(err) => {
                tracing::warn!(%err, "failed to query remote server count");
                1
            }
        }
    }
}
