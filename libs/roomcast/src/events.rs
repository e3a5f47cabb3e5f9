//! Lifecycle notifications and the sinks that receive them.
//!
//! The registry and the engine hold an injected [`EventSink`] rather than
//! emitting on shared state, so tests can substitute a [`RecordingSink`].

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::encoder::Packet;
use crate::error::{DispatchError, Error};
use crate::options::BroadcastOptions;

/// Capacity of a [`ChannelSink`]. Subscribers that fall behind skip
/// notifications (`RecvError::Lagged`).
const CHANNEL_SINK_CAPACITY: usize = 1024;

/// One notification per lifecycle point.
#[derive(Debug, Clone, PartialEq)]
pub enum FanoutEvent {
    RoomCreated {
        room: String,
    },
    MemberJoined {
        room: String,
        connection_id: String,
    },
    /// Emitted on every removal request, whether or not the connection was a member.
    MemberLeft {
        room: String,
        connection_id: String,
    },
    RoomDeleted {
        room: String,
    },
    /// Carries the packet about to be encoded, already stamped with its namespace.
    BroadcastStarted {
        namespace: String,
        packet: Packet,
        options: BroadcastOptions,
    },
    PacketSending {
        connection_id: String,
    },
    PacketSent {
        connection_id: String,
    },
    /// A volatile packet was skipped because the connection was busy.
    PacketDropped {
        connection_id: String,
    },
    DispatchFailed {
        connection_id: String,
        error: DispatchError,
    },
    RemotePublishFailed {
        reason: String,
    },
    BroadcastComplete {
        sent: usize,
        recipients: Vec<String>,
    },
}

impl FanoutEvent {
    /// Stable name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomCreated { .. } => "room/created",
            Self::MemberJoined { .. } => "room/joined",
            Self::MemberLeft { .. } => "room/left",
            Self::RoomDeleted { .. } => "room/deleted",
            Self::BroadcastStarted { .. } => "broadcast/started",
            Self::PacketSending { .. } => "packet/sending",
            Self::PacketSent { .. } => "packet/sent",
            Self::PacketDropped { .. } => "packet/dropped",
            Self::DispatchFailed { .. } => "packet/failed",
            Self::RemotePublishFailed { .. } => "remote/failed",
            Self::BroadcastComplete { .. } => "broadcast/complete",
        }
    }

    /// The error a failure notification reports, if any.
    pub fn to_error(&self) -> Option<Error> {
        match self {
            Self::DispatchFailed { connection_id, error } => Some(Error::DispatchFailed {
                connection_id: connection_id.clone(),
                source: error.clone(),
            }),
            _ => None,
        }
    }
}

/// Receives lifecycle notifications. Must not block.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &FanoutEvent);
}

pub struct NoopSink;

impl EventSink for NoopSink {
    fn notify(&self, _event: &FanoutEvent) {}
}

/// Renders notifications as `tracing` events.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, event: &FanoutEvent) {
        match event {
            FanoutEvent::RoomCreated { room } | FanoutEvent::RoomDeleted { room } => {
                tracing::debug!(event = event.name(), %room, "room lifecycle");
            }
            FanoutEvent::MemberJoined { room, connection_id }
            | FanoutEvent::MemberLeft { room, connection_id } => {
                tracing::debug!(event = event.name(), %room, %connection_id, "membership changed");
            }
            FanoutEvent::BroadcastStarted {
                namespace,
                packet,
                options,
            } => {
                tracing::debug!(
                    %namespace,
                    event = %packet.event,
                    rooms = options.rooms.len(),
                    except = options.except.len(),
                    volatile = options.flags.volatile,
                    "broadcast started"
                );
            }
            FanoutEvent::PacketSending { connection_id }
            | FanoutEvent::PacketSent { connection_id }
            | FanoutEvent::PacketDropped { connection_id } => {
                tracing::trace!(event = event.name(), %connection_id);
            }
            FanoutEvent::DispatchFailed { connection_id, error } => {
                tracing::warn!(%connection_id, %error, "failed to write packet to connection");
            }
            FanoutEvent::RemotePublishFailed { reason } => {
                tracing::warn!(%reason, "remote fan-out failed");
            }
            FanoutEvent::BroadcastComplete { sent, .. } => {
                tracing::debug!(sent, "broadcast complete");
            }
        }
    }
}

/// Publishes notifications on a `tokio::sync::broadcast` channel.
/// Cloneable; every subscriber gets its own receiver.
#[derive(Clone)]
pub struct ChannelSink {
    sender: broadcast::Sender<Arc<FanoutEvent>>,
}

impl ChannelSink {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_SINK_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FanoutEvent>> {
        self.sender.subscribe()
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ChannelSink {
    fn notify(&self, event: &FanoutEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(Arc::new(event.clone()));
    }
}

/// Forwards every notification to each inner sink, in order.
pub struct FanoutSinks(Vec<Arc<dyn EventSink>>);

impl FanoutSinks {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self(sinks)
    }
}

impl EventSink for FanoutSinks {
    fn notify(&self, event: &FanoutEvent) {
        for sink in &self.0 {
            sink.notify(event);
        }
    }
}

/// Keeps every notification in memory, for test harnesses.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<FanoutEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FanoutEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(FanoutEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: &FanoutEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_delivers_to_subscribers() {
        let sink = ChannelSink::new();
        let mut rx = sink.subscribe();

        sink.notify(&FanoutEvent::RoomCreated { room: "lobby".into() });

        let event = rx.recv().await.unwrap();
        assert_eq!(*event, FanoutEvent::RoomCreated { room: "lobby".into() });
    }

    #[test]
    fn channel_sink_without_subscribers_is_silent() {
        ChannelSink::new().notify(&FanoutEvent::RoomDeleted { room: "x".into() });
    }

    #[test]
    fn dispatch_failure_converts_to_error() {
        let event = FanoutEvent::DispatchFailed {
            connection_id: "s1".into(),
            error: DispatchError::Closed,
        };
        let err = event.to_error().unwrap();
        assert_eq!(err.to_string(), "dispatch to `s1` failed: connection closed");
        assert!(FanoutEvent::PacketSent { connection_id: "s1".into() }.to_error().is_none());
    }

    #[test]
    fn fanout_sinks_forward_to_all() {
        let a = Arc::new(RecordingSink::new());
        let b = Arc::new(RecordingSink::new());
        let sinks = FanoutSinks::new(vec![a.clone() as Arc<dyn EventSink>, b.clone()]);

        sinks.notify(&FanoutEvent::PacketSent { connection_id: "s1".into() });

        assert_eq!(a.names(), vec!["packet/sent"]);
        assert_eq!(b.names(), vec!["packet/sent"]);
    }
}
