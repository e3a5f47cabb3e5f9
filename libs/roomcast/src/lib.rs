//! Room membership and broadcast fan-out for a real-time messaging server.
//!
//! [`RoomRegistry`] tracks which connections belong to which rooms,
//! [`resolver`] turns a room selection into a deduplicated participant set,
//! and [`BroadcastEngine`] encodes a packet once and writes it to each
//! participant. The connection layer, the encoder, and any cross-process
//! transport plug in through the traits in [`connection`], [`encoder`], and
//! [`transport`].

pub mod config;
pub mod connection;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod events;
pub mod options;
pub mod registry;
pub mod resolver;
pub mod transport;

pub use config::FanoutConfig;
pub use connection::{
    ChannelConnection, ConnectionHandle, ConnectionLookup, Delivery, LocalConnections, Outbound, OutboundReceiver,
};
pub use encoder::{EncodedPacket, Encoder, Frame, JsonEncoder, Packet};
pub use engine::{BroadcastEngine, BroadcastReport};
pub use error::{DispatchError, EncodeError, Error, Result, TransportError};
pub use events::{ChannelSink, EventSink, FanoutEvent, FanoutSinks, NoopSink, RecordingSink, TracingSink};
pub use options::{BroadcastFlags, BroadcastOptions};
pub use registry::{RoomMap, RoomRegistry};
pub use transport::RemoteFanout;
