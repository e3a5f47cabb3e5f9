pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use roomcast::{
    BroadcastEngine, ChannelSink, EventSink, FanoutSinks, JsonEncoder, LocalConnections, RoomRegistry,
};

use config::Config;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<RoomRegistry>,
    pub connections: Arc<LocalConnections>,
    pub engine: Arc<BroadcastEngine>,
    /// Live feed of room and broadcast notifications.
    pub events: ChannelSink,
}

impl AppState {
    /// Wire the registry, connection table, and engine for one namespace.
    ///
    /// Notifications go to `sink` and to the [`events`](Self::events) feed.
    pub fn new(config: Config, sink: Arc<dyn EventSink>) -> Self {
        let events = ChannelSink::new();
        let feed: Arc<dyn EventSink> = Arc::new(events.clone());
        let sink: Arc<dyn EventSink> = Arc::new(FanoutSinks::new(vec![sink, feed]));

        let registry = Arc::new(RoomRegistry::new(sink.clone()));
        let connections = Arc::new(LocalConnections::new());
        let engine = BroadcastEngine::new(
            &config.fanout,
            registry.clone(),
            connections.clone(),
            Arc::new(JsonEncoder),
            sink,
        );

        Self {
            config: Arc::new(config),
            registry,
            connections,
            engine: Arc::new(engine),
            events,
        }
    }
}
