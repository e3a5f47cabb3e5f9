//! Broadcast selection and delivery flags.

use std::collections::HashSet;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Per-broadcast delivery flags, passed through untouched to every write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastFlags {
    /// The packet may be dropped if a connection cannot take it right away.
    #[serde(default)]
    pub volatile: bool,
    #[serde(default)]
    pub compress: bool,
    /// Deliver to this process only; skip the remote transport.
    #[serde(default)]
    pub local: bool,
}

/// Which connections a broadcast (or bulk operation) selects.
///
/// An empty `rooms` set selects every room. Connections listed in `except`,
/// or belonging to any room in `except_rooms`, are never selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastOptions {
    #[serde(default)]
    pub rooms: IndexSet<String>,
    #[serde(default)]
    pub except: HashSet<String>,
    #[serde(default)]
    pub except_rooms: IndexSet<String>,
    #[serde(default)]
    pub flags: BroadcastFlags,
}

impl BroadcastOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(mut self, room: impl Into<String>) -> Self {
        self.rooms.insert(room.into());
        self
    }

    pub fn except(mut self, connection_id: impl Into<String>) -> Self {
        self.except.insert(connection_id.into());
        self
    }

    pub fn except_room(mut self, room: impl Into<String>) -> Self {
        self.except_rooms.insert(room.into());
        self
    }

    pub fn volatile(mut self) -> Self {
        self.flags.volatile = true;
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.flags.compress = compress;
        self
    }

    pub fn local(mut self) -> Self {
        self.flags.local = true;
        self
    }

    /// True when no explicit room was requested.
    pub fn targets_all_rooms(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_selection() {
        let opts = BroadcastOptions::new()
            .to("lobby")
            .to("vip")
            .to("lobby")
            .except("s3")
            .except_room("muted")
            .volatile();

        assert_eq!(opts.rooms.iter().collect::<Vec<_>>(), vec!["lobby", "vip"]);
        assert!(opts.except.contains("s3"));
        assert!(opts.except_rooms.contains("muted"));
        assert!(opts.flags.volatile);
        assert!(!opts.flags.local);
        assert!(!opts.targets_all_rooms());
    }

    #[test]
    fn deserializes_with_defaults() {
        let opts: BroadcastOptions = serde_json::from_str(r#"{"rooms":["a"]}"#).unwrap();
        assert_eq!(opts.rooms.len(), 1);
        assert!(opts.except.is_empty());
        assert_eq!(opts.flags, BroadcastFlags::default());
    }
}
