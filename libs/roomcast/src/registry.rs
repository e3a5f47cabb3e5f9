//! Room membership registry: room name → member connection IDs.
//!
//! A single `RwLock` guards the whole map so every read observes one
//! consistent point in time. Notifications are collected while the lock is
//! held and delivered after it is released.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::events::{EventSink, FanoutEvent};
use crate::options::BroadcastOptions;
use crate::resolver::Participants;

/// Room name → members, both in insertion order.
pub type RoomMap = IndexMap<String, IndexSet<String>>;

pub struct RoomRegistry {
    rooms: RwLock<RoomMap>,
    sink: Arc<dyn EventSink>,
}

impl RoomRegistry {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            rooms: RwLock::new(IndexMap::new()),
            sink,
        }
    }

    /// Add a connection to a room, creating the room if needed.
    /// Adding an existing member is a no-op.
    pub fn add(&self, connection_id: &str, room: &str) -> Result<()> {
        self.add_all(connection_id, [room])
    }

    /// Add a connection to each room in order. Stops at the first invalid
    /// name; rooms already joined stay joined.
    pub fn add_all<I, S>(&self, connection_id: &str, rooms: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut events = Vec::new();
        let mut map = self.rooms.write();
        let result = rooms
            .into_iter()
            .try_for_each(|room| insert_member(&mut map, connection_id, room.as_ref(), &mut events));
        drop(map);
        self.emit(events);
        result
    }

    /// Remove a connection from a room. The room itself must exist; a
    /// connection that is not a member is ignored. Empty rooms are pruned.
    pub fn remove(&self, connection_id: &str, room: &str) -> Result<()> {
        let mut events = Vec::new();
        {
            let mut map = self.rooms.write();
            let members = map.get_mut(room).ok_or_else(|| Error::RoomNotFound {
                room: room.to_string(),
            })?;
            members.shift_remove(connection_id);
            let now_empty = members.is_empty();

            events.push(FanoutEvent::MemberLeft {
                room: room.to_string(),
                connection_id: connection_id.to_string(),
            });
            if now_empty {
                map.shift_remove(room);
                events.push(FanoutEvent::RoomDeleted {
                    room: room.to_string(),
                });
            }
        }
        self.emit(events);
        Ok(())
    }

    /// Remove a connection from every room it belongs to.
    pub fn remove_all(&self, connection_id: &str) {
        let mut events = Vec::new();
        self.rooms.write().retain(|room, members| {
            if !members.shift_remove(connection_id) {
                return true;
            }
            events.push(FanoutEvent::MemberLeft {
                room: room.clone(),
                connection_id: connection_id.to_string(),
            });
            if members.is_empty() {
                events.push(FanoutEvent::RoomDeleted { room: room.clone() });
                return false;
            }
            true
        });
        self.emit(events);
    }

    /// Point-in-time copy of every room and its members.
    pub fn snapshot(&self) -> RoomMap {
        self.rooms.read().clone()
    }

    /// Rooms the connection currently belongs to.
    pub fn membership_of(&self, connection_id: &str) -> IndexSet<String> {
        self.rooms
            .read()
            .iter()
            .filter(|(_, members)| members.contains(connection_id))
            .map(|(room, _)| room.clone())
            .collect()
    }

    pub fn is_member(&self, connection_id: &str, room: &str) -> bool {
        self.rooms
            .read()
            .get(room)
            .is_some_and(|members| members.contains(connection_id))
    }

    pub fn rooms(&self) -> Vec<String> {
        self.rooms.read().keys().cloned().collect()
    }

    /// Members of a room; empty if the room does not exist.
    pub fn members(&self, room: &str) -> Vec<String> {
        self.rooms
            .read()
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    /// Resolve the participants selected by `opts` and hand the lazy
    /// sequence to `f` while the read lock is held.
    ///
    /// `f` must not call back into the registry's mutating operations.
    pub fn with_participants<F, R>(
        &self,
        opts: &BroadcastOptions,
        is_live: F,
        f: impl FnOnce(Participants<'_, F>) -> R,
    ) -> R
    where
        F: FnMut(&str) -> bool,
    {
        let map = self.rooms.read();
        f(Participants::new(&map, opts, is_live))
    }

    /// Collected form of [`with_participants`](Self::with_participants).
    pub fn participants<F>(&self, opts: &BroadcastOptions, is_live: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        self.with_participants(opts, is_live, |ids| ids.map(str::to_string).collect())
    }

    fn emit(&self, events: Vec<FanoutEvent>) {
        for event in &events {
            self.sink.notify(event);
        }
    }
}

fn insert_member(
    map: &mut RoomMap,
    connection_id: &str,
    room: &str,
    events: &mut Vec<FanoutEvent>,
) -> Result<()> {
    if room.is_empty() {
        return Err(Error::InvalidRoomName);
    }

    let members = map.entry(room.to_string()).or_insert_with(|| {
        events.push(FanoutEvent::RoomCreated {
            room: room.to_string(),
        });
        IndexSet::new()
    });
    if members.insert(connection_id.to_string()) {
        events.push(FanoutEvent::MemberJoined {
            room: room.to_string(),
            connection_id: connection_id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;

    fn make_registry() -> (RoomRegistry, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        (RoomRegistry::new(sink.clone()), sink)
    }

    #[test]
    fn add_is_visible_in_snapshot_and_membership() {
        let (registry, _) = make_registry();
        registry.add("s1", "lobby").unwrap();

        assert!(registry.snapshot()["lobby"].contains("s1"));
        assert!(registry.membership_of("s1").contains("lobby"));
        assert!(registry.is_member("s1", "lobby"));
    }

    #[test]
    fn add_is_idempotent() {
        let (registry, sink) = make_registry();
        registry.add("s1", "lobby").unwrap();
        registry.add("s1", "lobby").unwrap();

        assert_eq!(registry.members("lobby"), vec!["s1"]);
        assert_eq!(sink.names(), vec!["room/created", "room/joined"]);
    }

    #[test]
    fn add_rejects_empty_room_name() {
        let (registry, sink) = make_registry();

        assert!(matches!(registry.add("s1", ""), Err(Error::InvalidRoomName)));
        assert!(registry.snapshot().is_empty());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn add_all_keeps_rooms_before_the_invalid_one() {
        let (registry, _) = make_registry();

        let result = registry.add_all("s1", ["a", "b", "", "c"]);
        assert!(matches!(result, Err(Error::InvalidRoomName)));

        assert_eq!(registry.rooms(), vec!["a", "b"]);
        assert!(!registry.is_member("s1", "c"));
    }

    #[test]
    fn remove_unknown_room_fails() {
        let (registry, _) = make_registry();
        match registry.remove("s1", "ghost-room") {
            Err(Error::RoomNotFound { room }) => assert_eq!(room, "ghost-room"),
            other => panic!("expected RoomNotFound, got {other:?}"),
        }
    }

    #[test]
    fn remove_non_member_is_a_no_op_that_still_notifies() {
        let (registry, sink) = make_registry();
        registry.add("s1", "lobby").unwrap();
        sink.clear();

        registry.remove("s2", "lobby").unwrap();

        assert_eq!(registry.members("lobby"), vec!["s1"]);
        assert_eq!(
            sink.events(),
            vec![FanoutEvent::MemberLeft {
                room: "lobby".into(),
                connection_id: "s2".into(),
            }]
        );
    }

    #[test]
    fn removing_last_member_prunes_the_room() {
        let (registry, sink) = make_registry();
        registry.add("s1", "lobby").unwrap();
        registry.add("s2", "lobby").unwrap();

        registry.remove("s1", "lobby").unwrap();
        assert!(!registry.is_member("s1", "lobby"));
        assert_eq!(registry.room_count(), 1);

        registry.remove("s2", "lobby").unwrap();
        assert_eq!(registry.room_count(), 0);
        assert_eq!(sink.names().last(), Some(&"room/deleted"));

        // The room is gone, so a second removal reports it.
        assert!(matches!(
            registry.remove("s2", "lobby"),
            Err(Error::RoomNotFound { .. })
        ));
    }

    #[test]
    fn double_remove_succeeds_while_room_has_other_members() {
        let (registry, _) = make_registry();
        registry.add("s1", "lobby").unwrap();
        registry.add("s2", "lobby").unwrap();

        registry.remove("s1", "lobby").unwrap();
        registry.remove("s1", "lobby").unwrap();
        assert_eq!(registry.members("lobby"), vec!["s2"]);
    }

    #[test]
    fn remove_all_leaves_connection_in_no_rooms() {
        let (registry, sink) = make_registry();
        registry.add_all("s1", ["a", "b", "c"]).unwrap();
        registry.add("s2", "b").unwrap();
        sink.clear();

        registry.remove_all("s1");

        assert!(registry.membership_of("s1").is_empty());
        assert_eq!(registry.rooms(), vec!["b"]);
        assert_eq!(
            sink.names(),
            vec!["room/left", "room/deleted", "room/left", "room/left", "room/deleted"]
        );

        // Unknown connection: nothing happens.
        sink.clear();
        registry.remove_all("nobody");
        assert!(sink.events().is_empty());
    }

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let (registry, _) = make_registry();
        registry.add("s1", "lobby").unwrap();

        let snapshot = registry.snapshot();
        registry.add("s2", "lobby").unwrap();

        assert_eq!(snapshot["lobby"].len(), 1);
        assert_eq!(registry.members("lobby").len(), 2);
    }

    #[test]
    fn concurrent_mutation_keeps_membership_consistent() {
        let (registry, _) = make_registry();
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let id = format!("c{t}_{i}");
                        registry.add_all(&id, ["shared", id.as_str()]).unwrap();
                        if i % 2 == 0 {
                            registry.remove_all(&id);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot["shared"].len(), 8 * 100);
        // Every surviving connection still has its own room.
        for id in &snapshot["shared"] {
            assert!(snapshot[id.as_str()].contains(id));
        }
        assert_eq!(snapshot.len(), 8 * 100 + 1);
    }
}
