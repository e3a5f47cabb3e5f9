//! Participant resolution: the union of the selected rooms' members, minus
//! exclusions and connections that are no longer live.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::connection::{ConnectionHandle, ConnectionLookup};
use crate::options::BroadcastOptions;
use crate::registry::{RoomMap, RoomRegistry};

/// Lazy, deduplicated sequence of connection IDs over a borrowed room map.
///
/// Order is room order (requested order, or registry order when no room was
/// requested) then member order. Each ID is produced at most once.
pub struct Participants<'a, F> {
    sets: std::vec::IntoIter<&'a IndexSet<String>>,
    current: Option<indexmap::set::Iter<'a, String>>,
    except: &'a HashSet<String>,
    except_via_rooms: HashSet<&'a str>,
    seen: HashSet<&'a str>,
    is_live: F,
}

impl<'a, F> Participants<'a, F>
where
    F: FnMut(&str) -> bool,
{
    pub fn new(rooms: &'a RoomMap, opts: &'a BroadcastOptions, is_live: F) -> Self {
        let sets: Vec<&IndexSet<String>> = if opts.targets_all_rooms() {
            rooms.values().collect()
        } else {
            opts.rooms.iter().filter_map(|room| rooms.get(room)).collect()
        };

        let except_via_rooms = opts
            .except_rooms
            .iter()
            .filter_map(|room| rooms.get(room))
            .flat_map(|members| members.iter().map(String::as_str))
            .collect();

        Self {
            sets: sets.into_iter(),
            current: None,
            except: &opts.except,
            except_via_rooms,
            seen: HashSet::new(),
            is_live,
        }
    }

    fn is_excluded(&self, id: &str) -> bool {
        self.except.contains(id) || self.except_via_rooms.contains(id)
    }
}

impl<'a, F> Iterator for Participants<'a, F>
where
    F: FnMut(&str) -> bool,
{
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let Some(id) = self.current.as_mut().and_then(Iterator::next) else {
                self.current = Some(self.sets.next()?.iter());
                continue;
            };
            let id = id.as_str();

            if self.is_excluded(id) || !self.seen.insert(id) {
                continue;
            }
            // Stale entry: still a member, but not resolvable any more.
            if !(self.is_live)(id) {
                continue;
            }
            return Some(id);
        }
    }
}

/// Resolve the selected participants to live handles, in resolver order.
///
/// IDs that no longer resolve are skipped. Handles are also deduplicated by
/// identity in case the lookup maps two IDs to the same connection.
pub fn resolve_connections(
    registry: &RoomRegistry,
    opts: &BroadcastOptions,
    lookup: &dyn ConnectionLookup,
) -> Vec<Arc<dyn ConnectionHandle>> {
    registry.with_participants(opts, |_| true, |ids| {
        let mut seen = HashSet::new();
        ids.filter_map(|id| lookup.resolve(id))
            .filter(|conn| seen.insert(Arc::as_ptr(conn) as *const ()))
            .collect()
    })
}

/// Resolve the selected participants to the IDs of live connections.
pub fn resolve_ids(
    registry: &RoomRegistry,
    opts: &BroadcastOptions,
    lookup: &dyn ConnectionLookup,
) -> Vec<String> {
    registry.participants(opts, |id| lookup.is_live(id))
}
