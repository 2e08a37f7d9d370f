use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::dao::models::RoomEntity;
use crate::state::room::RoomSession;

/// Exclusive-access guard for one room.
///
/// The lock is held for the full duration of a mutation, including the store
/// save and broadcast payload construction, so concurrent events on the same
/// room are strictly serialized while other rooms proceed independently.
pub type RoomHandle = Arc<Mutex<RoomSession>>;

/// Directory of all active rooms, keyed by id with an access-code index.
///
/// Injectable dependency of the coordinator: populated from the store at
/// startup and mutated only through create/delete operations.
pub struct RoomDirectory {
    rooms: DashMap<Uuid, RoomHandle>,
    access_codes: DashMap<String, Uuid>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            access_codes: DashMap::new(),
        }
    }

    /// Register a freshly created room and return its handle.
    pub fn insert(&self, session: RoomSession) -> RoomHandle {
        let id = session.id;
        self.access_codes.insert(session.access_code.clone(), id);
        let handle = Arc::new(Mutex::new(session));
        self.rooms.insert(id, handle.clone());
        handle
    }

    /// Remove a room and its access-code index entry.
    pub fn remove(&self, id: Uuid, access_code: &str) -> Option<RoomHandle> {
        self.access_codes.remove(access_code);
        self.rooms.remove(&id).map(|(_, handle)| handle)
    }

    /// Look up a live room by id.
    pub fn by_id(&self, id: Uuid) -> Option<RoomHandle> {
        self.rooms.get(&id).map(|entry| entry.value().clone())
    }

    /// Look up a live room by its opaque access code.
    pub fn by_access_code(&self, code: &str) -> Option<RoomHandle> {
        let id = *self.access_codes.get(code)?;
        self.by_id(id)
    }

    /// Whether `code` is already taken by an active room.
    pub fn contains_code(&self, code: &str) -> bool {
        self.access_codes.contains_key(code)
    }

    /// Snapshot of every live room handle.
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of active rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether the directory holds no rooms.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Load stored rooms that are not yet live, returning how many were
    /// added. Existing in-memory sessions win over their stored copies.
    pub fn hydrate(&self, entities: Vec<RoomEntity>) -> usize {
        let mut added = 0;
        for entity in entities {
            if self.rooms.contains_key(&entity.id) || self.contains_code(&entity.access_code) {
                continue;
            }
            self.insert(RoomSession::from(entity));
            added += 1;
        }
        added
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(code: &str) -> RoomSession {
        RoomSession::new("room".into(), "333".into(), code.into(), None)
    }

    #[test]
    fn lookup_by_id_and_code() {
        let directory = RoomDirectory::new();
        let session = session("code-1");
        let id = session.id;
        directory.insert(session);

        assert!(directory.by_id(id).is_some());
        assert!(directory.by_access_code("code-1").is_some());
        assert!(directory.by_access_code("code-2").is_none());
        assert!(directory.contains_code("code-1"));
    }

    #[test]
    fn remove_clears_both_indexes() {
        let directory = RoomDirectory::new();
        let session = session("code-1");
        let id = session.id;
        directory.insert(session);

        assert!(directory.remove(id, "code-1").is_some());
        assert!(directory.by_id(id).is_none());
        assert!(!directory.contains_code("code-1"));
        assert!(directory.is_empty());
    }

    #[test]
    fn hydrate_skips_rooms_already_live() {
        let directory = RoomDirectory::new();
        let live = session("code-1");
        let stored_copy = live.to_entity();
        directory.insert(live);

        let fresh = session("code-2").to_entity();
        let added = directory.hydrate(vec![stored_copy, fresh]);
        assert_eq!(added, 1);
        assert_eq!(directory.len(), 2);
    }
}
