use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use agora_core::metrics::ACTIVE_CONFERENCES;
use agora_core::models::ConferenceId;

use crate::conference::Conference;

/// Shared, lockable conference
pub type ConferenceHandle = Arc<Mutex<Conference>>;

/// In-memory conference ID → conference map
///
/// Lock order is always directory shard, then conference. Callers clone a
/// handle out of the map and drop the shard guard before locking it.
#[derive(Clone)]
pub struct ConferenceDirectory {
    conferences: Arc<DashMap<ConferenceId, ConferenceHandle>>,
    default_room_capacity: usize,
}

impl ConferenceDirectory {
    #[must_use]
    pub fn new(default_room_capacity: usize) -> Self {
        Self {
            conferences: Arc::new(DashMap::new()),
            default_room_capacity,
        }
    }

    /// Return the conference, creating it with its main room if absent
    pub fn get_or_create(&self, conference_id: &ConferenceId) -> (ConferenceHandle, bool) {
        match self.conferences.entry(conference_id.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let handle = Arc::new(Mutex::new(Conference::new(
                    conference_id.clone(),
                    self.default_room_capacity,
                )));
                entry.insert(handle.clone());
                ACTIVE_CONFERENCES.inc();
                info!(conference_id = %conference_id, "Conference created");
                (handle, true)
            }
        }
    }

    /// Create an empty conference under a fresh ID
    pub fn create(&self) -> ConferenceId {
        loop {
            let conference_id = ConferenceId::new();
            if let (_, true) = self.get_or_create(&conference_id) {
                return conference_id;
            }
        }
    }

    #[must_use]
    pub fn get(&self, conference_id: &ConferenceId) -> Option<ConferenceHandle> {
        self.conferences.get(conference_id).map(|c| c.value().clone())
    }

    /// Drop a conference that has no participants
    ///
    /// Must not be called while holding that conference's lock.
    pub fn remove_if_empty(&self, conference_id: &ConferenceId) -> bool {
        let removed = self
            .conferences
            .remove_if(conference_id, |_, handle| {
                let mut conference = handle.lock();
                if conference.is_empty() {
                    conference.closed = true;
                    true
                } else {
                    false
                }
            })
            .is_some();

        if removed {
            ACTIVE_CONFERENCES.dec();
            info!(conference_id = %conference_id, "Empty conference removed");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conferences.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conferences.is_empty()
    }

    #[must_use]
    pub fn contains(&self, conference_id: &ConferenceId) -> bool {
        self.conferences.contains_key(conference_id)
    }
}
