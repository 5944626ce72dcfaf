use std::collections::HashMap;

use crate::connection::{ConnectionId, Permissions};

/// Which connection owns each channel we've been confirmed in.
///
/// Only `JOIN`/`PART` echoes for our own login mutate this.
#[derive(Debug, Default)]
pub struct RoomTracker {
    rooms: HashMap<String, (ConnectionId, Permissions)>,
    readable: usize,
    writable: usize,
}

impl RoomTracker {
    /// Returns false if the channel was already owned by `id`.
    pub fn join(&mut self, channel: &str, id: ConnectionId, permissions: Permissions) -> bool {
        if let Some(old) = self.rooms.insert(channel.to_string(), (id, permissions)) {
            self.uncount(old.1);
            if old.0 == id {
                self.count(permissions);
                return false;
            }
        }
        self.count(permissions);
        true
    }

    pub fn part(&mut self, channel: &str) -> Option<ConnectionId> {
        let (id, permissions) = self.rooms.remove(channel)?;
        self.uncount(permissions);
        Some(id)
    }

    /// Forgets every channel owned by `id`, returning them.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Vec<String> {
        let channels: Vec<_> = self
            .rooms
            .iter()
            .filter(|(_, (owner, _))| *owner == id)
            .map(|(channel, _)| channel.clone())
            .collect();
        for channel in &channels {
            self.part(channel);
        }
        channels
    }

    pub fn clear(&mut self) {
        self.rooms.clear();
        self.readable = 0;
        self.writable = 0;
    }

    pub fn owner(&self, channel: &str) -> Option<ConnectionId> {
        self.rooms.get(channel).map(|&(id, _)| id)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.rooms.contains_key(channel)
    }

    /// Channels owned by `id`.
    pub fn count_on(&self, id: ConnectionId) -> usize {
        self.rooms.values().filter(|(owner, _)| *owner == id).count()
    }

    /// Channels sorted by name.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<_> = self.rooms.keys().cloned().collect();
        channels.sort_unstable();
        channels
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Channels whose owner can read. Reported in membership logs; the pool
    /// sizes itself with [`RoomTracker::count_on`].
    pub const fn readable(&self) -> usize {
        self.readable
    }

    /// Channels whose owner can write.
    pub const fn writable(&self) -> usize {
        self.writable
    }

    fn count(&mut self, permissions: Permissions) {
        self.readable += permissions.read as usize;
        self.writable += permissions.write as usize;
    }

    fn uncount(&mut self, permissions: Permissions) {
        self.readable -= permissions.read as usize;
        self.writable -= permissions.write as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_membership() {
        let mut rooms = RoomTracker::default();
        assert!(rooms.join("museun", 0, Permissions::READ_WRITE));
        assert!(rooms.join("shaken_bot", 1, Permissions::READ));
        assert!(!rooms.join("museun", 0, Permissions::READ_WRITE));

        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms.readable(), 2);
        assert_eq!(rooms.writable(), 1);
        assert_eq!(rooms.owner("museun"), Some(0));
        assert_eq!(rooms.count_on(0), 1);

        // moving a channel to another connection swaps its counts
        assert!(rooms.join("museun", 1, Permissions::READ));
        assert_eq!(rooms.writable(), 0);
        assert_eq!(rooms.count_on(1), 2);

        assert_eq!(rooms.part("museun"), Some(1));
        assert_eq!(rooms.part("museun"), None);
        assert_eq!(rooms.readable(), 1);
        assert_eq!(rooms.channels(), ["shaken_bot"]);
    }

    #[test]
    fn removing_a_connection() {
        let mut rooms = RoomTracker::default();
        rooms.join("a", 0, Permissions::READ);
        rooms.join("b", 1, Permissions::READ);
        rooms.join("c", 0, Permissions::READ);

        let mut gone = rooms.remove_connection(0);
        gone.sort();
        assert_eq!(gone, ["a", "c"]);
        assert_eq!(rooms.channels(), ["b"]);
        assert_eq!(rooms.readable(), 1);

        rooms.clear();
        assert!(rooms.is_empty());
        assert_eq!(rooms.readable(), 0);
    }
}
