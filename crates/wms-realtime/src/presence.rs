//! Process-local socket registry. Socket sessions are kept in a
//! process-local registry keyed by user id; presence is recomputed on
//! each connect/disconnect.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct PresenceRegistry {
    inner: RwLock<HashMap<String, HashSet<Uuid>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected socket under `user_key`. Returns `true`
    /// when this is that user's first active socket — a presence
    /// transition worth broadcasting.
    pub fn connect(&self, user_key: &str, socket_id: Uuid) -> bool {
        let mut map = self.inner.write();
        let set = map.entry(user_key.to_string()).or_default();
        let became_online = set.is_empty();
        set.insert(socket_id);
        became_online
    }

    /// Remove a disconnected socket. Returns `true` when the user has no
    /// remaining active sockets — a presence transition worth
    /// broadcasting.
    pub fn disconnect(&self, user_key: &str, socket_id: Uuid) -> bool {
        let mut map = self.inner.write();
        let Some(set) = map.get_mut(user_key) else {
            return false;
        };
        set.remove(&socket_id);
        if set.is_empty() {
            map.remove(user_key);
            true
        } else {
            false
        }
    }

    pub fn active_user_keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    pub fn is_online(&self, user_key: &str) -> bool {
        self.inner
            .read()
            .get(user_key)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }

    pub fn online_count(&self) -> usize {
        self.inner.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_connect_reports_presence_transition() {
        let reg = PresenceRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(reg.connect("op-1", a));
        assert!(!reg.connect("op-1", b));
        assert!(reg.is_online("op-1"));
    }

    #[test]
    fn disconnect_reports_presence_transition_only_when_last_socket() {
        let reg = PresenceRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        reg.connect("op-1", a);
        reg.connect("op-1", b);
        assert!(!reg.disconnect("op-1", a));
        assert!(reg.is_online("op-1"));
        assert!(reg.disconnect("op-1", b));
        assert!(!reg.is_online("op-1"));
    }
}
