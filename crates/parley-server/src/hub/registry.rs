//! Live connection registry.

use std::collections::BTreeMap;

use parley_core::{ConnectionId, ConnectionInfo, HubError, Result};

/// Every connection the hub currently considers live, keyed by ID.
///
/// Owned by the hub task, so it needs no locking. Iteration order is by ID,
/// which keeps broadcast order stable.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: BTreeMap<ConnectionId, ConnectionInfo>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    ///
    /// If the ID is already present the new entry replaces the old one and
    /// [`HubError::DuplicateConnection`] is returned so the caller can log it.
    pub fn register(&mut self, info: ConnectionInfo) -> Result<()> {
        let id = info.id.clone();
        match self.entries.insert(id.clone(), info) {
            Some(_) => Err(HubError::DuplicateConnection(id)),
            None => Ok(()),
        }
    }

    /// Remove a connection, returning its metadata if it was present.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<ConnectionInfo> {
        self.entries.remove(id)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// IDs of every live connection.
    pub fn ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.entries.keys()
    }

    /// Owned copy of the registry contents.
    pub fn snapshot(&self) -> BTreeMap<ConnectionId, ConnectionInfo> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::net::SocketAddr;

    use proptest::prelude::*;

    use super::*;

    fn info(port: u16) -> ConnectionInfo {
        ConnectionInfo::new(SocketAddr::from(([127, 0, 0, 1], port)))
    }

    #[test]
    fn register_and_unregister() {
        let mut registry = ConnectionRegistry::new();
        registry.register(info(1000)).unwrap();
        registry.register(info(1001)).unwrap();
        assert_eq!(registry.count(), 2);

        let removed = registry.unregister(&ConnectionId::from("127.0.0.1:1000"));
        assert_eq!(removed.map(|i| i.port), Some(1000));
        assert_eq!(registry.count(), 1);
        assert!(!registry.contains(&ConnectionId::from("127.0.0.1:1000")));
    }

    #[test]
    fn unregister_unknown_is_none() {
        let mut registry = ConnectionRegistry::new();
        assert!(registry.unregister(&ConnectionId::from("1.2.3.4:5")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_register_replaces_and_reports() {
        let mut registry = ConnectionRegistry::new();
        registry.register(info(1000)).unwrap();
        let replacement = info(1000).with_user_agent("second");

        let err = registry.register(replacement).unwrap_err();

        assert_eq!(
            err,
            HubError::DuplicateConnection(ConnectionId::from("127.0.0.1:1000"))
        );
        assert_eq!(registry.count(), 1);
        let stored = registry.snapshot();
        assert_eq!(
            stored[&ConnectionId::from("127.0.0.1:1000")].user_agent.as_deref(),
            Some("second")
        );
    }

    #[test]
    fn ids_are_ordered() {
        let mut registry = ConnectionRegistry::new();
        for port in [3000, 1000, 2000] {
            registry.register(info(port)).unwrap();
        }
        let ids: Vec<&str> = registry.ids().map(ConnectionId::as_str).collect();
        assert_eq!(ids, vec!["127.0.0.1:1000", "127.0.0.1:2000", "127.0.0.1:3000"]);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut registry = ConnectionRegistry::new();
        registry.register(info(1000)).unwrap();
        let snapshot = registry.snapshot();
        let _ = registry.unregister(&ConnectionId::from("127.0.0.1:1000"));
        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }

    proptest! {
        #[test]
        fn count_matches_live_set(ops in prop::collection::vec((any::<bool>(), 0u16..8), 0..64)) {
            let mut registry = ConnectionRegistry::new();
            let mut live = HashSet::new();
            for (connect, port) in ops {
                if connect {
                    let _ = registry.register(info(port));
                    let _ = live.insert(port);
                } else {
                    let _ = registry.unregister(&ConnectionId::from_addr(SocketAddr::from(([127, 0, 0, 1], port))));
                    let _ = live.remove(&port);
                }
                prop_assert_eq!(registry.count(), live.len());
            }
        }
    }
}
