//! Transport-side connection table.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use parley_core::{ConnectionId, SendError};

use super::connection::ClientConnection;
use crate::hub::{Frame, Transport};

/// Outbound sinks of every open WebSocket, keyed by connection ID.
///
/// Sessions attach their sink before announcing the connection to the hub
/// and detach it before announcing the disconnect. The hub reaches the
/// sinks only through [`Transport::send_to`].
#[derive(Default)]
pub struct ConnectionTable {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink, replacing any previous one under the same ID.
    pub fn attach(&self, connection: Arc<ClientConnection>) {
        let id = connection.id.clone();
        let _ = self.connections.write().insert(id, connection);
    }

    /// Remove `connection`'s sink. A newer sink attached under the same ID
    /// is left in place. Returns whether anything was removed.
    pub fn detach(&self, connection: &Arc<ClientConnection>) -> bool {
        let mut connections = self.connections.write();
        let current = connections
            .get(&connection.id)
            .is_some_and(|attached| Arc::ptr_eq(attached, connection));
        if current {
            let _ = connections.remove(&connection.id);
        }
        current
    }

    /// Number of attached sinks.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether no sinks are attached.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

impl Transport for ConnectionTable {
    fn send_to(&self, id: &ConnectionId, frame: Frame) -> Result<(), SendError> {
        match self.connections.read().get(id) {
            Some(connection) => connection.send(frame),
            None => Err(SendError::Unknown(id.clone())),
        }
    }
}
