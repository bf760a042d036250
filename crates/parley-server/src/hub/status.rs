//! Server status snapshot.

use std::collections::BTreeMap;

use parley_core::{ConnectionId, ConnectionInfo};
use serde::{Deserialize, Serialize};

/// Reply body for `GET STATUS`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    /// Live connections at the time of the snapshot.
    pub connection_count: usize,
    /// Metadata of every live connection, keyed by ID.
    pub sessions: BTreeMap<ConnectionId, ConnectionInfo>,
    /// Hub start time in epoch milliseconds.
    pub server_start_time: i64,
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;

    #[test]
    fn serializes_camel_case_with_sessions_keyed_by_id() {
        let info = ConnectionInfo::new(SocketAddr::from(([10, 0, 0, 1], 5000)));
        let mut sessions = BTreeMap::new();
        let _ = sessions.insert(info.id.clone(), info);
        let status = ServerStatus {
            connection_count: 1,
            sessions,
            server_start_time: 1_700_000_000_000,
        };

        let value = serde_json::to_value(&status).unwrap();

        assert_eq!(value["connectionCount"], 1);
        assert_eq!(value["serverStartTime"], 1_700_000_000_000_i64);
        assert_eq!(value["sessions"]["10.0.0.1:5000"]["port"], 5000);
    }
}
