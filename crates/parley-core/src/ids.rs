//! Connection identifiers.
//!
//! A connection is identified by the remote `address:port` pair captured
//! when the transport accepts it. Two live TCP connections can never share
//! that pair, so the ID is unique for the connection's lifetime.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Opaque identifier of one live client connection.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Build the ID for a peer socket address (`"127.0.0.1:50312"`).
    #[must_use]
    pub fn from_addr(addr: SocketAddr) -> Self {
        Self(format!("{}:{}", addr.ip(), addr.port()))
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<SocketAddr> for ConnectionId {
    fn from(addr: SocketAddr) -> Self {
        Self::from_addr(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_ipv4_addr() {
        let addr: SocketAddr = "127.0.0.1:50312".parse().unwrap();
        let id = ConnectionId::from_addr(addr);
        assert_eq!(id.as_str(), "127.0.0.1:50312");
    }

    #[test]
    fn from_ipv6_addr_has_no_brackets() {
        let addr: SocketAddr = "[::1]:9000".parse().unwrap();
        let id = ConnectionId::from(addr);
        assert_eq!(id.as_str(), "::1:9000");
    }

    #[test]
    fn distinct_ports_distinct_ids() {
        let a = ConnectionId::from_addr("10.0.0.1:1000".parse().unwrap());
        let b = ConnectionId::from_addr("10.0.0.1:1001".parse().unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ConnectionId::from("1.2.3.4:5");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""1.2.3.4:5""#);
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_matches_inner() {
        let id = ConnectionId::from("peer:1");
        assert_eq!(id.to_string(), "peer:1");
        assert_eq!(id.as_ref(), "peer:1");
    }
}
