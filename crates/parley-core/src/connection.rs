//! Connection handshake metadata and lifecycle state.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ConnectionId;

/// Identity metadata captured when a client connects.
///
/// This is what `connected`/`disconnected` broadcasts and `GET STATUS`
/// sessions carry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Connection ID (`address:port`).
    pub id: ConnectionId,
    /// Remote IP address.
    pub address: String,
    /// Remote port.
    pub port: u16,
    /// When the transport accepted the connection.
    pub connected_at: DateTime<Utc>,
    /// `User-Agent` header of the upgrade request, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ConnectionInfo {
    /// Metadata for a peer that connected just now.
    pub fn new(peer: SocketAddr) -> Self {
        Self::at(peer, Utc::now())
    }

    /// Metadata for a peer that connected at `connected_at`.
    pub fn at(peer: SocketAddr, connected_at: DateTime<Utc>) -> Self {
        Self {
            id: ConnectionId::from_addr(peer),
            address: peer.ip().to_string(),
            port: peer.port(),
            connected_at,
            user_agent: None,
        }
    }

    /// Attach the client's user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Lifecycle of a single connection.
///
/// `Connecting → Connected → Disconnected`. `Disconnected` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Accepted by the transport, not yet announced to the hub.
    #[default]
    Connecting,
    /// Registered with the hub.
    Connected,
    /// Gone. Sends are dropped.
    Disconnected,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Connected | Self::Disconnected)
                | (Self::Connected, Self::Disconnected)
        )
    }

    /// Whether this state is terminal.
    pub fn is_terminal(self) -> bool {
        self == Self::Disconnected
    }
}
