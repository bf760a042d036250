//! Error types for the hub and its transport boundary.
//!
//! None of these are fatal. The hub logs them and carries on: a bad event
//! from one client never affects another.

use thiserror::Error;

use crate::ids::ConnectionId;

/// Errors raised while routing a client event through the hub.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// The event's payload did not match the shape its name requires.
    #[error("invalid payload for {event}: {reason}")]
    InvalidPayload {
        /// Event name as sent by the client.
        event: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The client sent an event name outside the protocol vocabulary.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// A connection registered under an ID that is already live.
    #[error("connection already registered: {0}")]
    DuplicateConnection(ConnectionId),

    /// An event arrived for a connection the hub does not know.
    #[error("connection not registered: {0}")]
    NotRegistered(ConnectionId),
}

impl HubError {
    /// Shorthand for [`HubError::InvalidPayload`].
    pub fn invalid_payload(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            event: event.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for hub routing operations.
pub type Result<T, E = HubError> = std::result::Result<T, E>;

/// Why a frame could not be handed to a connection.
///
/// Sends are best-effort; callers log these and move on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The connection's writer has gone away.
    #[error("connection closed: {0}")]
    Closed(ConnectionId),

    /// The connection's outbound queue is full.
    #[error("send queue full: {0}")]
    Full(ConnectionId),

    /// The transport has no sink for this connection.
    #[error("no such connection: {0}")]
    Unknown(ConnectionId),
}

impl SendError {
    /// The connection the send was addressed to.
    pub fn connection_id(&self) -> &ConnectionId {
        match self {
            Self::Closed(id) | Self::Full(id) | Self::Unknown(id) => id,
        }
    }
}
