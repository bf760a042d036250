//! # parley-core
//!
//! Shared vocabulary for the Parley broadcast hub:
//!
//! - **IDs**: [`ConnectionId`], derived from the peer's `address:port`
//! - **Connections**: [`ConnectionInfo`] handshake metadata and the
//!   [`ConnectionState`] lifecycle
//! - **Protocol**: inbound [`InboundFrame`]s parsed into typed
//!   [`ClientEvent`]s, outbound [`OutboundEvent`]s tagged with [`EventTag`]
//! - **Errors**: [`HubError`] and [`SendError`] via `thiserror`

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod ids;
pub mod protocol;

pub use connection::{ConnectionInfo, ConnectionState};
pub use errors::{HubError, Result, SendError};
pub use ids::ConnectionId;
pub use protocol::{ClientEvent, EventTag, InboundFrame, OutboundEvent};
