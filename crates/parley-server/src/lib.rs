//! # parley-server
//!
//! The Parley broadcast hub and the surfaces around it.
//!
//! - [`hub`]: the serialized hub actor that owns the connection registry and
//!   message log, routes client events, and schedules per-connection
//!   heartbeats
//! - [`websocket`]: the transport adapter (connection sinks, session loop)
//! - [`server`]: Axum router (`/ws`, `/health`, `/metrics`, static files)
//! - [`shutdown`]: graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod hub;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod static_files;
pub mod websocket;

pub use config::ServerConfig;
pub use hub::{HubClosed, HubHandle};
pub use server::ParleyServer;
