//! WebSocket transport adapter.
//!
//! Owns the per-connection outbound sinks and the session loop that turns
//! socket traffic into hub commands.

pub mod connection;
pub mod session;
pub mod table;

pub use connection::ClientConnection;
pub use session::run_ws_session;
pub use table::ConnectionTable;
