//! One client's outbound sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use parley_core::{ConnectionId, ConnectionState, SendError};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::hub::Frame;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// A connected WebSocket client, as seen by the transport.
///
/// Frames are queued on a bounded channel drained by the session's writer
/// task. Once the connection is [`ConnectionState::Disconnected`] every
/// send is dropped.
pub struct ClientConnection {
    /// Connection ID.
    pub id: ConnectionId,
    /// Process-unique token for this socket. A reconnect from the same
    /// `address:port` gets a fresh one.
    pub session: u64,
    tx: mpsc::Sender<Frame>,
    state: Mutex<ConnectionState>,
    /// When the transport accepted this connection.
    pub connected_at: Instant,
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// A new connection in the `Connecting` state.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Frame>) -> Self {
        Self {
            id,
            session: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            tx,
            state: Mutex::new(ConnectionState::Connecting),
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Move to `next` if the transition is legal. Returns whether it moved.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if state.can_transition_to(next) {
            *state = next;
            true
        } else {
            false
        }
    }

    /// Queue a frame for the writer task without waiting.
    pub fn send(&self, frame: Frame) -> Result<(), SendError> {
        if self.state().is_terminal() {
            return Err(SendError::Closed(self.id.clone()));
        }
        self.tx.try_send(frame).map_err(|e| {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            match e {
                TrySendError::Full(_) => SendError::Full(self.id.clone()),
                TrySendError::Closed(_) => SendError::Closed(self.id.clone()),
            }
        })
    }

    /// Frames dropped because the queue was full or the writer had gone.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
