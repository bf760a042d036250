//! The hub's outbound seam.
//!
//! The hub never touches sockets. It hands serialized frames to a
//! [`Transport`], which owns the per-connection sinks.

use std::sync::Arc;

use metrics::counter;
use parley_core::{ConnectionId, SendError};
use tracing::{debug, warn};

use crate::metrics::SEND_DROPS_TOTAL;

/// A serialized outbound frame, shared across all recipients of a broadcast.
pub type Frame = Arc<String>;

/// Delivers frames to connections. Every send is best-effort.
pub trait Transport: Send + Sync + 'static {
    /// Hand `frame` to one connection.
    fn send_to(&self, id: &ConnectionId, frame: Frame) -> Result<(), SendError>;

    /// Hand `frame` to each of `ids`. A failure for one connection never
    /// stops delivery to the rest. Returns how many sends succeeded.
    fn send_to_all<'a, I>(&self, ids: I, frame: &Frame) -> usize
    where
        I: IntoIterator<Item = &'a ConnectionId>,
    {
        let mut delivered = 0;
        for id in ids {
            match self.send_to(id, Arc::clone(frame)) {
                Ok(()) => delivered += 1,
                Err(e) => log_send_failure(&e),
            }
        }
        delivered
    }
}

/// Record a dropped send. Full queues are worth a warning; sends to
/// connections that already went away are expected during teardown.
pub(crate) fn log_send_failure(err: &SendError) {
    counter!(SEND_DROPS_TOTAL).increment(1);
    let id = err.connection_id();
    match err {
        SendError::Full(_) => warn!(conn_id = %id, "send queue full, dropping frame"),
        SendError::Closed(_) | SendError::Unknown(_) => {
            debug!(conn_id = %id, "connection gone, dropping frame");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport that records every frame it is given.

    use std::collections::HashSet;

    use parking_lot::Mutex;
    use serde_json::Value;

    use super::*;

    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        sent: Mutex<Vec<(ConnectionId, Value)>>,
        failing: Mutex<HashSet<ConnectionId>>,
    }

    impl RecordingTransport {
        /// Make every send to `id` fail as if the client had gone.
        pub(crate) fn fail_sends_to(&self, id: &str) {
            let _ = self.failing.lock().insert(ConnectionId::from(id));
        }

        /// Every frame delivered to `id`, parsed back to JSON.
        pub(crate) fn frames_for(&self, id: &str) -> Vec<Value> {
            self.sent
                .lock()
                .iter()
                .filter(|(to, _)| to.as_str() == id)
                .map(|(_, v)| v.clone())
                .collect()
        }

        /// Frames delivered to `id` with the given numeric tag.
        pub(crate) fn tagged_for(&self, id: &str, tag: u64) -> Vec<Value> {
            self.frames_for(id)
                .into_iter()
                .filter(|f| f["event"].as_u64() == Some(tag))
                .map(|f| f["data"].clone())
                .collect()
        }

        pub(crate) fn clear(&self) {
            self.sent.lock().clear();
        }
    }

    impl Transport for RecordingTransport {
        fn send_to(&self, id: &ConnectionId, frame: Frame) -> Result<(), SendError> {
            if self.failing.lock().contains(id) {
                return Err(SendError::Closed(id.clone()));
            }
            let value: Value = serde_json::from_str(&frame).unwrap();
            self.sent.lock().push((id.clone(), value));
            Ok(())
        }
    }

    #[test]
    fn send_to_all_skips_failures() {
        let transport = RecordingTransport::default();
        transport.fail_sends_to("b:2");
        let ids: Vec<ConnectionId> = vec!["a:1".into(), "b:2".into(), "c:3".into()];
        let frame: Frame = Arc::new(r#"{"event":100,"data":"x"}"#.to_string());

        let delivered = transport.send_to_all(&ids, &frame);

        assert_eq!(delivered, 2);
        assert_eq!(transport.frames_for("a:1").len(), 1);
        assert!(transport.frames_for("b:2").is_empty());
        assert_eq!(transport.frames_for("c:3").len(), 1);
    }

    #[test]
    fn send_to_all_with_no_recipients() {
        let transport = RecordingTransport::default();
        let frame: Frame = Arc::new("{}".to_string());
        assert_eq!(transport.send_to_all(&Vec::<ConnectionId>::new(), &frame), 0);
    }
}
