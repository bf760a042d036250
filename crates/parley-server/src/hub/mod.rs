//! The broadcast hub.
//!
//! A single task owns the [`ConnectionRegistry`] and the [`MessageLog`] and
//! processes [`HubCommand`]s one at a time, so every registry mutation,
//! log append, and broadcast is totally ordered. Transport sessions talk to
//! it through a cloneable [`HubHandle`]; heartbeat timers feed ticks back
//! into the same queue.

pub mod heartbeat;
pub mod message_log;
pub mod registry;
pub mod status;
pub mod transport;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use parley_core::protocol::ACK;
use parley_core::{
    ClientEvent, ConnectionId, ConnectionInfo, HubError, InboundFrame, OutboundEvent,
};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::{
    CONNECTION_DURATION_SECONDS, CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL, DISCONNECTIONS_TOTAL,
    INVALID_EVENTS_TOTAL, MESSAGES_TOTAL,
};

pub use message_log::MessageLog;
pub use registry::ConnectionRegistry;
pub use status::ServerStatus;
pub use transport::{Frame, Transport};

/// Everything the hub can be asked to do.
#[derive(Debug)]
pub enum HubCommand {
    /// A transport accepted a new connection.
    Connect {
        /// Handshake metadata.
        info: ConnectionInfo,
        /// Transport-assigned token, unique per socket.
        session: u64,
    },
    /// A connection sent a frame.
    Event {
        /// Sender.
        id: ConnectionId,
        /// The frame as read off the wire.
        frame: InboundFrame,
    },
    /// A connection closed. Ignored unless `session` is the one the ID is
    /// currently registered under.
    Disconnect {
        /// Connection that closed.
        id: ConnectionId,
        /// Token the connection was announced with.
        session: u64,
    },
    /// A heartbeat timer fired.
    Heartbeat {
        /// Connection to ping.
        id: ConnectionId,
        /// Timer generation that produced the tick.
        generation: u64,
    },
    /// Snapshot the server status.
    Status(oneshot::Sender<ServerStatus>),
    /// Snapshot the message log.
    Messages(oneshot::Sender<Vec<Value>>),
}

/// The hub task has stopped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("hub is not running")]
pub struct HubClosed;

/// Result of a call through [`HubHandle`].
pub type Result<T, E = HubClosed> = std::result::Result<T, E>;

/// Hub tuning.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Per-connection ping period. Clamped to at least one millisecond.
    pub heartbeat_interval: Duration,
    /// Commands buffered in front of the hub.
    pub queue_capacity: usize,
    /// Sentinel the message log starts with.
    pub seed_message: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(5000),
            queue_capacity: 1024,
            seed_message: "Initial message".to_owned(),
        }
    }
}

/// Cloneable front door to the hub task.
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Announce a new connection. Its sink must already be attached to the
    /// transport so it receives its own `connected` broadcast. `session`
    /// must be passed back unchanged to [`HubHandle::disconnect`].
    pub async fn connect(&self, info: ConnectionInfo, session: u64) -> Result<()> {
        self.send(HubCommand::Connect { info, session }).await
    }

    /// Route a frame from `id`.
    pub async fn dispatch(&self, id: ConnectionId, frame: InboundFrame) -> Result<()> {
        self.send(HubCommand::Event { id, frame }).await
    }

    /// Announce that the `session` connection under `id` has gone away.
    pub async fn disconnect(&self, id: ConnectionId, session: u64) -> Result<()> {
        self.send(HubCommand::Disconnect { id, session }).await
    }

    /// Current server status.
    pub async fn status(&self) -> Result<ServerStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Status(reply)).await?;
        rx.await.map_err(|_| HubClosed)
    }

    /// Current message log, oldest first.
    pub async fn messages(&self) -> Result<Vec<Value>> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Messages(reply)).await?;
        rx.await.map_err(|_| HubClosed)
    }

    async fn send(&self, cmd: HubCommand) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| HubClosed)
    }
}

struct HeartbeatTimer {
    generation: u64,
    cancel: CancellationToken,
}

/// Hub state. Lives inside the task started by [`spawn_hub`].
pub struct BroadcastHub<T: Transport> {
    registry: ConnectionRegistry,
    sessions: HashMap<ConnectionId, u64>,
    log: MessageLog,
    transport: Arc<T>,
    start_time: DateTime<Utc>,
    heartbeat_interval: Duration,
    heartbeats: HashMap<ConnectionId, HeartbeatTimer>,
    next_generation: u64,
    commands: mpsc::WeakSender<HubCommand>,
    shutdown: CancellationToken,
}

/// Start the hub task.
///
/// The task runs until `shutdown` is cancelled or every [`HubHandle`] is
/// dropped. Heartbeat timers are children of `shutdown`.
pub fn spawn_hub<T: Transport>(
    config: &HubConfig,
    transport: Arc<T>,
    shutdown: CancellationToken,
) -> (HubHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let hub = BroadcastHub::new(config, transport, tx.downgrade(), shutdown);
    let task = tokio::spawn(hub.run(rx));
    (HubHandle { tx }, task)
}

impl<T: Transport> BroadcastHub<T> {
    fn new(
        config: &HubConfig,
        transport: Arc<T>,
        commands: mpsc::WeakSender<HubCommand>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            sessions: HashMap::new(),
            log: MessageLog::new(Value::String(config.seed_message.clone())),
            transport,
            start_time: Utc::now(),
            heartbeat_interval: config.heartbeat_interval,
            heartbeats: HashMap::new(),
            next_generation: 0,
            commands,
            shutdown,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>) {
        info!(start_time = %self.start_time, "hub started");
        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                () = shutdown.cancelled() => break,
            }
        }
        for (_, timer) in self.heartbeats.drain() {
            timer.cancel.cancel();
        }
        info!(connections = self.registry.count(), "hub stopped");
    }

    fn handle(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Connect { info, session } => self.on_connect(info, session),
            HubCommand::Event { id, frame } => self.on_event(&id, frame),
            HubCommand::Disconnect { id, session } => self.on_disconnect(&id, session),
            HubCommand::Heartbeat { id, generation } => self.on_heartbeat(&id, generation),
            HubCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            HubCommand::Messages(reply) => {
                let _ = reply.send(self.log.all());
            }
        }
    }

    #[instrument(skip_all, fields(conn_id = %info.id, session = session))]
    fn on_connect(&mut self, info: ConnectionInfo, session: u64) {
        let id = info.id.clone();
        if let Err(e) = self.registry.register(info.clone()) {
            error!(error = %e, "replacing existing registration");
        }
        let _ = self.sessions.insert(id.clone(), session);
        self.start_heartbeat(&id);

        counter!(CONNECTIONS_TOTAL).increment(1);
        self.record_active();
        info!(
            address = %info.address,
            user_agent = info.user_agent.as_deref().unwrap_or(""),
            connections = self.registry.count(),
            "client connected"
        );

        self.broadcast(&OutboundEvent::connected(&info));
        self.send_to(&id, &OutboundEvent::ok(self.log.to_value()));
    }

    #[instrument(skip_all, fields(conn_id = %id, event = %frame.event))]
    fn on_event(&mut self, id: &ConnectionId, frame: InboundFrame) {
        if !self.registry.contains(id) {
            warn!(error = %HubError::NotRegistered(id.clone()), "dropping event");
            return;
        }
        let event = match ClientEvent::parse(frame) {
            Ok(event) => event,
            Err(e) => {
                counter!(INVALID_EVENTS_TOTAL).increment(1);
                warn!(error = %e, "dropping invalid event");
                return;
            }
        };
        debug!(kind = event.name(), "handling event");

        match event {
            ClientEvent::GetStatus => {
                let status = self.status();
                self.send_to(id, &OutboundEvent::ok(json!({ "status": status })));
            }
            ClientEvent::GetMessages => {
                self.send_to(id, &OutboundEvent::ok(self.log.to_value()));
            }
            ClientEvent::PutMessage(message) => {
                self.log.append(message.clone());
                counter!(MESSAGES_TOTAL).increment(1);
                debug!(log_len = self.log.len(), "message appended");
                self.send_to(id, &OutboundEvent::ok(Value::String(ACK.to_owned())));
                self.broadcast(&OutboundEvent::broadcast(message));
            }
            ClientEvent::TestBroadcast(data) => {
                self.broadcast(&OutboundEvent::broadcast(json!({ "data": data })));
            }
            ClientEvent::TestError { code } => {
                self.send_to(id, &OutboundEvent::test_error(code));
            }
        }
    }

    #[instrument(skip_all, fields(conn_id = %id, session = session))]
    fn on_disconnect(&mut self, id: &ConnectionId, session: u64) {
        if self.sessions.get(id) != Some(&session) {
            debug!("disconnect for unknown or replaced session");
            return;
        }
        let _ = self.sessions.remove(id);
        self.stop_heartbeat(id);
        let Some(info) = self.registry.unregister(id) else {
            debug!("disconnect for unregistered connection");
            return;
        };

        counter!(DISCONNECTIONS_TOTAL).increment(1);
        self.record_active();
        let lifetime = (Utc::now() - info.connected_at)
            .to_std()
            .unwrap_or_default();
        histogram!(CONNECTION_DURATION_SECONDS).record(lifetime.as_secs_f64());
        info!(
            duration_secs = lifetime.as_secs(),
            connections = self.registry.count(),
            "client disconnected"
        );

        self.broadcast(&OutboundEvent::disconnected(&info));
    }

    fn on_heartbeat(&mut self, id: &ConnectionId, generation: u64) {
        let current = self.heartbeats.get(id).map(|t| t.generation);
        if current != Some(generation) || !self.registry.contains(id) {
            debug!(conn_id = %id, generation, "ignoring stale heartbeat");
            return;
        }
        self.send_to(id, &OutboundEvent::ping(Utc::now().timestamp_millis()));
    }

    fn start_heartbeat(&mut self, id: &ConnectionId) {
        self.stop_heartbeat(id);
        self.next_generation += 1;
        let timer = HeartbeatTimer {
            generation: self.next_generation,
            cancel: self.shutdown.child_token(),
        };
        drop(tokio::spawn(heartbeat::run_heartbeat(
            id.clone(),
            timer.generation,
            self.heartbeat_interval,
            self.commands.clone(),
            timer.cancel.clone(),
        )));
        let _ = self.heartbeats.insert(id.clone(), timer);
    }

    fn stop_heartbeat(&mut self, id: &ConnectionId) {
        if let Some(timer) = self.heartbeats.remove(id) {
            timer.cancel.cancel();
        }
    }

    fn status(&self) -> ServerStatus {
        ServerStatus {
            connection_count: self.registry.count(),
            sessions: self.registry.snapshot(),
            server_start_time: self.start_time.timestamp_millis(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_active(&self) {
        gauge!(CONNECTIONS_ACTIVE).set(self.registry.count() as f64);
    }

    fn send_to(&self, id: &ConnectionId, event: &OutboundEvent) {
        let Some(frame) = encode(event) else { return };
        if let Err(e) = self.transport.send_to(id, frame) {
            transport::log_send_failure(&e);
        }
    }

    fn broadcast(&self, event: &OutboundEvent) {
        let Some(frame) = encode(event) else { return };
        let delivered = self.transport.send_to_all(self.registry.ids(), &frame);
        debug!(
            recipients = self.registry.count(),
            delivered,
            "broadcast sent"
        );
    }
}

fn encode(event: &OutboundEvent) -> Option<Frame> {
    match event.to_json() {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            error!(error = %e, "failed to serialize outbound event");
            None
        }
    }
}
