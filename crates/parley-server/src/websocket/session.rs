//! WebSocket session lifecycle, from upgrade through disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use parley_core::{ConnectionInfo, ConnectionState, InboundFrame};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::table::ConnectionTable;
use crate::hub::{Frame, HubHandle};

/// Run a WebSocket session for one client.
///
/// 1. Attaches an outbound sink to `table` and announces the connection
/// 2. Forwards queued frames to the socket from a writer task
/// 3. Parses inbound text (or UTF-8 binary) frames and hands them to the hub
/// 4. On close or error, drops the sink and announces the disconnect
///
/// The session token from [`ClientConnection`] travels with both
/// announcements, so a late close from a replaced socket cannot tear down
/// its successor.
#[instrument(skip_all, fields(conn_id = %info.id))]
pub async fn run_ws_session(
    ws: WebSocket,
    info: ConnectionInfo,
    hub: HubHandle,
    table: Arc<ConnectionTable>,
    send_queue_capacity: usize,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let id = info.id.clone();

    let (send_tx, mut send_rx) = mpsc::channel::<Frame>(send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(id.clone(), send_tx));
    table.attach(Arc::clone(&connection));

    if hub.connect(info, connection.session).await.is_err() {
        warn!("hub not running, refusing connection");
        let _ = connection.transition(ConnectionState::Disconnected);
        let _ = table.detach(&connection);
        let _ = ws_tx.close().await;
        return;
    }
    let _ = connection.transition(ConnectionState::Connected);

    let outbound = tokio::spawn(async move {
        while let Some(frame) = send_rx.recv().await {
            if ws_tx.send(Message::Text(frame.as_str().to_owned().into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        let parsed = match &msg {
            Message::Text(text) => InboundFrame::parse(text.as_str()),
            Message::Binary(data) => match std::str::from_utf8(data) {
                Ok(text) => InboundFrame::parse(text),
                Err(_) => {
                    info!(len = data.len(), "received non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let frame = match parsed {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                continue;
            }
        };
        debug!(event = %frame.event, "received event");
        if hub.dispatch(id.clone(), frame).await.is_err() {
            warn!("hub not running, closing session");
            break;
        }
    }

    let _ = connection.transition(ConnectionState::Disconnected);
    if !table.detach(&connection) {
        debug!("sink already replaced by a newer session");
    }
    outbound.abort();
    let _ = hub.disconnect(id, connection.session).await;
    info!(
        dropped = connection.drop_count(),
        age_secs = connection.age().as_secs(),
        "session closed"
    );
}
