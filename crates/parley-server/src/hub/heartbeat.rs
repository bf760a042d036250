//! Per-connection heartbeat scheduling.

use std::time::Duration;

use parley_core::ConnectionId;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::HubCommand;

/// Shortest period a timer will run at. `interval_at` rejects zero.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The connection went away and the hub cancelled the timer.
    Cancelled,
    /// The hub stopped accepting commands.
    HubClosed,
}

/// Ask the hub to ping `id` once per `interval` until cancelled.
///
/// The first tick fires one full interval after the call. The task holds
/// only a weak sender, so it never keeps the hub alive on its own.
/// `generation` lets the hub discard ticks from a timer it already replaced.
/// Intervals below [`MIN_INTERVAL`] are raised to it.
pub async fn run_heartbeat(
    id: ConnectionId,
    generation: u64,
    interval: Duration,
    commands: mpsc::WeakSender<HubCommand>,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let interval = interval.max(MIN_INTERVAL);
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
            _ = ticker.tick() => {
                let Some(tx) = commands.upgrade() else {
                    return HeartbeatResult::HubClosed;
                };
                let tick = HubCommand::Heartbeat { id: id.clone(), generation };
                if tx.send(tick).await.is_err() {
                    return HeartbeatResult::HubClosed;
                }
            }
        }
    }
}
