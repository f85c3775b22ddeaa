use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, trace, warn};

use crate::channel::Channel;
use crate::message::Message;

/// Keep the channel alive until `close_rx` fires.
///
/// Each cycle reacts to whichever comes first: the close signal, a reconnect
/// request from the dispatch loop, or the heartbeat tick. This task owns
/// reconnection; a failed attempt is retried on the next tick, forever.
pub(crate) async fn run_keepalive(
    channel: Channel,
    mut reconnect_rx: mpsc::Receiver<()>,
    mut close_rx: oneshot::Receiver<()>,
) {
    let frame = match Message::heartbeat().encode() {
        Ok(frame) => frame,
        Err(e) => {
            error!(topic = %channel.topic(), "Heartbeat message cannot be encoded: {}", e);
            return;
        }
    };

    let period = channel.config().heartbeat_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = &mut close_rx => {
                channel.shutdown().await;
                return;
            }
            Some(()) = reconnect_rx.recv() => {
                // requested before another open already recovered the socket
                if channel.is_connected() {
                    trace!(topic = %channel.topic(), "Ignoring stale reconnect request");
                    continue;
                }
                if let Err(e) = channel.open().await {
                    debug!(topic = %channel.topic(), "Reconnect failed, retrying later: {}", e);
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = channel.write_frame(frame.clone()).await {
                    warn!(topic = %channel.topic(), "Heartbeat failed: {}", e);
                    if let Err(e) = channel.open().await {
                        debug!(topic = %channel.topic(), "Reconnect failed: {}", e);
                        channel.mark_disconnected().await;
                    }
                }
            }
        }
    }
}
