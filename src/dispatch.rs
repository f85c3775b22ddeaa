use tokio::sync::oneshot;
use tracing::{trace, warn};

use crate::channel::Channel;
use crate::connection::FrameStream;
use crate::error::SupabaseError;

/// Read frames from one socket and route them to the channel's listeners.
///
/// Exits when `stop_rx` fires (the socket is being replaced or closed), when
/// the channel is no longer connected, or after a read failure. A read
/// failure marks the channel disconnected and asks the heartbeat loop to
/// reconnect; this loop never reconnects itself.
///
/// A frame over the size limit is counted as dropped and also ends the
/// socket, since the WebSocket stream cannot be read past it.
pub(crate) async fn run_dispatch_loop(
    channel: Channel,
    mut reader: Box<dyn FrameStream>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let read_deadline = channel.config().read_deadline;

    while channel.is_connected() {
        tokio::select! {
            _ = &mut stop_rx => {
                trace!(topic = %channel.topic(), "Dispatch loop stopped");
                return;
            }
            read = tokio::time::timeout(read_deadline, reader.next_frame()) => {
                match read {
                    // deadline elapsed; re-check the connection state
                    Err(_) => continue,
                    Ok(Ok(Some(frame))) => channel.dispatch_frame(&frame).await,
                    Ok(Err(e @ SupabaseError::FrameTooLarge { .. })) => {
                        channel.record_dropped_frame(&e);
                        handle_read_failure(&channel, e.to_string()).await;
                        return;
                    }
                    Ok(Ok(None)) => {
                        handle_read_failure(&channel, "socket closed by peer".to_string()).await;
                        return;
                    }
                    Ok(Err(e)) => {
                        handle_read_failure(&channel, e.to_string()).await;
                        return;
                    }
                }
            }
        }
    }
    trace!(topic = %channel.topic(), "Dispatch loop exiting, channel no longer connected");
}

async fn handle_read_failure(channel: &Channel, reason: String) {
    warn!(topic = %channel.topic(), reason = %reason, "Realtime read failed");
    channel.close_writer().await;
    channel.mark_disconnected().await;
    channel.request_reconnect();
}
