use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::protocol::{Message, WebSocketConfig};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::{debug, error, info, trace};

use crate::config::RealtimeConfig;
use crate::error::SupabaseError;

/// Upper bound on waiting for the peer while closing a socket
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials realtime sockets.
///
/// The default implementation is [`WebSocketTransport`]; tests substitute an
/// in-memory transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a socket to `url`, returning its write and read halves.
    async fn connect(
        &self,
        url: &str,
        config: &RealtimeConfig,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), SupabaseError>;
}

/// Write half of a realtime socket
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame
    async fn send_text(&mut self, frame: String) -> Result<(), SupabaseError>;

    /// Close the socket. Errors are not reported.
    async fn close(&mut self);
}

/// Read half of a realtime socket
#[async_trait]
pub trait FrameStream: Send {
    /// Read the next text frame. `Ok(None)` means the peer closed the socket.
    ///
    /// Must be cancel safe: the dispatcher races it against a read deadline.
    async fn next_frame(&mut self) -> Result<Option<String>, SupabaseError>;
}

/// Transport over tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(
        &self,
        url: &str,
        config: &RealtimeConfig,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), SupabaseError> {
        let mut request = url.into_client_request()?;
        let origin = HeaderValue::from_str(&config.origin)
            .map_err(|e| SupabaseError::ConnectionError(format!("Invalid origin: {}", e)))?;
        request.headers_mut().insert(ORIGIN, origin);

        let ws_config = WebSocketConfig {
            max_message_size: Some(config.max_message_bytes),
            max_frame_size: Some(config.max_message_bytes),
            ..Default::default()
        };

        info!("Connecting to realtime socket at {}", request.uri());

        let (ws_stream, response) = connect_async_with_config(request, Some(ws_config), false)
            .await
            .map_err(|e| {
                error!("Failed to connect to WebSocket server: {}", e);
                e
            })?;

        debug!("Connected to WebSocket server. Response: {:?}", response);

        let (sink, stream) = ws_stream.split();
        Ok((
            Box::new(WebSocketSink { sink }),
            Box::new(WebSocketReader { stream }),
        ))
    }
}

struct WebSocketSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, frame: String) -> Result<(), SupabaseError> {
        trace!("Sending frame: {}", frame);
        self.sink.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let closed = tokio::time::timeout(CLOSE_TIMEOUT, async {
            if let Err(e) = self.sink.send(Message::Close(None)).await {
                debug!("Error sending close frame: {}", e);
            }
            let _ = self.sink.close().await;
        })
        .await;
        if closed.is_err() {
            debug!("Timed out closing WebSocket");
        }
    }
}

struct WebSocketReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WebSocketReader {
    async fn next_frame(&mut self) -> Result<Option<String>, SupabaseError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!("Received message: {}", text);
                    return Ok(Some(text));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(String::from_utf8_lossy(&data).into_owned()));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Server closed the socket: {:?}", frame);
                    return Ok(None);
                }
                // tungstenite answers pings itself
                Some(Ok(_)) => continue,
                Some(Err(tokio_tungstenite::tungstenite::Error::Capacity(
                    CapacityError::MessageTooLong { size, max_size },
                ))) => {
                    return Err(SupabaseError::FrameTooLarge {
                        size,
                        limit: max_size,
                    });
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }
}
