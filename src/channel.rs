use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::RealtimeConfig;
use crate::connection::{FrameSink, FrameStream, Transport};
use crate::dispatch::run_dispatch_loop;
use crate::error::SupabaseError;
use crate::event::{LifecycleCallback, Listener, ListenerRegistry};
use crate::heartbeat::run_keepalive;
use crate::message::{Message, Payload};
use crate::state::{ConnectionState, StateCell};

/// A subscription to one realtime topic.
///
/// `Channel` is a cheap handle; clones share the same connection, listeners
/// and callbacks.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    topic: String,
    url: String,
    config: RealtimeConfig,
    transport: Arc<dyn Transport>,
    state: StateCell,
    /// Set once on-disconnect has fired for the current connection
    disconnect_notified: AtomicBool,
    dropped_frames: AtomicU64,
    writer: Mutex<Option<Box<dyn FrameSink>>>,
    reader: Mutex<Option<ReaderTask>>,
    /// Serializes connection attempts and teardown
    open_lock: Mutex<()>,
    listeners: ListenerRegistry,
    on_connect: RwLock<Option<LifecycleCallback>>,
    on_disconnect: RwLock<Option<LifecycleCallback>>,
    reconnect_tx: mpsc::Sender<()>,
    reconnect_rx: Mutex<Option<mpsc::Receiver<()>>>,
    keepalive: Mutex<Option<KeepAliveTask>>,
}

struct ReaderTask {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct KeepAliveTask {
    close_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Channel {
    pub(crate) fn new(
        topic: &str,
        url: &str,
        config: RealtimeConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
        Self {
            inner: Arc::new(ChannelInner {
                topic: topic.to_string(),
                url: url.to_string(),
                config,
                transport,
                state: StateCell::new(ConnectionState::Disconnected),
                disconnect_notified: AtomicBool::new(true),
                dropped_frames: AtomicU64::new(0),
                writer: Mutex::new(None),
                reader: Mutex::new(None),
                open_lock: Mutex::new(()),
                listeners: ListenerRegistry::default(),
                on_connect: RwLock::new(None),
                on_disconnect: RwLock::new(None),
                reconnect_tx,
                reconnect_rx: Mutex::new(Some(reconnect_rx)),
                keepalive: Mutex::new(None),
            }),
        }
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn origin(&self) -> &str {
        &self.inner.config.origin
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Number of inbound frames discarded because they were oversized or malformed
    pub fn dropped_frames(&self) -> u64 {
        self.inner.dropped_frames.load(Ordering::Relaxed)
    }

    /// Register a callback for `event`, or for every event with [`WILDCARD`](crate::WILDCARD).
    pub async fn on<F>(&self, event: &str, callback: F)
    where
        F: Fn(&Channel, &Message) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .push(Listener::new(event, Arc::new(callback)))
            .await;
    }

    /// Remove every callback registered under exactly `event`
    pub async fn remove_callbacks_for_event(&self, event: &str) -> usize {
        let removed = self.inner.listeners.remove_event(event).await;
        debug!(topic = %self.inner.topic, event, removed, "Removed listeners");
        removed
    }

    /// Set the callback fired after every successful (re)connect
    pub async fn on_connect<F>(&self, callback: F)
    where
        F: Fn(&Channel) + Send + Sync + 'static,
    {
        *self.inner.on_connect.write().await = Some(Arc::new(callback));
    }

    /// Set the callback fired when the connection is lost or closed
    pub async fn on_disconnect<F>(&self, callback: F)
    where
        F: Fn(&Channel) + Send + Sync + 'static,
    {
        *self.inner.on_disconnect.write().await = Some(Arc::new(callback));
    }

    /// Connect, join the topic and start the dispatch and heartbeat loops.
    pub async fn listen(&self) -> Result<(), SupabaseError> {
        self.open().await?;

        let mut keepalive = self.inner.keepalive.lock().await;
        if keepalive.is_none() {
            let Some(reconnect_rx) = self.inner.reconnect_rx.lock().await.take() else {
                return Err(SupabaseError::ChannelClosed);
            };
            let (close_tx, close_rx) = oneshot::channel();
            let handle = tokio::spawn(run_keepalive(self.clone(), reconnect_rx, close_rx));
            *keepalive = Some(KeepAliveTask { close_tx, handle });
        }
        Ok(())
    }

    /// Send an event on this channel's topic, reconnecting first if needed.
    ///
    /// `payload` must be a JSON object or null.
    pub async fn send(&self, event: &str, payload: Value) -> Result<(), SupabaseError> {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Payload::new(),
            other => {
                return Err(SupabaseError::InvalidMessage(format!(
                    "payload must be a JSON object, got {}",
                    other
                )));
            }
        };
        let frame = Message::new(&self.inner.topic, event, payload).encode()?;

        if !self.is_connected() {
            debug!(topic = %self.inner.topic, "Reconnecting before send");
            self.open().await?;
        }
        self.write_frame(frame).await
    }

    /// Stop both background loops, release the socket and fire on-disconnect.
    ///
    /// Returns once the loops have exited. Later calls do nothing.
    pub async fn close(&self) {
        let keepalive = self.inner.keepalive.lock().await.take();
        match keepalive {
            Some(task) => {
                let _ = task.close_tx.send(());
                if let Err(e) = task.handle.await {
                    warn!(topic = %self.inner.topic, "Heartbeat task failed: {}", e);
                }
            }
            None => {
                // never listened; only a socket opened by `send` may be left
                let guard = self.inner.open_lock.lock().await;
                if self.state().is_closing() {
                    return;
                }
                self.inner.state.advance(ConnectionState::Closing);
                self.release_socket().await;
                self.inner.state.advance(ConnectionState::Closed);
                self.inner.reconnect_rx.lock().await.take();
                let was_live = !self.inner.disconnect_notified.swap(true, Ordering::AcqRel);
                drop(guard);

                if was_live {
                    self.fire(&self.inner.on_disconnect).await;
                }
            }
        }
    }

    /// Establish (or re-establish) the socket and perform the join handshake.
    pub(crate) async fn open(&self) -> Result<(), SupabaseError> {
        let guard = self.inner.open_lock.lock().await;
        if self.inner.state.advance(ConnectionState::Connecting).is_none() {
            return Err(SupabaseError::ChannelClosed);
        }
        self.release_socket().await;

        let (writer, reader) = match self.connect_and_join().await {
            Ok(halves) => halves,
            Err(e) => {
                self.inner.state.advance(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        *self.inner.writer.lock().await = Some(writer);
        self.inner.disconnect_notified.store(false, Ordering::Release);
        self.inner.state.advance(ConnectionState::Connected);

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_dispatch_loop(self.clone(), reader, stop_rx));
        *self.inner.reader.lock().await = Some(ReaderTask { stop_tx, handle });
        drop(guard);

        info!(topic = %self.inner.topic, "Joined realtime channel");
        self.fire(&self.inner.on_connect).await;
        Ok(())
    }

    async fn connect_and_join(
        &self,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), SupabaseError> {
        let join = Message::join(&self.inner.topic).encode()?;
        let (mut writer, reader) = self
            .inner
            .transport
            .connect(&self.inner.url, &self.inner.config)
            .await?;
        if let Err(e) = writer.send_text(join).await {
            warn!(topic = %self.inner.topic, "Failed to send join: {}", e);
            writer.close().await;
            return Err(e);
        }
        Ok((writer, reader))
    }

    /// Teardown requested by `close`, run on the heartbeat task.
    pub(crate) async fn shutdown(&self) {
        let _guard = self.inner.open_lock.lock().await;
        self.inner.state.advance(ConnectionState::Closing);
        self.release_socket().await;
        self.inner.state.advance(ConnectionState::Closed);
        self.inner.disconnect_notified.store(true, Ordering::Release);
        info!(topic = %self.inner.topic, "Closed realtime channel");
        self.fire(&self.inner.on_disconnect).await;
    }

    /// Stop the dispatch task of the current socket and close its writer.
    ///
    /// Never called from the dispatch task itself.
    async fn release_socket(&self) {
        let reader = self.inner.reader.lock().await.take();
        if let Some(task) = reader {
            let _ = task.stop_tx.send(());
            if let Err(e) = task.handle.await {
                warn!(topic = %self.inner.topic, "Dispatch task failed: {}", e);
            }
        }
        self.close_writer().await;
    }

    pub(crate) async fn close_writer(&self) {
        let writer = self.inner.writer.lock().await.take();
        if let Some(mut writer) = writer {
            writer.close().await;
        }
    }

    pub(crate) async fn write_frame(&self, frame: String) -> Result<(), SupabaseError> {
        let mut writer = self.inner.writer.lock().await;
        match writer.as_mut() {
            Some(writer) => writer.send_text(frame).await,
            None => Err(SupabaseError::NotConnected),
        }
    }

    /// Record a lost connection; on-disconnect fires at most once per connection.
    pub(crate) async fn mark_disconnected(&self) {
        if self.state().is_closing() {
            return;
        }
        self.inner.state.advance(ConnectionState::Disconnected);
        if !self.inner.disconnect_notified.swap(true, Ordering::AcqRel) {
            info!(topic = %self.inner.topic, "Realtime channel disconnected");
            self.fire(&self.inner.on_disconnect).await;
        }
    }

    /// Ask the heartbeat loop to reconnect. Never blocks; pending requests coalesce.
    pub(crate) fn request_reconnect(&self) {
        if self.inner.reconnect_tx.try_send(()).is_err() {
            trace!(topic = %self.inner.topic, "Reconnect already pending");
        }
    }

    pub(crate) fn record_dropped_frame(&self, reason: &SupabaseError) {
        let total = self.inner.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(topic = %self.inner.topic, total, "Dropped inbound frame: {}", reason);
    }

    /// Route one inbound frame to the matching listeners.
    pub(crate) async fn dispatch_frame(&self, frame: &str) {
        let limit = self.inner.config.max_message_bytes;
        if frame.len() > limit {
            self.record_dropped_frame(&SupabaseError::FrameTooLarge {
                size: frame.len(),
                limit,
            });
            return;
        }

        let message = match Message::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                self.record_dropped_frame(&e);
                return;
            }
        };
        if message.is_reply() {
            trace!(topic = %message.topic, "Ignoring reply");
            return;
        }

        let listeners = self.inner.listeners.snapshot().await;
        for listener in listeners.iter().filter(|l| l.matches(&message.event)) {
            listener.invoke(self, &message);
        }
    }

    async fn fire(&self, callback: &RwLock<Option<LifecycleCallback>>) {
        let callback = callback.read().await.clone();
        if let Some(callback) = callback {
            callback(self);
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("topic", &self.inner.topic)
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}
