#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use supabase_rs::{
    Channel, FrameSink, FrameStream, Message, Realtime, RealtimeConfig, SupabaseError, Transport,
};
use tokio::sync::{Mutex, mpsc};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory transport: every successful dial yields a [`ServerConn`] the
/// test can drive.
pub struct MockTransport {
    refuse: AtomicBool,
    dials: AtomicUsize,
    accepted_tx: mpsc::UnboundedSender<ServerConn>,
    accepted_rx: Mutex<mpsc::UnboundedReceiver<ServerConn>>,
}

/// Server side of one mock socket
pub struct ServerConn {
    pub url: String,
    pub origin: String,
    inbound: mpsc::UnboundedSender<Result<String, SupabaseError>>,
    outbound: mpsc::UnboundedReceiver<String>,
    fail_writes: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            refuse: AtomicBool::new(false),
            dials: AtomicUsize::new(0),
            accepted_tx,
            accepted_rx: Mutex::new(accepted_rx),
        })
    }

    pub fn refuse_dials(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// Wait for the next successful dial.
    pub async fn accept(&self) -> ServerConn {
        self.accepted_rx
            .lock()
            .await
            .recv()
            .await
            .expect("transport dropped")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        url: &str,
        config: &RealtimeConfig,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), SupabaseError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(SupabaseError::ConnectionError(format!(
                "connection refused: {}",
                url
            )));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let fail_writes = Arc::new(AtomicBool::new(false));
        let _ = self.accepted_tx.send(ServerConn {
            url: url.to_string(),
            origin: config.origin.clone(),
            inbound: inbound_tx,
            outbound: outbound_rx,
            fail_writes: Arc::clone(&fail_writes),
        });

        Ok((
            Box::new(MockSink {
                outbound: Some(outbound_tx),
                fail_writes,
            }),
            Box::new(MockStream {
                inbound: inbound_rx,
            }),
        ))
    }
}

impl ServerConn {
    /// Deliver a text frame to the client.
    pub fn push(&self, frame: &str) {
        let _ = self.inbound.send(Ok(frame.to_string()));
    }

    /// Make the client's next read fail.
    pub fn fail_read(&self) {
        let _ = self
            .inbound
            .send(Err(SupabaseError::ConnectionError("connection reset".to_string())));
    }

    /// Make every following client write fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Next frame written by the client, or `None` once it closed the socket.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    pub async fn next_message(&mut self) -> Message {
        let frame = self.next_frame().await.expect("client closed the socket");
        Message::decode(&frame).expect("client sent an undecodable frame")
    }
}

struct MockSink {
    outbound: Option<mpsc::UnboundedSender<String>>,
    fail_writes: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, frame: String) -> Result<(), SupabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SupabaseError::SendError("broken pipe".to_string()));
        }
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| SupabaseError::SendError("socket closed".to_string()))?;
        outbound
            .send(frame)
            .map_err(|e| SupabaseError::SendError(e.to_string()))
    }

    async fn close(&mut self) {
        self.outbound = None;
    }
}

struct MockStream {
    inbound: mpsc::UnboundedReceiver<Result<String, SupabaseError>>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn next_frame(&mut self) -> Result<Option<String>, SupabaseError> {
        match self.inbound.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

pub fn realtime(transport: &Arc<MockTransport>) -> Realtime {
    Realtime::new("http://localhost:54321", "anon-key").with_transport(transport.clone())
}

/// Counter bumped by a lifecycle callback
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Install counting on-connect / on-disconnect callbacks.
pub async fn count_lifecycle(channel: &Channel) -> (Counter, Counter) {
    let connects = Counter::default();
    let disconnects = Counter::default();
    let c = connects.clone();
    channel.on_connect(move |_| c.bump()).await;
    let d = disconnects.clone();
    channel.on_disconnect(move |_| d.bump()).await;
    (connects, disconnects)
}

/// Poll `condition` until it holds or roughly five seconds have passed.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
