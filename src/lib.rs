//! Supabase client with realtime channel subscriptions.
//!
//! A [`Channel`] joins one realtime topic over a WebSocket, routes inbound
//! events to registered listeners, sends a heartbeat every few seconds and
//! reconnects on its own after read or write failures.
//!
//! ```no_run
//! use supabase_rs::{SupabaseClient, SupabaseError};
//!
//! # async fn example() -> Result<(), SupabaseError> {
//! let client = SupabaseClient::new("https://xyzcompany.supabase.co", "anon-key")?;
//! let channel = client.realtime().channel("realtime:public:todos")?;
//!
//! channel
//!     .on("INSERT", |_channel, message| {
//!         println!("new row: {:?}", message.payload);
//!     })
//!     .await;
//! channel.on_disconnect(|channel| println!("lost {}", channel.topic())).await;
//!
//! channel.listen().await?;
//! channel.send("broadcast", serde_json::json!({"hello": "world"})).await?;
//! channel.close().await;
//! # Ok(())
//! # }
//! ```

mod channel;
mod client;
mod config;
mod connection;
mod dispatch;
mod error;
mod event;
mod heartbeat;
mod message;
mod realtime;
mod state;

pub use channel::Channel;
pub use client::{
    ADMIN_ENDPOINT, AUTH_ENDPOINT, ErrorResponse, REALTIME_ENDPOINT, REST_ENDPOINT,
    STORAGE_ENDPOINT, SupabaseClient,
};
pub use config::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_ORIGIN, DEFAULT_READ_DEADLINE, MAX_MESSAGE_BYTES,
    RealtimeConfig,
};
pub use connection::{FrameSink, FrameStream, Transport, WebSocketTransport};
pub use error::SupabaseError;
pub use event::{LifecycleCallback, Listener, ListenerCallback, WILDCARD};
pub use message::{
    HEARTBEAT_EVENT, Message, PHOENIX_TOPIC, PHX_CLOSE, PHX_ERROR, PHX_JOIN, PHX_LEAVE,
    PHX_REPLY, Payload,
};
pub use realtime::Realtime;
pub use state::ConnectionState;
