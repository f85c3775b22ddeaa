use thiserror::Error;

use crate::client::ErrorResponse;

/// Error types for the supabase-rs library
#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {0}")]
    ApiError(ErrorResponse),
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Send error: {0}")]
    SendError(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Channel closed")]
    ChannelClosed,
    #[error("Frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}
