use std::sync::Arc;

use url::Url;

use crate::channel::Channel;
use crate::config::RealtimeConfig;
use crate::connection::{Transport, WebSocketTransport};
use crate::error::SupabaseError;

const WEBSOCKET_PATH: &str = "realtime/v1/websocket";
const PROTOCOL_VERSION: &str = "1.0.0";

/// Factory for realtime channels bound to one project
#[derive(Clone)]
pub struct Realtime {
    base_url: String,
    api_key: String,
    config: RealtimeConfig,
    transport: Arc<dyn Transport>,
}

impl Realtime {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            config: RealtimeConfig::default(),
            transport: Arc::new(WebSocketTransport),
        }
    }

    /// Set the configuration applied to channels created afterwards
    pub fn with_config(mut self, config: RealtimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the socket implementation
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Socket URL derived from the project base URL.
    ///
    /// `https` becomes `wss` and `http` becomes `ws`; the API key and protocol
    /// version travel as query parameters.
    pub fn websocket_url(&self) -> Result<String, SupabaseError> {
        let mut url = Url::parse(&self.base_url)?;
        let scheme = match url.scheme() {
            "https" => Some("wss"),
            "http" => Some("ws"),
            _ => None,
        };
        if let Some(scheme) = scheme {
            url.set_scheme(scheme).map_err(|_| {
                SupabaseError::ConnectionError(format!(
                    "Cannot derive socket URL from {}",
                    self.base_url
                ))
            })?;
        }

        Ok(format!(
            "{}/{}?apikey={}&vsn={}",
            url.as_str().trim_end_matches('/'),
            WEBSOCKET_PATH,
            urlencoding::encode(&self.api_key),
            PROTOCOL_VERSION
        ))
    }

    /// Create a channel for `topic` on the project's realtime socket
    pub fn channel(&self, topic: &str) -> Result<Channel, SupabaseError> {
        let url = self.websocket_url()?;
        Ok(self.channel_with_url(topic, &url))
    }

    /// Create a channel for `topic` on an explicit socket URL
    pub fn channel_with_url(&self, topic: &str, url: &str) -> Channel {
        Channel::new(topic, url, self.config.clone(), Arc::clone(&self.transport))
    }
}

impl std::fmt::Debug for Realtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realtime")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_becomes_wss() {
        let realtime = Realtime::new("https://xyzcompany.supabase.co", "anon-key");
        assert_eq!(
            realtime.websocket_url().unwrap(),
            "wss://xyzcompany.supabase.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
    }

    #[test]
    fn http_becomes_ws_and_keeps_port() {
        let realtime = Realtime::new("http://localhost:54321/", "anon-key");
        assert_eq!(
            realtime.websocket_url().unwrap(),
            "ws://localhost:54321/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
    }

    #[test]
    fn api_key_is_url_encoded() {
        let realtime = Realtime::new("https://example.com", "a+b/c=");
        let url = realtime.websocket_url().unwrap();
        assert!(url.ends_with("?apikey=a%2Bb%2Fc%3D&vsn=1.0.0"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let realtime = Realtime::new("not a url", "anon-key");
        assert!(matches!(
            realtime.channel("room:1"),
            Err(SupabaseError::UrlParseError(_))
        ));
    }

    #[test]
    fn channels_carry_topic_url_and_config() {
        let config = RealtimeConfig::default().with_origin("https://app.example.com");
        let realtime = Realtime::new("https://example.com", "key").with_config(config);

        let channel = realtime.channel("room:1").unwrap();
        assert_eq!(channel.topic(), "room:1");
        assert_eq!(channel.origin(), "https://app.example.com");
        assert!(channel.url().starts_with("wss://example.com/realtime/v1/websocket"));
        assert!(!channel.is_connected());

        let explicit = realtime.channel_with_url("room:2", "ws://127.0.0.1:4000/socket");
        assert_eq!(explicit.url(), "ws://127.0.0.1:4000/socket");
    }
}
