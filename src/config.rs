use std::time::Duration;

/// Largest inbound frame the realtime socket accepts.
pub const MAX_MESSAGE_BYTES: usize = 3_072_000;

pub const DEFAULT_ORIGIN: &str = "http://localhost/";
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(10);

/// Settings shared by every realtime channel created from the same factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Value of the `Origin` header sent with the WebSocket handshake
    pub origin: String,
    /// Period between keepalive frames
    pub heartbeat_interval: Duration,
    /// How long a single socket read may block before the dispatcher re-checks its state
    pub read_deadline: Duration,
    /// Inbound frames larger than this are dropped
    pub max_message_bytes: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            read_deadline: DEFAULT_READ_DEADLINE,
            max_message_bytes: MAX_MESSAGE_BYTES,
        }
    }
}

impl RealtimeConfig {
    /// Set the origin header value
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.to_string();
        self
    }

    /// Set the keepalive period
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the per-read deadline
    pub fn with_read_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = deadline;
        self
    }

    /// Set the inbound frame size ceiling
    pub fn with_max_message_bytes(mut self, limit: usize) -> Self {
        self.max_message_bytes = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = RealtimeConfig::default();
        assert_eq!(config.origin, "http://localhost/");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.read_deadline, Duration::from_secs(10));
        assert_eq!(config.max_message_bytes, 3_072_000);
    }

    #[test]
    fn builders_override_fields() {
        let config = RealtimeConfig::default()
            .with_origin("https://app.example.com")
            .with_heartbeat_interval(Duration::from_secs(30))
            .with_read_deadline(Duration::from_secs(1))
            .with_max_message_bytes(1024);
        assert_eq!(config.origin, "https://app.example.com");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.read_deadline, Duration::from_secs(1));
        assert_eq!(config.max_message_bytes, 1024);
    }
}
