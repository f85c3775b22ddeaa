use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Connection lifecycle of a realtime channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Closing = 3,
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Closing,
            4 => Self::Closed,
            _ => Self::Disconnected,
        }
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// True once `close` has started; no further connection attempts are allowed.
    pub fn is_closing(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Atomic holder for a [`ConnectionState`].
///
/// Every change goes through [`StateCell::advance`], which refuses to leave
/// the closing states, so a late reconnect can never resurrect a closed channel.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next`. Returns the previous state, or `None` if the move was refused.
    pub fn advance(&self, next: ConnectionState) -> Option<ConnectionState> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let allowed = match ConnectionState::from_u8(current) {
                    ConnectionState::Closed => false,
                    ConnectionState::Closing => next == ConnectionState::Closed,
                    _ => true,
                };
                allowed.then_some(next as u8)
            })
            .ok()
            .map(ConnectionState::from_u8)
    }
}
