//! Configuration, frame envelope, and event/command enums for the session channel.

use serde::{Deserialize, Serialize};

use crate::protocol::{OutboundEvent, ProtocolError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the realtime WebSocket session.
#[derive(Clone)]
pub struct RealtimeConfig {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Give up on a single connect attempt after this many seconds.
    pub connect_timeout_secs: u64,
    /// Interval between WebSocket pings.
    pub heartbeat_interval_secs: u64,
    /// Reconnect base delay in seconds.
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
}

impl std::fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("url", &self.display_url())
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("max_reconnect_delay_secs", &self.max_reconnect_delay_secs)
            .finish()
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3005/ws".to_string(),
            connect_timeout_secs: 15,
            heartbeat_interval_secs: 25,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        }
    }
}

impl RealtimeConfig {
    /// The URL without its query string, safe to log.
    pub(crate) fn display_url(&self) -> &str {
        self.url.split('?').next().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

/// A text frame: `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn from_outbound(event: &OutboundEvent) -> Result<Self, ProtocolError> {
        Ok(Self {
            event: event.name().to_string(),
            data: event.payload()?,
        })
    }
}

// ---------------------------------------------------------------------------
// State, events & commands
// ---------------------------------------------------------------------------

/// Connection state of a session channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// First connection attempt after `open` is in progress.
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// Errors that end a session for good; the channel does not retry them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// What a [`super::Subscription`] receives, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The connection state changed. Never repeats the previous state.
    State(ConnectionState),
    /// A frame whose event name the subscription asked for.
    Message {
        event: String,
        data: serde_json::Value,
    },
    /// The session ended and will not reconnect.
    Fatal(FatalError),
}

/// Commands sent to the connection task.
#[derive(Debug)]
pub(crate) enum ChannelCommand {
    Publish(Envelope),
    Close,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("not connected")]
    NotConnected,

    #[error("outbound queue is full")]
    QueueFull,

    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Location, WaitingPayload};

    #[test]
    fn debug_hides_query_string() {
        let config = RealtimeConfig {
            url: "wss://colectivo.example/ws?token=secret".into(),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("wss://colectivo.example/ws"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn envelope_data_defaults_to_null() {
        let env: Envelope = serde_json::from_str(r#"{"event":"passenger:cancel-success"}"#).unwrap();
        assert_eq!(env.event, "passenger:cancel-success");
        assert!(env.data.is_null());
    }

    #[test]
    fn envelope_from_outbound() {
        let event = OutboundEvent::PassengerWaiting(WaitingPayload {
            location: Location::new(-33.44, -70.66),
            username: "ana".into(),
        });
        let env = Envelope::from_outbound(&event).unwrap();
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["event"], "passenger:waiting");
        assert_eq!(json["data"]["username"], "ana");
    }

    #[test]
    fn default_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::Connected.is_connected());
    }
}
