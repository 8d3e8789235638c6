//! Authenticated WebSocket session to the presence server.
//!
//! Frames are JSON envelopes (`{"event": ..., "data": ...}`). The session
//! handles the bearer handshake, pings, and auto-reconnect with backoff.
//! Consumers subscribe to event names and receive matching frames together
//! with every connection state transition.

mod client;
mod connection;
mod handler;
mod subscription;
mod types;

pub use client::{Publish, SessionChannel};
pub use subscription::Subscription;
pub use types::{
    ChannelError, ChannelEvent, ConnectionState, Envelope, FatalError, RealtimeConfig,
};
