//! Presence client for one passenger or driver session.
//!
//! Keeps the set of visible counterparts in sync with the server broadcasts,
//! publishes the local actor's own state, and re-publishes it after every
//! reconnect. All state lives on a single event task; the client handle
//! talks to it through commands.

mod client;
mod controller;
mod event_loop;
mod router;
mod types;

pub use client::PresenceClient;
pub use controller::{
    ActionError, DriverBroadcast, LocalAction, LocalActorState, SelfStateController,
};
pub use router::{encode_action, EventRouter, RouterOutcome};
pub use types::{PresenceConfig, PresenceError, PresenceEvent};
