//! Configuration, event, and command types for the presence client.

use tokio::sync::oneshot;

use crate::protocol::{Ack, CounterpartRecord};
use crate::realtime::RealtimeConfig;

use super::controller::{ActionError, LocalAction, LocalActorState};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the presence client.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    pub realtime: RealtimeConfig,
    /// Upper bound for a driver's advertised free seats.
    pub max_seats: u32,
    /// Fetch a snapshot of current counterparts after each connect.
    pub seed_on_connect: bool,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            realtime: RealtimeConfig::default(),
            max_seats: 4,
            seed_on_connect: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted by the presence system for the UI to consume.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    Connecting,
    Connected,
    Disconnected,
    /// The server refused the credential. The session will not reconnect.
    AuthFailed(String),
    CounterpartArrived(CounterpartRecord),
    CounterpartUpdated(CounterpartRecord),
    CounterpartLeft {
        id: String,
    },
    /// Snapshot records added after a connect.
    Seeded {
        count: usize,
    },
    Acknowledged(Ack),
    /// The active local state was sent again after a reconnect.
    Republished,
    /// The session was closed locally.
    Closed,
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("presence client has not been started")]
    NotStarted,

    #[error("presence client is already running")]
    AlreadyStarted,

    #[error("presence session has ended")]
    Stopped,

    #[error(transparent)]
    Action(#[from] ActionError),
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Requests from the client handle to the event task.
#[derive(Debug)]
pub(crate) enum PresenceCommand {
    Act {
        action: LocalAction,
        reply: oneshot::Sender<Result<(), ActionError>>,
    },
    Counterparts {
        reply: oneshot::Sender<Vec<CounterpartRecord>>,
    },
    LocalState {
        reply: oneshot::Sender<LocalActorState>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}
