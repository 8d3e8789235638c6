//! Presence client that maintains a session to the presence server.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

use crate::identity::{Credential, Identity};
use crate::notify::{LogSink, NotificationSink};
use crate::protocol::{events, CounterpartRecord, Location};
use crate::realtime::{ConnectionState, SessionChannel};
use crate::snapshot::SnapshotSource;

use super::controller::{LocalAction, LocalActorState, SelfStateController};
use super::event_loop::Worker;
use super::router::EventRouter;
use super::types::{PresenceCommand, PresenceConfig, PresenceError, PresenceEvent};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle to a presence session.
///
/// `start` spawns the event task; every other method is a request to it.
pub struct PresenceClient {
    identity: Identity,
    credential: Credential,
    config: PresenceConfig,
    snapshot: Option<Arc<dyn SnapshotSource>>,
    sink: Option<Box<dyn NotificationSink + Send>>,
    command_tx: Option<mpsc::Sender<PresenceCommand>>,
    state_rx: Option<watch::Receiver<ConnectionState>>,
    closed: bool,
}

impl PresenceClient {
    pub fn new(identity: Identity, credential: Credential, config: PresenceConfig) -> Self {
        Self {
            identity,
            credential,
            config,
            snapshot: None,
            sink: None,
            command_tx: None,
            state_rx: None,
            closed: false,
        }
    }

    /// Seed the registry from `source` after each connect.
    pub fn with_snapshot(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.snapshot = Some(source);
        self
    }

    /// Where toast notices go. Defaults to the log.
    pub fn with_sink(mut self, sink: Box<dyn NotificationSink + Send>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Open the session and start the event task.
    /// Returns a receiver for presence events.
    pub fn start(&mut self) -> Result<mpsc::UnboundedReceiver<PresenceEvent>, PresenceError> {
        if self.command_tx.is_some() {
            return Err(PresenceError::AlreadyStarted);
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(32);

        let mut channel = SessionChannel::new(self.config.realtime.clone());
        // Subscribe before opening so the first state transition is seen.
        let subscription = channel.subscribe(events::INBOUND);
        let state_rx = channel.open(&self.credential);

        let sink = self
            .sink
            .take()
            .unwrap_or_else(|| Box::new(LogSink));
        let router = EventRouter::new(self.identity.role, sink);
        let controller = SelfStateController::new(&self.identity, self.config.max_seats);
        let snapshot = if self.config.seed_on_connect {
            self.snapshot.clone()
        } else {
            None
        };

        let worker = Worker::new(channel, subscription, router, controller, snapshot, event_tx);
        tokio::spawn(worker.run(command_rx));

        info!(
            user_id = %self.identity.user_id,
            role = %self.identity.role,
            "Presence client started"
        );

        self.command_tx = Some(command_tx);
        self.state_rx = Some(state_rx);
        self.closed = false;
        Ok(event_rx)
    }

    /// Passenger: announce waiting at `location`.
    pub async fn mark_waiting(&self, location: Location) -> Result<(), PresenceError> {
        self.act(LocalAction::MarkWaiting { location }).await
    }

    /// Passenger: stop waiting.
    pub async fn cancel_waiting(&self) -> Result<(), PresenceError> {
        self.act(LocalAction::CancelWaiting).await
    }

    /// Driver: broadcast position and free seats.
    pub async fn update_location(&self, location: Location, seats: u32) -> Result<(), PresenceError> {
        self.act(LocalAction::UpdateLocation { location, seats })
            .await
    }

    /// Current counterparts in first-seen order.
    pub async fn counterparts(&self) -> Result<Vec<CounterpartRecord>, PresenceError> {
        let (reply, rx) = oneshot::channel();
        self.send(PresenceCommand::Counterparts { reply }).await?;
        rx.await.map_err(|_| PresenceError::Stopped)
    }

    pub async fn local_state(&self) -> Result<LocalActorState, PresenceError> {
        let (reply, rx) = oneshot::channel();
        self.send(PresenceCommand::LocalState { reply }).await?;
        rx.await.map_err(|_| PresenceError::Stopped)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or_default()
    }

    /// Log out: close the session and clear all presence state.
    /// Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), PresenceError> {
        let Some(command_tx) = self.command_tx.take() else {
            return Ok(());
        };
        self.closed = true;

        let (reply, rx) = oneshot::channel();
        if command_tx
            .send(PresenceCommand::Close { reply })
            .await
            .is_err()
        {
            return Ok(());
        }
        let _ = rx.await;
        info!(user_id = %self.identity.user_id, "Presence client closed");
        Ok(())
    }

    async fn act(&self, action: LocalAction) -> Result<(), PresenceError> {
        let (reply, rx) = oneshot::channel();
        self.send(PresenceCommand::Act { action, reply }).await?;
        rx.await.map_err(|_| PresenceError::Stopped)??;
        Ok(())
    }

    async fn send(&self, cmd: PresenceCommand) -> Result<(), PresenceError> {
        let Some(command_tx) = self.command_tx.as_ref() else {
            return Err(if self.closed {
                PresenceError::Stopped
            } else {
                PresenceError::NotStarted
            });
        };
        command_tx
            .send(cmd)
            .await
            .map_err(|_| PresenceError::Stopped)
    }
}
