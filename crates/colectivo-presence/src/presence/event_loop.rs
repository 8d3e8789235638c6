//! The single task that owns all presence state for a session.

use std::ops::ControlFlow;
use std::sync::Arc;

use colectivo_common::Notice;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::notify::NotificationSink;
use crate::protocol::CounterpartRecord;
use crate::realtime::{ChannelEvent, ConnectionState, FatalError, SessionChannel, Subscription};
use crate::snapshot::{fetch_for, SnapshotError, SnapshotSource};

use super::controller::SelfStateController;
use super::router::{EventRouter, RouterOutcome};
use super::types::{PresenceCommand, PresenceEvent};

pub(crate) type BoxedSink = Box<dyn NotificationSink + Send>;

/// A finished snapshot fetch, tagged with the connection it was started for.
struct SeedResult {
    generation: u64,
    result: Result<Vec<CounterpartRecord>, SnapshotError>,
}

/// Owns the channel, registry, and local state. Everything that mutates them
/// runs here, one event at a time.
pub(crate) struct Worker {
    channel: SessionChannel,
    subscription: Subscription,
    router: EventRouter<BoxedSink>,
    controller: SelfStateController,
    snapshot: Option<Arc<dyn SnapshotSource>>,
    seed_tx: mpsc::UnboundedSender<SeedResult>,
    seed_rx: mpsc::UnboundedReceiver<SeedResult>,
    /// Bumped on every connect and disconnect.
    generation: u64,
    had_connection: bool,
    fatal: bool,
    event_tx: mpsc::UnboundedSender<PresenceEvent>,
}

impl Worker {
    pub(crate) fn new(
        channel: SessionChannel,
        subscription: Subscription,
        router: EventRouter<BoxedSink>,
        controller: SelfStateController,
        snapshot: Option<Arc<dyn SnapshotSource>>,
        event_tx: mpsc::UnboundedSender<PresenceEvent>,
    ) -> Self {
        let (seed_tx, seed_rx) = mpsc::unbounded_channel();
        Self {
            channel,
            subscription,
            router,
            controller,
            snapshot,
            seed_tx,
            seed_rx,
            generation: 0,
            had_connection: false,
            fatal: false,
            event_tx,
        }
    }

    pub(crate) async fn run(mut self, mut command_rx: mpsc::Receiver<PresenceCommand>) {
        loop {
            tokio::select! {
                event = self.subscription.recv() => match event {
                    Some(event) => self.on_channel_event(event),
                    None => break,
                },
                cmd = command_rx.recv() => match cmd {
                    Some(cmd) => {
                        if self.on_command(cmd).is_break() {
                            break;
                        }
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(seed) = self.seed_rx.recv() => self.on_seed(seed),
            }
        }
        debug!("Presence event loop exited");
    }

    // -----------------------------------------------------------------------
    // Channel events
    // -----------------------------------------------------------------------

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::State(ConnectionState::Connecting) => {
                self.emit(PresenceEvent::Connecting);
            }
            ChannelEvent::State(ConnectionState::Connected) => self.on_connected(),
            ChannelEvent::State(ConnectionState::Disconnected) => self.on_disconnected(),
            ChannelEvent::Message { event, data } => self.on_message(&event, &data),
            ChannelEvent::Fatal(FatalError::AuthRejected(reason)) => {
                self.fatal = true;
                error!(reason = %reason, "Presence authentication failed");
                self.router
                    .notify(Notice::error("Authentication failed", reason.clone()));
                self.emit(PresenceEvent::AuthFailed(reason));
            }
            ChannelEvent::Fatal(FatalError::InvalidEndpoint(reason)) => {
                self.fatal = true;
                error!(reason = %reason, "Presence endpoint is invalid");
                self.router
                    .notify(Notice::error("Cannot connect", reason.clone()));
                self.emit(PresenceEvent::Error(reason));
            }
        }
    }

    fn on_connected(&mut self) {
        self.generation += 1;
        info!(generation = self.generation, "Presence session connected");
        self.emit(PresenceEvent::Connected);

        if self.had_connection {
            self.router.notify(Notice::success("Reconnected", "Back online"));
        }
        self.had_connection = true;

        if self.controller.on_connected(&self.channel).is_some() {
            self.emit(PresenceEvent::Republished);
        }
        self.start_seed();
    }

    fn on_disconnected(&mut self) {
        self.generation += 1;
        let dropped = self.router.connection_lost();
        self.controller.on_disconnected();
        info!(dropped, "Presence session disconnected");

        if !self.fatal {
            self.router
                .notify(Notice::warning("Connection lost", "Reconnecting…"));
        }
        self.emit(PresenceEvent::Disconnected);
    }

    fn on_message(&mut self, event: &str, data: &serde_json::Value) {
        let presence_event = match self.router.handle(event, data) {
            RouterOutcome::Arrived(record) => PresenceEvent::CounterpartArrived(record),
            RouterOutcome::Updated(record) => PresenceEvent::CounterpartUpdated(record),
            RouterOutcome::Left { id } => PresenceEvent::CounterpartLeft { id },
            RouterOutcome::Acknowledged(ack) => {
                if !self.controller.acknowledge(ack) {
                    debug!(?ack, "Ignoring acknowledgement that does not match local state");
                    return;
                }
                PresenceEvent::Acknowledged(ack)
            }
            RouterOutcome::Ignored => return,
        };
        self.emit(presence_event);
    }

    // -----------------------------------------------------------------------
    // Snapshot seeding
    // -----------------------------------------------------------------------

    fn start_seed(&self) {
        let Some(source) = self.snapshot.clone() else {
            return;
        };
        let generation = self.generation;
        let observer = self.router.role();
        let seed_tx = self.seed_tx.clone();
        tokio::spawn(async move {
            let result = fetch_for(source.as_ref(), observer).await;
            let _ = seed_tx.send(SeedResult { generation, result });
        });
    }

    fn on_seed(&mut self, seed: SeedResult) {
        if seed.generation != self.generation {
            debug!(
                started = seed.generation,
                current = self.generation,
                "Dropping snapshot from an earlier connection"
            );
            return;
        }
        match seed.result {
            Ok(records) => {
                let count = self.router.seed(records);
                info!(count, "Seeded counterparts from snapshot");
                self.emit(PresenceEvent::Seeded { count });
            }
            Err(e) => {
                warn!(error = %e, "Presence snapshot failed");
                self.emit(PresenceEvent::Error(e.to_string()));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Handle one request. Breaks once the session has been closed.
    fn on_command(&mut self, cmd: PresenceCommand) -> ControlFlow<()> {
        match cmd {
            PresenceCommand::Act { action, reply } => {
                let result = self
                    .controller
                    .perform(&action, &self.channel)
                    .map(|_| ());
                if let Err(e) = &result {
                    warn!(action = action.name(), error = %e, "Local action rejected");
                    self.router
                        .notify(Notice::warning("Action rejected", e.to_string()));
                }
                let _ = reply.send(result);
            }
            PresenceCommand::Counterparts { reply } => {
                let _ = reply.send(self.router.counterparts());
            }
            PresenceCommand::LocalState { reply } => {
                let _ = reply.send(self.controller.state().clone());
            }
            PresenceCommand::Close { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Logout: close the channel and forget all state.
    fn shutdown(&mut self) {
        let was = self.channel.state();
        self.channel.close();
        self.router.connection_lost();
        self.controller.reset();
        self.generation += 1;
        info!("Presence session closed");

        if was != ConnectionState::Disconnected {
            self.emit(PresenceEvent::Disconnected);
        }
        self.emit(PresenceEvent::Closed);
    }

    // Never waits on the consumer: this task also answers commands.
    fn emit(&self, event: PresenceEvent) {
        let _ = self.event_tx.send(event);
    }
}
