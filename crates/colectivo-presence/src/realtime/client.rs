//! Public handle for one authenticated realtime session.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::identity::Credential;
use crate::protocol::OutboundEvent;

use super::connection::connection_loop;
use super::subscription::{ChannelShared, Subscription};
use super::types::{ChannelCommand, ChannelError, ConnectionState, Envelope, RealtimeConfig};

/// Anything that can carry an outbound event to the server.
pub trait Publish {
    fn is_connected(&self) -> bool;
    fn publish(&self, event: &OutboundEvent) -> Result<(), ChannelError>;
}

// ---------------------------------------------------------------------------
// Session channel
// ---------------------------------------------------------------------------

/// A single logical session to the presence server.
///
/// `open` spawns the background connection task; the handle only sends it
/// commands and reads shared state. Subscriptions may be taken before `open`
/// and survive reconnects.
pub struct SessionChannel {
    config: RealtimeConfig,
    shared: Arc<ChannelShared>,
    command_tx: Option<mpsc::Sender<ChannelCommand>>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl SessionChannel {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            shared: ChannelShared::new(),
            command_tx: None,
            task: None,
            closed: false,
        }
    }

    /// Start connecting. Calling it again while the session is live returns
    /// the same state watch without opening a second connection.
    pub fn open(&mut self, credential: &Credential) -> watch::Receiver<ConnectionState> {
        if self.is_open() {
            return self.shared.watch();
        }

        let epoch = self.shared.begin_epoch();
        self.closed = false;
        self.shared.set_state(epoch, ConnectionState::Connecting);

        let (command_tx, command_rx) = mpsc::channel(64);
        self.command_tx = Some(command_tx);
        self.task = Some(tokio::spawn(connection_loop(
            self.config.clone(),
            credential.clone(),
            Arc::clone(&self.shared),
            epoch,
            command_rx,
        )));

        self.shared.watch()
    }

    /// Register interest in `events`. State transitions are always delivered.
    pub fn subscribe(&self, events: &[&str]) -> Subscription {
        self.shared.subscribe(events)
    }

    /// Hand an event to the connection task.
    ///
    /// Publishing after `close` is a silent no-op.
    pub fn publish(&self, event: &OutboundEvent) -> Result<(), ChannelError> {
        if self.closed {
            debug!(event = event.name(), "Ignoring publish on closed session");
            return Ok(());
        }
        let Some(command_tx) = self.command_tx.as_ref() else {
            return Err(ChannelError::NotConnected);
        };
        if !self.shared.state().is_connected() {
            return Err(ChannelError::NotConnected);
        }

        let envelope = Envelope::from_outbound(event)?;
        command_tx
            .try_send(ChannelCommand::Publish(envelope))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ChannelError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => ChannelError::NotConnected,
            })
    }

    /// End the session. Subscribers see `Disconnected` (once) and nothing after.
    pub fn close(&mut self) {
        self.closed = true;
        let epoch = self.shared.begin_epoch();
        self.shared.set_state(epoch, ConnectionState::Disconnected);
        if let Some(command_tx) = self.command_tx.take() {
            let _ = command_tx.try_send(ChannelCommand::Close);
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.shared.watch()
    }

    /// Whether a connection task is running for this channel.
    pub fn is_open(&self) -> bool {
        self.command_tx.is_some()
            && self
                .task
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }
}

impl Publish for SessionChannel {
    fn is_connected(&self) -> bool {
        !self.closed && self.state().is_connected()
    }

    fn publish(&self, event: &OutboundEvent) -> Result<(), ChannelError> {
        SessionChannel::publish(self, event)
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        if let Some(command_tx) = self.command_tx.take() {
            let _ = command_tx.try_send(ChannelCommand::Close);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ChannelEvent;
    use std::time::Duration;

    fn unreachable_config() -> RealtimeConfig {
        RealtimeConfig {
            url: "ws://127.0.0.1:1/ws".into(),
            connect_timeout_secs: 2,
            reconnect_delay_secs: 30,
            max_reconnect_delay_secs: 30,
            ..Default::default()
        }
    }

    #[test]
    fn publish_before_open_is_not_connected() {
        let channel = SessionChannel::new(RealtimeConfig::default());
        let err = channel.publish(&OutboundEvent::PassengerCancel).unwrap_err();
        assert!(matches!(err, ChannelError::NotConnected));
    }

    #[test]
    fn publish_after_close_is_noop() {
        let mut channel = SessionChannel::new(RealtimeConfig::default());
        channel.close();
        assert!(channel.publish(&OutboundEvent::PassengerCancel).is_ok());
        assert!(!Publish::is_connected(&channel));
    }

    #[tokio::test]
    async fn failed_connect_reports_disconnected() {
        let mut channel = SessionChannel::new(unreachable_config());
        let mut sub = channel.subscribe(&[]);
        let mut state = channel.open(&Credential::new("tok"));

        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == ConnectionState::Disconnected),
        )
        .await
        .expect("connect attempt should fail")
        .unwrap();

        assert_eq!(
            sub.recv().await,
            Some(ChannelEvent::State(ConnectionState::Connecting))
        );
        assert_eq!(
            sub.recv().await,
            Some(ChannelEvent::State(ConnectionState::Disconnected))
        );
        assert!(channel.is_open());

        channel.close();
        assert!(!channel.is_open());
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let mut channel = SessionChannel::new(unreachable_config());
        let mut sub = channel.subscribe(&[]);
        channel.open(&Credential::new("tok"));
        channel.open(&Credential::new("tok"));

        assert_eq!(
            sub.recv().await,
            Some(ChannelEvent::State(ConnectionState::Connecting))
        );
        channel.close();
        assert_eq!(channel.state(), ConnectionState::Disconnected);

        while let Some(event) = sub.try_recv() {
            assert_ne!(event, ChannelEvent::State(ConnectionState::Connecting));
        }
    }
}
