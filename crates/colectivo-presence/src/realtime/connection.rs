//! Background WebSocket connection loop with auto-reconnect.

use std::sync::Arc;
use std::time::Duration;

use colectivo_common::ConnectionTag;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::identity::Credential;

use super::handler::handle_text_frame;
use super::subscription::ChannelShared;
use super::types::{ChannelCommand, ConnectionState, FatalError, RealtimeConfig};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a connected session ended.
enum SessionEnd {
    /// Network loss or server close; reconnect.
    Lost,
    /// Local `close()`.
    Closed,
    /// Server closed with a policy violation after the upgrade.
    Rejected(String),
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Background task owning the WebSocket for one `open` of a session channel.
///
/// State goes `Connecting` once, then alternates `Connected`/`Disconnected`.
/// Retries after a loss stay in `Disconnected` so each loss is reported once.
/// Authentication failures end the task without retrying.
pub(crate) async fn connection_loop(
    config: RealtimeConfig,
    credential: Credential,
    shared: Arc<ChannelShared>,
    epoch: u64,
    mut command_rx: mpsc::Receiver<ChannelCommand>,
) {
    let base_delay = config.reconnect_delay_secs.max(1);
    let max_delay = config.max_reconnect_delay_secs.max(base_delay);
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs.max(1));
    let mut reconnect_delay = base_delay;

    shared.set_state(epoch, ConnectionState::Connecting);

    loop {
        let tag = ConnectionTag::new();
        let request = match build_request(&config.url, &credential) {
            Ok(request) => request,
            Err(e) => {
                error!(conn = %tag, error = %e, "Cannot build WebSocket request");
                shared.dispatch_fatal(epoch, e);
                shared.set_state(epoch, ConnectionState::Disconnected);
                return;
            }
        };
        info!(conn = %tag, url = %config.display_url(), "Connecting to presence server");

        let attempt = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(request));
        tokio::pin!(attempt);

        let outcome = loop {
            tokio::select! {
                result = &mut attempt => break Some(result),
                cmd = command_rx.recv() => match cmd {
                    Some(ChannelCommand::Publish(envelope)) => {
                        debug!(conn = %tag, event = %envelope.event, "Dropping publish while connecting");
                    }
                    Some(ChannelCommand::Close) | None => break None,
                },
            }
        };

        let Some(outcome) = outcome else {
            info!(conn = %tag, "Session closed while connecting");
            shared.set_state(epoch, ConnectionState::Disconnected);
            return;
        };

        match outcome {
            Ok(Ok((ws_stream, _))) => {
                reconnect_delay = base_delay;
                match run_session(ws_stream, &config, &shared, epoch, &mut command_rx, &tag).await {
                    SessionEnd::Closed => {
                        shared.set_state(epoch, ConnectionState::Disconnected);
                        return;
                    }
                    SessionEnd::Rejected(reason) => {
                        warn!(conn = %tag, reason = %reason, "Presence server closed session for policy violation");
                        shared.dispatch_fatal(epoch, FatalError::AuthRejected(reason));
                        shared.set_state(epoch, ConnectionState::Disconnected);
                        return;
                    }
                    SessionEnd::Lost => {
                        shared.set_state(epoch, ConnectionState::Disconnected);
                    }
                }
            }
            Ok(Err(WsError::Http(response))) if is_auth_rejection(response.status()) => {
                let status = response.status();
                warn!(conn = %tag, status = %status, "Presence server rejected credentials");
                shared.dispatch_fatal(epoch, FatalError::AuthRejected(status.to_string()));
                shared.set_state(epoch, ConnectionState::Disconnected);
                return;
            }
            Ok(Err(e)) => {
                warn!(conn = %tag, error = %e, "Failed to connect to presence server");
                shared.set_state(epoch, ConnectionState::Disconnected);
            }
            Err(_elapsed) => {
                warn!(
                    conn = %tag,
                    timeout_secs = connect_timeout.as_secs(),
                    "Connection attempt timed out"
                );
                shared.set_state(epoch, ConnectionState::Disconnected);
            }
        }

        if !shared.is_current(epoch) {
            return;
        }

        // Exponential backoff reconnect.
        info!(
            delay = reconnect_delay,
            "Reconnecting in {} seconds", reconnect_delay
        );
        if !wait_for_retry(Duration::from_secs(reconnect_delay), &mut command_rx).await {
            shared.set_state(epoch, ConnectionState::Disconnected);
            return;
        }
        reconnect_delay = (reconnect_delay * 2).min(max_delay);
    }
}

// ---------------------------------------------------------------------------
// Connected session
// ---------------------------------------------------------------------------

async fn run_session(
    ws_stream: WsStream,
    config: &RealtimeConfig,
    shared: &ChannelShared,
    epoch: u64,
    command_rx: &mut mpsc::Receiver<ChannelCommand>,
    tag: &ConnectionTag,
) -> SessionEnd {
    let (mut write, mut read) = ws_stream.split();
    shared.set_state(epoch, ConnectionState::Connected);
    info!(conn = %tag, "Connected to presence server");

    let period = Duration::from_secs(config.heartbeat_interval_secs.max(1));
    let mut heartbeat = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => handle_text_frame(&text, shared, epoch),
                Some(Ok(WsMessage::Ping(payload))) => {
                    if let Err(e) = write.send(WsMessage::Pong(payload)).await {
                        warn!(conn = %tag, error = %e, "Failed to answer ping");
                        return SessionEnd::Lost;
                    }
                }
                Some(Ok(WsMessage::Close(Some(frame)))) if frame.code == CloseCode::Policy => {
                    return SessionEnd::Rejected(frame.reason.to_string());
                }
                Some(Ok(WsMessage::Close(_))) => {
                    info!(conn = %tag, "Presence server closed connection");
                    return SessionEnd::Lost;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(conn = %tag, error = %e, "WebSocket error");
                    return SessionEnd::Lost;
                }
                None => {
                    info!(conn = %tag, "WebSocket stream ended");
                    return SessionEnd::Lost;
                }
            },
            cmd = command_rx.recv() => match cmd {
                Some(ChannelCommand::Publish(envelope)) => {
                    if shared.is_current(epoch) {
                        match serde_json::to_string(&envelope) {
                            Ok(json) => {
                                if let Err(e) = write.send(WsMessage::Text(json.into())).await {
                                    warn!(conn = %tag, error = %e, "Failed to publish");
                                    return SessionEnd::Lost;
                                }
                                debug!(conn = %tag, event = %envelope.event, "Published");
                            }
                            Err(e) => {
                                warn!(conn = %tag, event = %envelope.event, error = %e, "Failed to encode envelope");
                            }
                        }
                    } else {
                        debug!(conn = %tag, event = %envelope.event, "Dropping publish after close");
                    }
                }
                Some(ChannelCommand::Close) | None => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    info!(conn = %tag, "Session closed");
                    return SessionEnd::Closed;
                }
            },
            _ = heartbeat.tick() => {
                if let Err(e) = write.send(WsMessage::Ping(Default::default())).await {
                    warn!(conn = %tag, error = %e, "Heartbeat failed");
                    return SessionEnd::Lost;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sleep for `delay` unless the channel is closed first. Returns `false` on close.
async fn wait_for_retry(delay: Duration, command_rx: &mut mpsc::Receiver<ChannelCommand>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = command_rx.recv() => match cmd {
                Some(ChannelCommand::Publish(envelope)) => {
                    debug!(event = %envelope.event, "Dropping publish while disconnected");
                }
                Some(ChannelCommand::Close) | None => return false,
            },
        }
    }
}

/// Handshake request carrying the bearer credential.
fn build_request(url: &str, credential: &Credential) -> Result<Request, FatalError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| FatalError::InvalidEndpoint(e.to_string()))?;
    let value = HeaderValue::from_str(&credential.bearer()).map_err(|_| {
        FatalError::AuthRejected("credential is not a valid header value".to_string())
    })?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

fn is_auth_rejection(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ChannelEvent;

    #[test]
    fn request_carries_bearer_header() {
        let request =
            build_request("ws://localhost:3005/ws", &Credential::new("tok-123")).unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer tok-123"
        );
        assert_eq!(request.uri().path(), "/ws");
    }

    #[test]
    fn bad_url_is_invalid_endpoint() {
        let err = build_request("not a url", &Credential::new("tok")).unwrap_err();
        assert!(matches!(err, FatalError::InvalidEndpoint(_)));
    }

    #[test]
    fn newline_in_token_is_rejected() {
        let err = build_request("ws://localhost/ws", &Credential::new("a\nb")).unwrap_err();
        assert!(matches!(err, FatalError::AuthRejected(_)));
    }

    #[test]
    fn only_401_and_403_are_auth_failures() {
        assert!(is_auth_rejection(StatusCode::UNAUTHORIZED));
        assert!(is_auth_rejection(StatusCode::FORBIDDEN));
        assert!(!is_auth_rejection(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_auth_rejection(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn retry_wait_ends_on_close() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(ChannelCommand::Close).await.unwrap();
        assert!(!wait_for_retry(Duration::from_secs(60), &mut rx).await);
    }

    #[tokio::test]
    async fn retry_wait_elapses_when_idle() {
        let (_tx, mut rx) = mpsc::channel(4);
        assert!(wait_for_retry(Duration::from_millis(10), &mut rx).await);
    }

    #[tokio::test]
    async fn invalid_endpoint_is_fatal_and_not_retried() {
        let shared = ChannelShared::new();
        let mut sub = shared.subscribe(&[]);
        let epoch = shared.begin_epoch();
        let (_tx, rx) = mpsc::channel(4);

        let config = RealtimeConfig {
            url: "not a url".into(),
            ..Default::default()
        };
        connection_loop(config, Credential::new("tok"), Arc::clone(&shared), epoch, rx).await;

        assert_eq!(
            sub.try_recv(),
            Some(ChannelEvent::State(ConnectionState::Connecting))
        );
        assert!(matches!(
            sub.try_recv(),
            Some(ChannelEvent::Fatal(FatalError::InvalidEndpoint(_)))
        ));
        assert_eq!(
            sub.try_recv(),
            Some(ChannelEvent::State(ConnectionState::Disconnected))
        );
        assert_eq!(shared.state(), ConnectionState::Disconnected);
    }
}
