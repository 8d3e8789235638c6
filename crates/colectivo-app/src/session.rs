//! Interactive headless session: presence events and notices out, commands in.

use std::sync::Arc;
use std::time::Duration;

use colectivo_common::{new_id, ColectivoError, Notice, NoticeBoard};
use colectivo_config::ColectivoConfig;
use colectivo_presence::{
    CounterpartRecord, CredentialProvider, EnvCredential, HttpSnapshotSource, Identity,
    LocalActorState, Location, PresenceClient, PresenceConfig, PresenceError, PresenceEvent,
    RealtimeConfig, StaticCredential,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::Args;
use crate::commands::{resolve_location, Command, HELP};

/// Map the file config onto the presence client's runtime config.
pub fn presence_config(config: &ColectivoConfig) -> PresenceConfig {
    PresenceConfig {
        realtime: RealtimeConfig {
            url: config.realtime.url.clone(),
            connect_timeout_secs: config.realtime.connect_timeout_secs.into(),
            heartbeat_interval_secs: config.realtime.heartbeat_interval_secs.into(),
            reconnect_delay_secs: config.realtime.reconnect_delay_secs.into(),
            max_reconnect_delay_secs: config.realtime.max_reconnect_delay_secs.into(),
        },
        max_seats: config.driver.max_seats,
        seed_on_connect: config.api.seed_on_connect,
    }
}

/// Driver broadcast defaults kept between commands.
struct DriverPosition {
    location: Location,
    seats: u32,
}

/// Run one session until the user quits, stdin closes, or auth fails.
pub async fn run(args: &Args, config: &ColectivoConfig) -> Result<(), ColectivoError> {
    let role = args
        .role
        .ok_or_else(|| ColectivoError::InvalidInput("a role is required".into()))?;

    let provider: Box<dyn CredentialProvider> = match &args.token {
        Some(token) => Box::new(StaticCredential::new(token.clone())),
        None => Box::new(EnvCredential::new("COLECTIVO_TOKEN")),
    };
    let credential = provider
        .credential()
        .map_err(|e| ColectivoError::Auth(e.to_string()))?;

    let user_id = args.user_id.clone().unwrap_or_else(new_id);
    let username = args.username.clone().unwrap_or_else(|| user_id.clone());
    let identity = Identity::new(user_id, username, role);
    info!(user_id = %identity.user_id, role = %role, route = %config.route.code, "Starting session");

    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<Notice>();
    let mut client = PresenceClient::new(identity, credential.clone(), presence_config(config))
        .with_sink(Box::new(notice_tx));

    if config.api.seed_on_connect {
        let source = HttpSnapshotSource::new(
            config.api.base_url.clone(),
            credential,
            Duration::from_secs(config.api.request_timeout_secs.into()),
        )
        .map_err(|e| ColectivoError::Network(e.to_string()))?;
        client = client.with_snapshot(Arc::new(source));
    }

    let mut events = client.start().map_err(presence_error)?;
    let mut board = NoticeBoard::new(config.notifications.capacity as usize);
    let mut driver = DriverPosition {
        location: Location::new(config.route.center.latitude, config.route.center.longitude),
        seats: config.driver.default_seats,
    };

    println!(
        "colectivo {} · route {} ({}) · type 'help' for commands",
        role, config.route.code, config.route.name
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PresenceEvent::AuthFailed(reason)) => {
                    println!("authentication failed: {reason}");
                    break Err(ColectivoError::Auth(reason));
                }
                Some(PresenceEvent::Closed) | None => break Ok(()),
                Some(event) => print_event(&event),
            },
            Some(notice) = notice_rx.recv() => {
                if config.notifications.enabled {
                    println!("[{}] {}: {}", notice.level.as_str(), notice.title, notice.body);
                    board.push(notice);
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(Command::Quit) => break Ok(()),
                    Ok(command) => {
                        if let Err(e) = execute(&client, command, config, &mut driver, &mut board).await {
                            println!("error: {e}");
                        }
                    }
                    Err(e) => println!("{e}"),
                },
                Ok(None) => {
                    debug!("stdin closed");
                    break Ok(());
                }
                Err(e) => break Err(e.into()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break Ok(());
            }
        }
    };

    if let Err(e) = client.close().await {
        warn!(error = %e, "Failed to close presence session");
    }
    result
}

async fn execute(
    client: &PresenceClient,
    command: Command,
    config: &ColectivoConfig,
    driver: &mut DriverPosition,
    board: &mut NoticeBoard,
) -> Result<(), ColectivoError> {
    match command {
        Command::Wait { stop } => {
            let location = resolve_location(&config.route, stop.as_deref())?;
            client.mark_waiting(location).await.map_err(presence_error)?;
            println!("waiting at {location}");
        }
        Command::Cancel => {
            client.cancel_waiting().await.map_err(presence_error)?;
            println!("no longer waiting");
        }
        Command::Locate { stop, seats } => {
            let location = match stop {
                Some(stop) => resolve_location(&config.route, Some(&stop))?,
                None => driver.location,
            };
            let seats = seats.unwrap_or(driver.seats);
            client
                .update_location(location, seats)
                .await
                .map_err(presence_error)?;
            driver.location = location;
            driver.seats = seats;
            println!("broadcasting {location} with {seats} seats");
        }
        Command::Seats(seats) => {
            client
                .update_location(driver.location, seats)
                .await
                .map_err(presence_error)?;
            driver.seats = seats;
            println!("broadcasting {seats} free seats");
        }
        Command::List => {
            let counterparts = client.counterparts().await.map_err(presence_error)?;
            if counterparts.is_empty() {
                println!("nobody visible");
            }
            for record in &counterparts {
                println!("  {}", describe(record));
            }
        }
        Command::Status => {
            println!("connection: {:?}", client.connection_state());
            let state = client.local_state().await.map_err(presence_error)?;
            println!("local: {}", describe_local(&state));
            for notice in board.visible() {
                println!("  [{}] {}: {}", notice.level.as_str(), notice.title, notice.body);
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

fn print_event(event: &PresenceEvent) {
    match event {
        PresenceEvent::Connecting => println!("connecting..."),
        PresenceEvent::Connected => println!("connected"),
        PresenceEvent::Disconnected => println!("disconnected"),
        PresenceEvent::CounterpartArrived(record) => println!("+ {}", describe(record)),
        PresenceEvent::CounterpartUpdated(record) => println!("~ {}", describe(record)),
        PresenceEvent::CounterpartLeft { id } => println!("- {id}"),
        PresenceEvent::Seeded { count } => println!("loaded {count} from snapshot"),
        PresenceEvent::Acknowledged(ack) => debug!(?ack, "Server acknowledged"),
        PresenceEvent::Republished => println!("state re-sent after reconnect"),
        PresenceEvent::Error(message) => println!("error: {message}"),
        PresenceEvent::AuthFailed(_) | PresenceEvent::Closed => {}
    }
}

fn describe(record: &CounterpartRecord) -> String {
    match record {
        CounterpartRecord::Passenger(p) => {
            format!("passenger {} ({}) at {}", p.username, p.id, p.location)
        }
        CounterpartRecord::Driver(d) => format!(
            "driver {} ({}) at {} · {} seats",
            d.username, d.id, d.location, d.available_seats
        ),
    }
}

fn describe_local(state: &LocalActorState) -> String {
    let ack = if state.is_acknowledged() {
        " (confirmed)"
    } else {
        ""
    };
    match state {
        LocalActorState::Passenger {
            waiting: true,
            location: Some(location),
            ..
        } => format!("waiting at {location}{ack}"),
        LocalActorState::Passenger { .. } => format!("not waiting{ack}"),
        LocalActorState::Driver {
            broadcast: Some(b),
            ..
        } => format!("at {} with {} seats{ack}", b.location, b.available_seats),
        LocalActorState::Driver { .. } => "not broadcasting".to_string(),
    }
}

fn presence_error(e: PresenceError) -> ColectivoError {
    ColectivoError::Presence(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use colectivo_presence::{DriverPresence, Role};

    #[test]
    fn presence_config_follows_file_config() {
        let mut config = ColectivoConfig::default();
        config.realtime.url = "wss://colectivo.example/ws".into();
        config.realtime.max_reconnect_delay_secs = 60;
        config.driver.max_seats = 6;
        config.api.seed_on_connect = false;

        let presence = presence_config(&config);
        assert_eq!(presence.realtime.url, "wss://colectivo.example/ws");
        assert_eq!(presence.realtime.max_reconnect_delay_secs, 60);
        assert_eq!(presence.max_seats, 6);
        assert!(!presence.seed_on_connect);
    }

    #[test]
    fn describes_counterparts() {
        let record = CounterpartRecord::Driver(DriverPresence {
            id: "d1".into(),
            username: "carla".into(),
            location: Location::new(-33.5, -70.7),
            available_seats: 2,
            status: Default::default(),
        });
        assert_eq!(
            describe(&record),
            "driver carla (d1) at (-33.5000, -70.7000) · 2 seats"
        );
    }

    #[test]
    fn describes_local_state() {
        assert_eq!(
            describe_local(&LocalActorState::idle(Role::Passenger)),
            "not waiting"
        );
        assert_eq!(
            describe_local(&LocalActorState::idle(Role::Driver)),
            "not broadcasting"
        );
    }
}
