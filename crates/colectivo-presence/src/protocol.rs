//! Protocol types for the Colectivo presence system.
//!
//! These types define the application-level payloads carried inside the
//! realtime envelope (`{"event": ..., "data": ...}`). The envelope itself is
//! handled by `realtime`.
//!
//! Inbound and outbound messages are closed enums: a payload is decoded
//! into its typed variant here, before anything touches the registry.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names used on the wire.
///
/// The server speaks two dialects (web and mobile) for the same broadcasts;
/// both names decode to the same variant.
pub mod events {
    // Client -> server
    pub const PASSENGER_WAITING: &str = "passenger:waiting";
    pub const PASSENGER_CANCEL: &str = "passenger:cancel";
    pub const DRIVER_LOCATION: &str = "driver:location";

    // Server -> client broadcasts
    pub const PASSENGER_NEW_WAITING: &str = "passenger:new-waiting";
    pub const PASSENGER_CANCELLED: &str = "passenger:cancelled";
    pub const DRIVER_LOCATION_UPDATED: &str = "driver:location-updated";

    // Server -> client acknowledgements
    pub const PASSENGER_WAITING_SUCCESS: &str = "passenger:waiting-success";
    pub const PASSENGER_CANCEL_SUCCESS: &str = "passenger:cancel-success";
    pub const DRIVER_LOCATION_UPDATE_SUCCESS: &str = "driver:location-update-success";

    /// Every event name [`super::InboundEvent::decode`] understands.
    pub const INBOUND: &[&str] = &[
        PASSENGER_NEW_WAITING,
        PASSENGER_WAITING,
        PASSENGER_CANCELLED,
        DRIVER_LOCATION_UPDATED,
        DRIVER_LOCATION,
        PASSENGER_WAITING_SUCCESS,
        PASSENGER_CANCEL_SUCCESS,
        DRIVER_LOCATION_UPDATE_SUCCESS,
    ];
}

// ---------------------------------------------------------------------------
// Shared types
// ---------------------------------------------------------------------------

/// A WGS84 position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// The actor's role, fixed for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Passenger,
    Driver,
}

impl Role {
    /// The role whose presence this role observes.
    pub fn counterpart(self) -> Role {
        match self {
            Role::Passenger => Role::Driver,
            Role::Driver => Role::Passenger,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Passenger => "passenger",
            Role::Driver => "driver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passenger" => Ok(Role::Passenger),
            "driver" => Ok(Role::Driver),
            other => Err(format!("unknown role '{other}' (expected passenger or driver)")),
        }
    }
}

/// Driver availability as broadcast by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    #[default]
    Available,
    Busy,
}

impl DriverStatus {
    /// Status implied by a seat count: a full vehicle is busy.
    pub fn for_seats(seats: u32) -> Self {
        if seats == 0 {
            DriverStatus::Busy
        } else {
            DriverStatus::Available
        }
    }
}

// ---------------------------------------------------------------------------
// Presence records
// ---------------------------------------------------------------------------

/// A passenger waiting on the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerPresence {
    pub id: String,
    pub username: String,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A driver broadcasting position and free seats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPresence {
    pub id: String,
    pub username: String,
    pub location: Location,
    pub available_seats: u32,
    #[serde(default)]
    pub status: DriverStatus,
}

/// A counterpart's last-known broadcast state.
#[derive(Debug, Clone, PartialEq)]
pub enum CounterpartRecord {
    Passenger(PassengerPresence),
    Driver(DriverPresence),
}

impl CounterpartRecord {
    pub fn id(&self) -> &str {
        match self {
            CounterpartRecord::Passenger(p) => &p.id,
            CounterpartRecord::Driver(d) => &d.id,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            CounterpartRecord::Passenger(p) => &p.username,
            CounterpartRecord::Driver(d) => &d.username,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            CounterpartRecord::Passenger(p) => p.location,
            CounterpartRecord::Driver(d) => d.location,
        }
    }

    /// The role of the actor this record describes.
    pub fn role(&self) -> Role {
        match self {
            CounterpartRecord::Passenger(_) => Role::Passenger,
            CounterpartRecord::Driver(_) => Role::Driver,
        }
    }
}

impl From<PassengerPresence> for CounterpartRecord {
    fn from(p: PassengerPresence) -> Self {
        CounterpartRecord::Passenger(p)
    }
}

impl From<DriverPresence> for CounterpartRecord {
    fn from(d: DriverPresence) -> Self {
        CounterpartRecord::Driver(d)
    }
}

/// Broadcast when a passenger stops waiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerCancelled {
    pub passenger_id: String,
}

/// Server confirmation of the local actor's last action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    WaitingAccepted,
    CancelAccepted,
    LocationAccepted,
}

impl Ack {
    /// The role that receives this acknowledgement.
    pub fn role(self) -> Role {
        match self {
            Ack::WaitingAccepted | Ack::CancelAccepted => Role::Passenger,
            Ack::LocationAccepted => Role::Driver,
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed {event} payload: {source}")]
    Malformed {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {event}: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A validated message received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    PassengerWaiting(PassengerPresence),
    PassengerCancelled(PassengerCancelled),
    DriverLocation(DriverPresence),
    Ack(Ack),
}

impl InboundEvent {
    /// Decode a wire event.
    ///
    /// Returns `Ok(None)` for event names this client does not handle and
    /// `Err` when a known event carries a payload that does not fit.
    pub fn decode(event: &str, data: &serde_json::Value) -> Result<Option<Self>, ProtocolError> {
        let decoded = match event {
            events::PASSENGER_NEW_WAITING | events::PASSENGER_WAITING => {
                InboundEvent::PassengerWaiting(parse(event, data)?)
            }
            events::PASSENGER_CANCELLED => InboundEvent::PassengerCancelled(parse(event, data)?),
            events::DRIVER_LOCATION_UPDATED | events::DRIVER_LOCATION => {
                InboundEvent::DriverLocation(parse(event, data)?)
            }
            events::PASSENGER_WAITING_SUCCESS => InboundEvent::Ack(Ack::WaitingAccepted),
            events::PASSENGER_CANCEL_SUCCESS => InboundEvent::Ack(Ack::CancelAccepted),
            events::DRIVER_LOCATION_UPDATE_SUCCESS => InboundEvent::Ack(Ack::LocationAccepted),
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }

    /// The role that acts on this event; the other role ignores it.
    pub fn observer(&self) -> Role {
        match self {
            InboundEvent::PassengerWaiting(_) | InboundEvent::PassengerCancelled(_) => Role::Driver,
            InboundEvent::DriverLocation(_) => Role::Passenger,
            InboundEvent::Ack(ack) => ack.role(),
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(
    event: &str,
    data: &serde_json::Value,
) -> Result<T, ProtocolError> {
    T::deserialize(data).map_err(|source| ProtocolError::Malformed {
        event: event.to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Payload for `passenger:waiting`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitingPayload {
    pub location: Location,
    pub username: String,
}

/// Payload for `driver:location`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationPayload {
    pub location: Location,
    pub available_seats: u32,
    pub username: String,
}

/// A message this client publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    PassengerWaiting(WaitingPayload),
    PassengerCancel,
    DriverLocation(DriverLocationPayload),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::PassengerWaiting(_) => events::PASSENGER_WAITING,
            OutboundEvent::PassengerCancel => events::PASSENGER_CANCEL,
            OutboundEvent::DriverLocation(_) => events::DRIVER_LOCATION,
        }
    }

    pub fn payload(&self) -> Result<serde_json::Value, ProtocolError> {
        let value = match self {
            OutboundEvent::PassengerWaiting(p) => serde_json::to_value(p),
            OutboundEvent::PassengerCancel => Ok(serde_json::json!({})),
            OutboundEvent::DriverLocation(p) => serde_json::to_value(p),
        };
        value.map_err(|source| ProtocolError::Encode {
            event: self.name(),
            source,
        })
    }
}
