//! Routes decoded server events into the registry and the notification sink.

use colectivo_common::Notice;
use tracing::{debug, warn};

use crate::notify::NotificationSink;
use crate::protocol::{
    Ack, CounterpartRecord, DriverLocationPayload, InboundEvent, OutboundEvent, Role,
    WaitingPayload,
};
use crate::registry::{PresenceRegistry, Upsert};

use super::controller::{ActionError, LocalAction};

/// What an inbound event did.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterOutcome {
    /// A counterpart id not seen before was added.
    Arrived(CounterpartRecord),
    /// An existing counterpart record was replaced.
    Updated(CounterpartRecord),
    Left { id: String },
    Acknowledged(Ack),
    Ignored,
}

/// Applies inbound events for one observing role.
///
/// Owns the counterpart registry. Arrivals of a new id produce exactly one
/// info notice; updates and removals are silent.
pub struct EventRouter<S> {
    role: Role,
    registry: PresenceRegistry,
    sink: S,
}

impl<S: NotificationSink> EventRouter<S> {
    pub fn new(role: Role, sink: S) -> Self {
        Self {
            role,
            registry: PresenceRegistry::new(),
            sink,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Decode and apply a raw wire event. Never fails: unknown and malformed
    /// events are logged and ignored.
    pub fn handle(&mut self, event: &str, data: &serde_json::Value) -> RouterOutcome {
        match InboundEvent::decode(event, data) {
            Ok(Some(inbound)) => self.apply(inbound),
            Ok(None) => {
                debug!(event = %event, "Ignoring unhandled event");
                RouterOutcome::Ignored
            }
            Err(e) => {
                warn!(event = %event, error = %e, "Dropping malformed event");
                RouterOutcome::Ignored
            }
        }
    }

    pub fn apply(&mut self, event: InboundEvent) -> RouterOutcome {
        if event.observer() != self.role {
            debug!(role = %self.role, ?event, "Event is for the other role");
            return RouterOutcome::Ignored;
        }

        match event {
            InboundEvent::PassengerWaiting(passenger) => self.upsert(passenger.into()),
            InboundEvent::DriverLocation(driver) => self.upsert(driver.into()),
            InboundEvent::PassengerCancelled(cancel) => {
                match self.registry.remove(&cancel.passenger_id) {
                    Some(_) => RouterOutcome::Left {
                        id: cancel.passenger_id,
                    },
                    None => {
                        debug!(id = %cancel.passenger_id, "Cancellation for unknown passenger");
                        RouterOutcome::Ignored
                    }
                }
            }
            InboundEvent::Ack(ack) => RouterOutcome::Acknowledged(ack),
        }
    }

    /// The connection dropped: forget every counterpart. Returns how many were dropped.
    pub fn connection_lost(&mut self) -> usize {
        let dropped = self.registry.len();
        self.registry.clear();
        dropped
    }

    /// Add snapshot records without notifying. Records for the wrong role
    /// and ids already known are skipped.
    pub fn seed(&mut self, records: Vec<CounterpartRecord>) -> usize {
        let observed = self.role.counterpart();
        self.registry
            .seed(records.into_iter().filter(|r| r.role() == observed))
    }

    /// Pass a notice through to the sink.
    pub fn notify(&mut self, notice: Notice) {
        self.sink.notify(notice);
    }

    pub fn counterparts(&self) -> Vec<CounterpartRecord> {
        self.registry.list()
    }

    pub fn registry(&self) -> &PresenceRegistry {
        &self.registry
    }

    fn upsert(&mut self, record: CounterpartRecord) -> RouterOutcome {
        match self.registry.upsert(record.clone()) {
            Upsert::Inserted => {
                self.sink.notify(arrival_notice(&record));
                RouterOutcome::Arrived(record)
            }
            Upsert::Replaced => RouterOutcome::Updated(record),
        }
    }
}

fn arrival_notice(record: &CounterpartRecord) -> Notice {
    match record {
        CounterpartRecord::Passenger(p) => Notice::info(
            "New passenger waiting",
            format!("{} is waiting for a ride", p.username),
        ),
        CounterpartRecord::Driver(d) => Notice::info(
            "Driver available",
            format!("{} · {} seats", d.username, d.available_seats),
        ),
    }
}

/// Build the wire event for a local action.
pub fn encode_action(
    role: Role,
    username: &str,
    action: &LocalAction,
) -> Result<OutboundEvent, ActionError> {
    if action.role() != role {
        return Err(ActionError::WrongRole {
            action: action.name(),
            role,
        });
    }
    Ok(match action {
        LocalAction::MarkWaiting { location } => OutboundEvent::PassengerWaiting(WaitingPayload {
            location: *location,
            username: username.to_string(),
        }),
        LocalAction::CancelWaiting => OutboundEvent::PassengerCancel,
        LocalAction::UpdateLocation { location, seats } => {
            OutboundEvent::DriverLocation(DriverLocationPayload {
                location: *location,
                available_seats: *seats,
                username: username.to_string(),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{events, DriverPresence, DriverStatus, Location};
    use colectivo_common::NoticeLevel;
    use serde_json::json;

    fn passenger_frame(id: &str, lat: f64) -> serde_json::Value {
        json!({
            "id": id,
            "username": format!("user-{id}"),
            "location": {"latitude": lat, "longitude": -70.66}
        })
    }

    fn driver_frame(id: &str, seats: u32) -> serde_json::Value {
        json!({
            "id": id,
            "username": "carla",
            "location": {"latitude": -33.5, "longitude": -70.7},
            "availableSeats": seats
        })
    }

    fn driver_router() -> EventRouter<Vec<Notice>> {
        EventRouter::new(Role::Driver, Vec::new())
    }

    fn passenger_router() -> EventRouter<Vec<Notice>> {
        EventRouter::new(Role::Passenger, Vec::new())
    }

    #[test]
    fn new_then_update_notifies_once() {
        let mut router = driver_router();
        let first = router.handle(events::PASSENGER_NEW_WAITING, &passenger_frame("p1", -33.44));
        let second = router.handle(events::PASSENGER_NEW_WAITING, &passenger_frame("p1", -33.45));

        assert!(matches!(first, RouterOutcome::Arrived(_)));
        assert!(matches!(second, RouterOutcome::Updated(_)));

        let list = router.counterparts();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].location(), Location::new(-33.45, -70.66));

        assert_eq!(router.sink.len(), 1);
        assert_eq!(router.sink[0].level, NoticeLevel::Info);
        assert_eq!(router.sink[0].title, "New passenger waiting");
        assert_eq!(router.sink[0].body, "user-p1 is waiting for a ride");
    }

    #[test]
    fn mobile_alias_is_same_counterpart() {
        let mut router = driver_router();
        router.handle(events::PASSENGER_NEW_WAITING, &passenger_frame("p1", -33.44));
        router.handle(events::PASSENGER_WAITING, &passenger_frame("p1", -33.47));
        assert_eq!(router.registry().len(), 1);
        assert_eq!(router.sink.len(), 1);
    }

    #[test]
    fn cancel_of_unknown_id_changes_nothing() {
        let mut router = driver_router();
        router.handle(events::PASSENGER_NEW_WAITING, &passenger_frame("p1", -33.44));

        let outcome = router.handle(events::PASSENGER_CANCELLED, &json!({"passengerId": "p9"}));
        assert_eq!(outcome, RouterOutcome::Ignored);
        assert_eq!(router.registry().len(), 1);
        assert_eq!(router.sink.len(), 1);
    }

    #[test]
    fn cancel_removes_until_seen_again() {
        let mut router = driver_router();
        router.handle(events::PASSENGER_NEW_WAITING, &passenger_frame("p1", -33.44));

        let outcome = router.handle(events::PASSENGER_CANCELLED, &json!({"passengerId": "p1"}));
        assert_eq!(outcome, RouterOutcome::Left { id: "p1".into() });
        assert!(router.counterparts().is_empty());

        let again = router.handle(events::PASSENGER_NEW_WAITING, &passenger_frame("p1", -33.46));
        assert!(matches!(again, RouterOutcome::Arrived(_)));
        assert_eq!(router.sink.len(), 2);
    }

    #[test]
    fn last_arrived_wins() {
        let mut router = passenger_router();
        router.handle(events::DRIVER_LOCATION_UPDATED, &driver_frame("d1", 3));
        router.handle(events::DRIVER_LOCATION_UPDATED, &driver_frame("d1", 1));

        let CounterpartRecord::Driver(d) = &router.counterparts()[0] else {
            panic!("expected driver");
        };
        assert_eq!(d.available_seats, 1);
        assert_eq!(router.sink.len(), 1);
        assert_eq!(router.sink[0].body, "carla · 3 seats");
    }

    #[test]
    fn connection_lost_clears_registry() {
        let mut router = passenger_router();
        router.handle(events::DRIVER_LOCATION_UPDATED, &driver_frame("d1", 3));
        router.handle(events::DRIVER_LOCATION_UPDATED, &driver_frame("d2", 2));

        assert_eq!(router.connection_lost(), 2);
        assert!(router.counterparts().is_empty());
    }

    #[test]
    fn other_roles_events_are_ignored() {
        let mut router = passenger_router();
        let outcome = router.handle(events::PASSENGER_NEW_WAITING, &passenger_frame("p1", -33.44));
        assert_eq!(outcome, RouterOutcome::Ignored);
        assert!(router.registry().is_empty());

        let outcome = router.handle(events::DRIVER_LOCATION_UPDATE_SUCCESS, &json!({}));
        assert_eq!(outcome, RouterOutcome::Ignored);
    }

    #[test]
    fn malformed_event_does_not_block_the_next() {
        let mut router = driver_router();
        let bad = router.handle(events::PASSENGER_NEW_WAITING, &json!({"id": 7}));
        let unknown = router.handle("chat:message", &json!({"text": "hola"}));
        let good = router.handle(events::PASSENGER_NEW_WAITING, &passenger_frame("p2", -33.5));

        assert_eq!(bad, RouterOutcome::Ignored);
        assert_eq!(unknown, RouterOutcome::Ignored);
        assert!(matches!(good, RouterOutcome::Arrived(_)));
    }

    #[test]
    fn acks_pass_through_for_own_role() {
        let mut router = passenger_router();
        assert_eq!(
            router.handle(events::PASSENGER_WAITING_SUCCESS, &json!(null)),
            RouterOutcome::Acknowledged(Ack::WaitingAccepted)
        );
    }

    #[test]
    fn seed_is_silent_and_filters_role() {
        let mut router = passenger_router();
        router.handle(events::DRIVER_LOCATION_UPDATED, &driver_frame("d1", 1));

        let seeded = router.seed(vec![
            DriverPresence {
                id: "d1".into(),
                username: "carla".into(),
                location: Location::new(0.0, 0.0),
                available_seats: 4,
                status: DriverStatus::Available,
            }
            .into(),
            DriverPresence {
                id: "d2".into(),
                username: "diego".into(),
                location: Location::new(0.0, 0.0),
                available_seats: 2,
                status: DriverStatus::Available,
            }
            .into(),
            CounterpartRecord::Passenger(crate::protocol::PassengerPresence {
                id: "p1".into(),
                username: "ana".into(),
                location: Location::new(0.0, 0.0),
                created_at: None,
            }),
        ]);

        assert_eq!(seeded, 1);
        assert_eq!(router.registry().len(), 2);
        assert_eq!(router.sink.len(), 1);
    }

    #[test]
    fn encode_checks_role() {
        let action = LocalAction::UpdateLocation {
            location: Location::new(-33.5, -70.7),
            seats: 2,
        };
        assert!(encode_action(Role::Passenger, "ana", &action).is_err());

        let event = encode_action(Role::Driver, "carla", &action).unwrap();
        assert_eq!(event.name(), "driver:location");
        assert_eq!(event.payload().unwrap()["availableSeats"], json!(2));
    }
}
