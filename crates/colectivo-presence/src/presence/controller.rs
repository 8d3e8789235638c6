//! The local actor's own broadcast state and the actions that change it.

use tracing::{debug, info, warn};

use crate::identity::Identity;
use crate::protocol::{
    Ack, DriverLocationPayload, DriverStatus, Location, OutboundEvent, Role, WaitingPayload,
};
use crate::realtime::{ChannelError, Publish};

use super::router::encode_action;

// ---------------------------------------------------------------------------
// Actions & state
// ---------------------------------------------------------------------------

/// Something the local user asks to broadcast.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalAction {
    MarkWaiting { location: Location },
    CancelWaiting,
    UpdateLocation { location: Location, seats: u32 },
}

impl LocalAction {
    /// The only role allowed to perform this action.
    pub fn role(&self) -> Role {
        match self {
            LocalAction::MarkWaiting { .. } | LocalAction::CancelWaiting => Role::Passenger,
            LocalAction::UpdateLocation { .. } => Role::Driver,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LocalAction::MarkWaiting { .. } => "mark-waiting",
            LocalAction::CancelWaiting => "cancel-waiting",
            LocalAction::UpdateLocation { .. } => "update-location",
        }
    }
}

/// What a driver last broadcast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverBroadcast {
    pub location: Location,
    pub available_seats: u32,
    pub status: DriverStatus,
}

/// The local actor's published state.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalActorState {
    Passenger {
        waiting: bool,
        location: Option<Location>,
        acknowledged: bool,
    },
    Driver {
        broadcast: Option<DriverBroadcast>,
        acknowledged: bool,
    },
}

impl LocalActorState {
    pub fn idle(role: Role) -> Self {
        match role {
            Role::Passenger => LocalActorState::Passenger {
                waiting: false,
                location: None,
                acknowledged: false,
            },
            Role::Driver => LocalActorState::Driver {
                broadcast: None,
                acknowledged: false,
            },
        }
    }

    pub fn role(&self) -> Role {
        match self {
            LocalActorState::Passenger { .. } => Role::Passenger,
            LocalActorState::Driver { .. } => Role::Driver,
        }
    }

    /// Whether there is something to re-publish after a reconnect.
    pub fn is_active(&self) -> bool {
        match self {
            LocalActorState::Passenger { waiting, .. } => *waiting,
            LocalActorState::Driver { broadcast, .. } => broadcast.is_some(),
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        match self {
            LocalActorState::Passenger { acknowledged, .. }
            | LocalActorState::Driver { acknowledged, .. } => *acknowledged,
        }
    }

    fn set_acknowledged(&mut self, value: bool) {
        match self {
            LocalActorState::Passenger { acknowledged, .. }
            | LocalActorState::Driver { acknowledged, .. } => *acknowledged = value,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("not connected to the presence server")]
    NotConnected,

    #[error("{action} is not available to a {role}")]
    WrongRole { action: &'static str, role: Role },

    #[error("already marked as waiting")]
    AlreadyWaiting,

    #[error("not currently waiting")]
    NotWaiting,

    #[error("{seats} seats exceeds the maximum of {max}")]
    SeatsOutOfRange { seats: u32, max: u32 },

    #[error(transparent)]
    Channel(ChannelError),
}

impl From<ChannelError> for ActionError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::NotConnected => ActionError::NotConnected,
            other => ActionError::Channel(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns [`LocalActorState`] and is the only place it changes.
///
/// Actions are published first and committed after; a rejected or failed
/// action leaves the state as it was. Nothing is queued while offline.
#[derive(Debug)]
pub struct SelfStateController {
    role: Role,
    username: String,
    max_seats: u32,
    state: LocalActorState,
}

impl SelfStateController {
    pub fn new(identity: &Identity, max_seats: u32) -> Self {
        Self {
            role: identity.role,
            username: identity.username.clone(),
            max_seats,
            state: LocalActorState::idle(identity.role),
        }
    }

    pub fn state(&self) -> &LocalActorState {
        &self.state
    }

    /// Validate, publish, then commit `action`. Returns the event that was sent.
    pub fn perform<P: Publish + ?Sized>(
        &mut self,
        action: &LocalAction,
        channel: &P,
    ) -> Result<OutboundEvent, ActionError> {
        if action.role() != self.role {
            return Err(ActionError::WrongRole {
                action: action.name(),
                role: self.role,
            });
        }
        if !channel.is_connected() {
            return Err(ActionError::NotConnected);
        }

        let next = self.next_state(action)?;
        let event = encode_action(self.role, &self.username, action)?;
        channel.publish(&event)?;

        debug!(action = action.name(), "Local action published");
        self.state = next;
        Ok(event)
    }

    /// Re-publish the active state after a (re)connect.
    ///
    /// Call once per transition to connected. Returns the event sent, if any.
    pub fn on_connected<P: Publish + ?Sized>(&mut self, channel: &P) -> Option<OutboundEvent> {
        let event = self.republish_event()?;
        match channel.publish(&event) {
            Ok(()) => {
                info!(event = event.name(), "Re-published local state");
                Some(event)
            }
            Err(e) => {
                warn!(event = event.name(), error = %e, "Failed to re-publish local state");
                None
            }
        }
    }

    /// The server forgets us on disconnect; earlier acks no longer hold.
    pub fn on_disconnected(&mut self) {
        self.state.set_acknowledged(false);
    }

    /// Apply a server acknowledgement. Acks that do not match the current
    /// state (late or for another role) are ignored and return `false`.
    pub fn acknowledge(&mut self, ack: Ack) -> bool {
        let matches = match (&self.state, ack) {
            (LocalActorState::Passenger { waiting, .. }, Ack::WaitingAccepted) => *waiting,
            (LocalActorState::Passenger { waiting, .. }, Ack::CancelAccepted) => !*waiting,
            (LocalActorState::Driver { broadcast, .. }, Ack::LocationAccepted) => {
                broadcast.is_some()
            }
            _ => false,
        };
        if matches {
            self.state.set_acknowledged(true);
        }
        matches
    }

    /// Forget everything on logout.
    pub fn reset(&mut self) {
        self.state = LocalActorState::idle(self.role);
    }

    fn next_state(&self, action: &LocalAction) -> Result<LocalActorState, ActionError> {
        match (&self.state, action) {
            (LocalActorState::Passenger { waiting: true, .. }, LocalAction::MarkWaiting { .. }) => {
                Err(ActionError::AlreadyWaiting)
            }
            (LocalActorState::Passenger { .. }, LocalAction::MarkWaiting { location }) => {
                Ok(LocalActorState::Passenger {
                    waiting: true,
                    location: Some(*location),
                    acknowledged: false,
                })
            }
            (LocalActorState::Passenger { waiting: false, .. }, LocalAction::CancelWaiting) => {
                Err(ActionError::NotWaiting)
            }
            (LocalActorState::Passenger { location, .. }, LocalAction::CancelWaiting) => {
                Ok(LocalActorState::Passenger {
                    waiting: false,
                    location: *location,
                    acknowledged: false,
                })
            }
            (LocalActorState::Driver { .. }, LocalAction::UpdateLocation { location, seats }) => {
                if *seats > self.max_seats {
                    return Err(ActionError::SeatsOutOfRange {
                        seats: *seats,
                        max: self.max_seats,
                    });
                }
                Ok(LocalActorState::Driver {
                    broadcast: Some(DriverBroadcast {
                        location: *location,
                        available_seats: *seats,
                        status: DriverStatus::for_seats(*seats),
                    }),
                    acknowledged: false,
                })
            }
            (_, action) => Err(ActionError::WrongRole {
                action: action.name(),
                role: self.role,
            }),
        }
    }

    fn republish_event(&self) -> Option<OutboundEvent> {
        match &self.state {
            LocalActorState::Passenger {
                waiting: true,
                location: Some(location),
                ..
            } => Some(OutboundEvent::PassengerWaiting(WaitingPayload {
                location: *location,
                username: self.username.clone(),
            })),
            LocalActorState::Driver {
                broadcast: Some(broadcast),
                ..
            } => Some(OutboundEvent::DriverLocation(DriverLocationPayload {
                location: broadcast.location,
                available_seats: broadcast.available_seats,
                username: self.username.clone(),
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeChannel {
        connected: Cell<bool>,
        sent: RefCell<Vec<OutboundEvent>>,
    }

    impl FakeChannel {
        fn connected() -> Self {
            let channel = Self::default();
            channel.connected.set(true);
            channel
        }
    }

    impl Publish for FakeChannel {
        fn is_connected(&self) -> bool {
            self.connected.get()
        }

        fn publish(&self, event: &OutboundEvent) -> Result<(), ChannelError> {
            if !self.connected.get() {
                return Err(ChannelError::NotConnected);
            }
            self.sent.borrow_mut().push(event.clone());
            Ok(())
        }
    }

    fn driver() -> SelfStateController {
        SelfStateController::new(&Identity::new("d1", "carla", Role::Driver), 4)
    }

    fn passenger() -> SelfStateController {
        SelfStateController::new(&Identity::new("p1", "ana", Role::Passenger), 4)
    }

    fn here() -> Location {
        Location::new(-33.45, -70.66)
    }

    #[test]
    fn reconnect_republishes_driver_state_once() {
        let channel = FakeChannel::connected();
        let mut controller = driver();
        controller
            .perform(
                &LocalAction::UpdateLocation {
                    location: here(),
                    seats: 2,
                },
                &channel,
            )
            .unwrap();
        channel.sent.borrow_mut().clear();

        channel.connected.set(false);
        controller.on_disconnected();
        channel.connected.set(true);
        let event = controller.on_connected(&channel).unwrap();

        let sent = channel.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], event);
        let OutboundEvent::DriverLocation(payload) = &sent[0] else {
            panic!("expected driver:location");
        };
        assert_eq!(payload.available_seats, 2);
        assert_eq!(payload.username, "carla");
    }

    #[test]
    fn reconnect_republishes_waiting_passenger_once() {
        let channel = FakeChannel::connected();
        let mut controller = passenger();
        controller
            .perform(&LocalAction::MarkWaiting { location: here() }, &channel)
            .unwrap();
        channel.sent.borrow_mut().clear();

        channel.connected.set(false);
        controller.on_disconnected();
        channel.connected.set(true);
        let event = controller.on_connected(&channel).unwrap();

        let sent = channel.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], event);
        let OutboundEvent::PassengerWaiting(payload) = &sent[0] else {
            panic!("expected passenger:waiting");
        };
        assert_eq!(payload.location, here());
        assert_eq!(payload.username, "ana");
    }

    #[test]
    fn idle_state_is_not_republished() {
        let channel = FakeChannel::connected();
        let mut controller = passenger();
        assert!(controller.on_connected(&channel).is_none());
        assert!(channel.sent.borrow().is_empty());
    }

    #[test]
    fn passenger_cannot_update_location() {
        let channel = FakeChannel::connected();
        let mut controller = passenger();
        let before = controller.state().clone();

        let err = controller
            .perform(
                &LocalAction::UpdateLocation {
                    location: here(),
                    seats: 2,
                },
                &channel,
            )
            .unwrap_err();

        assert!(matches!(
            err,
            ActionError::WrongRole {
                role: Role::Passenger,
                ..
            }
        ));
        assert_eq!(controller.state(), &before);
        assert!(channel.sent.borrow().is_empty());
    }

    #[test]
    fn offline_action_is_rejected_not_queued() {
        let channel = FakeChannel::default();
        let mut controller = passenger();
        let err = controller
            .perform(&LocalAction::MarkWaiting { location: here() }, &channel)
            .unwrap_err();
        assert!(matches!(err, ActionError::NotConnected));
        assert!(!controller.state().is_active());

        channel.connected.set(true);
        assert!(controller.on_connected(&channel).is_none());
    }

    #[test]
    fn waiting_lifecycle() {
        let channel = FakeChannel::connected();
        let mut controller = passenger();

        assert!(matches!(
            controller.perform(&LocalAction::CancelWaiting, &channel),
            Err(ActionError::NotWaiting)
        ));
        controller
            .perform(&LocalAction::MarkWaiting { location: here() }, &channel)
            .unwrap();
        assert!(controller.state().is_active());
        assert!(matches!(
            controller.perform(&LocalAction::MarkWaiting { location: here() }, &channel),
            Err(ActionError::AlreadyWaiting)
        ));

        assert!(controller.acknowledge(Ack::WaitingAccepted));
        assert!(controller.state().is_acknowledged());

        controller
            .perform(&LocalAction::CancelWaiting, &channel)
            .unwrap();
        assert!(!controller.state().is_active());
        assert!(!controller.state().is_acknowledged());
        assert!(!controller.acknowledge(Ack::WaitingAccepted));
        assert!(controller.acknowledge(Ack::CancelAccepted));

        let names: Vec<_> = channel.sent.borrow().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["passenger:waiting", "passenger:cancel"]);
    }

    #[test]
    fn too_many_seats_is_rejected() {
        let channel = FakeChannel::connected();
        let mut controller = driver();
        let err = controller
            .perform(
                &LocalAction::UpdateLocation {
                    location: here(),
                    seats: 5,
                },
                &channel,
            )
            .unwrap_err();
        assert!(matches!(err, ActionError::SeatsOutOfRange { seats: 5, max: 4 }));
        assert!(!controller.state().is_active());
    }

    #[test]
    fn zero_seats_marks_driver_busy() {
        let channel = FakeChannel::connected();
        let mut controller = driver();
        controller
            .perform(
                &LocalAction::UpdateLocation {
                    location: here(),
                    seats: 0,
                },
                &channel,
            )
            .unwrap();
        let LocalActorState::Driver {
            broadcast: Some(broadcast),
            ..
        } = controller.state()
        else {
            panic!("expected driver broadcast");
        };
        assert_eq!(broadcast.status, DriverStatus::Busy);
    }

    #[test]
    fn disconnect_drops_ack_and_reset_clears_state() {
        let channel = FakeChannel::connected();
        let mut controller = driver();
        controller
            .perform(
                &LocalAction::UpdateLocation {
                    location: here(),
                    seats: 3,
                },
                &channel,
            )
            .unwrap();
        assert!(controller.acknowledge(Ack::LocationAccepted));

        controller.on_disconnected();
        assert!(!controller.state().is_acknowledged());
        assert!(controller.state().is_active());

        controller.reset();
        assert_eq!(controller.state(), &LocalActorState::idle(Role::Driver));
    }

    #[test]
    fn ack_for_other_role_is_ignored() {
        let mut controller = driver();
        assert!(!controller.acknowledge(Ack::WaitingAccepted));
    }
}
