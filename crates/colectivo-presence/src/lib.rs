pub mod identity;
pub mod notify;
pub mod presence;
pub mod protocol;
pub mod realtime;
pub mod registry;
pub mod snapshot;

pub use identity::{
    Credential, CredentialError, CredentialProvider, EnvCredential, Identity, StaticCredential,
};
pub use notify::{LogSink, NotificationSink};
pub use presence::{
    ActionError, LocalAction, LocalActorState, PresenceClient, PresenceConfig, PresenceError,
    PresenceEvent,
};
pub use protocol::{
    Ack, CounterpartRecord, DriverPresence, DriverStatus, InboundEvent, Location, OutboundEvent,
    PassengerPresence, Role,
};
pub use realtime::{ConnectionState, Publish, RealtimeConfig, SessionChannel};
pub use registry::{PresenceRegistry, Upsert};
pub use snapshot::{HttpSnapshotSource, SnapshotError, SnapshotSource};
