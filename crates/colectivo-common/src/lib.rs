pub mod errors;
pub mod id;
pub mod notifications;

pub use errors::{ColectivoError, ConfigError};
pub use id::{new_id, ConnectionTag};
pub use notifications::{Notice, NoticeBoard, NoticeLevel};

pub type Result<T> = std::result::Result<T, ColectivoError>;
