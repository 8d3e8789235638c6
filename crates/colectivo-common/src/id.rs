use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Short hex tag attached to every log line of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionTag(String);

impl ConnectionTag {
    pub fn new() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let bytes = uuid.as_bytes();
        Self(format!(
            "{:02x}{:02x}{:02x}{:02x}",
            bytes[0], bytes[1], bytes[2], bytes[3]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionTag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
