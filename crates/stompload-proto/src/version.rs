//! Negotiated protocol level.

use std::{fmt, str::FromStr};

use crate::errors::ProtocolError;

/// Protocol level negotiated for a session.
///
/// The level decides which headers subscribe, unsubscribe and ack frames
/// carry. It is fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolVersion {
    /// Level 1.0: no subscription ids, acks by `message-id`.
    V1_0,
    /// Level 1.1: subscription ids, acks by `message-id` + `subscription`.
    V1_1,
    /// Level 1.2: acks by the message's own `ack` header.
    #[default]
    V1_2,
}

impl ProtocolVersion {
    /// All supported levels, lowest first.
    pub const ALL: [Self; 3] = [Self::V1_0, Self::V1_1, Self::V1_2];

    /// Wire spelling of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
            Self::V1_2 => "1.2",
        }
    }

    /// True when CONNECT must carry `accept-version` and `host`.
    pub fn negotiates(self) -> bool {
        self != Self::V1_0
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.0" => Ok(Self::V1_0),
            "1.1" => Ok(Self::V1_1),
            "1.2" => Ok(Self::V1_2),
            other => Err(ProtocolError::UnsupportedVersion(other.to_string())),
        }
    }
}
