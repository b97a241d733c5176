//! Operation codes shared with the business and delivery tiers

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Envelope version carried by every [`Msg`](super::Msg)
pub const MSG_VERSION: i32 = 1;

/// Reply code for a successful call
pub const SUCCESS_REPLY_CODE: i32 = 0;

/// Reply message for a successful call
pub const SUCCESS_REPLY_MSG: &str = "success";

/// Message operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OpCode {
    /// Point-to-point message
    SingleSend = 2,
    /// Room chat message
    RoomSend = 3,
    /// Room online-count update
    RoomCountSend = 4,
    /// Room membership info update
    RoomInfoSend = 5,
    /// Raw-TCP join
    BuildTcpConn = 6,
}

impl OpCode {
    /// Create an `OpCode` from a raw integer value
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            2 => Some(Self::SingleSend),
            3 => Some(Self::RoomSend),
            4 => Some(Self::RoomCountSend),
            5 => Some(Self::RoomInfoSend),
            6 => Some(Self::BuildTcpConn),
            _ => None,
        }
    }

    /// Get the raw integer value
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SingleSend => "SingleSend",
            Self::RoomSend => "RoomSend",
            Self::RoomCountSend => "RoomCountSend",
            Self::RoomInfoSend => "RoomInfoSend",
            Self::BuildTcpConn => "BuildTcpConn",
        };
        write!(f, "{name}({})", self.as_i32())
    }
}

impl Serialize for OpCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = i32::deserialize(deserializer)?;
        Self::from_i32(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown op code: {value}")))
    }
}
