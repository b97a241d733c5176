//! User and room identifiers
//!
//! Both are plain integers on the wire. A zero `UserId` means the connection
//! has not joined yet; `RoomId::NONE` (-1) means "joined without a room".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error when parsing an identifier from string
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("invalid identifier format")]
    InvalidFormat,
}

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create from a raw value
            #[inline]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the raw value
            #[inline]
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| IdParseError::InvalidFormat)
            }
        }
    };
}

integer_id!(
    /// Identifier of an authenticated user, assigned by the business tier
    UserId
);

integer_id!(
    /// Identifier of a logical chat room
    RoomId
);

impl UserId {
    /// Whether this id denotes "not joined" (rejected or not yet authenticated)
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl RoomId {
    /// Sentinel for a connection that joined without a room
    pub const NONE: Self = Self(-1);

    /// Whether this id denotes a real room
    #[inline]
    pub const fn is_room(self) -> bool {
        self.0 != Self::NONE.0
    }

    /// Whether this id is acceptable on the raw-TCP transport (strictly positive)
    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}
