//! Value objects - immutable types that represent domain concepts

mod ids;
mod snowflake;

pub use ids::{IdParseError, RoomId, UserId};
pub use snowflake::{Snowflake, SnowflakeGenerator, SnowflakeParseError, MAX_WORKER_ID};
