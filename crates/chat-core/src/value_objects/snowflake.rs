//! Message sequence ids
//!
//! A sequence id packs, from the high bits down, the milliseconds since
//! [`Snowflake::EPOCH`] (41 bits), the issuing worker (10 bits) and a
//! per-millisecond counter (12 bits). Ids from one worker are strictly
//! increasing; ids from different workers never collide.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const WORKER_BITS: u32 = 10;
const COUNTER_BITS: u32 = 12;
const COUNTER_MAX: u64 = (1 << COUNTER_BITS) - 1;

/// Largest accepted worker id
pub const MAX_WORKER_ID: u16 = (1 << WORKER_BITS) - 1;

/// Time-ordered message sequence id; zero means "not assigned yet".
///
/// Travels as a JSON integer, like every other id on the push surface.
/// Decimal strings are accepted on input for callers that cannot carry
/// 64-bit integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Snowflake(i64);

impl Snowflake {
    /// 2024-01-01T00:00:00Z in Unix milliseconds
    pub const EPOCH: i64 = 1_704_067_200_000;

    #[inline]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn into_inner(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Worker that issued this id
    pub fn worker_id(&self) -> u16 {
        ((self.0 >> COUNTER_BITS) & i64::from(MAX_WORKER_ID)) as u16
    }

    /// Issue time, in Unix milliseconds
    pub fn unix_millis(&self) -> i64 {
        (self.0 >> (WORKER_BITS + COUNTER_BITS)) + Self::EPOCH
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.unix_millis())
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for Snowflake {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for Snowflake {
    type Err = SnowflakeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(Self)
            .map_err(|_| SnowflakeParseError(s.to_string()))
    }
}

/// Input that is not a decimal 64-bit integer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid sequence id: {0:?}")]
pub struct SnowflakeParseError(String);

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Int(i64),
            Text(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Int(id) => Ok(Self(id)),
            Wire::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Issues sequence ids for one worker.
///
/// The last `(millis, counter)` slot lives in a single atomic word; callers
/// race on a compare-exchange and the loser retries against the new slot.
/// A clock that stalls or steps back keeps issuing from the last slot.
pub struct SnowflakeGenerator {
    worker_id: u16,
    last_slot: AtomicU64,
}

impl SnowflakeGenerator {
    /// # Panics
    /// Panics if `worker_id` exceeds [`MAX_WORKER_ID`]
    pub fn new(worker_id: u16) -> Self {
        assert!(worker_id <= MAX_WORKER_ID, "worker id must be at most {MAX_WORKER_ID}");
        Self {
            worker_id,
            last_slot: AtomicU64::new(0),
        }
    }

    pub fn worker_id(&self) -> u16 {
        self.worker_id
    }

    pub fn generate(&self) -> Snowflake {
        let (millis, counter) = self.claim_slot();
        let elapsed = millis as i64 - Snowflake::EPOCH;
        Snowflake(
            (elapsed << (WORKER_BITS + COUNTER_BITS))
                | (i64::from(self.worker_id) << COUNTER_BITS)
                | counter as i64,
        )
    }

    fn claim_slot(&self) -> (u64, u64) {
        let mut current = self.last_slot.load(Ordering::Acquire);
        loop {
            let (last_millis, last_counter) = (current >> COUNTER_BITS, current & COUNTER_MAX);
            let now = unix_millis();

            let next = if now > last_millis {
                (now, 0)
            } else if last_counter < COUNTER_MAX {
                (last_millis, last_counter + 1)
            } else {
                // Counter exhausted; wait for the clock to tick over
                std::hint::spin_loop();
                current = self.last_slot.load(Ordering::Acquire);
                continue;
            };

            match self.last_slot.compare_exchange_weak(
                current,
                (next.0 << COUNTER_BITS) | next.1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for SnowflakeGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeGenerator")
            .field("worker_id", &self.worker_id)
            .finish()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
