//! Snowflake ID - 64-bit unique identifier for persisted entities
//!
//! Layout, high to low: 42 bits of milliseconds since the platform epoch,
//! 10 bits of worker id, 12 bits of per-millisecond sequence. Ids are
//! serialized as strings on the wire so JavaScript clients never see a value
//! above `Number.MAX_SAFE_INTEGER`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const TIMESTAMP_SHIFT: u32 = 22;
const WORKER_SHIFT: u32 = 12;
const SEQUENCE_BITS: u32 = 12;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

/// 64-bit snowflake identifier for rooms, messages, and users
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Snowflake(i64);

impl Snowflake {
    /// Platform epoch: 2023-09-01 00:00:00 UTC (milliseconds)
    pub const EPOCH: i64 = 1_693_526_400_000;

    #[inline]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn into_inner(self) -> i64 {
        self.0
    }

    /// Milliseconds since the Unix epoch at which this id was issued
    #[inline]
    pub fn timestamp(&self) -> i64 {
        (self.0 >> TIMESTAMP_SHIFT) + Self::EPOCH
    }

    /// Parse from string representation
    ///
    /// This is the "well-formed persisted-entity identifier" check: anything
    /// that does not parse as a decimal i64 is malformed.
    pub fn parse(s: &str) -> Result<Self, SnowflakeParseError> {
        s.parse::<i64>()
            .map(Snowflake)
            .map_err(|_| SnowflakeParseError::InvalidFormat)
    }
}

/// Error when parsing a Snowflake from string
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SnowflakeParseError {
    #[error("invalid snowflake format")]
    InvalidFormat,
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Snowflake {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<Snowflake> for i64 {
    fn from(id: Snowflake) -> Self {
        id.0
    }
}

impl std::str::FromStr for Snowflake {
    type Err = SnowflakeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Snowflake::parse(s)
    }
}

// Serialize as string for JSON (JavaScript BigInt safety)
impl Serialize for Snowflake {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

/// Accepted wire shapes: canonical string, or a bare integer from older
/// clients that predate the string encoding.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Str(String),
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match IdRepr::deserialize(deserializer)? {
            IdRepr::Int(raw) => Ok(Snowflake(raw)),
            IdRepr::Str(s) => Snowflake::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// Lock-free Snowflake ID generator
///
/// The last issued `(millis << 12) | sequence` pair is kept in one atomic
/// word, so a compare-exchange either claims a fresh millisecond or the next
/// sequence slot within the current one. A backwards clock step keeps
/// issuing under the last seen millisecond, which preserves monotonicity.
pub struct SnowflakeGenerator {
    worker_bits: i64,
    state: AtomicI64,
}

impl SnowflakeGenerator {
    /// Create a new generator with the given worker ID
    ///
    /// # Panics
    /// Panics if `worker_id` does not fit in 10 bits.
    pub fn new(worker_id: u16) -> Self {
        assert!(worker_id < 1024, "worker id must fit in 10 bits");
        Self {
            worker_bits: i64::from(worker_id) << WORKER_SHIFT,
            state: AtomicI64::new(0),
        }
    }

    /// Generate a new unique Snowflake ID
    pub fn generate(&self) -> Snowflake {
        loop {
            let now = millis_since_epoch();
            let seen = self.state.load(Ordering::Acquire);

            let next = if now > (seen >> SEQUENCE_BITS) {
                now << SEQUENCE_BITS
            } else if (seen & SEQUENCE_MASK) < SEQUENCE_MASK {
                seen + 1
            } else {
                // 4096 ids in one millisecond; wait out the tick
                std::hint::spin_loop();
                continue;
            };

            if self
                .state
                .compare_exchange(seen, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let id = ((next >> SEQUENCE_BITS) << TIMESTAMP_SHIFT)
                    | self.worker_bits
                    | (next & SEQUENCE_MASK);
                return Snowflake::new(id);
            }
            // Lost the race; retry against the fresh state
        }
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

fn millis_since_epoch() -> i64 {
    let unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64);
    unix_ms - Snowflake::EPOCH
}
