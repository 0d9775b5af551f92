//! Native document identifiers and their external hex form.
//!
//! # Responsibility
//! - Generate fresh 12-byte identifiers without coordination.
//! - Convert between the native identifier and the lowercase hex string
//!   carried on every value object.
//!
//! # Invariants
//! - `ObjectId::parse` is the only way an external string becomes a native id.
//! - `ObjectId::to_hex` always yields 24 lowercase hex characters.
//! - Ids generated by one process increase within a second until the 24-bit
//!   counter wraps.

use once_cell::sync::Lazy;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const ID_LEN: usize = 12;
const HEX_LEN: usize = ID_LEN * 2;
const COUNTER_MASK: u32 = 0x00ff_ffff;

// 5 random bytes fixed per process plus a counter seeded at a random offset.
static PROCESS_NONCE: Lazy<[u8; 5]> = Lazy::new(|| {
    let bytes = Uuid::new_v4().into_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]]
});
static COUNTER: Lazy<AtomicU32> = Lazy::new(|| {
    let bytes = Uuid::new_v4().into_bytes();
    AtomicU32::new(u32::from_be_bytes([0, bytes[5], bytes[6], bytes[7]]))
});

/// Store-native primary key for customers, cards and addresses.
///
/// Layout: 4-byte big-endian unix seconds, 5-byte process nonce, 3-byte
/// counter. Ordering of the raw bytes roughly follows creation time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; ID_LEN]);

/// Rejected external identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidIdentifier {
    /// Raw input, kept for diagnostics.
    pub input: String,
}

impl Display for InvalidIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid id hex `{}`", self.input)
    }
}

impl Error for InvalidIdentifier {}

impl ObjectId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as u32);
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;

        let mut bytes = [0u8; ID_LEN];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(PROCESS_NONCE.as_slice());
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Builds an identifier from raw bytes.
    pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses the external hex form.
    ///
    /// Accepts exactly 24 hex digits in either case. Anything else, including
    /// the empty string, is rejected before it can reach a store.
    pub fn parse(input: &str) -> Result<Self, InvalidIdentifier> {
        let invalid = || InvalidIdentifier {
            input: input.to_string(),
        };
        if input.len() != HEX_LEN {
            return Err(invalid());
        }

        let mut bytes = [0u8; ID_LEN];
        hex::decode_to_slice(input, &mut bytes).map_err(|_| invalid())?;
        Ok(Self(bytes))
    }

    /// Returns the lowercase hex form exposed to callers.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns the raw bytes.
    pub fn bytes(&self) -> [u8; ID_LEN] {
        self.0
    }

    /// Creation time encoded in the id, as unix seconds.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HexVisitor;

        impl Visitor<'_> for HexVisitor {
            type Value = ObjectId;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str("a 24 character hex object id")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ObjectId, E> {
                ObjectId::parse(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(HexVisitor)
    }
}

/// Parses every id in `inputs`, failing the whole batch on the first bad one.
pub fn parse_all<'a, I>(inputs: I) -> Result<Vec<ObjectId>, InvalidIdentifier>
where
    I: IntoIterator<Item = &'a str>,
{
    inputs.into_iter().map(ObjectId::parse).collect()
}
