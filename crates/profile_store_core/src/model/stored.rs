//! Persisted document shapes.
//!
//! # Responsibility
//! - Pair each value object with its native `_id` by composition.
//! - Carry the customer membership lists, which are the source of truth for
//!   ownership.
//! - Convert stored shapes back into value objects with hex ids applied.
//!
//! # Invariants
//! - `StoredUser::addresses`/`cards` are the only persisted ownership links.
//! - Value-object attribute lists are never written; they are derived on read.

use crate::model::attributes::{Address, Attribute, Card};
use crate::model::ids::ObjectId;
use crate::model::user::{User, UserProfile};
use serde::{Deserialize, Serialize};

/// Card or address document: `{_id, <value fields>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAttribute<T> {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(flatten)]
    pub value: T,
}

impl<T: Attribute> StoredAttribute<T> {
    pub fn new(id: ObjectId, value: T) -> Self {
        Self { id, value }
    }

    /// Returns the value with its hex id written back.
    pub fn into_value(self) -> T {
        let mut value = self.value;
        value.set_id(self.id.to_hex());
        value
    }
}

/// Customer document: `{_id, <profile fields>, addresses: [..], cards: [..]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUser {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(flatten)]
    pub profile: UserProfile,
    #[serde(default)]
    pub addresses: Vec<ObjectId>,
    #[serde(default)]
    pub cards: Vec<ObjectId>,
}

impl StoredUser {
    pub fn new(id: ObjectId, profile: UserProfile) -> Self {
        Self {
            id,
            profile,
            addresses: Vec::new(),
            cards: Vec::new(),
        }
    }

    /// Rebuilds the caller view with id-only attribute stubs.
    pub fn into_user(self) -> User {
        User {
            user_id: self.id.to_hex(),
            addresses: self
                .addresses
                .iter()
                .map(|id| Address::stub(id.to_hex()))
                .collect(),
            cards: self
                .cards
                .iter()
                .map(|id| Card::stub(id.to_hex()))
                .collect(),
            profile: self.profile,
        }
    }
}
