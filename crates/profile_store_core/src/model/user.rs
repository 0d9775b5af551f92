//! Customer value object.

use crate::model::attributes::{Address, Card};
use serde::{Deserialize, Serialize};

/// Freeform profile fields persisted on the customer document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Unique across all customers.
    pub username: String,
    pub password: String,
    pub salt: String,
}

/// Denormalized customer view returned to callers.
///
/// `addresses` and `cards` are rebuilt on every read from the stored
/// membership lists. After `get`/`list` they hold id-only stubs; hydration
/// replaces them with full records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub profile: UserProfile,
    /// Hex id, empty until persisted.
    pub user_id: String,
    pub addresses: Vec<Address>,
    pub cards: Vec<Card>,
}

impl User {
    /// Creates an unsaved user with no attributes.
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    /// Convenience for builders and tests.
    pub fn with_username(username: impl Into<String>) -> Self {
        Self::new(UserProfile {
            username: username.into(),
            ..UserProfile::default()
        })
    }

    pub fn username(&self) -> &str {
        &self.profile.username
    }

    /// Returns whether the user has been written to the store.
    pub fn is_persisted(&self) -> bool {
        !self.user_id.is_empty()
    }
}
