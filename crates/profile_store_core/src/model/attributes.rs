//! Card and address value objects.
//!
//! Both are owned by at most one customer, but only through the customer's
//! membership list. Nothing on an attribute points back at its owner.

use crate::store::Collection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Id list on the customer document that records ownership of one
/// attribute kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipField {
    Cards,
    Addresses,
}

impl MembershipField {
    /// Field name on the customer document.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cards => "cards",
            Self::Addresses => "addresses",
        }
    }

    /// Collection holding the attribute documents listed in this field.
    pub fn collection(self) -> Collection {
        match self {
            Self::Cards => Collection::Cards,
            Self::Addresses => Collection::Addresses,
        }
    }

    /// Returns `None` for `customers`, which is not an attribute collection.
    pub fn for_collection(collection: Collection) -> Option<Self> {
        match collection {
            Collection::Cards => Some(Self::Cards),
            Collection::Addresses => Some(Self::Addresses),
            Collection::Customers => None,
        }
    }
}

/// Behaviour shared by the attribute kinds stored beside customers.
pub trait Attribute: Clone + Serialize + DeserializeOwned {
    /// Membership field naming this kind on the customer document.
    const FIELD: MembershipField;

    /// Hex id, empty until persisted.
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Id-only placeholder used when rebuilding a user's lists on read.
    fn stub(id: String) -> Self;
}

/// Payment card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Card {
    pub long_num: String,
    pub expires: String,
    pub ccv: String,
    #[serde(skip)]
    pub id: String,
}

impl Card {
    pub fn new(
        long_num: impl Into<String>,
        expires: impl Into<String>,
        ccv: impl Into<String>,
    ) -> Self {
        Self {
            long_num: long_num.into(),
            expires: expires.into(),
            ccv: ccv.into(),
            id: String::new(),
        }
    }
}

impl Attribute for Card {
    const FIELD: MembershipField = MembershipField::Cards;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stub(id: String) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// Shipping address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub country: String,
    pub city: String,
    pub postcode: String,
    #[serde(skip)]
    pub id: String,
}

impl Address {
    pub fn new(
        number: impl Into<String>,
        street: impl Into<String>,
        city: impl Into<String>,
        postcode: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            number: number.into(),
            country: country.into(),
            city: city.into(),
            postcode: postcode.into(),
            id: String::new(),
        }
    }
}

impl Attribute for Address {
    const FIELD: MembershipField = MembershipField::Addresses;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stub(id: String) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}
