//! Error taxonomy returned by profile repositories.

use crate::model::ids::InvalidIdentifier;
use crate::store::{Collection, StoreError, UnknownCollection};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ProfileResult<T> = Result<T, ProfileError>;

/// Step of a user create at which a sub-write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStage {
    Cards,
    Addresses,
    Customer,
}

impl Display for CreateStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cards => "cards",
            Self::Addresses => "addresses",
            Self::Customer => "customer",
        })
    }
}

#[derive(Debug)]
pub enum ProfileError {
    /// Malformed id string, rejected before any store call.
    InvalidIdentifier(InvalidIdentifier),
    /// Well-formed lookup with no matching document.
    NotFound { collection: Collection, key: String },
    UnknownCollection(UnknownCollection),
    /// Transport, timeout or driver failure.
    Store(StoreError),
    /// User create failed after `written` attribute documents were stored.
    /// Those documents were handed to cleanup before this error was returned;
    /// `source` is the failure that aborted the create.
    PartialWrite {
        stage: CreateStage,
        written: usize,
        source: StoreError,
    },
    /// Attribute `attr_id` was stored but linking it to its owner failed.
    /// The document stays in `collection` until deleted or linked again.
    Unlinked {
        collection: Collection,
        attr_id: String,
        source: Box<ProfileError>,
    },
}

impl ProfileError {
    pub fn not_found(collection: Collection, key: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid_identifier(&self) -> bool {
        matches!(self, Self::InvalidIdentifier(_))
    }
}

impl Display for ProfileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(err) => write!(f, "{err}"),
            Self::NotFound { collection, key } => write!(f, "{collection} not found: {key}"),
            Self::UnknownCollection(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::PartialWrite {
                stage,
                written,
                source,
            } => write!(
                f,
                "user create failed at {stage} after {written} attribute writes: {source}"
            ),
            Self::Unlinked {
                collection,
                attr_id,
                source,
            } => write!(f, "{collection} {attr_id} stored but not linked: {source}"),
        }
    }
}

impl Error for ProfileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidIdentifier(err) => Some(err),
            Self::UnknownCollection(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::PartialWrite { source, .. } => Some(source),
            Self::Unlinked { source, .. } => Some(&**source),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<InvalidIdentifier> for ProfileError {
    fn from(value: InvalidIdentifier) -> Self {
        Self::InvalidIdentifier(value)
    }
}

impl From<UnknownCollection> for ProfileError {
    fn from(value: UnknownCollection) -> Self {
        Self::UnknownCollection(value)
    }
}

impl From<StoreError> for ProfileError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
