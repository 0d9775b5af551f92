//! Cross-collection consistency protocol.
//!
//! # Responsibility
//! - Mutate customer membership lists through atomic set updates only.
//! - Clean up attribute documents written by a create that did not finish.
//! - Delete a customer's attributes on cascade, and strip a deleted
//!   attribute from every customer.
//!
//! # Invariants
//! - `add_membership`/`remove_membership` are the only writers of an existing
//!   customer's id lists.
//! - Cleanup is idempotent: deleting already-absent ids is a no-op.
//! - Cleanup and cascade failures are logged and never returned, so they
//!   cannot mask the error of the operation that triggered them.

use crate::model::attributes::MembershipField;
use crate::model::ids::ObjectId;
use crate::model::stored::StoredUser;
use crate::repo::error::{CreateStage, ProfileError, ProfileResult};
use crate::store::{Collection, DocumentStore, StoreError};
use log::{info, warn};

/// Attribute ids successfully written during one user create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenAttributes {
    pub cards: Vec<ObjectId>,
    pub addresses: Vec<ObjectId>,
}

impl WrittenAttributes {
    pub fn len(&self) -> usize {
        self.cards.len() + self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Membership and cleanup operations over one store.
pub struct ConsistencyCoordinator<'s, S> {
    store: &'s S,
}

impl<'s, S: DocumentStore> ConsistencyCoordinator<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Adds `attr_id` to the user's `field` list unless already present.
    ///
    /// # Errors
    /// - `InvalidIdentifier` when `user_id` is malformed; nothing is written.
    /// - `NotFound` when no customer has that id.
    pub fn add_membership(
        &self,
        field: MembershipField,
        attr_id: ObjectId,
        user_id: &str,
    ) -> ProfileResult<()> {
        let user = ObjectId::parse(user_id)?;
        self.add_member(field, attr_id, user)
    }

    /// Removes `attr_id` from the user's `field` list.
    ///
    /// Removing an id that is not listed succeeds without change.
    pub fn remove_membership(
        &self,
        field: MembershipField,
        attr_id: ObjectId,
        user_id: &str,
    ) -> ProfileResult<()> {
        let user = ObjectId::parse(user_id)?;
        self.remove_member(field, attr_id, user)
    }

    pub(crate) fn add_member(
        &self,
        field: MembershipField,
        attr_id: ObjectId,
        user: ObjectId,
    ) -> ProfileResult<()> {
        let matched = self
            .store
            .add_to_set(Collection::Customers, user, field.as_str(), attr_id)?;
        if !matched {
            return Err(ProfileError::not_found(Collection::Customers, user.to_hex()));
        }
        Ok(())
    }

    pub(crate) fn remove_member(
        &self,
        field: MembershipField,
        attr_id: ObjectId,
        user: ObjectId,
    ) -> ProfileResult<()> {
        let matched = self
            .store
            .pull(Collection::Customers, user, field.as_str(), attr_id)?;
        if !matched {
            return Err(ProfileError::not_found(Collection::Customers, user.to_hex()));
        }
        Ok(())
    }

    /// Strips `attr_id` from the `field` list of every customer.
    pub fn detach_everywhere(
        &self,
        field: MembershipField,
        attr_id: ObjectId,
    ) -> ProfileResult<u64> {
        let modified = self
            .store
            .pull_all(Collection::Customers, field.as_str(), attr_id)?;
        info!(
            "event=membership_pull module=coordinator status=ok field={} attr_id={} customers={}",
            field.as_str(),
            attr_id,
            modified
        );
        Ok(modified)
    }

    /// Abandons a user create: deletes what was written, then builds the
    /// error the caller sees from the failure that stopped the create.
    pub fn abandon_create(
        &self,
        stage: CreateStage,
        written: &WrittenAttributes,
        cause: StoreError,
    ) -> ProfileError {
        warn!(
            "event=user_create module=coordinator status=error stage={} written={} error={}",
            stage,
            written.len(),
            cause
        );
        if written.is_empty() {
            return ProfileError::Store(cause);
        }

        self.discard(written);
        ProfileError::PartialWrite {
            stage,
            written: written.len(),
            source: cause,
        }
    }

    /// Best-effort removal of attribute documents. Both kinds are attempted
    /// even if the first fails.
    pub fn discard(&self, written: &WrittenAttributes) {
        self.delete_quietly("cleanup", Collection::Addresses, &written.addresses);
        self.delete_quietly("cleanup", Collection::Cards, &written.cards);
    }

    /// Deletes every attribute listed on `user`, addresses first.
    pub fn cascade(&self, user: &StoredUser) {
        self.delete_quietly("cascade_delete", Collection::Addresses, &user.addresses);
        self.delete_quietly("cascade_delete", Collection::Cards, &user.cards);
    }

    fn delete_quietly(&self, event: &str, collection: Collection, ids: &[ObjectId]) {
        if ids.is_empty() {
            return;
        }
        match self.store.delete_many(collection, ids) {
            Ok(removed) => info!(
                "event={event} module=coordinator status=ok collection={collection} requested={} removed={removed}",
                ids.len()
            ),
            Err(err) => warn!(
                "event={event} module=coordinator status=error collection={collection} requested={} error={err}",
                ids.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConsistencyCoordinator, WrittenAttributes};
    use crate::model::attributes::MembershipField;
    use crate::model::ids::ObjectId;
    use crate::repo::error::{CreateStage, ProfileError};
    use crate::store::{Collection, DocumentStore, SqliteDocumentStore, StoreError};
    use serde_json::json;

    #[test]
    fn add_membership_rejects_malformed_user_id() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let coordinator = ConsistencyCoordinator::new(&store);
        let err = coordinator
            .add_membership(MembershipField::Cards, ObjectId::new(), "bogus")
            .unwrap_err();
        assert!(err.is_invalid_identifier());
    }

    #[test]
    fn add_membership_reports_missing_user() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let coordinator = ConsistencyCoordinator::new(&store);
        let err = coordinator
            .add_membership(
                MembershipField::Addresses,
                ObjectId::new(),
                &ObjectId::new().to_hex(),
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn abandon_without_writes_returns_bare_store_error() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let coordinator = ConsistencyCoordinator::new(&store);
        let err = coordinator.abandon_create(
            CreateStage::Cards,
            &WrittenAttributes::default(),
            StoreError::Unavailable("down".to_string()),
        );
        assert!(matches!(err, ProfileError::Store(StoreError::Unavailable(_))));
    }

    #[test]
    fn abandon_deletes_written_attributes_and_keeps_the_cause() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let card = ObjectId::new();
        let address = ObjectId::new();
        store
            .insert(Collection::Cards, &json!({ "_id": card.to_hex() }))
            .unwrap();
        store
            .insert(Collection::Addresses, &json!({ "_id": address.to_hex() }))
            .unwrap();

        let written = WrittenAttributes {
            cards: vec![card],
            addresses: vec![address],
        };
        let coordinator = ConsistencyCoordinator::new(&store);
        let err = coordinator.abandon_create(
            CreateStage::Customer,
            &written,
            StoreError::Conflict("username".to_string()),
        );

        match err {
            ProfileError::PartialWrite {
                stage,
                written,
                source,
            } => {
                assert_eq!(stage, CreateStage::Customer);
                assert_eq!(written, 2);
                assert!(matches!(source, StoreError::Conflict(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.find_by_id(Collection::Cards, card).unwrap().is_none());
        assert!(store
            .find_by_id(Collection::Addresses, address)
            .unwrap()
            .is_none());

        // Second cleanup of the same ids is a no-op.
        coordinator.discard(&written);
    }
}
