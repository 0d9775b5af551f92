//! Customer repository.
//!
//! # Responsibility
//! - Create customers together with their cards and addresses.
//! - Read customers with id-only attribute stubs, and hydrate them on request.
//! - Delete customers with cascade, and delete attributes with a global pull
//!   from every customer's membership list.
//! - Repair membership lists that point at missing attribute documents.
//!
//! # Invariants
//! - Attributes are written before the customer that lists them.
//! - A create either leaves the customer and all its new attributes stored,
//!   or removes every attribute it wrote (best effort, see coordinator).
//! - Hydration overwrites a list only after that kind was fetched in full.

use crate::model::attributes::{Address, Attribute, Card, MembershipField};
use crate::model::ids::{parse_all, ObjectId};
use crate::model::stored::StoredUser;
use crate::model::user::User;
use crate::repo::attribute_repo::{normalize_limit, AttributeRepository};
use crate::repo::coordinator::{ConsistencyCoordinator, WrittenAttributes};
use crate::repo::error::{CreateStage, ProfileError, ProfileResult};
use crate::store::{decode, document_id, encode, Collection, DocumentStore};
use log::info;
use std::collections::HashSet;

/// Membership ids removed by [`UserRepository::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub pruned_cards: Vec<String>,
    pub pruned_addresses: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.pruned_cards.is_empty() && self.pruned_addresses.is_empty()
    }
}

/// Repository over the `customers` collection.
pub struct UserRepository<'s, S> {
    store: &'s S,
    row_cap: u32,
}

impl<'s, S: DocumentStore> UserRepository<'s, S> {
    pub fn new(store: &'s S, row_cap: u32) -> Self {
        Self { store, row_cap }
    }

    fn cards(&self) -> AttributeRepository<'s, S, Card> {
        AttributeRepository::new(self.store, self.row_cap)
    }

    fn addresses(&self) -> AttributeRepository<'s, S, Address> {
        AttributeRepository::new(self.store, self.row_cap)
    }

    fn coordinator(&self) -> ConsistencyCoordinator<'s, S> {
        ConsistencyCoordinator::new(self.store)
    }

    /// Stores `user` with every card and address it carries.
    ///
    /// Cards are written in order, then addresses, then the customer document
    /// listing their ids. The first failure stops the sequence and every
    /// attribute written so far by this call is deleted again.
    ///
    /// Returns the stored user with all ids filled in. `user` is not touched,
    /// so a failed create never leaks ids of deleted documents.
    ///
    /// # Errors
    /// - `Store` when the first write fails.
    /// - `PartialWrite` when a later write fails; carries the cause that aborted the create.
    pub fn create(&self, user: &User) -> ProfileResult<User> {
        let user_id = ObjectId::new();
        let coordinator = self.coordinator();
        let mut written = WrittenAttributes::default();

        let card_repo = self.cards();
        let mut cards = Vec::with_capacity(user.cards.len());
        for card in &user.cards {
            match card_repo.insert(card) {
                Ok((id, created)) => {
                    written.cards.push(id);
                    cards.push(created);
                }
                Err(err) => {
                    return Err(coordinator.abandon_create(CreateStage::Cards, &written, err))
                }
            }
        }

        let address_repo = self.addresses();
        let mut addresses = Vec::with_capacity(user.addresses.len());
        for address in &user.addresses {
            match address_repo.insert(address) {
                Ok((id, created)) => {
                    written.addresses.push(id);
                    addresses.push(created);
                }
                Err(err) => {
                    return Err(coordinator.abandon_create(CreateStage::Addresses, &written, err))
                }
            }
        }

        let mut stored = StoredUser::new(user_id, user.profile.clone());
        stored.cards = written.cards.clone();
        stored.addresses = written.addresses.clone();
        let inserted = encode(&stored)
            .and_then(|document| self.store.insert(Collection::Customers, &document));
        if let Err(err) = inserted {
            return Err(coordinator.abandon_create(CreateStage::Customer, &written, err));
        }

        info!(
            "event=user_create module=repo status=ok user_id={user_id} cards={} addresses={}",
            cards.len(),
            addresses.len()
        );
        Ok(User {
            profile: user.profile.clone(),
            user_id: user_id.to_hex(),
            addresses,
            cards,
        })
    }

    /// Loads one customer. Attribute lists hold id-only stubs.
    pub fn get_by_id(&self, id: &str) -> ProfileResult<User> {
        let native = ObjectId::parse(id)?;
        Ok(self.load(native)?.into_user())
    }

    /// Loads one customer by unique username. Attribute lists hold stubs.
    pub fn get_by_username(&self, username: &str) -> ProfileResult<User> {
        let document = self
            .store
            .find_by_field(Collection::Customers, "username", username)?
            .ok_or_else(|| ProfileError::not_found(Collection::Customers, username))?;
        let stored: StoredUser = decode(Collection::Customers, document)?;
        Ok(stored.into_user())
    }

    /// Lists up to `limit` customers (capped) in store order, with stubs.
    pub fn list_all(&self, limit: Option<u32>) -> ProfileResult<Vec<User>> {
        let limit = normalize_limit(limit, self.row_cap);
        let documents = self.store.find_all(Collection::Customers, limit)?;
        let mut users = Vec::with_capacity(documents.len());
        for document in documents {
            let stored: StoredUser = decode(Collection::Customers, document)?;
            users.push(stored.into_user());
        }
        Ok(users)
    }

    /// Replaces the id-only stubs on `user` with full records.
    ///
    /// All ids are validated before the first fetch. Addresses are replaced
    /// once fully fetched, then cards; on error the pending kind keeps its
    /// stubs. Ids with no stored document are dropped from the result.
    pub fn hydrate_attributes(&self, user: &mut User) -> ProfileResult<()> {
        let address_ids = parse_all(user.addresses.iter().map(|address| address.id.as_str()))?;
        let card_ids = parse_all(user.cards.iter().map(|card| card.id.as_str()))?;

        let addresses = self.addresses().fetch_ordered(&address_ids)?;
        user.addresses = addresses;

        let cards = self.cards().fetch_ordered(&card_ids)?;
        user.cards = cards;
        Ok(())
    }

    /// Deletes one document from `collection`.
    ///
    /// - `customers`: deletes the customer's addresses and cards (best
    ///   effort, both attempted), then the customer.
    /// - `cards`/`addresses`: removes the id from every customer's list, then
    ///   deletes the attribute document.
    pub fn delete(&self, collection: Collection, id: &str) -> ProfileResult<()> {
        let native = ObjectId::parse(id)?;
        let coordinator = self.coordinator();

        if let Some(field) = MembershipField::for_collection(collection) {
            coordinator.detach_everywhere(field, native)?;
        } else {
            let stored = self.load(native)?;
            coordinator.cascade(&stored);
        }

        let removed = self.store.delete_many(collection, &[native])?;
        if removed == 0 {
            return Err(ProfileError::not_found(collection, native.to_hex()));
        }
        Ok(())
    }

    /// Prunes membership ids whose attribute document no longer exists.
    pub fn reconcile(&self, id: &str) -> ProfileResult<ReconcileReport> {
        let native = ObjectId::parse(id)?;
        let stored = self.load(native)?;
        let coordinator = self.coordinator();

        let pruned_cards =
            self.prune_missing(&coordinator, &self.cards(), native, &stored.cards)?;
        let pruned_addresses =
            self.prune_missing(&coordinator, &self.addresses(), native, &stored.addresses)?;

        let report = ReconcileReport {
            pruned_cards,
            pruned_addresses,
        };
        info!(
            "event=reconcile module=repo status=ok user_id={native} pruned_cards={} pruned_addresses={}",
            report.pruned_cards.len(),
            report.pruned_addresses.len()
        );
        Ok(report)
    }

    /// Reconciles every customer in the store, ignoring the row cap.
    ///
    /// Returns `(user_id, report)` per customer in store order. Stops at the
    /// first failure.
    pub fn reconcile_all(&self) -> ProfileResult<Vec<(String, ReconcileReport)>> {
        let documents = self.store.find_all(Collection::Customers, u32::MAX)?;
        let mut reports = Vec::with_capacity(documents.len());
        for document in &documents {
            let id = document_id(document)?.to_hex();
            let report = self.reconcile(&id)?;
            reports.push((id, report));
        }
        Ok(reports)
    }

    fn prune_missing<T: Attribute>(
        &self,
        coordinator: &ConsistencyCoordinator<'s, S>,
        repo: &AttributeRepository<'s, S, T>,
        user: ObjectId,
        listed: &[ObjectId],
    ) -> ProfileResult<Vec<String>> {
        let present: HashSet<ObjectId> = repo
            .fetch_stored(listed)?
            .into_iter()
            .map(|stored| stored.id)
            .collect();

        let mut pruned = Vec::new();
        for id in listed.iter().filter(|id| !present.contains(*id)) {
            coordinator.remove_member(T::FIELD, *id, user)?;
            pruned.push(id.to_hex());
        }
        Ok(pruned)
    }

    fn load(&self, id: ObjectId) -> ProfileResult<StoredUser> {
        let document = self
            .store
            .find_by_id(Collection::Customers, id)?
            .ok_or_else(|| ProfileError::not_found(Collection::Customers, id.to_hex()))?;
        Ok(decode(Collection::Customers, document)?)
    }
}
