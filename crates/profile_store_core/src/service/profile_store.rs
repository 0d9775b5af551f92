//! Profile store entry point.
//!
//! # Responsibility
//! - Own the document store and hand out repositories over it.
//! - Provide the CRUD surface used by the API layer.
//!
//! # Invariants
//! - Holds no mutable state of its own; every call is self-contained.
//! - Service APIs never bypass repository validation or the consistency
//!   protocol.

use crate::config::StoreConfig;
use crate::model::attributes::{Address, Card, MembershipField};
use crate::model::ids::ObjectId;
use crate::model::user::User;
use crate::repo::attribute_repo::AttributeRepository;
use crate::repo::coordinator::ConsistencyCoordinator;
use crate::repo::error::ProfileResult;
use crate::repo::user_repo::{ReconcileReport, UserRepository};
use crate::store::{Collection, DocumentStore, SqliteDocumentStore};
use log::info;

/// Customers, cards and addresses over one document store.
pub struct ProfileStore<S = SqliteDocumentStore> {
    store: S,
    row_cap: u32,
}

impl ProfileStore<SqliteDocumentStore> {
    /// Opens the SQLite-backed store described by `config`.
    pub fn open(config: &StoreConfig) -> ProfileResult<Self> {
        let store = SqliteDocumentStore::open(
            config.location.clone(),
            config.pool_size,
            config.acquire_timeout,
            config.busy_timeout,
        )?;
        info!(
            "event=store_open module=service status=ok location={:?} pool_size={} row_cap={}",
            config.location,
            store.pool().max_size(),
            config.row_cap
        );
        Ok(Self::with_store(store, config.row_cap))
    }

    /// Opens a private in-memory store with default settings.
    pub fn open_in_memory() -> ProfileResult<Self> {
        Self::open(&StoreConfig::in_memory())
    }
}

impl<S: DocumentStore> ProfileStore<S> {
    /// Wraps any document store implementation.
    pub fn with_store(store: S, row_cap: u32) -> Self {
        Self {
            store,
            row_cap: row_cap.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn users(&self) -> UserRepository<'_, S> {
        UserRepository::new(&self.store, self.row_cap)
    }

    pub fn cards(&self) -> AttributeRepository<'_, S, Card> {
        AttributeRepository::new(&self.store, self.row_cap)
    }

    pub fn addresses(&self) -> AttributeRepository<'_, S, Address> {
        AttributeRepository::new(&self.store, self.row_cap)
    }

    pub fn coordinator(&self) -> ConsistencyCoordinator<'_, S> {
        ConsistencyCoordinator::new(&self.store)
    }

    /// Creates a user with all its cards and addresses.
    pub fn create_user(&self, user: &User) -> ProfileResult<User> {
        self.users().create(user)
    }

    /// Gets a user with id-only attribute stubs.
    pub fn get_user(&self, id: &str) -> ProfileResult<User> {
        self.users().get_by_id(id)
    }

    pub fn get_user_by_name(&self, username: &str) -> ProfileResult<User> {
        self.users().get_by_username(username)
    }

    pub fn list_users(&self, limit: Option<u32>) -> ProfileResult<Vec<User>> {
        self.users().list_all(limit)
    }

    /// Replaces attribute stubs on `user` with full records.
    pub fn hydrate_attributes(&self, user: &mut User) -> ProfileResult<()> {
        self.users().hydrate_attributes(user)
    }

    /// Creates a card, linked to `owner_id` unless it is `None` or empty.
    pub fn create_card(&self, card: &Card, owner_id: Option<&str>) -> ProfileResult<Card> {
        self.cards().create(card, owner_id)
    }

    pub fn get_card(&self, id: &str) -> ProfileResult<Card> {
        self.cards().get_by_id(id)
    }

    pub fn list_cards(&self, limit: Option<u32>) -> ProfileResult<Vec<Card>> {
        self.cards().get_all(limit)
    }

    /// Creates an address, linked to `owner_id` unless it is `None` or empty.
    pub fn create_address(
        &self,
        address: &Address,
        owner_id: Option<&str>,
    ) -> ProfileResult<Address> {
        self.addresses().create(address, owner_id)
    }

    pub fn get_address(&self, id: &str) -> ProfileResult<Address> {
        self.addresses().get_by_id(id)
    }

    pub fn list_addresses(&self, limit: Option<u32>) -> ProfileResult<Vec<Address>> {
        self.addresses().get_all(limit)
    }

    /// Deletes a customer (with cascade) or a card/address (with global pull).
    pub fn delete(&self, collection: Collection, id: &str) -> ProfileResult<()> {
        self.users().delete(collection, id)
    }

    /// Same as [`Self::delete`], taking the collection by name.
    pub fn delete_by_name(&self, collection: &str, id: &str) -> ProfileResult<()> {
        self.delete(collection.parse()?, id)
    }

    /// Links an existing attribute to a user.
    pub fn add_membership(
        &self,
        field: MembershipField,
        attr_id: &str,
        user_id: &str,
    ) -> ProfileResult<()> {
        let attr = ObjectId::parse(attr_id)?;
        self.coordinator().add_membership(field, attr, user_id)
    }

    /// Unlinks an attribute from a user. The attribute document stays.
    pub fn remove_membership(
        &self,
        field: MembershipField,
        attr_id: &str,
        user_id: &str,
    ) -> ProfileResult<()> {
        let attr = ObjectId::parse(attr_id)?;
        self.coordinator().remove_membership(field, attr, user_id)
    }

    /// Drops membership ids of `user_id` that point at missing documents.
    pub fn reconcile_user(&self, user_id: &str) -> ProfileResult<ReconcileReport> {
        self.users().reconcile(user_id)
    }

    /// Runs [`Self::reconcile_user`] for every customer, not just one page.
    pub fn reconcile_all(&self) -> ProfileResult<Vec<(String, ReconcileReport)>> {
        self.users().reconcile_all()
    }

    pub fn ping(&self) -> ProfileResult<()> {
        Ok(self.store.ping()?)
    }
}
