//! Shared helpers for integration tests.

#![allow(dead_code)]

use profile_store_core::model::ids::ObjectId;
use profile_store_core::store::{Document, StoreResult};
use profile_store_core::{
    Address, Card, Collection, DocumentStore, ProfileStore, SqliteDocumentStore, StoreError, User,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const ROW_CAP: u32 = 100;

/// In-memory store wrapper that counts calls and fails on demand.
pub struct FlakyStore {
    inner: SqliteDocumentStore,
    calls: AtomicUsize,
    inserts: Mutex<HashMap<Collection, usize>>,
    fail_insert: Mutex<Option<(Collection, usize)>>,
    fail_deletes: Mutex<HashSet<Collection>>,
    fail_find_by_ids: Mutex<HashSet<Collection>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteDocumentStore::in_memory().unwrap(),
            calls: AtomicUsize::new(0),
            inserts: Mutex::new(HashMap::new()),
            fail_insert: Mutex::new(None),
            fail_deletes: Mutex::new(HashSet::new()),
            fail_find_by_ids: Mutex::new(HashSet::new()),
        }
    }

    /// Makes the `nth` (1-based) insert into `collection` fail from now on.
    pub fn fail_nth_insert(&self, collection: Collection, nth: usize) {
        self.inserts.lock().unwrap().clear();
        *self.fail_insert.lock().unwrap() = Some((collection, nth));
    }

    /// Makes every delete fail, whatever the collection.
    pub fn fail_deletes(&self, fail: bool) {
        let mut failing = self.fail_deletes.lock().unwrap();
        failing.clear();
        if fail {
            failing.extend(Collection::ALL);
        }
    }

    /// Makes deletes in `collection` fail; other collections still work.
    pub fn fail_deletes_in(&self, collection: Collection) {
        self.fail_deletes.lock().unwrap().insert(collection);
    }

    /// Makes multi-id lookups in `collection` fail.
    pub fn fail_find_by_ids(&self, collection: Collection) {
        self.fail_find_by_ids.lock().unwrap().insert(collection);
    }

    pub fn heal(&self) {
        *self.fail_insert.lock().unwrap() = None;
        self.fail_deletes(false);
        self.fail_find_by_ids.lock().unwrap().clear();
    }

    /// Number of store primitives invoked so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &SqliteDocumentStore {
        &self.inner
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.inner.find_all(collection, u32::MAX).unwrap().len()
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn injected(message: &str) -> StoreError {
        StoreError::Unavailable(format!("injected: {message}"))
    }
}

impl DocumentStore for FlakyStore {
    fn insert(&self, collection: Collection, document: &Document) -> StoreResult<()> {
        self.tick();
        let attempt = {
            let mut inserts = self.inserts.lock().unwrap();
            let counter = inserts.entry(collection).or_insert(0);
            *counter += 1;
            *counter
        };
        if *self.fail_insert.lock().unwrap() == Some((collection, attempt)) {
            return Err(Self::injected("insert"));
        }
        self.inner.insert(collection, document)
    }

    fn find_by_id(&self, collection: Collection, id: ObjectId) -> StoreResult<Option<Document>> {
        self.tick();
        self.inner.find_by_id(collection, id)
    }

    fn find_by_ids(&self, collection: Collection, ids: &[ObjectId]) -> StoreResult<Vec<Document>> {
        self.tick();
        if self.fail_find_by_ids.lock().unwrap().contains(&collection) {
            return Err(Self::injected("find_by_ids"));
        }
        self.inner.find_by_ids(collection, ids)
    }

    fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Document>> {
        self.tick();
        self.inner.find_by_field(collection, field, value)
    }

    fn find_all(&self, collection: Collection, limit: u32) -> StoreResult<Vec<Document>> {
        self.tick();
        self.inner.find_all(collection, limit)
    }

    fn add_to_set(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &str,
        value: ObjectId,
    ) -> StoreResult<bool> {
        self.tick();
        self.inner.add_to_set(collection, id, field, value)
    }

    fn pull(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &str,
        value: ObjectId,
    ) -> StoreResult<bool> {
        self.tick();
        self.inner.pull(collection, id, field, value)
    }

    fn pull_all(&self, collection: Collection, field: &str, value: ObjectId) -> StoreResult<u64> {
        self.tick();
        self.inner.pull_all(collection, field, value)
    }

    fn delete_many(&self, collection: Collection, ids: &[ObjectId]) -> StoreResult<u64> {
        self.tick();
        if self.fail_deletes.lock().unwrap().contains(&collection) {
            return Err(Self::injected("delete_many"));
        }
        self.inner.delete_many(collection, ids)
    }

    fn ping(&self) -> StoreResult<()> {
        self.tick();
        self.inner.ping()
    }
}

pub fn memory_store() -> ProfileStore {
    ProfileStore::open_in_memory().unwrap()
}

pub fn flaky_store() -> ProfileStore<FlakyStore> {
    ProfileStore::with_store(FlakyStore::new(), ROW_CAP)
}

pub fn card(long_num: &str) -> Card {
    Card::new(long_num, "08/19", "123")
}

pub fn address(street: &str) -> Address {
    Address::new("1", street, "Glasgow", "G1 1AA", "United Kingdom")
}

/// Unsaved user carrying the given attributes.
pub fn user_with(username: &str, cards: Vec<Card>, addresses: Vec<Address>) -> User {
    let mut user = User::with_username(username);
    user.profile.first_name = "Test".to_string();
    user.profile.last_name = username.to_string();
    user.cards = cards;
    user.addresses = addresses;
    user
}
