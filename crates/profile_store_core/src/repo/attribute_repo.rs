//! Card and address repository.
//!
//! # Responsibility
//! - Create, fetch and delete documents in the `cards` and `addresses`
//!   collections.
//! - Optionally link a new attribute to an owner at creation time.
//!
//! # Invariants
//! - Every lookup id passes through `ObjectId::parse` before any store call.
//! - Listing never returns more than the configured row cap.
//! - A failed owner link leaves the attribute document in place (it is not
//!   rolled back); the caller receives the link error.

use crate::model::attributes::Attribute;
use crate::model::ids::{parse_all, ObjectId};
use crate::model::stored::StoredAttribute;
use crate::repo::coordinator::ConsistencyCoordinator;
use crate::repo::error::{ProfileError, ProfileResult};
use crate::store::{decode, encode, DocumentStore, StoreResult};
use log::{debug, warn};
use std::collections::HashMap;
use std::marker::PhantomData;

/// Default and maximum number of rows returned by list calls.
pub const DEFAULT_ROW_CAP: u32 = 100;

/// Repository over one attribute collection.
pub struct AttributeRepository<'s, S, T> {
    store: &'s S,
    row_cap: u32,
    kind: PhantomData<T>,
}

impl<'s, S: DocumentStore, T: Attribute> AttributeRepository<'s, S, T> {
    pub fn new(store: &'s S, row_cap: u32) -> Self {
        Self {
            store,
            row_cap,
            kind: PhantomData,
        }
    }

    /// Stores `value` under a fresh id and, when `owner_id` is non-empty,
    /// adds it to that customer's membership list.
    ///
    /// # Errors
    /// - `InvalidIdentifier` for a malformed `owner_id`; nothing is written.
    /// - `Unlinked` when the owner link fails, e.g. because the owner does not
    ///   exist. The attribute stays stored; the error carries its id and the
    ///   link failure.
    pub fn create(&self, value: &T, owner_id: Option<&str>) -> ProfileResult<T> {
        let owner = owner_id
            .filter(|raw| !raw.is_empty())
            .map(ObjectId::parse)
            .transpose()?;

        let (id, created) = self.insert(value)?;
        if let Some(owner) = owner {
            let coordinator = ConsistencyCoordinator::new(self.store);
            if let Err(err) = coordinator.add_member(T::FIELD, id, owner) {
                warn!(
                    "event=attribute_link module=repo status=error collection={} attr_id={id} owner_id={owner} error={err}",
                    T::FIELD.collection()
                );
                return Err(ProfileError::Unlinked {
                    collection: T::FIELD.collection(),
                    attr_id: id.to_hex(),
                    source: Box::new(err),
                });
            }
        }

        debug!(
            "event=attribute_create module=repo status=ok collection={} anonymous={}",
            T::FIELD.collection(),
            owner.is_none()
        );
        Ok(created)
    }

    /// Inserts `value` with a fresh id, with no owner link.
    pub(crate) fn insert(&self, value: &T) -> StoreResult<(ObjectId, T)> {
        let stored = StoredAttribute::new(ObjectId::new(), value.clone());
        self.store.insert(T::FIELD.collection(), &encode(&stored)?)?;
        Ok((stored.id, stored.into_value()))
    }

    pub fn get_by_id(&self, id: &str) -> ProfileResult<T> {
        let native = ObjectId::parse(id)?;
        let collection = T::FIELD.collection();
        let document = self
            .store
            .find_by_id(collection, native)?
            .ok_or_else(|| ProfileError::not_found(collection, native.to_hex()))?;
        let stored: StoredAttribute<T> = decode(collection, document)?;
        Ok(stored.into_value())
    }

    /// Lists up to `limit` records (default and ceiling: the row cap) in
    /// store order.
    pub fn get_all(&self, limit: Option<u32>) -> ProfileResult<Vec<T>> {
        let limit = normalize_limit(limit, self.row_cap);
        let collection = T::FIELD.collection();
        let documents = self.store.find_all(collection, limit)?;
        let mut values = Vec::with_capacity(documents.len());
        for document in documents {
            let stored: StoredAttribute<T> = decode(collection, document)?;
            values.push(stored.into_value());
        }
        Ok(values)
    }

    /// Resolves hex ids to records. One malformed id fails the whole call.
    pub fn get_by_id_set<'a, I>(&self, ids: I) -> ProfileResult<Vec<T>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let natives = parse_all(ids)?;
        Ok(self.fetch_ordered(&natives)?)
    }

    /// Returns the stored records for `ids`, following the order of `ids`.
    /// Ids with no document are skipped.
    pub(crate) fn fetch_ordered(&self, ids: &[ObjectId]) -> StoreResult<Vec<T>> {
        let mut found: HashMap<ObjectId, T> = self
            .fetch_stored(ids)?
            .into_iter()
            .map(|stored| (stored.id, stored.into_value()))
            .collect();

        let mut ordered = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(value) = found.remove(id) {
                ordered.push(value);
            }
        }
        if ordered.len() < ids.len() {
            warn!(
                "event=attribute_resolve module=repo status=dangling collection={} requested={} found={}",
                T::FIELD.collection(),
                ids.len(),
                ordered.len()
            );
        }
        Ok(ordered)
    }

    pub(crate) fn fetch_stored(&self, ids: &[ObjectId]) -> StoreResult<Vec<StoredAttribute<T>>> {
        let collection = T::FIELD.collection();
        self.store
            .find_by_ids(collection, ids)?
            .into_iter()
            .map(|document| decode(collection, document))
            .collect()
    }

    /// Deletes the given documents; absent ids are ignored.
    pub fn delete_many(&self, ids: &[ObjectId]) -> StoreResult<u64> {
        self.store.delete_many(T::FIELD.collection(), ids)
    }
}

/// Applies the row cap: `None` or `0` means the cap, larger values clamp to it.
pub fn normalize_limit(limit: Option<u32>, row_cap: u32) -> u32 {
    match limit {
        Some(0) | None => row_cap,
        Some(value) => value.min(row_cap),
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_limit;

    #[test]
    fn normalize_limit_defaults_and_clamps_to_cap() {
        assert_eq!(normalize_limit(None, 100), 100);
        assert_eq!(normalize_limit(Some(0), 100), 100);
        assert_eq!(normalize_limit(Some(7), 100), 7);
        assert_eq!(normalize_limit(Some(500), 100), 100);
    }
}
