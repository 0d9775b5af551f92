//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist each collection as rows of JSON documents keyed by `_id`.
//! - Implement set-membership updates as single locked read-modify-write
//!   transactions.
//!
//! # Invariants
//! - Every call borrows exactly one pooled session and returns it on exit.
//! - Set updates run under `BEGIN IMMEDIATE`, so concurrent writers serialize.
//! - Listing order is insertion order (`seq`).

use crate::db::{DatabaseLocation, SessionPool};
use crate::model::ids::ObjectId;
use crate::store::{document_id, Collection, Document, DocumentStore, StoreError, StoreResult};
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use std::time::Duration;

/// Document store over a pool of SQLite sessions.
pub struct SqliteDocumentStore {
    pool: SessionPool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SessionPool) -> Self {
        Self { pool }
    }

    /// Opens a store with its own pool.
    pub fn open(
        location: DatabaseLocation,
        pool_size: usize,
        acquire_timeout: Duration,
        busy_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = SessionPool::open(location, pool_size, acquire_timeout, busy_timeout)?;
        Ok(Self::new(pool))
    }

    /// Opens a private in-memory store with default timeouts.
    pub fn in_memory() -> StoreResult<Self> {
        Self::open(
            DatabaseLocation::Memory,
            1,
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    fn modify_members<F>(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &str,
        apply: F,
    ) -> StoreResult<bool>
    where
        F: FnOnce(&mut Vec<Document>) -> bool,
    {
        let mut session = self.pool.acquire()?;
        let tx = session.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(mut document) = load_in_tx(&tx, collection, id)? else {
            return Ok(false);
        };
        if apply(member_array(&mut document, field)?) {
            write_in_tx(&tx, collection, id, &document)?;
        }
        tx.commit()?;
        Ok(true)
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn insert(&self, collection: Collection, document: &Document) -> StoreResult<()> {
        let id = document_id(document)?;
        let body = serde_json::to_string(document)?;
        let session = self.pool.acquire()?;
        session.execute(
            &format!("INSERT INTO {collection} (id, body) VALUES (?1, ?2);"),
            params![id.to_hex(), body],
        )?;
        Ok(())
    }

    fn find_by_id(&self, collection: Collection, id: ObjectId) -> StoreResult<Option<Document>> {
        let session = self.pool.acquire()?;
        let body: Option<String> = session
            .query_row(
                &format!("SELECT body FROM {collection} WHERE id = ?1;"),
                [id.to_hex()],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|text| parse_body(collection, &text)).transpose()
    }

    fn find_by_ids(&self, collection: Collection, ids: &[ObjectId]) -> StoreResult<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let session = self.pool.acquire()?;
        let mut stmt = session.prepare(&format!(
            "SELECT body FROM {collection}
             WHERE id IN (SELECT value FROM json_each(?1))
             ORDER BY seq ASC;"
        ))?;
        let mut rows = stmt.query([id_array(ids)?])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            documents.push(parse_body(collection, &body)?);
        }
        Ok(documents)
    }

    fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Document>> {
        let path = field_path(field)?;
        let session = self.pool.acquire()?;
        let body: Option<String> = session
            .query_row(
                &format!(
                    "SELECT body FROM {collection}
                     WHERE json_extract(body, ?1) = ?2
                     ORDER BY seq ASC
                     LIMIT 1;"
                ),
                params![path, value],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|text| parse_body(collection, &text)).transpose()
    }

    fn find_all(&self, collection: Collection, limit: u32) -> StoreResult<Vec<Document>> {
        let session = self.pool.acquire()?;
        let mut stmt = session.prepare(&format!(
            "SELECT body FROM {collection} ORDER BY seq ASC LIMIT ?1;"
        ))?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            documents.push(parse_body(collection, &body)?);
        }
        Ok(documents)
    }

    fn add_to_set(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &str,
        value: ObjectId,
    ) -> StoreResult<bool> {
        let member = Document::String(value.to_hex());
        self.modify_members(collection, id, field, |members| {
            if members.contains(&member) {
                return false;
            }
            members.push(member);
            true
        })
    }

    fn pull(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &str,
        value: ObjectId,
    ) -> StoreResult<bool> {
        let member = Document::String(value.to_hex());
        self.modify_members(collection, id, field, |members| {
            let before = members.len();
            members.retain(|existing| existing != &member);
            members.len() != before
        })
    }

    fn pull_all(&self, collection: Collection, field: &str, value: ObjectId) -> StoreResult<u64> {
        let path = field_path(field)?;
        let member = Document::String(value.to_hex());
        let mut session = self.pool.acquire()?;
        let tx = session.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let holders = {
            let mut stmt = tx.prepare(&format!(
                "SELECT id, body FROM {collection}
                 WHERE EXISTS (
                    SELECT 1 FROM json_each({collection}.body, ?1)
                    WHERE json_each.value = ?2
                 )
                 ORDER BY seq ASC;"
            ))?;
            let mut rows = stmt.query(params![path, value.to_hex()])?;
            let mut holders = Vec::new();
            while let Some(row) = rows.next()? {
                let id_text: String = row.get(0)?;
                let body: String = row.get(1)?;
                holders.push((id_text, body));
            }
            holders
        };

        let mut modified = 0;
        for (id_text, body) in holders {
            let mut document = parse_body(collection, &body)?;
            member_array(&mut document, field)?.retain(|existing| existing != &member);
            tx.execute(
                &format!("UPDATE {collection} SET body = ?2 WHERE id = ?1;"),
                params![id_text, serde_json::to_string(&document)?],
            )?;
            modified += 1;
        }
        tx.commit()?;
        Ok(modified)
    }

    fn delete_many(&self, collection: Collection, ids: &[ObjectId]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let session = self.pool.acquire()?;
        let removed = session.execute(
            &format!("DELETE FROM {collection} WHERE id IN (SELECT value FROM json_each(?1));"),
            [id_array(ids)?],
        )?;
        Ok(removed as u64)
    }

    fn ping(&self) -> StoreResult<()> {
        let session = self.pool.acquire()?;
        session.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

fn load_in_tx(
    tx: &Transaction<'_>,
    collection: Collection,
    id: ObjectId,
) -> StoreResult<Option<Document>> {
    let body: Option<String> = tx
        .query_row(
            &format!("SELECT body FROM {collection} WHERE id = ?1;"),
            [id.to_hex()],
            |row| row.get(0),
        )
        .optional()?;
    body.map(|text| parse_body(collection, &text)).transpose()
}

fn write_in_tx(
    tx: &Transaction<'_>,
    collection: Collection,
    id: ObjectId,
    document: &Document,
) -> StoreResult<()> {
    tx.execute(
        &format!("UPDATE {collection} SET body = ?2 WHERE id = ?1;"),
        params![id.to_hex(), serde_json::to_string(document)?],
    )?;
    Ok(())
}

fn parse_body(collection: Collection, body: &str) -> StoreResult<Document> {
    serde_json::from_str(body)
        .map_err(|err| StoreError::MalformedDocument(format!("{collection}.body: {err}")))
}

fn member_array<'doc>(
    document: &'doc mut Document,
    field: &str,
) -> StoreResult<&'doc mut Vec<Document>> {
    let object = document
        .as_object_mut()
        .ok_or_else(|| StoreError::MalformedDocument("document is not an object".to_string()))?;
    object
        .entry(field)
        .or_insert_with(|| Document::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| StoreError::MalformedDocument(format!("field `{field}` is not an array")))
}

fn id_array(ids: &[ObjectId]) -> StoreResult<String> {
    let hex: Vec<String> = ids.iter().map(ObjectId::to_hex).collect();
    Ok(serde_json::to_string(&hex)?)
}

// Only plain top-level names are accepted, so the path cannot address
// anything but one field of the document.
fn field_path(field: &str) -> StoreResult<String> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid {
        return Err(StoreError::MalformedDocument(format!(
            "unsupported field name `{field}`"
        )));
    }
    Ok(format!("$.{field}"))
}

#[cfg(test)]
mod tests {
    use super::SqliteDocumentStore;
    use crate::model::ids::ObjectId;
    use crate::store::{Collection, DocumentStore, StoreError};
    use serde_json::json;

    fn customer(id: ObjectId, username: &str) -> serde_json::Value {
        json!({ "_id": id.to_hex(), "username": username, "cards": [], "addresses": [] })
    }

    #[test]
    fn insert_then_find_by_id_and_field() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let id = ObjectId::new();
        store
            .insert(Collection::Customers, &customer(id, "eve"))
            .unwrap();

        let found = store.find_by_id(Collection::Customers, id).unwrap().unwrap();
        assert_eq!(found["username"], json!("eve"));

        let by_name = store
            .find_by_field(Collection::Customers, "username", "eve")
            .unwrap()
            .unwrap();
        assert_eq!(by_name["_id"], json!(id.to_hex()));
        assert!(store
            .find_by_id(Collection::Cards, id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store
            .insert(Collection::Customers, &customer(ObjectId::new(), "eve"))
            .unwrap();
        let err = store
            .insert(Collection::Customers, &customer(ObjectId::new(), "eve"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn add_to_set_and_pull_keep_set_semantics() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let user = ObjectId::new();
        let card = ObjectId::new();
        store
            .insert(Collection::Customers, &customer(user, "eve"))
            .unwrap();

        assert!(store
            .add_to_set(Collection::Customers, user, "cards", card)
            .unwrap());
        assert!(store
            .add_to_set(Collection::Customers, user, "cards", card)
            .unwrap());
        let doc = store.find_by_id(Collection::Customers, user).unwrap().unwrap();
        assert_eq!(doc["cards"], json!([card.to_hex()]));

        assert!(store
            .pull(Collection::Customers, user, "cards", card)
            .unwrap());
        let doc = store.find_by_id(Collection::Customers, user).unwrap().unwrap();
        assert_eq!(doc["cards"], json!([]));

        assert!(!store
            .add_to_set(Collection::Customers, ObjectId::new(), "cards", card)
            .unwrap());
    }

    #[test]
    fn pull_all_touches_only_documents_holding_the_value() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let card = ObjectId::new();
        let holders = [ObjectId::new(), ObjectId::new()];
        for (index, id) in holders.iter().enumerate() {
            store
                .insert(Collection::Customers, &customer(*id, &format!("holder{index}")))
                .unwrap();
            store
                .add_to_set(Collection::Customers, *id, "cards", card)
                .unwrap();
        }
        store
            .insert(Collection::Customers, &customer(ObjectId::new(), "bystander"))
            .unwrap();

        let modified = store
            .pull_all(Collection::Customers, "cards", card)
            .unwrap();
        assert_eq!(modified, 2);
        for id in holders {
            let doc = store.find_by_id(Collection::Customers, id).unwrap().unwrap();
            assert_eq!(doc["cards"], json!([]));
        }
    }

    #[test]
    fn find_by_ids_and_delete_many_ignore_absent_ids() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let present = ObjectId::new();
        store
            .insert(Collection::Cards, &json!({ "_id": present.to_hex(), "ccv": "1" }))
            .unwrap();

        let found = store
            .find_by_ids(Collection::Cards, &[present, ObjectId::new()])
            .unwrap();
        assert_eq!(found.len(), 1);

        let removed = store
            .delete_many(Collection::Cards, &[present, ObjectId::new()])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            store.delete_many(Collection::Cards, &[present]).unwrap(),
            0
        );
    }

    #[test]
    fn find_all_respects_limit_and_insertion_order() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let ids: Vec<ObjectId> = (0..5).map(|_| ObjectId::new()).collect();
        for id in &ids {
            store
                .insert(Collection::Addresses, &json!({ "_id": id.to_hex() }))
                .unwrap();
        }

        let page = store.find_all(Collection::Addresses, 3).unwrap();
        let got: Vec<String> = page
            .iter()
            .map(|doc| doc["_id"].as_str().unwrap().to_string())
            .collect();
        let expected: Vec<String> = ids.iter().take(3).map(ObjectId::to_hex).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn field_names_outside_plain_identifiers_are_rejected() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let err = store
            .find_by_field(Collection::Customers, "username') OR 1=1 --", "x")
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedDocument(_)));
    }
}
