//! Core logic for the profile store.
//! Customers, payment cards and shipping addresses over a document store,
//! kept consistent without multi-document transactions.

pub mod config;
pub mod db;
pub mod fixtures;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use db::{DatabaseLocation, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attributes::{Address, Attribute, Card, MembershipField};
pub use model::ids::{InvalidIdentifier, ObjectId};
pub use model::user::{User, UserProfile};
pub use repo::error::{CreateStage, ProfileError, ProfileResult};
pub use repo::user_repo::ReconcileReport;
pub use service::profile_store::ProfileStore;
pub use store::{Collection, DocumentStore, SqliteDocumentStore, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
