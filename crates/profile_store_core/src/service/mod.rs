//! Use-case service layer.
//!
//! # Responsibility
//! - Expose the profile store operations to callers.
//! - Remain storage-agnostic: any `DocumentStore` can back the service.

pub mod profile_store;
