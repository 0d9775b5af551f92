//! Repository layer over the profile collections.
//!
//! # Responsibility
//! - Expose use-case oriented operations on customers, cards and addresses.
//! - Keep the cross-collection consistency protocol in one place
//!   (`coordinator`), invoked by the repositories.
//!
//! # Invariants
//! - Id strings are validated before they reach the store.
//! - Repository APIs return semantic errors (`NotFound`,
//!   `InvalidIdentifier`) distinct from store transport errors.

pub mod attribute_repo;
pub mod coordinator;
pub mod error;
pub mod user_repo;
