//! Value objects exchanged with callers and their persisted wrappers.
//!
//! # Responsibility
//! - Define the plain `User`/`Card`/`Address` shapes callers work with.
//! - Define the stored shapes that pair a value with its native id.
//! - Own the identity codec between native ids and hex strings.
//!
//! # Invariants
//! - Value-object ids are either empty (not persisted) or lowercase hex.
//! - Membership id lists exist only on the stored user, never on `User`.

pub mod attributes;
pub mod ids;
pub mod stored;
pub mod user;
