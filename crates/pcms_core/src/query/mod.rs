//! Read-side query entry points.
//!
//! # Responsibility
//! - Translate external filter/sort/page parameters into repository queries.
//! - Own the opaque page cursor format.
//!
//! # Invariants
//! - Pages are keyset-based; ordering ties are broken by id.

pub mod cursor;
pub mod gateway;
