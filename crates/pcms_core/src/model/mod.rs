//! Content domain model.
//!
//! # Responsibility
//! - Define the data structures shared by repository, validator and service.
//! - Keep lifecycle rules next to the status type.
//!
//! # Invariants
//! - Every content item is identified by a stable `ContentId`.
//! - Status changes follow `ContentStatus::can_transition_to`.

pub mod content;
