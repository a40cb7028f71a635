//! Repository layer: content storage contracts and implementations.
//!
//! # Responsibility
//! - Define the narrow storage contract used by service and query gateway.
//! - Isolate SQL details from business orchestration.
//!
//! # Invariants
//! - Repositories do not apply business validation; the service validates
//!   before calling `save`.
//! - Semantic failures (`NotFound`, `Conflict`, `SlugTaken`) are distinct
//!   from transport errors (`Db`).

pub mod content_repo;
pub mod memory_repo;
