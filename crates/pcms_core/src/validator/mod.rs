//! Write-path validation for content items.
//!
//! # Responsibility
//! - Check schema and business rules before the service persists an item.
//! - Report every violation at once for batched client-facing errors.

pub mod content_validator;
