//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validator and repository calls into content use-cases.
//! - Keep outer layers (CLI, transport) decoupled from storage details.

pub mod content_service;
