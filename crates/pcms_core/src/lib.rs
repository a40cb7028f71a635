//! Core content-management logic for the portfolio CMS.
//! This crate is the single source of truth for content invariants.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;
pub mod validator;

pub use bootstrap::{compose, CmsCore};
pub use config::{load_config, CmsConfig, ConfigError, ContentRules, QueryConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::content::{Actor, ContentId, ContentItem, ContentStatus};
pub use query::gateway::{ContentPage, ListRequest, QueryError, QueryGateway, QueryResult};
pub use repo::content_repo::{
    ContentFilter, ContentQuery, ContentRepository, PagePosition, RepoError, RepoResult,
    SortDirection, SortField, SortKey, SortValue, SqliteContentRepository,
};
pub use repo::memory_repo::InMemoryContentRepository;
pub use service::content_service::{
    ContentPatch, ContentService, NewContent, ServiceError, ServiceResult,
};
pub use validator::content_validator::{ContentValidator, ValidationError};

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
