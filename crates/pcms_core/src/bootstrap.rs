//! Explicit startup composition.
//!
//! # Responsibility
//! - Build validator, service and gateway from one repository and config.
//! - Replace any ambient component registry: callers own the result and
//!   pass it to handlers.
//!
//! # Invariants
//! - Service and gateway share the same repository instance.

use crate::config::CmsConfig;
use crate::query::gateway::QueryGateway;
use crate::repo::content_repo::ContentRepository;
use crate::service::content_service::ContentService;
use crate::validator::content_validator::ContentValidator;
use log::info;

/// Wired core components.
pub struct CmsCore<R: ContentRepository> {
    pub service: ContentService<R>,
    pub gateway: QueryGateway<R>,
}

/// Composes the core in dependency order: validator, service, gateway.
///
/// `repo` is typically `&SqliteContentRepository` or
/// `&InMemoryContentRepository`, which are `Copy`.
pub fn compose<R>(repo: R, config: &CmsConfig) -> CmsCore<R>
where
    R: ContentRepository + Clone,
{
    let validator = ContentValidator::new(config.content.clone());
    let service = ContentService::new(repo.clone(), validator);
    let gateway = QueryGateway::new(repo, &config.query);
    info!(
        "event=core_compose module=bootstrap status=ok title_max_chars={} slug_max_chars={} max_page_size={}",
        config.content.title_max_chars,
        config.content.slug_max_chars,
        config.query.normalized().1
    );
    CmsCore { service, gateway }
}
