//! Content lifecycle service.
//!
//! # Responsibility
//! - Orchestrate create, update, rename, publish, unpublish, archive and
//!   delete over a repository.
//! - Stamp timestamps and audit identity; clients never set them.
//!
//! # Invariants
//! - Every mutation is validated, then written by exactly one guarded
//!   `save(item, expected_version)` call.
//! - A stale `expected_version` is reported as `Conflict` before lifecycle
//!   rules are checked; the repository re-checks it atomically on write.
//! - Version conflicts are returned to the caller, never retried here.
//! - Logs carry ids, versions and statuses only, never titles or bodies.

use crate::model::content::{now_epoch_ms, Actor, ContentId, ContentItem, ContentStatus};
use crate::repo::content_repo::{ContentRepository, RepoError};
use crate::validator::content_validator::{ContentValidator, ValidationError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for content use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Target item does not exist.
    NotFound(ContentId),
    /// No item owns the slug.
    SlugNotFound(String),
    /// Caller's version is stale; re-fetch and resubmit.
    Conflict {
        id: ContentId,
        expected: u64,
        actual: u64,
    },
    /// One or more rule violations, in full.
    ValidationFailed(Vec<ValidationError>),
    /// Requested status change is not in the lifecycle.
    InvalidTransition {
        from: ContentStatus,
        to: ContentStatus,
    },
    /// Unexpected storage backend failure.
    Storage(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "content item not found: {id}"),
            Self::SlugNotFound(slug) => write!(f, "content item not found for slug `{slug}`"),
            Self::Conflict {
                id,
                expected,
                actual,
            } => write!(
                f,
                "content item {id} was modified concurrently: expected version {expected}, stored {actual}"
            ),
            Self::ValidationFailed(errors) => {
                write!(f, "content validation failed")?;
                for (index, err) in errors.iter().enumerate() {
                    let separator = if index == 0 { ": " } else { "; " };
                    write!(f, "{separator}{err}")?;
                }
                Ok(())
            }
            Self::InvalidTransition { from, to } => {
                write!(f, "cannot move content from {from} to {to}")
            }
            Self::Storage(err) => write!(f, "content storage failure: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::SlugNotFound(slug) => Self::SlugNotFound(slug),
            RepoError::Conflict {
                id,
                expected,
                actual,
            } => Self::Conflict {
                id,
                expected,
                actual,
            },
            RepoError::SlugTaken(slug) => {
                Self::ValidationFailed(vec![ValidationError::SlugTaken(slug)])
            }
            other => Self::Storage(other),
        }
    }
}

impl ServiceError {
    /// Stable short code for logs and outer layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::SlugNotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::ValidationFailed(_) => "validation_failed",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Storage(_) => "storage_error",
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Input for creating a content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContent {
    pub slug: String,
    pub title: String,
    pub body: String,
}

/// Partial edit of title and/or body. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none()
    }
}

/// Content use-case service over a repository implementation.
pub struct ContentService<R: ContentRepository> {
    repo: R,
    validator: ContentValidator,
}

impl<R: ContentRepository> ContentService<R> {
    /// Creates a service from explicitly constructed collaborators.
    pub fn new(repo: R, validator: ContentValidator) -> Self {
        Self { repo, validator }
    }

    /// Gets one item by id.
    pub fn get(&self, id: ContentId) -> ServiceResult<ContentItem> {
        self.repo.get(id).map_err(Into::into)
    }

    /// Gets one item by slug.
    pub fn get_by_slug(&self, slug: &str) -> ServiceResult<ContentItem> {
        self.repo.find_by_slug(slug).map_err(Into::into)
    }

    /// Creates a draft at version 1.
    ///
    /// A slug already in use fails with `ValidationFailed([SlugTaken])`.
    pub fn create(&self, input: NewContent, actor: &Actor) -> ServiceResult<ContentItem> {
        let item = ContentItem::new_draft(
            input.slug,
            input.title.trim(),
            input.body,
            actor,
            now_epoch_ms(),
        );

        let mut errors = self.validator.validate(&item, None);
        if self.slug_in_use(&item.slug, None)? {
            errors.push(ValidationError::SlugTaken(item.slug.clone()));
        }
        self.reject_invalid("content_create", item.id, errors)?;

        let stored = self.persist("content_create", &item, 0)?;
        info!(
            "event=content_create module=service status=ok id={} version={}",
            stored.id, stored.version
        );
        Ok(stored)
    }

    /// Applies a title/body patch.
    pub fn update(
        &self,
        id: ContentId,
        expected_version: u64,
        patch: ContentPatch,
        actor: &Actor,
    ) -> ServiceResult<ContentItem> {
        self.mutate("content_update", id, expected_version, actor, |item| {
            if let Some(title) = patch.title {
                item.title = title.trim().to_string();
            }
            if let Some(body) = patch.body {
                item.body = body;
            }
        })
    }

    /// Changes the slug. The only path that may alter it.
    pub fn rename(
        &self,
        id: ContentId,
        expected_version: u64,
        new_slug: impl Into<String>,
        actor: &Actor,
    ) -> ServiceResult<ContentItem> {
        let new_slug = new_slug.into();
        self.mutate("content_rename", id, expected_version, actor, |item| {
            item.slug = new_slug;
        })
    }

    /// Draft -> Published.
    pub fn publish(
        &self,
        id: ContentId,
        expected_version: u64,
        actor: &Actor,
    ) -> ServiceResult<ContentItem> {
        self.transition(
            "content_publish",
            id,
            expected_version,
            ContentStatus::Published,
            actor,
        )
    }

    /// Published -> Draft.
    pub fn unpublish(
        &self,
        id: ContentId,
        expected_version: u64,
        actor: &Actor,
    ) -> ServiceResult<ContentItem> {
        self.transition(
            "content_unpublish",
            id,
            expected_version,
            ContentStatus::Draft,
            actor,
        )
    }

    /// Draft or Published -> Archived.
    pub fn archive(
        &self,
        id: ContentId,
        expected_version: u64,
        actor: &Actor,
    ) -> ServiceResult<ContentItem> {
        self.transition(
            "content_archive",
            id,
            expected_version,
            ContentStatus::Archived,
            actor,
        )
    }

    /// Physically removes an item. Terminal; the id is never reused.
    pub fn delete(&self, id: ContentId, actor: &Actor) -> ServiceResult<()> {
        match self.repo.delete(id) {
            Ok(()) => {
                info!("event=content_delete module=service status=ok id={id} actor={actor}");
                Ok(())
            }
            Err(err) => Err(self.log_failure("content_delete", id, err.into())),
        }
    }

    fn transition(
        &self,
        event: &'static str,
        id: ContentId,
        expected_version: u64,
        target: ContentStatus,
        actor: &Actor,
    ) -> ServiceResult<ContentItem> {
        let current = self.load_expected(event, id, expected_version)?;
        if !current.status.can_transition_to(target) {
            return Err(self.log_failure(
                event,
                id,
                ServiceError::InvalidTransition {
                    from: current.status,
                    to: target,
                },
            ));
        }

        let mut next = current.clone();
        next.status = target;
        next.touch(actor, now_epoch_ms());
        if target == ContentStatus::Published {
            next.published_at = Some(next.updated_at);
        }

        let errors = self.validator.validate(&next, Some(&current));
        self.reject_invalid(event, id, errors)?;

        let stored = self.persist(event, &next, expected_version)?;
        info!(
            "event={event} module=service status=ok id={} from={} to={} version={}",
            stored.id, current.status, stored.status, stored.version
        );
        Ok(stored)
    }

    fn mutate(
        &self,
        event: &'static str,
        id: ContentId,
        expected_version: u64,
        actor: &Actor,
        apply: impl FnOnce(&mut ContentItem),
    ) -> ServiceResult<ContentItem> {
        let current = self.load_expected(event, id, expected_version)?;
        let mut next = current.clone();
        apply(&mut next);
        next.touch(actor, now_epoch_ms());

        let mut errors = self.validator.validate(&next, Some(&current));
        if next.slug != current.slug && self.slug_in_use(&next.slug, Some(id))? {
            errors.push(ValidationError::SlugTaken(next.slug.clone()));
        }
        self.reject_invalid(event, id, errors)?;

        let stored = self.persist(event, &next, expected_version)?;
        info!(
            "event={event} module=service status=ok id={} version={}",
            stored.id, stored.version
        );
        Ok(stored)
    }

    /// Reads the stored item and rejects a stale `expected_version` before
    /// any rule is evaluated against state the caller has not seen.
    fn load_expected(
        &self,
        event: &'static str,
        id: ContentId,
        expected_version: u64,
    ) -> ServiceResult<ContentItem> {
        let current = self
            .repo
            .get(id)
            .map_err(|err| self.log_failure(event, id, err.into()))?;
        if current.version != expected_version {
            return Err(self.log_failure(
                event,
                id,
                ServiceError::Conflict {
                    id,
                    expected: expected_version,
                    actual: current.version,
                },
            ));
        }
        Ok(current)
    }

    fn persist(
        &self,
        event: &'static str,
        item: &ContentItem,
        expected_version: u64,
    ) -> ServiceResult<ContentItem> {
        self.repo
            .save(item, expected_version)
            .map_err(|err| self.log_failure(event, item.id, err.into()))
    }

    fn slug_in_use(&self, slug: &str, owner: Option<ContentId>) -> ServiceResult<bool> {
        match self.repo.find_by_slug(slug) {
            Ok(existing) => Ok(Some(existing.id) != owner),
            Err(RepoError::SlugNotFound(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn reject_invalid(
        &self,
        event: &'static str,
        id: ContentId,
        errors: Vec<ValidationError>,
    ) -> ServiceResult<()> {
        if errors.is_empty() {
            return Ok(());
        }
        Err(self.log_failure(event, id, ServiceError::ValidationFailed(errors)))
    }

    fn log_failure(&self, event: &'static str, id: ContentId, err: ServiceError) -> ServiceError {
        match &err {
            ServiceError::Conflict {
                expected, actual, ..
            } => warn!(
                "event={event} module=service status=conflict id={id} expected_version={expected} stored_version={actual}"
            ),
            ServiceError::Storage(source) => warn!(
                "event={event} module=service status=error id={id} error_code=storage_error error={source}"
            ),
            other => info!(
                "event={event} module=service status=rejected id={id} error_code={}",
                other.code()
            ),
        }
        err
    }
}
