//! Content validator.
//!
//! # Invariants
//! - Validation is pure: no storage access, no clock, no logging.
//! - All violations are collected; order follows field order
//!   (title, slug, body, status).

use crate::config::ContentRules;
use crate::model::content::{ContentItem, ContentStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

/// One rule violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Title is blank after trim.
    EmptyTitle,
    TitleTooLong { max_chars: usize, actual_chars: usize },
    /// Slug is not lowercase ASCII words joined by single hyphens.
    InvalidSlug(String),
    SlugTooLong { max_chars: usize, actual_chars: usize },
    /// Another item already owns the slug.
    SlugTaken(String),
    BodyTooLarge { max_bytes: usize, actual_bytes: usize },
    /// New items must start as drafts.
    InitialStatusNotDraft(ContentStatus),
    IllegalTransition {
        from: ContentStatus,
        to: ContentStatus,
    },
    /// Archived items cannot be edited.
    ArchivedReadOnly,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be blank"),
            Self::TitleTooLong {
                max_chars,
                actual_chars,
            } => write!(
                f,
                "title has {actual_chars} characters; at most {max_chars} allowed"
            ),
            Self::InvalidSlug(slug) => write!(
                f,
                "slug `{slug}` must be lowercase letters and digits separated by single hyphens"
            ),
            Self::SlugTooLong {
                max_chars,
                actual_chars,
            } => write!(
                f,
                "slug has {actual_chars} characters; at most {max_chars} allowed"
            ),
            Self::SlugTaken(slug) => write!(f, "slug already in use: `{slug}`"),
            Self::BodyTooLarge {
                max_bytes,
                actual_bytes,
            } => write!(f, "body has {actual_bytes} bytes; at most {max_bytes} allowed"),
            Self::InitialStatusNotDraft(status) => {
                write!(f, "new content must start as draft, got {status}")
            }
            Self::IllegalTransition { from, to } => {
                write!(f, "status transition {from} -> {to} is not allowed")
            }
            Self::ArchivedReadOnly => write!(f, "archived content cannot be modified"),
        }
    }
}

impl Error for ValidationError {}

/// Validates candidate items against configured bounds.
#[derive(Debug, Clone, Default)]
pub struct ContentValidator {
    rules: ContentRules,
}

impl ContentValidator {
    pub fn new(rules: ContentRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ContentRules {
        &self.rules
    }

    /// Returns every violation of `candidate`, given the currently stored
    /// copy (`None` for a new item). An empty list means valid.
    pub fn validate(
        &self,
        candidate: &ContentItem,
        stored: Option<&ContentItem>,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let title_chars = candidate.title.trim().chars().count();
        if title_chars == 0 {
            errors.push(ValidationError::EmptyTitle);
        } else if title_chars > self.rules.title_max_chars {
            errors.push(ValidationError::TitleTooLong {
                max_chars: self.rules.title_max_chars,
                actual_chars: title_chars,
            });
        }

        errors.extend(self.validate_slug(&candidate.slug));

        let body_bytes = candidate.body.len();
        if body_bytes > self.rules.body_max_bytes {
            errors.push(ValidationError::BodyTooLarge {
                max_bytes: self.rules.body_max_bytes,
                actual_bytes: body_bytes,
            });
        }

        match stored {
            None => {
                if candidate.status != ContentStatus::Draft {
                    errors.push(ValidationError::InitialStatusNotDraft(candidate.status));
                }
            }
            Some(stored) if stored.status == candidate.status => {
                if stored.status.is_terminal() && stored != candidate {
                    errors.push(ValidationError::ArchivedReadOnly);
                }
            }
            Some(stored) => {
                if !stored.status.can_transition_to(candidate.status) {
                    errors.push(ValidationError::IllegalTransition {
                        from: stored.status,
                        to: candidate.status,
                    });
                }
            }
        }

        errors
    }

    /// Slug-only checks, shared with the rename path.
    pub fn validate_slug(&self, slug: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !SLUG_RE.is_match(slug) {
            errors.push(ValidationError::InvalidSlug(slug.to_string()));
        }
        let slug_chars = slug.chars().count();
        if slug_chars > self.rules.slug_max_chars {
            errors.push(ValidationError::SlugTooLong {
                max_chars: self.rules.slug_max_chars,
                actual_chars: slug_chars,
            });
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentValidator, ValidationError};
    use crate::config::ContentRules;
    use crate::model::content::{Actor, ContentItem, ContentStatus};

    fn draft(slug: &str, title: &str) -> ContentItem {
        ContentItem::new_draft(slug, title, "body", &Actor::system(), 1)
    }

    #[test]
    fn valid_new_draft_passes() {
        let validator = ContentValidator::default();
        assert!(validator
            .validate(&draft("bridge-project", "Bridge Project"), None)
            .is_empty());
    }

    #[test]
    fn reports_all_violations_at_once() {
        let validator = ContentValidator::new(ContentRules {
            body_max_bytes: 2,
            ..ContentRules::default()
        });
        let mut item = draft("Bad Slug", "   ");
        item.status = ContentStatus::Published;

        let errors = validator.validate(&item, None);
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyTitle,
                ValidationError::InvalidSlug("Bad Slug".to_string()),
                ValidationError::BodyTooLarge {
                    max_bytes: 2,
                    actual_bytes: 4,
                },
                ValidationError::InitialStatusNotDraft(ContentStatus::Published),
            ]
        );
    }

    #[test]
    fn slug_pattern_rejects_edge_hyphens() {
        let validator = ContentValidator::default();
        for slug in ["-lead", "trail-", "double--dash", "", "under_score", "ümlaut"] {
            assert!(
                !validator.validate_slug(slug).is_empty(),
                "slug `{slug}` should be rejected"
            );
        }
        assert!(validator.validate_slug("project-2024").is_empty());
    }

    #[test]
    fn title_limit_counts_characters() {
        let validator = ContentValidator::new(ContentRules {
            title_max_chars: 3,
            ..ContentRules::default()
        });
        assert!(validator.validate(&draft("a", "äöü"), None).is_empty());
        assert_eq!(
            validator.validate(&draft("a", "abcd"), None),
            vec![ValidationError::TitleTooLong {
                max_chars: 3,
                actual_chars: 4,
            }]
        );
    }

    #[test]
    fn transition_rules_follow_state_machine() {
        let validator = ContentValidator::default();
        let mut stored = draft("a", "A");
        stored.status = ContentStatus::Archived;
        stored.version = 3;

        let mut candidate = stored.clone();
        candidate.status = ContentStatus::Draft;
        assert_eq!(
            validator.validate(&candidate, Some(&stored)),
            vec![ValidationError::IllegalTransition {
                from: ContentStatus::Archived,
                to: ContentStatus::Draft,
            }]
        );

        let mut edited = stored.clone();
        edited.title = "Edited".to_string();
        assert_eq!(
            validator.validate(&edited, Some(&stored)),
            vec![ValidationError::ArchivedReadOnly]
        );
    }
}
