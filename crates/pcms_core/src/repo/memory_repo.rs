//! In-process content repository.
//!
//! Used for tests and for running the core without a database file. Follows
//! the same contract as `SqliteContentRepository`: the version check and the
//! write happen under one lock acquisition, and no lock outlives a call.

use crate::model::content::{ContentId, ContentItem};
use crate::repo::content_repo::{
    next_version, ContentQuery, ContentRepository, RepoError, RepoResult,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex-guarded map of content items keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryContentRepository {
    items: Mutex<BTreeMap<ContentId, ContentItem>>,
}

impl InMemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ContentId, ContentItem>> {
        // Every mutation is a single insert or remove, so a poisoned map is still consistent.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContentRepository for InMemoryContentRepository {
    fn get(&self, id: ContentId) -> RepoResult<ContentItem> {
        self.lock().get(&id).cloned().ok_or(RepoError::NotFound(id))
    }

    fn find_by_slug(&self, slug: &str) -> RepoResult<ContentItem> {
        self.lock()
            .values()
            .find(|item| item.slug == slug)
            .cloned()
            .ok_or_else(|| RepoError::SlugNotFound(slug.to_string()))
    }

    fn save(&self, item: &ContentItem, expected_version: u64) -> RepoResult<ContentItem> {
        let mut items = self.lock();

        let actual = items.get(&item.id).map(|stored| stored.version);
        match (expected_version, actual) {
            (0, None) => {}
            (_, None) => return Err(RepoError::NotFound(item.id)),
            (expected, Some(actual)) if expected != actual => {
                return Err(RepoError::Conflict {
                    id: item.id,
                    expected,
                    actual,
                });
            }
            _ => {}
        }

        let slug_taken = items
            .values()
            .any(|other| other.id != item.id && other.slug == item.slug);
        if slug_taken {
            return Err(RepoError::SlugTaken(item.slug.clone()));
        }

        let mut stored = item.clone();
        stored.version = next_version(item.id, expected_version)?;
        if let Some(previous) = items.get(&item.id) {
            stored.created_at = previous.created_at;
            stored.created_by = previous.created_by.clone();
        }
        items.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn delete(&self, id: ContentId) -> RepoResult<()> {
        self.lock()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound(id))
    }

    fn query(&self, query: &ContentQuery) -> RepoResult<Vec<ContentItem>> {
        if let Some(position) = query.after.as_ref() {
            if !query.sort.accepts(&position.value) {
                return Err(RepoError::InvalidQuery(format!(
                    "page position value does not match sort field `{}`",
                    query.sort.field.as_str()
                )));
            }
        }

        let items = self.lock();
        let mut matched = items
            .values()
            .filter(|item| query.filter.matches(item))
            .filter(|item| match query.after.as_ref() {
                Some(position) => query.sort.is_after(item, position),
                None => true,
            })
            .cloned()
            .collect::<Vec<_>>();
        drop(items);

        matched.sort_by(|left, right| query.sort.compare(left, right));
        matched.truncate(usize::try_from(query.limit).unwrap_or(usize::MAX));
        Ok(matched)
    }
}
