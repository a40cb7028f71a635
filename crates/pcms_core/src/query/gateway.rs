//! Query gateway: read path for editors and public readers.
//!
//! # Responsibility
//! - Parse external list parameters (status, free text, sort, limit, cursor).
//! - Run keyset-paged repository queries and mint next-page cursors.
//! - Hide non-published items from public reads.
//!
//! # Invariants
//! - Applied page size is within `[1, max_page_size]`.
//! - A cursor is only accepted for the sort key it was minted for.
//! - Paging a fixed data set visits every matching item exactly once; items
//!   inserted concurrently never shift already-issued cursors.
//! - Under the default `-created_at` order, items edited mid-scan are still
//!   visited exactly once. Orders on mutable columns (`updated_at`, `title`,
//!   `slug`) can skip a row whose sort value moves behind the cursor.

use crate::config::QueryConfig;
use crate::model::content::{ContentId, ContentItem, ContentStatus};
use crate::query::cursor::{decode_cursor, encode_cursor};
use crate::repo::content_repo::{
    ContentFilter, ContentQuery, ContentRepository, PagePosition, RepoError, SortKey,
};
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Query-layer error.
#[derive(Debug)]
pub enum QueryError {
    /// Cursor is malformed or belongs to another sort order.
    InvalidCursor(String),
    /// Unknown sort expression.
    InvalidSort(String),
    /// Unknown status filter value.
    InvalidStatus(String),
    NotFound(ContentId),
    SlugNotFound(String),
    Storage(RepoError),
    /// A next-page cursor could not be minted.
    CursorEncoding(serde_json::Error),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCursor(message) => write!(f, "invalid page cursor: {message}"),
            Self::InvalidSort(value) => write!(
                f,
                "invalid sort `{value}`; expected [-]created_at|updated_at|title|slug"
            ),
            Self::InvalidStatus(value) => write!(
                f,
                "invalid status `{value}`; expected draft|published|archived"
            ),
            Self::NotFound(id) => write!(f, "content item not found: {id}"),
            Self::SlugNotFound(slug) => write!(f, "content item not found for slug `{slug}`"),
            Self::Storage(err) => write!(f, "content storage failure: {err}"),
            Self::CursorEncoding(err) => write!(f, "failed to encode page cursor: {err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::CursorEncoding(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for QueryError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::SlugNotFound(slug) => Self::SlugNotFound(slug),
            RepoError::InvalidQuery(message) => Self::InvalidCursor(message),
            other => Self::Storage(other),
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(value: serde_json::Error) -> Self {
        Self::CursorEncoding(value)
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Typed list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub status: Option<ContentStatus>,
    /// Free-text match on title. Blank means no text filter.
    pub title_query: Option<String>,
    pub sort: SortKey,
    /// Requested page size. Defaults and clamps per `QueryConfig`.
    pub limit: Option<u32>,
    /// Cursor from a previous page's `next_cursor`.
    pub cursor: Option<String>,
}

impl ListRequest {
    /// Builds a request from raw external parameters.
    pub fn from_params(
        status: Option<&str>,
        title_query: Option<&str>,
        sort: Option<&str>,
        limit: Option<u32>,
        cursor: Option<&str>,
    ) -> QueryResult<Self> {
        let status = status
            .map(|value| {
                ContentStatus::parse(value)
                    .ok_or_else(|| QueryError::InvalidStatus(value.to_string()))
            })
            .transpose()?;
        let sort = match sort {
            Some(value) => {
                SortKey::parse(value).ok_or_else(|| QueryError::InvalidSort(value.to_string()))?
            }
            None => SortKey::default(),
        };

        Ok(Self {
            status,
            title_query: title_query.map(str::to_string),
            sort,
            limit,
            cursor: cursor.map(str::to_string),
        })
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPage {
    pub items: Vec<ContentItem>,
    /// Present when more items may follow.
    pub next_cursor: Option<String>,
    /// Effective page size used by the query.
    pub applied_limit: u32,
}

/// Read-side facade over a repository.
pub struct QueryGateway<R: ContentRepository> {
    repo: R,
    default_page_size: u32,
    max_page_size: u32,
}

impl<R: ContentRepository> QueryGateway<R> {
    pub fn new(repo: R, config: &QueryConfig) -> Self {
        let (default_page_size, max_page_size) = config.normalized();
        Self {
            repo,
            default_page_size,
            max_page_size,
        }
    }

    /// Gets one item by id regardless of status.
    pub fn get(&self, id: ContentId) -> QueryResult<ContentItem> {
        self.repo.get(id).map_err(Into::into)
    }

    /// Gets one item by slug regardless of status.
    pub fn get_by_slug(&self, slug: &str) -> QueryResult<ContentItem> {
        self.repo.find_by_slug(slug).map_err(Into::into)
    }

    /// Gets a published item by slug; anything else reads as not found.
    pub fn get_public_by_slug(&self, slug: &str) -> QueryResult<ContentItem> {
        let item = self.get_by_slug(slug)?;
        if !item.is_public() {
            return Err(QueryError::SlugNotFound(slug.to_string()));
        }
        Ok(item)
    }

    /// Lists items for authenticated editors.
    pub fn list(&self, request: &ListRequest) -> QueryResult<ContentPage> {
        self.run_list(request, request.status)
    }

    /// Lists published items only, whatever status the request names.
    pub fn list_public(&self, request: &ListRequest) -> QueryResult<ContentPage> {
        self.run_list(request, Some(ContentStatus::Published))
    }

    /// Clamps a requested page size into configured bounds.
    pub fn normalize_limit(&self, limit: Option<u32>) -> u32 {
        match limit {
            Some(value) => value.clamp(1, self.max_page_size),
            None => self.default_page_size,
        }
    }

    fn run_list(
        &self,
        request: &ListRequest,
        status: Option<ContentStatus>,
    ) -> QueryResult<ContentPage> {
        let after = match request.cursor.as_deref() {
            Some(token) => Some(self.position_from_cursor(token, request.sort)?),
            None => None,
        };
        let applied_limit = self.normalize_limit(request.limit);
        let title_contains = request
            .title_query
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let query = ContentQuery {
            filter: ContentFilter {
                status,
                title_contains,
            },
            sort: request.sort,
            after,
            limit: applied_limit.saturating_add(1),
        };
        let mut items = self.repo.query(&query)?;

        let has_more = items.len() > applied_limit as usize;
        items.truncate(applied_limit as usize);

        let next_cursor = match items.last() {
            Some(last) if has_more => {
                let position = PagePosition {
                    value: request.sort.value_of(last),
                    id: last.id,
                };
                Some(encode_cursor(request.sort, &position)?)
            }
            _ => None,
        };

        debug!(
            "event=content_list module=query status=ok sort={} returned={} has_more={}",
            query.sort,
            items.len(),
            has_more
        );

        Ok(ContentPage {
            items,
            next_cursor,
            applied_limit,
        })
    }

    fn position_from_cursor(&self, token: &str, sort: SortKey) -> QueryResult<PagePosition> {
        let (minted_for, position) = decode_cursor(token).map_err(QueryError::InvalidCursor)?;
        if minted_for != sort {
            return Err(QueryError::InvalidCursor(format!(
                "cursor was issued for sort `{minted_for}`, request uses `{sort}`"
            )));
        }
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::QueryError;
    use std::error::Error;

    #[test]
    fn cursor_encoding_failure_is_not_blamed_on_the_caller() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = QueryError::from(json_err);

        assert!(matches!(err, QueryError::CursorEncoding(_)));
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("failed to encode page cursor"));
    }
}
