//! Content repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide get/find/save/delete/query over the `content_items` table.
//! - Enforce optimistic concurrency inside one conditional write.
//!
//! # Invariants
//! - `save(item, v)` stores `v + 1` only when the stored version equals `v`.
//! - `save(item, 0)` inserts; it never overwrites an existing id.
//! - A rejected write leaves stored state untouched.
//! - Query ordering is total: `(sort column, id)` in the requested direction.
//! - Read paths reject malformed persisted rows instead of masking them.

use crate::db::DbError;
use crate::model::content::{Actor, ContentId, ContentItem, ContentStatus};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const CONTENT_SELECT_SQL: &str = "SELECT
    id,
    slug,
    title,
    body,
    status,
    version,
    created_at,
    updated_at,
    published_at,
    created_by,
    updated_by
FROM content_items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for content persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// No item with this id.
    NotFound(ContentId),
    /// No item with this slug.
    SlugNotFound(String),
    /// Stored version differs from the expected one.
    Conflict {
        id: ContentId,
        expected: u64,
        actual: u64,
    },
    /// Another item already owns the slug.
    SlugTaken(String),
    /// Query arguments cannot be executed (e.g. page position of the wrong type).
    InvalidQuery(String),
    /// Persisted data cannot be converted to a valid item.
    InvalidData(String),
    Db(DbError),
}

impl Display for RepoError {
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
                "version conflict on content item {id}: expected {expected}, stored {actual}"
            ),
            Self::SlugTaken(slug) => write!(f, "slug already in use: `{slug}`"),
            Self::InvalidQuery(message) => write!(f, "invalid content query: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted content data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Column a content list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Title,
    Slug,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Title => "title",
            Self::Slug => "slug",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            "title" => Some(Self::Title),
            "slug" => Some(Self::Slug),
            _ => None,
        }
    }

    fn is_text(self) -> bool {
        matches!(self, Self::Title | Self::Slug)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Ordering for content lists. Ties are always broken by id, same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Newest first by creation time. `created_at` never changes after insert,
/// so edits cannot move a row across an issued cursor.
impl Default for SortKey {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }

    /// Parses `field` (ascending) or `-field` (descending).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        match value.strip_prefix('-') {
            Some(field) => SortField::parse(field).map(Self::desc),
            None => SortField::parse(value).map(Self::asc),
        }
    }

    /// Extracts this key's sort value from an item.
    pub fn value_of(&self, item: &ContentItem) -> SortValue {
        match self.field {
            SortField::CreatedAt => SortValue::Integer(item.created_at),
            SortField::UpdatedAt => SortValue::Integer(item.updated_at),
            SortField::Title => SortValue::Text(item.title.clone()),
            SortField::Slug => SortValue::Text(item.slug.clone()),
        }
    }

    /// Total order of two items under this key, id tie-break included.
    pub fn compare(&self, left: &ContentItem, right: &ContentItem) -> Ordering {
        let ordering = self
            .value_of(left)
            .cmp(&self.value_of(right))
            .then_with(|| left.id.cmp(&right.id));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Whether `item` comes strictly after `position` in this order.
    pub fn is_after(&self, item: &ContentItem, position: &PagePosition) -> bool {
        let ordering = self
            .value_of(item)
            .cmp(&position.value)
            .then_with(|| item.id.cmp(&position.id));
        match self.direction {
            SortDirection::Asc => ordering == Ordering::Greater,
            SortDirection::Desc => ordering == Ordering::Less,
        }
    }

    pub(crate) fn accepts(&self, value: &SortValue) -> bool {
        match value {
            SortValue::Integer(_) => !self.field.is_text(),
            SortValue::Text(_) => self.field.is_text(),
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.direction == SortDirection::Desc {
            f.write_str("-")?;
        }
        f.write_str(self.field.as_str())
    }
}

/// Sort column value captured for keyset paging.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortValue {
    Integer(i64),
    Text(String),
}

/// Keyset position: rows strictly after `(value, id)` are returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePosition {
    pub value: SortValue,
    pub id: ContentId,
}

/// Row filter for content lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    /// Exact status match.
    pub status: Option<ContentStatus>,
    /// ASCII case-insensitive substring of `title`.
    pub title_contains: Option<String>,
}

impl ContentFilter {
    /// In-process equivalent of the SQL `WHERE` clause.
    pub fn matches(&self, item: &ContentItem) -> bool {
        if let Some(status) = self.status {
            if item.status != status {
                return false;
            }
        }
        if let Some(needle) = self.title_contains.as_deref() {
            if !item
                .title
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// One page request against the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    pub filter: ContentFilter,
    pub sort: SortKey,
    pub after: Option<PagePosition>,
    pub limit: u32,
}

/// Repository interface for content items.
pub trait ContentRepository {
    fn get(&self, id: ContentId) -> RepoResult<ContentItem>;
    fn find_by_slug(&self, slug: &str) -> RepoResult<ContentItem>;
    /// Conditionally writes `item` and returns the stored copy with its new version.
    fn save(&self, item: &ContentItem, expected_version: u64) -> RepoResult<ContentItem>;
    fn delete(&self, id: ContentId) -> RepoResult<()>;
    fn query(&self, query: &ContentQuery) -> RepoResult<Vec<ContentItem>>;
}

impl<R: ContentRepository + ?Sized> ContentRepository for &R {
    fn get(&self, id: ContentId) -> RepoResult<ContentItem> {
        (**self).get(id)
    }

    fn find_by_slug(&self, slug: &str) -> RepoResult<ContentItem> {
        (**self).find_by_slug(slug)
    }

    fn save(&self, item: &ContentItem, expected_version: u64) -> RepoResult<ContentItem> {
        (**self).save(item, expected_version)
    }

    fn delete(&self, id: ContentId) -> RepoResult<()> {
        (**self).delete(id)
    }

    fn query(&self, query: &ContentQuery) -> RepoResult<Vec<ContentItem>> {
        (**self).query(query)
    }
}

/// Returns the version the next successful write will store.
pub(crate) fn next_version(id: ContentId, expected_version: u64) -> RepoResult<u64> {
    expected_version
        .checked_add(1)
        .ok_or_else(|| RepoError::InvalidData(format!("version overflow on content item {id}")))
}

/// SQLite-backed content repository.
pub struct SqliteContentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContentRepository<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn insert(&self, item: &ContentItem) -> RepoResult<()> {
        let result = self.conn.execute(
            "INSERT INTO content_items (
                id,
                slug,
                title,
                body,
                status,
                version,
                created_at,
                updated_at,
                published_at,
                created_by,
                updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                item.id.to_string(),
                item.slug.as_str(),
                item.title.as_str(),
                item.body.as_str(),
                item.status.as_str(),
                version_to_db(item.version)?,
                item.created_at,
                item.updated_at,
                item.published_at,
                item.created_by.as_str(),
                item.updated_by.as_str(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_constraint_violation(&err) => {
                if let Some(actual) = self.stored_version(item.id)? {
                    return Err(RepoError::Conflict {
                        id: item.id,
                        expected: 0,
                        actual,
                    });
                }
                if self.slug_owner(&item.slug)?.is_some() {
                    return Err(RepoError::SlugTaken(item.slug.clone()));
                }
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the stored creation audit fields, which the write leaves untouched.
    fn update(&self, item: &ContentItem, expected_version: u64) -> RepoResult<(i64, Actor)> {
        let result = self
            .conn
            .query_row(
                "UPDATE content_items
                 SET
                    slug = ?2,
                    title = ?3,
                    body = ?4,
                    status = ?5,
                    version = ?6,
                    updated_at = ?7,
                    published_at = ?8,
                    updated_by = ?9
                 WHERE id = ?1
                   AND version = ?10
                 RETURNING created_at, created_by;",
                params![
                    item.id.to_string(),
                    item.slug.as_str(),
                    item.title.as_str(),
                    item.body.as_str(),
                    item.status.as_str(),
                    version_to_db(item.version)?,
                    item.updated_at,
                    item.published_at,
                    item.updated_by.as_str(),
                    version_to_db(expected_version)?,
                ],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional();

        match result {
            Ok(Some((created_at, created_by))) => Ok((created_at, Actor::new(created_by))),
            Ok(None) => match self.stored_version(item.id)? {
                None => Err(RepoError::NotFound(item.id)),
                Some(actual) => Err(RepoError::Conflict {
                    id: item.id,
                    expected: expected_version,
                    actual,
                }),
            },
            Err(err) if is_constraint_violation(&err) => {
                Err(RepoError::SlugTaken(item.slug.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn stored_version(&self, id: ContentId) -> RepoResult<Option<u64>> {
        let version = self
            .conn
            .query_row(
                "SELECT version FROM content_items WHERE id = ?1;",
                [id.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        version.map(version_from_db).transpose()
    }

    fn slug_owner(&self, slug: &str) -> RepoResult<Option<String>> {
        let owner = self
            .conn
            .query_row(
                "SELECT id FROM content_items WHERE slug = ?1;",
                [slug],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(owner)
    }

    fn select_one(&self, where_clause: &str, value: &str) -> RepoResult<Option<ContentItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CONTENT_SELECT_SQL} WHERE {where_clause};"))?;
        let mut rows = stmt.query([value])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_content_row(row)?));
        }
        Ok(None)
    }
}

impl ContentRepository for SqliteContentRepository<'_> {
    fn get(&self, id: ContentId) -> RepoResult<ContentItem> {
        self.select_one("id = ?1", &id.to_string())?
            .ok_or(RepoError::NotFound(id))
    }

    fn find_by_slug(&self, slug: &str) -> RepoResult<ContentItem> {
        self.select_one("slug = ?1", slug)?
            .ok_or_else(|| RepoError::SlugNotFound(slug.to_string()))
    }

    fn save(&self, item: &ContentItem, expected_version: u64) -> RepoResult<ContentItem> {
        let mut stored = item.clone();
        stored.version = next_version(item.id, expected_version)?;

        if expected_version == 0 {
            self.insert(&stored)?;
        } else {
            let (created_at, created_by) = self.update(&stored, expected_version)?;
            stored.created_at = created_at;
            stored.created_by = created_by;
        }

        Ok(stored)
    }

    fn delete(&self, id: ContentId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM content_items WHERE id = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn query(&self, query: &ContentQuery) -> RepoResult<Vec<ContentItem>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let mut sql = format!("{CONTENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.filter.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        if let Some(needle) = query.filter.title_contains.as_deref() {
            sql.push_str(" AND title LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(format!("%{}%", escape_like(needle))));
        }

        let column = query.sort.field.as_str();
        let (comparator, direction) = match query.sort.direction {
            SortDirection::Asc => (">", "ASC"),
            SortDirection::Desc => ("<", "DESC"),
        };

        if let Some(position) = query.after.as_ref() {
            if !query.sort.accepts(&position.value) {
                return Err(RepoError::InvalidQuery(format!(
                    "page position value does not match sort field `{column}`"
                )));
            }
            sql.push_str(&format!(
                " AND ({column} {comparator} ? OR ({column} = ? AND id {comparator} ?))"
            ));
            let value = sort_value_to_db(&position.value);
            bind_values.push(value.clone());
            bind_values.push(value);
            bind_values.push(Value::Text(position.id.to_string()));
        }

        sql.push_str(&format!(
            " ORDER BY {column} {direction}, id {direction} LIMIT ?"
        ));
        bind_values.push(Value::Integer(i64::from(query.limit)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();

        while let Some(row) = rows.next()? {
            items.push(parse_content_row(row)?);
        }

        Ok(items)
    }
}

fn parse_content_row(row: &Row<'_>) -> RepoResult<ContentItem> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in content_items.id"))
    })?;

    let status_text: String = row.get("status")?;
    let status = ContentStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in content_items.status"
        ))
    })?;

    let version = version_from_db(row.get("version")?)?;
    if version == 0 {
        return Err(RepoError::InvalidData(format!(
            "stored version 0 for content item {id}"
        )));
    }

    Ok(ContentItem {
        id,
        slug: row.get("slug")?,
        title: row.get("title")?,
        body: row.get("body")?,
        status,
        version,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        published_at: row.get("published_at")?,
        created_by: Actor::new(row.get::<_, String>("created_by")?),
        updated_by: Actor::new(row.get::<_, String>("updated_by")?),
    })
}

fn version_to_db(version: u64) -> RepoResult<i64> {
    i64::try_from(version)
        .map_err(|_| RepoError::InvalidData(format!("version {version} exceeds storage range")))
}

fn version_from_db(version: i64) -> RepoResult<u64> {
    u64::try_from(version).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid version `{version}` in content_items.version"
        ))
    })
}

fn sort_value_to_db(value: &SortValue) -> Value {
    match value {
        SortValue::Integer(number) => Value::Integer(*number),
        SortValue::Text(text) => Value::Text(text.clone()),
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _) if inner.code == ErrorCode::ConstraintViolation
    )
}
