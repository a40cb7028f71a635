use pcms_core::db::{open_db, open_db_in_memory};
use pcms_core::{
    Actor, ContentId, ContentItem, ContentPatch, ContentQuery, ContentRepository, ContentRules,
    ContentService, ContentStatus, ContentValidator, InMemoryContentRepository, NewContent,
    RepoError, RepoResult, ServiceError, SqliteContentRepository, ValidationError,
};
use std::sync::Barrier;
use std::thread;

fn new_content(slug: &str, title: &str) -> NewContent {
    NewContent {
        slug: slug.to_string(),
        title: title.to_string(),
        body: "body".to_string(),
    }
}

fn editor() -> Actor {
    Actor::new("editor")
}

#[test]
fn create_then_publish_bumps_version_and_stale_publish_conflicts() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContentRepository::new(&conn);
    let service = ContentService::new(&repo, ContentValidator::default());

    let created = service
        .create(new_content("bridge-project", "Bridge Project"), &editor())
        .unwrap();
    assert_eq!(created.status, ContentStatus::Draft);
    assert_eq!(created.version, 1);
    assert_eq!(created.published_at, None);

    let published = service.publish(created.id, 1, &editor()).unwrap();
    assert_eq!(published.status, ContentStatus::Published);
    assert_eq!(published.version, 2);
    assert!(published.published_at.is_some());

    let err = service.publish(created.id, 1, &editor()).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Conflict { expected: 1, actual: 2, .. }
    ));
    assert_eq!(err.code(), "conflict");
    assert_eq!(service.get(created.id).unwrap(), published);
}

#[test]
fn create_trims_title_and_records_actor() {
    let service = ContentService::new(InMemoryContentRepository::new(), ContentValidator::default());
    let created = service
        .create(new_content("trimmed", "  Trimmed  "), &Actor::new("alice"))
        .unwrap();

    assert_eq!(created.title, "Trimmed");
    assert_eq!(created.created_by, Actor::new("alice"));
    assert_eq!(created.updated_by, Actor::new("alice"));
    assert_eq!(created.created_at, created.updated_at);
}

#[test]
fn create_reports_every_violation_at_once() {
    let rules = ContentRules {
        title_max_chars: 5,
        slug_max_chars: 96,
        body_max_bytes: 4,
    };
    let service = ContentService::new(InMemoryContentRepository::new(), ContentValidator::new(rules));

    let err = service
        .create(
            NewContent {
                slug: "Not A Slug".to_string(),
                title: "Far too long".to_string(),
                body: "12345".to_string(),
            },
            &editor(),
        )
        .unwrap_err();

    let ServiceError::ValidationFailed(errors) = err else {
        panic!("expected validation failure, got {err:?}");
    };
    assert_eq!(errors.len(), 3);
    assert!(matches!(errors[0], ValidationError::TitleTooLong { max_chars: 5, .. }));
    assert!(matches!(errors[1], ValidationError::InvalidSlug(_)));
    assert!(matches!(errors[2], ValidationError::BodyTooLarge { max_bytes: 4, .. }));
}

#[test]
fn duplicate_slug_is_a_validation_failure() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContentRepository::new(&conn);
    let service = ContentService::new(&repo, ContentValidator::default());

    service.create(new_content("taken", "First"), &editor()).unwrap();
    let err = service.create(new_content("taken", "Second"), &editor()).unwrap_err();
    match err {
        ServiceError::ValidationFailed(errors) => {
            assert_eq!(errors, vec![ValidationError::SlugTaken("taken".to_string())]);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn update_applies_patch_and_keeps_slug() {
    let service = ContentService::new(InMemoryContentRepository::new(), ContentValidator::default());
    let created = service.create(new_content("post", "Post"), &editor()).unwrap();

    let updated = service
        .update(
            created.id,
            1,
            ContentPatch {
                title: Some(" Post, revised ".to_string()),
                body: None,
            },
            &Actor::new("bob"),
        )
        .unwrap();
    assert_eq!(updated.title, "Post, revised");
    assert_eq!(updated.body, "body");
    assert_eq!(updated.slug, "post");
    assert_eq!(updated.version, 2);
    assert_eq!(updated.created_by, editor());
    assert_eq!(updated.updated_by, Actor::new("bob"));

    let err = service
        .update(
            created.id,
            2,
            ContentPatch {
                title: Some("   ".to_string()),
                body: None,
            },
            &editor(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ValidationFailed(ref errors) if errors == &vec![ValidationError::EmptyTitle]
    ));
    assert_eq!(service.get(created.id).unwrap().version, 2);
}

#[test]
fn rename_checks_slug_ownership() {
    let service = ContentService::new(InMemoryContentRepository::new(), ContentValidator::default());
    let first = service.create(new_content("first", "First"), &editor()).unwrap();
    service.create(new_content("second", "Second"), &editor()).unwrap();

    let err = service.rename(first.id, 1, "second", &editor()).unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailed(_)));

    // Renaming to the slug it already owns is not a collision.
    let same = service.rename(first.id, 1, "first", &editor()).unwrap();
    assert_eq!(same.version, 2);

    let renamed = service.rename(first.id, 2, "first-renamed", &editor()).unwrap();
    assert_eq!(renamed.slug, "first-renamed");
    assert_eq!(service.get_by_slug("first-renamed").unwrap().id, first.id);
    assert!(matches!(
        service.get_by_slug("first"),
        Err(ServiceError::SlugNotFound(_))
    ));

    let err = service.rename(first.id, 3, "Bad Slug", &editor()).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ValidationFailed(ref errors)
            if matches!(errors.as_slice(), [ValidationError::InvalidSlug(_)])
    ));
}

#[test]
fn rename_reports_stale_version_and_missing_item_before_slug_collisions() {
    let service = ContentService::new(InMemoryContentRepository::new(), ContentValidator::default());
    let first = service.create(new_content("first", "First"), &editor()).unwrap();
    service.create(new_content("second", "Second"), &editor()).unwrap();
    service
        .update(
            first.id,
            1,
            ContentPatch {
                title: Some("First, edited".to_string()),
                body: None,
            },
            &editor(),
        )
        .unwrap();

    let err = service.rename(first.id, 1, "second", &editor()).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Conflict { expected: 1, actual: 2, .. }
    ));

    let missing = ContentId::new_v4();
    let err = service.rename(missing, 1, "second", &editor()).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(id) if id == missing));

    assert_eq!(service.get_by_slug("first").unwrap().version, 2);
}

/// Store whose slug lookups always miss, so the service pre-check passes and
/// only the storage-level unique index can catch a duplicate.
struct SlugLookupMisses<R>(R);

impl<R: ContentRepository> ContentRepository for SlugLookupMisses<R> {
    fn get(&self, id: ContentId) -> RepoResult<ContentItem> {
        self.0.get(id)
    }

    fn find_by_slug(&self, slug: &str) -> RepoResult<ContentItem> {
        Err(RepoError::SlugNotFound(slug.to_string()))
    }

    fn save(&self, item: &ContentItem, expected_version: u64) -> RepoResult<ContentItem> {
        self.0.save(item, expected_version)
    }

    fn delete(&self, id: ContentId) -> RepoResult<()> {
        self.0.delete(id)
    }

    fn query(&self, query: &ContentQuery) -> RepoResult<Vec<ContentItem>> {
        self.0.query(query)
    }
}

#[test]
fn unique_slug_index_backs_up_the_service_check() {
    let conn = open_db_in_memory().unwrap();
    let repo = SlugLookupMisses(SqliteContentRepository::new(&conn));
    let service = ContentService::new(&repo, ContentValidator::default());

    let first = service.create(new_content("dup", "First"), &editor()).unwrap();
    let err = service.create(new_content("dup", "Second"), &editor()).unwrap_err();
    match err {
        ServiceError::ValidationFailed(errors) => {
            assert_eq!(errors, vec![ValidationError::SlugTaken("dup".to_string())]);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }

    let second = service.create(new_content("other", "Other"), &editor()).unwrap();
    let err = service.rename(second.id, 1, "dup", &editor()).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ValidationFailed(ref errors)
            if errors == &vec![ValidationError::SlugTaken("dup".to_string())]
    ));
    assert_eq!(repo.get(first.id).unwrap().slug, "dup");
}

#[test]
fn concurrent_creates_with_one_slug_on_separate_connections_get_exactly_one_success() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("content.db");
    drop(open_db(&db_path).unwrap());

    let barrier = Barrier::new(2);
    let results = thread::scope(|scope| {
        let handles = ["Left", "Right"]
            .into_iter()
            .map(|title| {
                let barrier = &barrier;
                let db_path = db_path.as_path();
                scope.spawn(move || {
                    let conn = open_db(db_path).unwrap();
                    let repo = SqliteContentRepository::new(&conn);
                    let service = ContentService::new(&repo, ContentValidator::default());
                    barrier.wait();
                    service
                        .create(new_content("contested", title), &editor())
                        .map(|item| item.id)
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });

    let winners = results
        .iter()
        .filter_map(|result| result.as_ref().ok())
        .collect::<Vec<_>>();
    assert_eq!(winners.len(), 1);
    assert!(results.iter().any(|result| matches!(
        result,
        Err(ServiceError::ValidationFailed(errors))
            if errors == &vec![ValidationError::SlugTaken("contested".to_string())]
    )));

    let conn = open_db(&db_path).unwrap();
    let repo = SqliteContentRepository::new(&conn);
    assert_eq!(&repo.find_by_slug("contested").unwrap().id, winners[0]);
}

#[test]
fn unpublish_returns_to_draft() {
    let service = ContentService::new(InMemoryContentRepository::new(), ContentValidator::default());
    let created = service.create(new_content("toggle", "Toggle"), &editor()).unwrap();
    let published = service.publish(created.id, 1, &editor()).unwrap();
    let draft = service.unpublish(created.id, published.version, &editor()).unwrap();

    assert_eq!(draft.status, ContentStatus::Draft);
    assert_eq!(draft.version, 3);

    let err = service.unpublish(created.id, 3, &editor()).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::InvalidTransition {
            from: ContentStatus::Draft,
            to: ContentStatus::Draft
        }
    ));
}

#[test]
fn archived_items_accept_no_further_changes() {
    let service = ContentService::new(InMemoryContentRepository::new(), ContentValidator::default());
    let created = service.create(new_content("old", "Old"), &editor()).unwrap();
    let published = service.publish(created.id, 1, &editor()).unwrap();
    let archived = service.archive(created.id, published.version, &editor()).unwrap();
    assert_eq!(archived.status, ContentStatus::Archived);
    let version = archived.version;

    for err in [
        service.publish(created.id, version, &editor()).unwrap_err(),
        service.unpublish(created.id, version, &editor()).unwrap_err(),
        service.archive(created.id, version, &editor()).unwrap_err(),
    ] {
        assert!(matches!(
            err,
            ServiceError::InvalidTransition {
                from: ContentStatus::Archived,
                ..
            }
        ));
    }

    let err = service
        .update(
            created.id,
            version,
            ContentPatch {
                title: Some("New".to_string()),
                body: None,
            },
            &editor(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ValidationFailed(ref errors) if errors == &vec![ValidationError::ArchivedReadOnly]
    ));

    let err = service.rename(created.id, version, "renamed", &editor()).unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailed(_)));

    assert_eq!(service.get(created.id).unwrap(), archived);
}

#[test]
fn delete_is_terminal_and_frees_slug() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContentRepository::new(&conn);
    let service = ContentService::new(&repo, ContentValidator::default());

    let created = service.create(new_content("temp", "Temp"), &editor()).unwrap();
    service.delete(created.id, &editor()).unwrap();

    assert!(matches!(service.get(created.id), Err(ServiceError::NotFound(_))));
    assert!(matches!(
        service.delete(created.id, &editor()),
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.publish(created.id, 1, &editor()),
        Err(ServiceError::NotFound(_))
    ));

    let again = service.create(new_content("temp", "Temp again"), &editor()).unwrap();
    assert_ne!(again.id, created.id);
}

#[test]
fn concurrent_publishers_on_shared_store_get_exactly_one_success() {
    let repo = InMemoryContentRepository::new();
    let service = ContentService::new(&repo, ContentValidator::default());
    let created = service.create(new_content("race", "Race"), &editor()).unwrap();

    let barrier = Barrier::new(2);
    let results = thread::scope(|scope| {
        let handles = (0..2)
            .map(|index| {
                let service = &service;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    service.publish(created.id, 1, &Actor::new(format!("writer-{index}")))
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });

    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results.iter().any(|result| matches!(
        result,
        Err(ServiceError::Conflict { expected: 1, actual: 2, .. })
    )));
    assert_eq!(service.get(created.id).unwrap().version, 2);
}

#[test]
fn concurrent_editors_on_separate_connections_get_exactly_one_success() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("content.db");

    let created = {
        let conn = open_db(&db_path).unwrap();
        let repo = SqliteContentRepository::new(&conn);
        let service = ContentService::new(&repo, ContentValidator::default());
        service.create(new_content("shared", "Shared"), &editor()).unwrap()
    };

    let barrier = Barrier::new(2);
    let results = thread::scope(|scope| {
        let handles = ["left", "right"]
            .into_iter()
            .map(|title| {
                let barrier = &barrier;
                let db_path = db_path.as_path();
                scope.spawn(move || {
                    let conn = open_db(db_path).unwrap();
                    let repo = SqliteContentRepository::new(&conn);
                    let service = ContentService::new(&repo, ContentValidator::default());
                    barrier.wait();
                    service
                        .update(
                            created.id,
                            1,
                            ContentPatch {
                                title: Some(title.to_string()),
                                body: None,
                            },
                            &editor(),
                        )
                        .map(|item| item.title)
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });

    let winners = results
        .iter()
        .filter_map(|result| result.as_ref().ok())
        .collect::<Vec<_>>();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .any(|result| matches!(result, Err(ServiceError::Conflict { .. }))));

    let conn = open_db(&db_path).unwrap();
    let repo = SqliteContentRepository::new(&conn);
    let stored = ContentService::new(&repo, ContentValidator::default())
        .get(created.id)
        .unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(&stored.title, winners[0]);
}
