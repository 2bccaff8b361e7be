//! Repository coverage against a real SQLite file with migrations applied.

mod support;

use chrono::{Duration, NaiveDate};
use hearth_core::calendar::content_hash;
use hearth_core::{CredentialUpdate, EventRepository, OutcomeUpdate, SourceRepository};
use hearth_domain::{
    CalendarEvent, EventChangeSet, EventContent, EventKey, EventTiming, FeedValidators,
    HearthError, SourceId,
};
use hearth_infra::database::{SqliteEventRepository, SqliteSourceRepository};
use support::{registered_source, t0, TestDatabase};

fn all_day_event(source_id: SourceId, uid: &str, title: &str, location: Option<&str>) -> CalendarEvent {
    let content = EventContent {
        title: title.to_string(),
        timing: EventTiming::AllDay {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        },
        location: location.map(str::to_string),
    };
    CalendarEvent {
        source_id,
        key: EventKey::new(uid, None),
        content_hash: content_hash(&content),
        content,
        first_seen_at: t0(),
        updated_at: t0(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn inserted_source_round_trips() {
    let db = TestDatabase::new();
    let repo = SqliteSourceRepository::new(db.manager.clone());

    let mut source = registered_source("parent-1", "child-a", "hash-1", t0());
    source.credential.validators =
        FeedValidators { etag: Some("\"v1\"".into()), last_modified: None };
    repo.insert_source(&source).await.expect("insert");

    let loaded = repo.get_source(source.id()).await.expect("get").expect("present");
    assert_eq!(loaded, source);

    assert!(repo.get_source(SourceId::new()).await.expect("get").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn active_duplicate_for_same_child_is_rejected_by_the_index() {
    let db = TestDatabase::new();
    let repo = SqliteSourceRepository::new(db.manager.clone());

    let first = registered_source("parent-1", "child-a", "same-hash", t0());
    repo.insert_source(&first).await.expect("first insert");

    let second = registered_source("parent-2", "child-a", "same-hash", t0());
    let err = repo.insert_source(&second).await.unwrap_err();
    assert!(matches!(err, HearthError::DuplicateSource(_)), "got {err:?}");

    // A different child may follow the same feed.
    let other_child = registered_source("parent-1", "child-b", "same-hash", t0());
    repo.insert_source(&other_child).await.expect("other child insert");

    // After deactivation the same feed can be registered again.
    repo.set_active(first.id(), false).await.expect("deactivate");
    assert!(repo.find_active_by_hash("child-a", "same-hash").await.unwrap().is_none());
    repo.insert_source(&second).await.expect("re-register after deactivate");

    let found = repo.find_active_by_hash("child-a", "same-hash").await.unwrap().unwrap();
    assert_eq!(found.id(), second.id());
}

#[tokio::test(flavor = "multi_thread")]
async fn due_sources_are_active_and_most_overdue_first() {
    let db = TestDatabase::new();
    let repo = SqliteSourceRepository::new(db.manager.clone());
    let now = t0();

    let late = registered_source("p", "c1", "h1", now - Duration::minutes(5));
    let later = registered_source("p", "c2", "h2", now - Duration::minutes(50));
    let future = registered_source("p", "c3", "h3", now + Duration::minutes(5));
    let inactive = registered_source("p", "c4", "h4", now - Duration::hours(2));
    for source in [&late, &later, &future, &inactive] {
        repo.insert_source(source).await.unwrap();
    }
    repo.set_active(inactive.id(), false).await.unwrap();

    let due: Vec<_> = repo.due_sources(now).await.unwrap().iter().map(|s| s.id()).collect();
    assert_eq!(due, vec![later.id(), late.id()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn record_outcome_keeps_validators_when_none() {
    let db = TestDatabase::new();
    let repo = SqliteSourceRepository::new(db.manager.clone());
    let source = registered_source("p", "c", "h", t0());
    repo.insert_source(&source).await.unwrap();

    let validators = FeedValidators {
        etag: Some("\"abc\"".into()),
        last_modified: Some("Mon, 01 Jan 2024 08:00:00 GMT".into()),
    };
    repo.record_outcome(
        source.id(),
        &OutcomeUpdate {
            validators: Some(validators.clone()),
            last_synced_at: t0(),
            next_run_at: t0() + Duration::minutes(30),
            consecutive_failures: 0,
            deactivate: false,
        },
    )
    .await
    .unwrap();

    repo.record_outcome(
        source.id(),
        &OutcomeUpdate {
            validators: None,
            last_synced_at: t0() + Duration::minutes(30),
            next_run_at: t0() + Duration::minutes(60),
            consecutive_failures: 5,
            deactivate: true,
        },
    )
    .await
    .unwrap();

    let loaded = repo.get_source(source.id()).await.unwrap().unwrap();
    assert_eq!(loaded.credential.validators, validators);
    assert_eq!(loaded.credential.consecutive_failures, 5);
    assert_eq!(loaded.credential.next_run_at, t0() + Duration::minutes(60));
    assert_eq!(loaded.source.last_synced_at, Some(t0() + Duration::minutes(30)));
    assert!(!loaded.source.active);
    assert!(repo.due_sources(t0() + Duration::days(1)).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn credential_update_resets_validators_and_failures() {
    let db = TestDatabase::new();
    let repo = SqliteSourceRepository::new(db.manager.clone());
    let mut source = registered_source("p", "c", "old-hash", t0());
    source.credential.validators = FeedValidators { etag: Some("\"x\"".into()), last_modified: None };
    source.credential.consecutive_failures = 3;
    repo.insert_source(&source).await.unwrap();

    repo.update_credential(
        source.id(),
        &CredentialUpdate {
            encrypted_url: "v1.test.new.cipher".into(),
            url_hash: "new-hash".into(),
            masked_url: "https://new.example.com/***".into(),
            oauth_account: None,
            next_run_at: t0() + Duration::minutes(1),
        },
    )
    .await
    .unwrap();

    let loaded = repo.get_source(source.id()).await.unwrap().unwrap();
    assert_eq!(loaded.credential.url_hash, "new-hash");
    assert!(loaded.credential.validators.is_empty());
    assert_eq!(loaded.credential.consecutive_failures, 0);
    assert!(repo.find_active_by_hash("c", "old-hash").await.unwrap().is_none());

    let missing = repo
        .update_credential(
            SourceId::new(),
            &CredentialUpdate {
                encrypted_url: String::new(),
                url_hash: String::new(),
                masked_url: String::new(),
                oauth_account: None,
                next_run_at: t0(),
            },
        )
        .await;
    assert!(matches!(missing, Err(HearthError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn owner_listing_is_scoped() {
    let db = TestDatabase::new();
    let repo = SqliteSourceRepository::new(db.manager.clone());
    repo.insert_source(&registered_source("alice", "c1", "h1", t0())).await.unwrap();
    repo.insert_source(&registered_source("alice", "c2", "h2", t0())).await.unwrap();
    repo.insert_source(&registered_source("bob", "c3", "h3", t0())).await.unwrap();

    assert_eq!(repo.list_sources_for_owner("alice").await.unwrap().len(), 2);
    assert_eq!(repo.list_sources_for_owner("bob").await.unwrap().len(), 1);
    assert!(repo.list_sources_for_owner("carol").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn event_changes_apply_as_a_set_diff() {
    let db = TestDatabase::new();
    let sources = SqliteSourceRepository::new(db.manager.clone());
    let events = SqliteEventRepository::new(db.manager.clone());
    let source = registered_source("p", "c", "h", t0());
    sources.insert_source(&source).await.unwrap();
    let id = source.id();

    let a = all_day_event(id, "A", "Pickup", Some("School"));
    let b = all_day_event(id, "B", "Swim", None);
    let mut recurring = all_day_event(id, "R", "Soccer", None);
    recurring.key.recurrence_id = Some("2024-01-13T15:00:00Z".into());

    events
        .apply_changes(
            id,
            &EventChangeSet {
                to_create: vec![a.clone(), b.clone(), recurring.clone()],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let mut b_changed = all_day_event(id, "B", "Swim (pool 2)", None);
    b_changed.updated_at = t0() + Duration::minutes(30);
    events
        .apply_changes(
            id,
            &EventChangeSet {
                to_create: vec![],
                to_update: vec![b_changed.clone()],
                to_delete: vec![a.key.clone()],
            },
        )
        .await
        .unwrap();

    let stored = events.events_for_source(id).await.unwrap();
    assert_eq!(stored, vec![b_changed, recurring]);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_change_set_is_rolled_back() {
    let db = TestDatabase::new();
    let sources = SqliteSourceRepository::new(db.manager.clone());
    let events = SqliteEventRepository::new(db.manager.clone());
    let source = registered_source("p", "c", "h", t0());
    sources.insert_source(&source).await.unwrap();
    let id = source.id();

    let a = all_day_event(id, "A", "Pickup", None);
    events
        .apply_changes(id, &EventChangeSet { to_create: vec![a.clone()], ..Default::default() })
        .await
        .unwrap();

    // Second create of "A" violates the primary key after "B" was inserted.
    let b = all_day_event(id, "B", "Swim", None);
    let result = events
        .apply_changes(
            id,
            &EventChangeSet { to_create: vec![b, a.clone()], ..Default::default() },
        )
        .await;
    assert!(result.is_err());

    let stored = events.events_for_source(id).await.unwrap();
    assert_eq!(stored, vec![a]);
}
