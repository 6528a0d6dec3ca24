//! Completion tests: persistence, ownership and retry behaviour.
//!
//! Run with: `cargo test -p imgvault-api --test completion_test`

mod helpers;

use std::time::Duration;

use helpers::{jpeg_item, setup_test_app};
use imgvault_core::models::CallerIdentity;
use imgvault_core::AppError;
use imgvault_infra::SessionCache;

#[tokio::test]
async fn test_upload_then_complete() {
    let app = setup_test_app();
    let caller = CallerIdentity::new("user-1");

    app.state
        .uploads
        .batch_upload("session-1", &[jpeg_item()])
        .await
        .unwrap();
    let statuses = app.state.completion.complete("session-1", &caller).await.unwrap();

    assert_eq!(statuses.len(), 1);
    let status = &statuses[0];
    assert!(status.is_ok());
    assert_eq!(status.image_id, "img-1");

    let metadata = status.metadata.as_ref().unwrap();
    assert_eq!(metadata.width, 800);
    assert_eq!(metadata.height, 600);
    assert_eq!(metadata.format, "JPEG");
    assert_eq!(metadata.size, 1024);
    assert!(metadata.upload_time.ends_with('Z'));
    assert_eq!(status.variants["public"], "/cdn-images/img-1/public");
    assert_eq!(status.variants["thumbnail"], "/cdn-images/img-1/thumbnail");

    let record = app.assets.get("img-1").unwrap();
    assert_eq!(record.count, 0);
    assert_eq!(record.size, 1024);
    assert!(record.pending_owner.is_none());
    assert!(app.relations.is_owner("img-1", "user-1"));

    assert!(app.cache.get("session-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_complete_without_session() {
    let app = setup_test_app();

    let err = app
        .state
        .completion
        .complete("missing", &CallerIdentity::new("user-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SessionNotFound));
}

#[tokio::test]
async fn test_replayed_completion_is_rejected_by_uniqueness() {
    let app = setup_test_app();
    let caller = CallerIdentity::new("user-1");

    let session = app
        .state
        .uploads
        .batch_upload("session-1", &[jpeg_item()])
        .await
        .unwrap();
    let stale = session.to_json().unwrap();

    app.state.completion.complete("session-1", &caller).await.unwrap();

    // A second completion racing the first still sees the session.
    app.cache
        .set_if_absent("session-1", &stale, Duration::from_secs(60))
        .await
        .unwrap();
    let err = app
        .state
        .completion
        .complete("session-1", &caller)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BulkInsertFailed { .. }));
    assert_eq!(app.assets.len(), 1);
}

#[tokio::test]
async fn test_insert_failure_keeps_session_for_retry() {
    let app = setup_test_app();
    let caller = CallerIdentity::new("user-1");
    app.state
        .uploads
        .batch_upload("session-1", &[jpeg_item()])
        .await
        .unwrap();

    app.assets.fail_insert(true);
    let err = app
        .state
        .completion
        .complete("session-1", &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BulkInsertFailed { .. }));
    assert!(app.cache.get("session-1").await.unwrap().is_some());
    assert_eq!(app.relations.len(), 0);

    app.assets.fail_insert(false);
    let statuses = app.state.completion.complete("session-1", &caller).await.unwrap();
    assert!(statuses[0].is_ok());
    assert_eq!(app.assets.len(), 1);
}

#[tokio::test]
async fn test_grant_failure_is_repaired_by_sweep() {
    let app = setup_test_app();
    let caller = CallerIdentity::new("user-1");
    app.state
        .uploads
        .batch_upload("session-1", &[jpeg_item(), jpeg_item()])
        .await
        .unwrap();

    app.relations.fail_add(true);
    let err = app
        .state
        .completion
        .complete("session-1", &caller)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::GrantFailed { .. }));
    assert_eq!(
        app.assets.get("img-1").unwrap().pending_owner.as_deref(),
        Some("user-1")
    );
    assert!(app.cache.get("session-1").await.unwrap().is_some());

    app.relations.fail_add(false);
    let report = app.state.ownership.sweep().await.unwrap();

    assert_eq!(report.examined, 2);
    assert_eq!(report.repaired, 2);
    assert_eq!(report.failed, 0);
    assert!(app.relations.is_owner("img-1", "user-1"));
    assert!(app.relations.is_owner("img-2", "user-1"));
    assert!(app.assets.get("img-2").unwrap().pending_owner.is_none());
}

#[tokio::test]
async fn test_sweep_keeps_failing_records_pending() {
    let app = setup_test_app();
    let caller = CallerIdentity::new("user-1");
    app.state
        .uploads
        .batch_upload("session-1", &[jpeg_item()])
        .await
        .unwrap();
    app.relations.fail_add(true);
    app.state
        .completion
        .complete("session-1", &caller)
        .await
        .unwrap_err();

    let report = app.state.ownership.sweep().await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(app.assets.get("img-1").unwrap().pending_owner.is_some());
}

#[tokio::test]
async fn test_failed_lookup_is_reported_per_image() {
    let app = setup_test_app();
    let caller = CallerIdentity::new("user-1");
    app.state
        .uploads
        .batch_upload("session-1", &[jpeg_item(), jpeg_item(), jpeg_item()])
        .await
        .unwrap();
    app.hosting.fail_fetch("img-2");

    let statuses = app.state.completion.complete("session-1", &caller).await.unwrap();

    let ids: Vec<&str> = statuses.iter().map(|s| s.image_id.as_str()).collect();
    assert_eq!(ids, vec!["img-1", "img-2", "img-3"]);
    assert!(statuses[0].is_ok());
    assert!(statuses[1].error.is_some());
    assert!(statuses[1].metadata.is_none());
    assert!(statuses[2].is_ok());

    assert_eq!(app.assets.len(), 2);
    assert!(app.assets.get("img-2").is_none());
}

#[tokio::test]
async fn test_all_lookups_failing_keeps_session() {
    let app = setup_test_app();
    app.state
        .uploads
        .batch_upload("session-1", &[jpeg_item()])
        .await
        .unwrap();
    app.hosting.fail_fetch("img-1");

    let err = app
        .state
        .completion
        .complete("session-1", &CallerIdentity::new("user-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ExternalStoreFailed { .. }));
    assert_eq!(app.assets.len(), 0);
    assert!(app.cache.get("session-1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_retry_after_grant_failure_resumes() {
    let app = setup_test_app();
    let caller = CallerIdentity::new("user-1");
    app.state
        .uploads
        .batch_upload("session-1", &[jpeg_item()])
        .await
        .unwrap();

    app.relations.fail_add(true);
    let err = app
        .state
        .completion
        .complete("session-1", &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GrantFailed { .. }));

    app.relations.fail_add(false);
    let statuses = app.state.completion.complete("session-1", &caller).await.unwrap();

    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].is_ok());
    assert_eq!(app.assets.len(), 1);
    assert!(app.relations.is_owner("img-1", "user-1"));
    assert!(app.assets.get("img-1").unwrap().pending_owner.is_none());
    assert!(app.cache.get("session-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_retry_by_another_caller_does_not_resume() {
    let app = setup_test_app();
    app.state
        .uploads
        .batch_upload("session-1", &[jpeg_item()])
        .await
        .unwrap();

    app.relations.fail_add(true);
    app.state
        .completion
        .complete("session-1", &CallerIdentity::new("user-1"))
        .await
        .unwrap_err();

    app.relations.fail_add(false);
    let err = app
        .state
        .completion
        .complete("session-1", &CallerIdentity::new("user-2"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BulkInsertFailed { .. }));
    assert!(!app.relations.is_owner("img-1", "user-2"));
}
