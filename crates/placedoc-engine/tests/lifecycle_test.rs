//! File lifecycle integration tests.
//!
//! Run with: `cargo test -p placedoc-engine --test lifecycle_test`

mod helpers;

use bytes::Bytes;
use helpers::{file, setup_test_app, DEPARTMENT, DIRECTORY};
use placedoc_core::{AppError, Area};
use placedoc_engine::test_helpers::CopyFault;
use placedoc_engine::{MoveControl, MoveState};
use placedoc_storage::Storage;

const RESUME: &str = "101/CS/101/resume.pdf";

#[tokio::test]
async fn test_reject_then_reupload_resolves_rejection() {
    let app = setup_test_app().await;
    let service = &app.service;

    service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"v1"))
        .await
        .unwrap();

    let results = service
        .reject(&app.manager, &[file(RESUME)], "Wrong format")
        .await
        .unwrap();
    assert!(results[0].is_ok());

    assert!(app.storage.exists(Area::Reject, RESUME).await.unwrap());
    assert!(!app.storage.exists(Area::Pending, RESUME).await.unwrap());
    let open = service.my_rejections(&app.uploader).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].file_name, "resume.pdf");
    assert_eq!(open[0].reason, "Wrong format");
    assert!(!open[0].resolved);

    let ack = service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"v2"))
        .await
        .unwrap();
    assert!(ack.resolved_rejection);

    assert!(service.my_rejections(&app.uploader).await.unwrap().is_empty());
    let records = app.ledger.all();
    assert_eq!(records.len(), 1);
    assert!(records[0].resolved);
    assert!(records[0].resolved_at.is_some());
    let data = app.storage.get(Area::Pending, RESUME).await.unwrap();
    assert_eq!(&data[..], b"v2");
}

#[tokio::test]
async fn test_second_reupload_is_noop() {
    let app = setup_test_app().await;
    let service = &app.service;

    service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"v1"))
        .await
        .unwrap();
    service
        .reject(&app.manager, &[file(RESUME)], "Wrong format")
        .await
        .unwrap();

    let first = service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"v2"))
        .await
        .unwrap();
    let resolved_at = app.ledger.all()[0].resolved_at;

    let second = service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"v3"))
        .await
        .unwrap();

    assert!(first.resolved_rejection);
    assert!(!second.resolved_rejection);
    assert_eq!(app.ledger.all().len(), 1);
    assert_eq!(app.ledger.all()[0].resolved_at, resolved_at);
}

#[tokio::test]
async fn test_archive_moves_file() {
    let app = setup_test_app().await;
    let service = &app.service;

    service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"pdf"))
        .await
        .unwrap();

    let results = service.archive(&app.manager, &[file(RESUME)]).await.unwrap();
    let ack = results.into_iter().next().unwrap().unwrap();
    assert_eq!(ack.area, Area::Archive);

    assert!(!app.storage.exists(Area::Pending, RESUME).await.unwrap());
    assert!(app.storage.exists(Area::Archive, RESUME).await.unwrap());
    assert!(app.ledger.all().is_empty());
}

#[tokio::test]
async fn test_archive_missing_source_changes_nothing() {
    let app = setup_test_app().await;

    let pending_before = app.storage.list(Area::Pending, "").await.unwrap();
    let results = app
        .service
        .archive(&app.manager, &[file(RESUME)])
        .await
        .unwrap();

    assert!(matches!(results[0], Err(AppError::NotFound(_))));
    assert_eq!(app.storage.list(Area::Pending, "").await.unwrap(), pending_before);
    assert!(app.storage.list(Area::Archive, "").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_copy_that_never_completes_times_out() {
    let app = setup_test_app().await;
    app.service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"pdf"))
        .await
        .unwrap();
    app.storage.set_copy_fault(CopyFault::NeverCompletes);

    let results = app
        .service
        .archive(&app.manager, &[file(RESUME)])
        .await
        .unwrap();

    assert!(matches!(results[0], Err(AppError::MoveTimeout { .. })));
    assert!(app.storage.exists(Area::Pending, RESUME).await.unwrap());
    assert!(!app.storage.exists(Area::Archive, RESUME).await.unwrap());
}

#[tokio::test]
async fn test_cancelled_move_leaves_source() {
    let app = setup_test_app().await;
    app.service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"pdf"))
        .await
        .unwrap();
    app.storage.set_copy_fault(CopyFault::NeverCompletes);

    let control = MoveControl::new();
    let mut progress = control.subscribe();
    let engine = app.service.engine().clone();
    let task = {
        let control = control.clone();
        tokio::spawn(async move { engine.move_to_archive_with(&file(RESUME), &control).await })
    };

    progress
        .wait_for(|state| *state == MoveState::CopyInFlight)
        .await
        .unwrap();
    control.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, AppError::MoveCancelled(_)));
    assert_eq!(control.state(), MoveState::Failed);
    assert!(app.storage.exists(Area::Pending, RESUME).await.unwrap());
    assert!(!app.storage.exists(Area::Archive, RESUME).await.unwrap());
}

#[tokio::test]
async fn test_failed_source_delete_needs_reconciliation() {
    let app = setup_test_app().await;
    app.service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"pdf"))
        .await
        .unwrap();
    app.storage.fail_deletes_in(Area::Pending);

    let results = app
        .service
        .reject(&app.manager, &[file(RESUME)], "Wrong format")
        .await
        .unwrap();

    assert!(matches!(results[0], Err(AppError::ReconciliationRequired(_))));
    // No rejection is recorded for a move that did not complete
    assert!(app.ledger.all().is_empty());
}

#[tokio::test]
async fn test_duplicate_rejection_leaves_storage_untouched() {
    let app = setup_test_app().await;
    let service = &app.service;
    service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"v1"))
        .await
        .unwrap();
    service
        .reject(&app.manager, &[file(RESUME)], "Wrong format")
        .await
        .unwrap();

    // The file reappears in pending without a re-upload through the engine
    app.storage
        .put(Area::Pending, RESUME, Bytes::from_static(b"v2"))
        .await
        .unwrap();

    let results = service
        .reject(&app.manager, &[file(RESUME)], "Still wrong")
        .await
        .unwrap();

    assert!(matches!(
        results[0],
        Err(AppError::DuplicateRejection { .. })
    ));
    assert!(app.storage.exists(Area::Pending, RESUME).await.unwrap());
    let rejected = app.storage.get(Area::Reject, RESUME).await.unwrap();
    assert_eq!(&rejected[..], b"v1");
}

#[tokio::test]
async fn test_batch_reports_each_file() {
    let app = setup_test_app().await;
    let service = &app.service;
    for name in ["resume.pdf", "offer.pdf"] {
        service
            .upload(&app.uploader, DEPARTMENT, DIRECTORY, name, Bytes::from_static(b"pdf"))
            .await
            .unwrap();
    }

    let results = service
        .reject(
            &app.manager,
            &[
                file("101/CS/101/resume.pdf"),
                file("101/CS/101/missing.pdf"),
                file("101/CS/101/offer.pdf"),
            ],
            "Unsigned",
        )
        .await
        .unwrap();

    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(AppError::NotFound(_))));
    assert!(results[2].is_ok());
    assert_eq!(service.my_rejections(&app.uploader).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_upload_racing_reject_keeps_ledger_consistent() {
    let app = setup_test_app().await;
    app.service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"v1"))
        .await
        .unwrap();

    let engine = app.service.engine().clone();
    let reject = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.reject(&file(RESUME), "Wrong format").await })
    };
    let upload = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.upload(&file(RESUME), Bytes::from_static(b"v2")).await })
    };

    reject.await.unwrap().unwrap();
    upload.await.unwrap().unwrap();

    // Whichever ran first, an open rejection means the file is not pending
    let open = engine.list_unresolved_rejections("101").await.unwrap();
    let pending = app.storage.exists(Area::Pending, RESUME).await.unwrap();
    assert_eq!(open.is_empty(), pending);
}

#[tokio::test]
async fn test_placeholder_listed_once() {
    let app = setup_test_app().await;

    // Created once in setup; creating again is a no-op
    app.service
        .create_directory(&app.admin, DEPARTMENT, DIRECTORY)
        .await
        .unwrap();

    let dirs = app
        .service
        .list_directories(&app.manager, Area::Pending, DEPARTMENT)
        .await
        .unwrap();
    assert_eq!(dirs, vec![DIRECTORY]);
    assert!(app
        .service
        .list_roll_numbers(&app.manager, Area::Pending, DEPARTMENT, DIRECTORY)
        .await
        .unwrap()
        .is_empty());
}
