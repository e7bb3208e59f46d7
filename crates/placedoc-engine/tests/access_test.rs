//! Role and catalog integration tests.
//!
//! Run with: `cargo test -p placedoc-engine --test access_test`

mod helpers;

use bytes::Bytes;
use helpers::{file, setup_test_app, DEPARTMENT, DIRECTORY};
use placedoc_core::models::NewUser;
use placedoc_core::{AppError, Area, Role, SubmissionIdentity};
use std::io::Read;

#[tokio::test]
async fn test_uploader_cannot_manage_files() {
    let app = setup_test_app().await;

    let archive = app.service.archive(&app.uploader, &[file("101/CS/101/a.pdf")]).await;
    assert!(matches!(archive, Err(AppError::Forbidden(_))));

    let rolls = app
        .service
        .list_roll_numbers(&app.uploader, Area::Pending, DEPARTMENT, DIRECTORY)
        .await;
    assert!(matches!(rolls, Err(AppError::Forbidden(_))));

    // Directory names are visible so an upload target can be chosen
    let dirs = app
        .service
        .list_directories(&app.uploader, Area::Pending, DEPARTMENT)
        .await
        .unwrap();
    assert_eq!(dirs, vec![DIRECTORY]);
}

#[tokio::test]
async fn test_admin_only_administers() {
    let app = setup_test_app().await;

    let upload = app
        .service
        .upload(&app.admin, DEPARTMENT, DIRECTORY, "a.pdf", Bytes::from_static(b"pdf"))
        .await;
    assert!(matches!(upload, Err(AppError::Forbidden(_))));

    let add = app.service.add_department(&app.manager, "ECE").await;
    assert!(matches!(add, Err(AppError::Forbidden(_))));

    assert!(app.service.add_department(&app.admin, "ECE").await.unwrap());
    assert_eq!(
        app.service.list_departments(&app.uploader).await.unwrap(),
        vec!["101", "ECE"]
    );
}

#[tokio::test]
async fn test_upload_goes_to_own_roll_number() {
    let app = setup_test_app().await;

    let ack = app
        .service
        .upload(&app.manager, DEPARTMENT, DIRECTORY, "cv.pdf", Bytes::from_static(b"pdf"))
        .await
        .unwrap();
    assert_eq!(ack.key, "101/CS/401/cv.pdf");
}

#[tokio::test]
async fn test_upload_into_unknown_directory_fails() {
    let app = setup_test_app().await;

    let err = app
        .service
        .upload(&app.uploader, DEPARTMENT, "Nowhere", "a.pdf", Bytes::from_static(b"pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_accessor_browses_archive_only() {
    let app = setup_test_app().await;
    app.service
        .upload(&app.uploader, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"one"))
        .await
        .unwrap();
    app.service
        .upload(&app.manager, DEPARTMENT, DIRECTORY, "resume.pdf", Bytes::from_static(b"two"))
        .await
        .unwrap();
    app.service
        .archive(
            &app.manager,
            &[file("101/CS/101/resume.pdf"), file("101/CS/401/resume.pdf")],
        )
        .await
        .unwrap();

    let pending = app
        .service
        .list_roll_numbers(&app.accessor, Area::Pending, DEPARTMENT, DIRECTORY)
        .await;
    assert!(matches!(pending, Err(AppError::Forbidden(_))));

    let rolls = app
        .service
        .list_roll_numbers(&app.accessor, Area::Archive, DEPARTMENT, DIRECTORY)
        .await
        .unwrap();
    assert_eq!(rolls, vec!["101", "401"]);

    let identity = SubmissionIdentity::new(DEPARTMENT, DIRECTORY, "101").unwrap();
    let files = app
        .service
        .list_files(&app.accessor, Area::Archive, &identity)
        .await
        .unwrap();
    assert_eq!(files, vec!["101/CS/101/resume.pdf"]);

    let bundle = app
        .service
        .download_bundle(
            &app.accessor,
            Area::Archive,
            &[file("101/CS/101/resume.pdf"), file("101/CS/401/resume.pdf")],
        )
        .await
        .unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bundle)).unwrap();
    let mut content = String::new();
    archive
        .by_name("401_resume.pdf")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "two");
}

#[tokio::test]
async fn test_admin_adds_user_who_can_log_in() {
    let app = setup_test_app().await;

    app.service
        .add_user(
            &app.admin,
            NewUser {
                email: "new@example.com".to_string(),
                password: "pw".to_string(),
                role: Role::Accessor,
                name: "New".to_string(),
                roll_number: "555".to_string(),
            },
        )
        .await
        .unwrap();

    let ctx = app.service.login("new@example.com", "pw").await.unwrap();
    assert_eq!(ctx.principal.role, Role::Accessor);

    let again = app.service.login("new@example.com", "wrong").await;
    assert!(matches!(again, Err(AppError::Unauthorized(_))));
}
