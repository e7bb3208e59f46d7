//! Shared setup for engine integration tests.

#![allow(dead_code)]

use placedoc_core::models::{FileRef, Role};
use placedoc_core::UploadPolicy;
use placedoc_engine::test_helpers::{
    quick_move_config, test_user, FaultyStorage, MockDepartmentDirectory, MockRejectionLedger,
    MockUserDirectory,
};
use placedoc_engine::{PlacementService, RequestContext};
use std::sync::Arc;

pub const DEPARTMENT: &str = "101";
pub const DIRECTORY: &str = "CS";
pub const ROLL_NUMBER: &str = "101";

pub struct TestApp {
    pub service: PlacementService,
    pub storage: Arc<FaultyStorage>,
    pub ledger: MockRejectionLedger,
    pub admin: RequestContext,
    pub uploader: RequestContext,
    pub accessor: RequestContext,
    pub manager: RequestContext,
}

/// Service over in-memory doubles, with department `101` and directory `101/CS`
/// created and one logged-in user per role
pub async fn setup_test_app() -> TestApp {
    let storage = Arc::new(FaultyStorage::in_memory());
    let ledger = MockRejectionLedger::new();
    let users = MockUserDirectory::new();
    users.add_user(test_user("admin@example.com", "admin-pw", Role::Admin, "0"));
    users.add_user(test_user(
        "uploader@example.com",
        "uploader-pw",
        Role::Uploader,
        ROLL_NUMBER,
    ));
    users.add_user(test_user(
        "accessor@example.com",
        "accessor-pw",
        Role::Accessor,
        "301",
    ));
    users.add_user(test_user(
        "manager@example.com",
        "manager-pw",
        Role::Manager,
        "401",
    ));

    let service = PlacementService::new(
        storage.clone(),
        Arc::new(ledger.clone()),
        Arc::new(users),
        Arc::new(MockDepartmentDirectory::new()),
        quick_move_config(),
        UploadPolicy::default(),
    );

    let admin = service
        .login("admin@example.com", "admin-pw")
        .await
        .unwrap();
    let uploader = service
        .login("uploader@example.com", "uploader-pw")
        .await
        .unwrap();
    let accessor = service
        .login("accessor@example.com", "accessor-pw")
        .await
        .unwrap();
    let manager = service
        .login("manager@example.com", "manager-pw")
        .await
        .unwrap();

    service.add_department(&admin, DEPARTMENT).await.unwrap();
    service
        .create_directory(&admin, DEPARTMENT, DIRECTORY)
        .await
        .unwrap();

    TestApp {
        service,
        storage,
        ledger,
        admin,
        uploader,
        accessor,
        manager,
    }
}

pub fn file(path: &str) -> FileRef {
    FileRef::parse(path).unwrap()
}
