//! Mock repository implementations for testing
//!
//! These mocks allow testing the engine without database dependencies.

use async_trait::async_trait;
use chrono::Utc;
use placedoc_core::models::{Department, FileRef, RejectionRecord, User};
use placedoc_core::AppError;
use placedoc_db::{DepartmentDirectory, RejectionLedger, UserDirectory};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// Mock rejection ledger enforcing one open rejection per file, like the unique index
#[derive(Clone, Default)]
pub struct MockRejectionLedger {
    records: Arc<Mutex<Vec<RejectionRecord>>>,
}

impl MockRejectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record ever written, resolved or not
    pub fn all(&self) -> Vec<RejectionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RejectionLedger for MockRejectionLedger {
    async fn record(&self, file: &FileRef, reason: &str) -> Result<RejectionRecord, AppError> {
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| !r.resolved && r.matches(file)) {
            return Err(AppError::DuplicateRejection { key: file.path() });
        }

        let record = RejectionRecord {
            id: records.len() as i64 + 1,
            department: file.identity.department.clone(),
            directory: file.identity.directory.clone(),
            roll_number: file.identity.roll_number.clone(),
            file_name: file.file_name.clone(),
            reason: reason.to_string(),
            resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn resolve(&self, file: &FileRef) -> Result<Option<RejectionRecord>, AppError> {
        let mut records = self.records.lock().unwrap();
        let newest = records
            .iter_mut()
            .filter(|r| !r.resolved && r.matches(file))
            .max_by_key(|r| (r.created_at, r.id));

        Ok(newest.map(|record| {
            record.resolved = true;
            record.resolved_at = Some(Utc::now());
            record.clone()
        }))
    }

    async fn list_unresolved(&self, roll_number: &str) -> Result<Vec<RejectionRecord>, AppError> {
        let mut open: Vec<RejectionRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.resolved && r.roll_number == roll_number)
            .cloned()
            .collect();
        open.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(open)
    }

    async fn find_unresolved(&self, file: &FileRef) -> Result<Option<RejectionRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.resolved && r.matches(file))
            .max_by_key(|r| (r.created_at, r.id))
            .cloned())
    }
}

#[derive(Clone, Default)]
pub struct MockUserDirectory {
    users: Arc<Mutex<HashMap<String, User>>>,
}

impl MockUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        self.users.lock().unwrap().insert(user.email.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().get(email).cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.email) {
            return Err(AppError::Validation(format!(
                "User {} already exists",
                user.email
            )));
        }
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockDepartmentDirectory {
    names: Arc<Mutex<BTreeSet<String>>>,
}

impl MockDepartmentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_departments(names: &[&str]) -> Self {
        let directory = Self::new();
        directory
            .names
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        directory
    }
}

#[async_trait]
impl DepartmentDirectory for MockDepartmentDirectory {
    async fn list(&self) -> Result<Vec<Department>, AppError> {
        Ok(self
            .names
            .lock()
            .unwrap()
            .iter()
            .map(|name| Department { name: name.clone() })
            .collect())
    }

    async fn insert(&self, name: &str) -> Result<bool, AppError> {
        Ok(self.names.lock().unwrap().insert(name.to_string()))
    }

    async fn exists(&self, name: &str) -> Result<bool, AppError> {
        Ok(self.names.lock().unwrap().contains(name))
    }
}
