//! Catalog: department, directory, roll-number and file enumeration.
//!
//! Directories and roll numbers are not stored anywhere; they are derived from the
//! object keys of an area on every call. Destinations of unfinished moves are hidden.

use placedoc_core::models::SubmissionIdentity;
use placedoc_core::validation::validate_segment;
use placedoc_core::{AppError, Area};
use placedoc_db::DepartmentDirectory;
use placedoc_storage::{keys, Storage};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::lifecycle::InFlightMoves;

#[derive(Clone)]
pub struct Catalog {
    storage: Arc<dyn Storage>,
    departments: Arc<dyn DepartmentDirectory>,
    in_flight: InFlightMoves,
}

impl Catalog {
    pub fn new(
        storage: Arc<dyn Storage>,
        departments: Arc<dyn DepartmentDirectory>,
        in_flight: InFlightMoves,
    ) -> Self {
        Self {
            storage,
            departments,
            in_flight,
        }
    }

    /// Keys under `prefix` that are not the destination of a move in flight
    async fn visible_keys(&self, area: Area, prefix: &str) -> Result<Vec<String>, AppError> {
        let keys = self.storage.list(area, prefix).await?;
        Ok(keys
            .into_iter()
            .filter(|key| !self.in_flight.contains(area, key))
            .collect())
    }

    pub async fn list_departments(&self) -> Result<Vec<String>, AppError> {
        let departments = self.departments.list().await?;
        let names: BTreeSet<String> = departments.into_iter().map(|d| d.name).collect();
        Ok(names.into_iter().collect())
    }

    /// Returns `false` if the department already existed
    #[tracing::instrument(skip(self))]
    pub async fn add_department(&self, name: &str) -> Result<bool, AppError> {
        validate_segment("department", name)?;
        self.departments.insert(name).await
    }

    /// Materialize `department/directory/` in the pending area. Idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn create_directory_placeholder(
        &self,
        department: &str,
        directory: &str,
    ) -> Result<String, AppError> {
        validate_segment("department", department)?;
        validate_segment("directory", directory)?;

        if !self.departments.exists(department).await? {
            return Err(AppError::NotFound(format!("Department {}", department)));
        }

        let key = keys::placeholder_key(department, directory);
        if !self.storage.exists(Area::Pending, &key).await? {
            self.storage
                .put(Area::Pending, &key, bytes::Bytes::new())
                .await
                .map_err(|e| AppError::StorageWrite(e.to_string()))?;
            tracing::info!(key = %key, "Directory created");
        }

        Ok(key)
    }

    /// Directory names under `department/`, deduplicated and sorted
    pub async fn list_directories(
        &self,
        area: Area,
        department: &str,
    ) -> Result<Vec<String>, AppError> {
        validate_segment("department", department)?;

        let prefix = keys::department_prefix(department);
        let names: BTreeSet<String> = self
            .visible_keys(area, &prefix)
            .await?
            .iter()
            .filter_map(|key| keys::folder_segment(key, 1))
            .map(str::to_string)
            .collect();

        Ok(names.into_iter().collect())
    }

    /// Roll numbers under `department/directory/`, deduplicated and sorted
    pub async fn list_roll_numbers(
        &self,
        area: Area,
        department: &str,
        directory: &str,
    ) -> Result<Vec<String>, AppError> {
        validate_segment("department", department)?;
        validate_segment("directory", directory)?;

        let prefix = keys::directory_prefix(department, directory);
        let rolls: BTreeSet<String> = self
            .visible_keys(area, &prefix)
            .await?
            .iter()
            .filter_map(|key| keys::folder_segment(key, 2))
            .map(str::to_string)
            .collect();

        Ok(rolls.into_iter().collect())
    }

    /// Full relative paths of the files in one submission, sorted
    pub async fn list_files(
        &self,
        area: Area,
        identity: &SubmissionIdentity,
    ) -> Result<Vec<String>, AppError> {
        let prefix = keys::submission_prefix(identity);
        let mut files: Vec<String> = self
            .visible_keys(area, &prefix)
            .await?
            .into_iter()
            .filter(|key| !keys::is_placeholder(key))
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }
}
