//! Request-scoped facade over the engine, the catalog and authentication.
//!
//! Every call takes the caller's [`RequestContext`] and checks the role's
//! capabilities before touching storage or the database.

use bytes::Bytes;
use placedoc_core::models::{Capability, FileRef, NewUser, Principal, RejectionRecord};
use placedoc_core::{AppError, Area, Config, MoveConfig, SubmissionIdentity, UploadPolicy};
use placedoc_db::{DepartmentDirectory, RejectionLedger, UserDirectory};
use placedoc_storage::{ByteStream, Storage};
use std::sync::Arc;

use crate::access::{Authenticator, RequestContext};
use crate::bundle::bundle_zip;
use crate::catalog::Catalog;
use crate::lifecycle::{Ack, LifecycleEngine};

#[derive(Clone)]
pub struct PlacementService {
    engine: LifecycleEngine,
    catalog: Catalog,
    auth: Authenticator,
}

impl PlacementService {
    pub fn new(
        storage: Arc<dyn Storage>,
        ledger: Arc<dyn RejectionLedger>,
        users: Arc<dyn UserDirectory>,
        departments: Arc<dyn DepartmentDirectory>,
        moves: MoveConfig,
        uploads: UploadPolicy,
    ) -> Self {
        let engine = LifecycleEngine::new(storage.clone(), ledger, moves, uploads);
        let catalog = Catalog::new(storage, departments, engine.in_flight());
        Self {
            engine,
            catalog,
            auth: Authenticator::new(users),
        }
    }

    pub fn from_config(
        config: &Config,
        storage: Arc<dyn Storage>,
        ledger: Arc<dyn RejectionLedger>,
        users: Arc<dyn UserDirectory>,
        departments: Arc<dyn DepartmentDirectory>,
    ) -> Self {
        Self::new(
            storage,
            ledger,
            users,
            departments,
            config.moves.clone(),
            config.uploads.clone(),
        )
    }

    pub fn engine(&self) -> &LifecycleEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Authenticate and open a request context
    pub async fn login(&self, email: &str, password: &str) -> Result<RequestContext, AppError> {
        let principal = self.auth.authenticate(email, password).await?;
        Ok(RequestContext::new(principal))
    }

    /// Upload into the caller's own submission under `department/directory`
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, email = %ctx.principal.email))]
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        department: &str,
        directory: &str,
        file_name: &str,
        content: Bytes,
    ) -> Result<Ack, AppError> {
        ctx.require(Capability::Upload)?;

        let identity =
            SubmissionIdentity::new(department, directory, ctx.principal.roll_number.as_str())?;
        let file = FileRef::new(identity, file_name)?;

        let directories = self
            .catalog
            .list_directories(Area::Pending, department)
            .await?;
        if !directories.iter().any(|d| d == directory) {
            return Err(AppError::NotFound(format!(
                "Directory {}/{}",
                department, directory
            )));
        }

        self.engine.upload(&file, content).await
    }

    /// Open rejections of the caller's own roll number
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, email = %ctx.principal.email))]
    pub async fn my_rejections(&self, ctx: &RequestContext) -> Result<Vec<RejectionRecord>, AppError> {
        ctx.require(Capability::Upload)?;
        self.engine
            .list_unresolved_rejections(&ctx.principal.roll_number)
            .await
    }

    /// Archive each selected pending file; one result per file
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, email = %ctx.principal.email, files = files.len()))]
    pub async fn archive(
        &self,
        ctx: &RequestContext,
        files: &[FileRef],
    ) -> Result<Vec<Result<Ack, AppError>>, AppError> {
        ctx.require(Capability::ManageFiles)?;
        Ok(self.engine.archive_many(files).await)
    }

    /// Reject each selected pending file with the same reason; one result per file
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, email = %ctx.principal.email, files = files.len()))]
    pub async fn reject(
        &self,
        ctx: &RequestContext,
        files: &[FileRef],
        reason: &str,
    ) -> Result<Vec<Result<Ack, AppError>>, AppError> {
        ctx.require(Capability::ManageFiles)?;
        placedoc_core::validation::validate_reason(reason)?;
        Ok(self.engine.reject_many(files, reason).await)
    }

    pub async fn list_departments(&self, _ctx: &RequestContext) -> Result<Vec<String>, AppError> {
        self.catalog.list_departments().await
    }

    pub async fn list_directories(
        &self,
        ctx: &RequestContext,
        area: Area,
        department: &str,
    ) -> Result<Vec<String>, AppError> {
        ctx.require_list_directories(area)?;
        self.catalog.list_directories(area, department).await
    }

    pub async fn list_roll_numbers(
        &self,
        ctx: &RequestContext,
        area: Area,
        department: &str,
        directory: &str,
    ) -> Result<Vec<String>, AppError> {
        ctx.require_browse(area)?;
        self.catalog
            .list_roll_numbers(area, department, directory)
            .await
    }

    pub async fn list_files(
        &self,
        ctx: &RequestContext,
        area: Area,
        identity: &SubmissionIdentity,
    ) -> Result<Vec<String>, AppError> {
        ctx.require_browse(area)?;
        self.catalog.list_files(area, identity).await
    }

    pub async fn download(
        &self,
        ctx: &RequestContext,
        area: Area,
        file: &FileRef,
    ) -> Result<ByteStream, AppError> {
        ctx.require_browse(area)?;
        self.engine.download(area, file).await
    }

    /// Zip the selected files of `area`
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, area = %area, files = files.len()))]
    pub async fn download_bundle(
        &self,
        ctx: &RequestContext,
        area: Area,
        files: &[FileRef],
    ) -> Result<Vec<u8>, AppError> {
        ctx.require_browse(area)?;
        if files.is_empty() {
            return Err(AppError::Validation(
                "Select at least one file to download".to_string(),
            ));
        }
        Ok(bundle_zip(self.engine.storage(), area, files).await?)
    }

    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, department = %name))]
    pub async fn add_department(&self, ctx: &RequestContext, name: &str) -> Result<bool, AppError> {
        ctx.require(Capability::Administer)?;
        self.catalog.add_department(name).await
    }

    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, department = %department, directory = %directory))]
    pub async fn create_directory(
        &self,
        ctx: &RequestContext,
        department: &str,
        directory: &str,
    ) -> Result<String, AppError> {
        ctx.require(Capability::Administer)?;
        self.catalog
            .create_directory_placeholder(department, directory)
            .await
    }

    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id))]
    pub async fn add_user(
        &self,
        ctx: &RequestContext,
        new_user: NewUser,
    ) -> Result<Principal, AppError> {
        ctx.require(Capability::Administer)?;
        self.auth.add_user(new_user).await
    }
}
