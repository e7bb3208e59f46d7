//! Shared wiring for the placedoc command-line front end.

use anyhow::Context;
use placedoc_core::models::{FileRef, Principal, User};
use placedoc_core::{AppError, Config, ErrorMetadata, LogLevel, Role};
use placedoc_db::{DepartmentRepository, RejectionRepository, UserRepository};
use placedoc_engine::{hash_password, Ack, PlacementService};
use futures::StreamExt;
use placedoc_storage::{create_storage, ByteStream};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Initialize tracing for CLI binaries. `LOG_FORMAT=json` selects JSON lines.
pub fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Connect to Postgres and storage and assemble the service
pub async fn build_service(config: &Config) -> anyhow::Result<PlacementService> {
    let pool = placedoc_db::connect(&config.database).await?;
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage")?;

    tracing::info!(
        backend = %storage.backend_type(),
        environment = %config.environment,
        "Storage initialized"
    );

    Ok(PlacementService::from_config(
        config,
        storage,
        Arc::new(RejectionRepository::new(pool.clone())),
        Arc::new(UserRepository::new(pool.clone())),
        Arc::new(DepartmentRepository::new(pool)),
    ))
}

/// Create an admin account directly in the database.
///
/// Used once after `migrate` so that the first admin can log in and add everyone else.
pub async fn seed_admin(
    config: &Config,
    email: &str,
    password: &str,
    name: &str,
) -> anyhow::Result<Principal> {
    let pool = placedoc_db::connect(&config.database).await?;
    let user = User {
        email: email.trim().to_string(),
        password_hash: hash_password(password).map_err(user_error)?,
        role: Role::Admin,
        name: name.to_string(),
        roll_number: ADMIN_ROLL_NUMBER.to_string(),
    };
    UserRepository::new(pool)
        .insert(&user)
        .await
        .map_err(user_error)?;

    tracing::info!(email = %user.email, "Admin account created");
    Ok(user.into())
}

/// Roll number recorded for seeded admin accounts
pub const ADMIN_ROLL_NUMBER: &str = "admin";

/// Parse `department/directory/roll_number/file_name` arguments
pub fn parse_files(paths: &[String]) -> Result<Vec<FileRef>, AppError> {
    paths.iter().map(|p| FileRef::parse(p)).collect()
}

/// One line of batch output
#[derive(Debug, Serialize, PartialEq)]
pub struct ItemReport {
    pub key: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<&'static str>,
    /// Whether retrying the same item may succeed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ItemReport {
    pub fn from_result(file: &FileRef, result: &Result<Ack, AppError>) -> Self {
        match result {
            Ok(ack) => Self {
                key: ack.key.clone(),
                ok: true,
                error_code: None,
                message: None,
                suggested_action: None,
                retryable: None,
            },
            Err(err) => {
                log_error(err);
                Self {
                    key: file.path(),
                    ok: false,
                    error_code: Some(err.error_code()),
                    message: Some(err.client_message()),
                    suggested_action: err.suggested_action(),
                    retryable: Some(err.is_recoverable()),
                }
            }
        }
    }
}

/// Log an error at the level its kind calls for, with its source chain
pub fn log_error(err: &AppError) {
    let code = err.error_code();
    let details = err.detailed_message();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(error_code = code, error = %details, "Request failed"),
        LogLevel::Warn => tracing::warn!(error_code = code, error = %details, "Request failed"),
        LogLevel::Error => tracing::error!(error_code = code, error = %details, "Request failed"),
    }
}

/// Write a downloaded stream to `path`, returning the number of bytes written
pub async fn write_stream(mut stream: ByteStream, path: &Path) -> anyhow::Result<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| user_error(e.into()))?;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(written)
}

/// Render an error the way a user should see it
pub fn user_error(err: AppError) -> anyhow::Error {
    log_error(&err);
    match err.suggested_action() {
        Some(action) => anyhow::anyhow!("{} [{}] {}", err.client_message(), err.error_code(), action),
        None => anyhow::anyhow!("{} [{}]", err.client_message(), err.error_code()),
    }
}
