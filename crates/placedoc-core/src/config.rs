//! Configuration module
//!
//! Configuration is read from the environment (after loading `.env` through dotenvy)
//! and validated once at startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::Area;
use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MOVE_TIMEOUT_SECS: u64 = 45;
const MOVE_POLL_INITIAL_MS: u64 = 250;
const MOVE_POLL_MAX_MS: u64 = 2000;
const MOVE_POLL_BACKOFF: f64 = 2.0;
const MAX_UPLOAD_SIZE_MB: usize = 20;

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_seconds: u64,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub pending_container: String,
    pub archive_container: String,
    pub reject_container: String,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO etc.)
    pub local_storage_path: Option<String>,
}

impl StorageConfig {
    /// Container (bucket or directory) backing an area
    pub fn container(&self, area: Area) -> &str {
        match area {
            Area::Pending => &self.pending_container,
            Area::Archive => &self.archive_container,
            Area::Reject => &self.reject_container,
        }
    }
}

/// Timing of the copy-status poll used by moves.
///
/// The poll starts at `poll_initial`, multiplies by `backoff_factor` after every
/// pending status up to `poll_max`, and gives up once `timeout` has elapsed.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveConfig {
    pub timeout: Duration,
    pub poll_initial: Duration,
    pub poll_max: Duration,
    pub backoff_factor: f64,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(MOVE_TIMEOUT_SECS),
            poll_initial: Duration::from_millis(MOVE_POLL_INITIAL_MS),
            poll_max: Duration::from_millis(MOVE_POLL_MAX_MS),
            backoff_factor: MOVE_POLL_BACKOFF,
        }
    }
}

impl MoveConfig {
    /// Delay that follows `current` in the poll schedule
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.backoff_factor).min(self.poll_max)
    }
}

/// What the engine accepts on upload
#[derive(Clone, Debug, PartialEq)]
pub struct UploadPolicy {
    pub max_size_bytes: usize,
    /// Lowercased extensions without the dot. Empty means any extension.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            allowed_extensions: vec!["pdf".to_string()],
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub log_format: String,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub moves: MoveConfig,
    pub uploads: UploadPolicy,
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let backend = match env_opt("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let allowed_extensions = env::var("ALLOWED_EXTENSIONS")
            .unwrap_or_else(|_| "pdf".to_string())
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let config = Config {
            environment,
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
                max_connections: env_parse("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
                timeout_seconds: env_parse("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            },
            storage: StorageConfig {
                backend,
                pending_container: env::var("PENDING_CONTAINER")
                    .unwrap_or_else(|_| "placements-2024".to_string()),
                archive_container: env::var("ARCHIVE_CONTAINER")
                    .unwrap_or_else(|_| "archive".to_string()),
                reject_container: env::var("REJECT_CONTAINER")
                    .unwrap_or_else(|_| "reject".to_string()),
                s3_region: env_opt("S3_REGION").or_else(|| env_opt("AWS_REGION")),
                s3_endpoint: env_opt("S3_ENDPOINT"),
                local_storage_path: env_opt("LOCAL_STORAGE_PATH"),
            },
            moves: MoveConfig {
                timeout: Duration::from_secs(env_parse("MOVE_TIMEOUT_SECS", MOVE_TIMEOUT_SECS)),
                poll_initial: Duration::from_millis(env_parse(
                    "MOVE_POLL_INITIAL_MS",
                    MOVE_POLL_INITIAL_MS,
                )),
                poll_max: Duration::from_millis(env_parse("MOVE_POLL_MAX_MS", MOVE_POLL_MAX_MS)),
                backoff_factor: env_parse("MOVE_POLL_BACKOFF", MOVE_POLL_BACKOFF),
            },
            uploads: UploadPolicy {
                max_size_bytes: env_parse("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB) * 1024 * 1024,
                allowed_extensions,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database.url.starts_with("postgres://")
            && !self.database.url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        let containers = [
            &self.storage.pending_container,
            &self.storage.archive_container,
            &self.storage.reject_container,
        ];
        if containers.iter().any(|c| c.trim().is_empty()) {
            return Err(anyhow::anyhow!("Container names must not be empty"));
        }
        if containers[0] == containers[1]
            || containers[0] == containers[2]
            || containers[1] == containers[2]
        {
            return Err(anyhow::anyhow!(
                "PENDING_CONTAINER, ARCHIVE_CONTAINER and REJECT_CONTAINER must be distinct"
            ));
        }

        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "The memory storage backend cannot be used in production"
                    ));
                }
            }
        }

        if self.moves.timeout.is_zero() {
            return Err(anyhow::anyhow!("MOVE_TIMEOUT_SECS must be greater than 0"));
        }
        if self.moves.poll_initial.is_zero() || self.moves.poll_initial > self.moves.poll_max {
            return Err(anyhow::anyhow!(
                "MOVE_POLL_INITIAL_MS must be greater than 0 and not exceed MOVE_POLL_MAX_MS"
            ));
        }
        if self.moves.backoff_factor < 1.0 {
            return Err(anyhow::anyhow!("MOVE_POLL_BACKOFF must be at least 1.0"));
        }

        Ok(())
    }
}
