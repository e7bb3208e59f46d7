use crate::traits::{
    ByteStream, CopyId, CopyState, ObjectProperties, Storage, StorageError, StorageResult,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use placedoc_core::{Area, StorageConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;
use uuid::Uuid;

/// Object name used for directory placeholders.
///
/// `object_store` paths cannot end in a delimiter, so the placeholder `CS/Drive/`
/// is stored as `CS/Drive/.placeholder` and reported back as `CS/Drive/`.
pub const PLACEHOLDER_MARKER: &str = ".placeholder";

struct CopyJob {
    id: CopyId,
    state: CopyState,
    abort: Option<AbortHandle>,
}

type CopyJobs = Arc<Mutex<HashMap<(Area, String), CopyJob>>>;

/// Storage over three `object_store` containers, one per area.
///
/// Copies between areas run on a spawned task; their state is kept per destination
/// key and reported by [`Storage::properties`] until the key is written or deleted.
#[derive(Clone)]
pub struct ObjectStoreStorage {
    pending: Arc<dyn ObjectStore>,
    archive: Arc<dyn ObjectStore>,
    reject: Arc<dyn ObjectStore>,
    copies: CopyJobs,
    backend: StorageBackend,
}

impl ObjectStoreStorage {
    pub fn new(
        backend: StorageBackend,
        pending: Arc<dyn ObjectStore>,
        archive: Arc<dyn ObjectStore>,
        reject: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            pending,
            archive,
            reject,
            copies: Arc::new(Mutex::new(HashMap::new())),
            backend,
        }
    }

    /// Three independent in-process stores
    pub fn in_memory() -> Self {
        Self::new(
            StorageBackend::Memory,
            Arc::new(InMemory::new()),
            Arc::new(InMemory::new()),
            Arc::new(InMemory::new()),
        )
    }

    /// One directory per container below `base_path`
    #[cfg(feature = "storage-local")]
    pub async fn local(
        base_path: impl Into<std::path::PathBuf>,
        config: &StorageConfig,
    ) -> StorageResult<Self> {
        use object_store::local::LocalFileSystem;

        let base_path = base_path.into();
        let mut stores: Vec<Arc<dyn ObjectStore>> = Vec::with_capacity(3);

        for area in Area::ALL {
            let dir = base_path.join(config.container(area));
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            let store = LocalFileSystem::new_with_prefix(&dir)
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;
            stores.push(Arc::new(store));
        }

        let reject = stores.pop();
        let archive = stores.pop();
        let pending = stores.pop();
        match (pending, archive, reject) {
            (Some(pending), Some(archive), Some(reject)) => Ok(Self::new(
                StorageBackend::Local,
                pending,
                archive,
                reject,
            )),
            _ => Err(StorageError::ConfigError(
                "Failed to initialize local storage areas".to_string(),
            )),
        }
    }

    /// One bucket per container
    ///
    /// `endpoint_url` is only needed for S3-compatible providers
    /// (e.g. "http://localhost:9000" for MinIO).
    #[cfg(feature = "storage-s3")]
    pub fn s3(config: &StorageConfig) -> StorageResult<Self> {
        use object_store::aws::AmazonS3Builder;

        let region = config.s3_region.clone().ok_or_else(|| {
            StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
        })?;

        let build = |bucket: &str| -> StorageResult<Arc<dyn ObjectStore>> {
            let mut builder = AmazonS3Builder::from_env()
                .with_region(region.clone())
                .with_bucket_name(bucket.to_string());

            if let Some(ref endpoint) = config.s3_endpoint {
                let allow_http = endpoint.starts_with("http://");
                builder = builder
                    .with_endpoint(endpoint.clone())
                    .with_allow_http(allow_http);
            }

            let store = builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;
            Ok(Arc::new(store))
        };

        Ok(Self::new(
            StorageBackend::S3,
            build(config.container(Area::Pending))?,
            build(config.container(Area::Archive))?,
            build(config.container(Area::Reject))?,
        ))
    }

    fn store(&self, area: Area) -> &Arc<dyn ObjectStore> {
        match area {
            Area::Pending => &self.pending,
            Area::Archive => &self.archive,
            Area::Reject => &self.reject,
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<(Area, String), CopyJob>> {
        self.copies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Convert a key to an object path, rejecting traversal and empty segments
    fn to_path(key: &str) -> StorageResult<Path> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|segment| segment == "." || segment == "..")
        {
            return Err(StorageError::InvalidKey(format!(
                "Storage key contains invalid characters: {}",
                key
            )));
        }

        let raw = if key.ends_with('/') {
            format!("{}{}", key, PLACEHOLDER_MARKER)
        } else {
            if key.rsplit('/').next() == Some(PLACEHOLDER_MARKER) {
                return Err(StorageError::InvalidKey(format!(
                    "{} is a reserved name",
                    PLACEHOLDER_MARKER
                )));
            }
            key.to_string()
        };

        Path::parse(raw).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }

    fn to_key(path: &Path) -> String {
        let raw = path.as_ref();
        match raw.strip_suffix(PLACEHOLDER_MARKER) {
            Some(prefix) if prefix.is_empty() || prefix.ends_with('/') => prefix.to_string(),
            _ => raw.to_string(),
        }
    }

    fn forget_copy(&self, area: Area, key: &str) {
        if let Some(job) = self.jobs().remove(&(area, key.to_string())) {
            if let Some(handle) = job.abort {
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl Storage for ObjectStoreStorage {
    async fn put(&self, area: Area, key: &str, data: Bytes) -> StorageResult<()> {
        let location = Self::to_path(key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        // A fresh write supersedes any copy that targeted the key
        self.forget_copy(area, key);

        self.store(area)
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    area = %area,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Storage put failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            area = %area,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage put successful"
        );

        Ok(())
    }

    async fn get(&self, area: Area, key: &str) -> StorageResult<Bytes> {
        let location = Self::to_path(key)?;
        let start = std::time::Instant::now();

        let result = self.store(area).get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    area = %area,
                    key = %key,
                    "Storage get failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            area = %area,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage get successful"
        );

        Ok(bytes)
    }

    async fn get_stream(&self, area: Area, key: &str) -> StorageResult<ByteStream> {
        let location = Self::to_path(key)?;

        let result = self.store(area).get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let key = key.to_string();
        let stream = result.into_stream().map(move |res| {
            res.map_err(|e| {
                tracing::error!(area = %area, key = %key, error = %e, "Storage stream error");
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(stream.boxed())
    }

    async fn list(&self, area: Area, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix_path = if prefix.is_empty() {
            None
        } else {
            if !prefix.ends_with('/') {
                return Err(StorageError::InvalidKey(format!(
                    "List prefix must end in '/': {}",
                    prefix
                )));
            }
            Some(Path::parse(prefix).map_err(|e| StorageError::InvalidKey(e.to_string()))?)
        };

        let metas: Vec<_> = self
            .store(area)
            .list(prefix_path.as_ref())
            .try_collect()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let mut keys: Vec<String> = metas.iter().map(|m| Self::to_key(&m.location)).collect();
        keys.sort();
        Ok(keys)
    }

    async fn properties(&self, area: Area, key: &str) -> StorageResult<ObjectProperties> {
        let location = Self::to_path(key)?;
        let head = self.store(area).head(&location).await;
        let copy = self
            .jobs()
            .get(&(area, key.to_string()))
            .map(|job| (job.id, job.state.clone()));

        match head {
            Ok(meta) => Ok(ObjectProperties {
                key: key.to_string(),
                size: Some(meta.size as u64),
                last_modified: Some(meta.last_modified),
                copy,
            }),
            Err(ObjectStoreError::NotFound { .. }) => match copy {
                Some(copy) => Ok(ObjectProperties {
                    key: key.to_string(),
                    size: None,
                    last_modified: None,
                    copy: Some(copy),
                }),
                None => Err(StorageError::NotFound(key.to_string())),
            },
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn exists(&self, area: Area, key: &str) -> StorageResult<bool> {
        let location = Self::to_path(key)?;
        match self.store(area).head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn start_copy(
        &self,
        from_area: Area,
        to_area: Area,
        key: &str,
    ) -> StorageResult<CopyId> {
        let location = Self::to_path(key)?;
        let source = self.store(from_area).clone();
        let destination = self.store(to_area).clone();

        match source.head(&location).await {
            Ok(_) => {}
            Err(ObjectStoreError::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::BackendError(e.to_string())),
        }

        let id = Uuid::new_v4();
        let slot = (to_area, key.to_string());

        // Register before spawning so the first poll already sees the copy
        if let Some(previous) = self.jobs().insert(
            slot.clone(),
            CopyJob {
                id,
                state: CopyState::Pending,
                abort: None,
            },
        ) {
            if let Some(handle) = previous.abort {
                handle.abort();
            }
        }

        let copies = self.copies.clone();
        let task_slot = slot.clone();
        let handle = tokio::spawn(async move {
            let outcome = async {
                let data = source.get(&location).await?.bytes().await?;
                destination.put(&location, PutPayload::from(data)).await?;
                Ok::<(), ObjectStoreError>(())
            }
            .await;

            let mut jobs = copies.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(job) = jobs.get_mut(&task_slot) {
                if job.id == id && job.state == CopyState::Pending {
                    job.state = match outcome {
                        Ok(()) => CopyState::Success,
                        Err(e) => {
                            tracing::warn!(
                                copy_id = %id,
                                key = %task_slot.1,
                                error = %e,
                                "Server-side copy failed"
                            );
                            CopyState::Failed(e.to_string())
                        }
                    };
                    job.abort = None;
                }
            }
        });

        if let Some(job) = self.jobs().get_mut(&slot) {
            if job.id == id && job.state == CopyState::Pending {
                job.abort = Some(handle.abort_handle());
            }
        }

        tracing::debug!(
            copy_id = %id,
            from_area = %from_area,
            to_area = %to_area,
            key = %key,
            "Server-side copy started"
        );

        Ok(id)
    }

    async fn abort_copy(&self, to_area: Area, key: &str) -> StorageResult<()> {
        Self::to_path(key)?;

        if let Some(job) = self.jobs().get_mut(&(to_area, key.to_string())) {
            if job.state == CopyState::Pending {
                if let Some(handle) = job.abort.take() {
                    handle.abort();
                }
                job.state = CopyState::Aborted;
            }
        }

        self.delete(to_area, key).await
    }

    async fn finish_copy(&self, to_area: Area, key: &str) -> StorageResult<()> {
        Self::to_path(key)?;

        let mut jobs = self.jobs();
        let slot = (to_area, key.to_string());
        if matches!(jobs.get(&slot), Some(job) if job.state != CopyState::Pending) {
            jobs.remove(&slot);
        }
        Ok(())
    }

    async fn delete(&self, area: Area, key: &str) -> StorageResult<()> {
        let location = Self::to_path(key)?;
        let start = std::time::Instant::now();

        self.forget_copy(area, key);

        match self.store(area).delete(&location).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    area = %area,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Storage delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            area = %area,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
