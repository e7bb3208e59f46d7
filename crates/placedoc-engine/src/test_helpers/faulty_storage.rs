//! Storage wrapper that injects faults into an in-memory store

use async_trait::async_trait;
use bytes::Bytes;
use placedoc_core::Area;
use placedoc_storage::{
    ByteStream, CopyId, CopyState, ObjectProperties, ObjectStoreStorage, Storage, StorageBackend,
    StorageError, StorageResult,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// How copy states are reported on destinations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyFault {
    None,
    /// The copy runs but its state never leaves `Pending`
    NeverCompletes,
    /// The copy runs but reports `Failed` with this reason
    Fails(String),
}

pub struct FaultyStorage {
    inner: ObjectStoreStorage,
    copy_fault: Mutex<CopyFault>,
    failing_puts: Mutex<HashSet<Area>>,
    failing_deletes: Mutex<HashSet<Area>>,
    failing_status_reads: AtomicUsize,
}

impl FaultyStorage {
    pub fn new(inner: ObjectStoreStorage) -> Self {
        Self {
            inner,
            copy_fault: Mutex::new(CopyFault::None),
            failing_puts: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            failing_status_reads: AtomicUsize::new(0),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(ObjectStoreStorage::in_memory())
    }

    pub fn set_copy_fault(&self, fault: CopyFault) {
        *self.copy_fault.lock().unwrap() = fault;
    }

    /// Every write in `area` fails until [`FaultyStorage::heal_puts`]
    pub fn fail_puts_in(&self, area: Area) {
        self.failing_puts.lock().unwrap().insert(area);
    }

    pub fn heal_puts(&self) {
        self.failing_puts.lock().unwrap().clear();
    }

    /// Every delete in `area` fails until [`FaultyStorage::heal_deletes`]
    pub fn fail_deletes_in(&self, area: Area) {
        self.failing_deletes.lock().unwrap().insert(area);
    }

    pub fn heal_deletes(&self) {
        self.failing_deletes.lock().unwrap().clear();
    }

    /// The next `count` property reads fail with a backend error
    pub fn fail_status_reads(&self, count: usize) {
        self.failing_status_reads.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn put(&self, area: Area, key: &str, data: Bytes) -> StorageResult<()> {
        if self.failing_puts.lock().unwrap().contains(&area) {
            return Err(StorageError::UploadFailed(
                "injected write failure".to_string(),
            ));
        }
        self.inner.put(area, key, data).await
    }

    async fn get(&self, area: Area, key: &str) -> StorageResult<Bytes> {
        self.inner.get(area, key).await
    }

    async fn get_stream(&self, area: Area, key: &str) -> StorageResult<ByteStream> {
        self.inner.get_stream(area, key).await
    }

    async fn list(&self, area: Area, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(area, prefix).await
    }

    async fn properties(&self, area: Area, key: &str) -> StorageResult<ObjectProperties> {
        let injected = self
            .failing_status_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageError::BackendError(
                "injected status read failure".to_string(),
            ));
        }

        let mut props = self.inner.properties(area, key).await?;
        let fault = self.copy_fault.lock().unwrap().clone();
        if let Some((id, state)) = props.copy.take() {
            let state = match (fault, state) {
                (_, CopyState::Aborted) => CopyState::Aborted,
                (CopyFault::None, state) => state,
                (CopyFault::NeverCompletes, _) => CopyState::Pending,
                (CopyFault::Fails(reason), _) => CopyState::Failed(reason),
            };
            props.copy = Some((id, state));
        }
        Ok(props)
    }

    async fn exists(&self, area: Area, key: &str) -> StorageResult<bool> {
        self.inner.exists(area, key).await
    }

    async fn start_copy(
        &self,
        from_area: Area,
        to_area: Area,
        key: &str,
    ) -> StorageResult<CopyId> {
        self.inner.start_copy(from_area, to_area, key).await
    }

    async fn abort_copy(&self, to_area: Area, key: &str) -> StorageResult<()> {
        self.inner.abort_copy(to_area, key).await
    }

    async fn finish_copy(&self, to_area: Area, key: &str) -> StorageResult<()> {
        self.inner.finish_copy(to_area, key).await
    }

    async fn delete(&self, area: Area, key: &str) -> StorageResult<()> {
        if self.failing_deletes.lock().unwrap().contains(&area) {
            return Err(StorageError::DeleteFailed(
                "injected delete failure".to_string(),
            ));
        }
        self.inner.delete(area, key).await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}
