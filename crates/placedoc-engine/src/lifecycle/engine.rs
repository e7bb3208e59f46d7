//! File Lifecycle Engine
//!
//! Owns upload, archive and reject, and keeps the rejection ledger in step with
//! the storage areas. Every mutation of a file runs under that file's key lock.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use placedoc_core::models::{FileRef, RejectionRecord};
use placedoc_core::validation::{extension_of, validate_reason};
use placedoc_core::{AppError, Area, MoveConfig, UploadPolicy};
use placedoc_db::RejectionLedger;
use placedoc_storage::{keys, ByteStream, Storage};
use serde::Serialize;
use std::sync::Arc;

use super::in_flight::InFlightMoves;
use super::locks::KeyLocks;
use super::mover::{MoveControl, Mover};

/// Acknowledgement of a completed engine operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    /// Area now holding the file
    pub area: Area,
    pub key: String,
    pub at: DateTime<Utc>,
    /// Whether an upload closed an open rejection
    pub resolved_rejection: bool,
}

impl Ack {
    fn new(area: Area, key: String) -> Self {
        Self {
            area,
            key,
            at: Utc::now(),
            resolved_rejection: false,
        }
    }
}

#[derive(Clone)]
pub struct LifecycleEngine {
    storage: Arc<dyn Storage>,
    ledger: Arc<dyn RejectionLedger>,
    mover: Mover,
    locks: KeyLocks,
    in_flight: InFlightMoves,
    uploads: UploadPolicy,
}

impl LifecycleEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        ledger: Arc<dyn RejectionLedger>,
        moves: MoveConfig,
        uploads: UploadPolicy,
    ) -> Self {
        let in_flight = InFlightMoves::new();
        Self {
            mover: Mover::new(storage.clone(), moves, in_flight.clone()),
            storage,
            ledger,
            locks: KeyLocks::new(),
            in_flight,
            uploads,
        }
    }

    /// Destinations of unfinished moves, for readers that must hide them
    pub fn in_flight(&self) -> InFlightMoves {
        self.in_flight.clone()
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    fn check_upload(&self, file: &FileRef, size: usize) -> Result<(), AppError> {
        let allowed = &self.uploads.allowed_extensions;
        if !allowed.is_empty() {
            let accepted = extension_of(&file.file_name)
                .map(|ext| allowed.contains(&ext))
                .unwrap_or(false);
            if !accepted {
                return Err(AppError::Validation(format!(
                    "Only {} files can be uploaded",
                    allowed.join(", ")
                )));
            }
        }

        if size > self.uploads.max_size_bytes {
            return Err(AppError::Validation(format!(
                "File exceeds the maximum upload size of {} MB",
                self.uploads.max_size_bytes / (1024 * 1024)
            )));
        }

        Ok(())
    }

    /// Write `content` into the pending area, replacing any existing object, and
    /// resolve the newest open rejection of the same file.
    #[tracing::instrument(skip(self, content), fields(key = %file.path(), size_bytes = content.len()))]
    pub async fn upload(&self, file: &FileRef, content: Bytes) -> Result<Ack, AppError> {
        self.check_upload(file, content.len())?;

        let key = keys::file_key(file);
        let _guard = self.locks.lock(&key).await;

        self.storage
            .put(Area::Pending, &key, content)
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;

        let resolved = self.ledger.resolve(file).await.map_err(|e| {
            tracing::error!(
                key = %key,
                error = %e,
                "File uploaded but its rejection could not be resolved"
            );
            e
        })?;

        if let Some(ref record) = resolved {
            tracing::info!(key = %key, rejection_id = record.id, "Re-upload resolved rejection");
        }

        let mut ack = Ack::new(Area::Pending, key);
        ack.resolved_rejection = resolved.is_some();
        Ok(ack)
    }

    /// Move a pending file into the archive area
    pub async fn move_to_archive(&self, file: &FileRef) -> Result<Ack, AppError> {
        self.move_to_archive_with(file, &MoveControl::new()).await
    }

    #[tracing::instrument(skip(self, control), fields(key = %file.path()))]
    pub async fn move_to_archive_with(
        &self,
        file: &FileRef,
        control: &MoveControl,
    ) -> Result<Ack, AppError> {
        let key = keys::file_key(file);
        let _guard = self.locks.lock(&key).await;

        self.mover
            .move_file(Area::Pending, Area::Archive, &key, control)
            .await?;

        Ok(Ack::new(Area::Archive, key))
    }

    /// Move a pending file into the reject area and record why.
    ///
    /// A file absent from pending is `NotFound` even if it already has an open
    /// rejection; `DuplicateRejection` only applies to a file still in pending.
    pub async fn reject(&self, file: &FileRef, reason: &str) -> Result<Ack, AppError> {
        self.reject_with(file, reason, &MoveControl::new()).await
    }

    #[tracing::instrument(skip(self, reason, control), fields(key = %file.path()))]
    pub async fn reject_with(
        &self,
        file: &FileRef,
        reason: &str,
        control: &MoveControl,
    ) -> Result<Ack, AppError> {
        validate_reason(reason)?;

        let key = keys::file_key(file);
        let _guard = self.locks.lock(&key).await;

        if !self.storage.exists(Area::Pending, &key).await? {
            return Err(AppError::NotFound(key));
        }
        if self.ledger.find_unresolved(file).await?.is_some() {
            return Err(AppError::DuplicateRejection { key });
        }

        self.mover
            .move_file(Area::Pending, Area::Reject, &key, control)
            .await?;

        let record = self.ledger.record(file, reason).await.map_err(|e| {
            tracing::error!(
                key = %key,
                error = %e,
                "File moved to reject area but the rejection was not recorded"
            );
            e
        })?;

        tracing::info!(key = %key, rejection_id = record.id, "File rejected");

        Ok(Ack::new(Area::Reject, key))
    }

    /// Snapshot of the open rejections owned by `roll_number`
    pub async fn list_unresolved_rejections(
        &self,
        roll_number: &str,
    ) -> Result<Vec<RejectionRecord>, AppError> {
        self.ledger.list_unresolved(roll_number).await
    }

    /// Archive each file independently; one result per input, in order
    pub async fn archive_many(&self, files: &[FileRef]) -> Vec<Result<Ack, AppError>> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            results.push(self.move_to_archive(file).await);
        }
        results
    }

    /// Reject each file independently with the same reason
    pub async fn reject_many(&self, files: &[FileRef], reason: &str) -> Vec<Result<Ack, AppError>> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            results.push(self.reject(file, reason).await);
        }
        results
    }

    /// Stream a file out of `area`
    pub async fn download(&self, area: Area, file: &FileRef) -> Result<ByteStream, AppError> {
        let key = keys::file_key(file);
        if self.in_flight.contains(area, &key) {
            return Err(AppError::NotFound(key));
        }
        Ok(self.storage.get_stream(area, &key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{quick_move_config, CopyFault, FaultyStorage, MockRejectionLedger};
    use futures::TryStreamExt;
    use placedoc_core::SubmissionIdentity;

    fn file(name: &str) -> FileRef {
        FileRef::new(SubmissionIdentity::new("CS", "Drive", "101").unwrap(), name).unwrap()
    }

    fn engine() -> (LifecycleEngine, Arc<FaultyStorage>, MockRejectionLedger) {
        let storage = Arc::new(FaultyStorage::in_memory());
        let ledger = MockRejectionLedger::new();
        let engine = LifecycleEngine::new(
            storage.clone(),
            Arc::new(ledger.clone()),
            quick_move_config(),
            UploadPolicy::default(),
        );
        (engine, storage, ledger)
    }

    #[tokio::test]
    async fn test_upload_writes_pending() {
        let (engine, storage, _) = engine();

        let ack = engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"%PDF"))
            .await
            .unwrap();

        assert_eq!(ack.area, Area::Pending);
        assert_eq!(ack.key, "CS/Drive/101/resume.pdf");
        assert!(!ack.resolved_rejection);
        assert!(storage.exists(Area::Pending, &ack.key).await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_rejects_disallowed_extension() {
        let (engine, storage, _) = engine();

        let err = engine
            .upload(&file("resume.exe"), Bytes::from_static(b"MZ"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(storage.list(Area::Pending, "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_file() {
        let storage = Arc::new(FaultyStorage::in_memory());
        let engine = LifecycleEngine::new(
            storage,
            Arc::new(MockRejectionLedger::new()),
            quick_move_config(),
            UploadPolicy {
                max_size_bytes: 4,
                allowed_extensions: vec![],
            },
        );

        let err = engine
            .upload(&file("notes.txt"), Bytes::from_static(b"too large"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reject_requires_reason() {
        let (engine, storage, ledger) = engine();
        engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"%PDF"))
            .await
            .unwrap();

        let err = engine.reject(&file("resume.pdf"), "   ").await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(storage
            .exists(Area::Pending, "CS/Drive/101/resume.pdf")
            .await
            .unwrap());
        assert!(ledger.all().is_empty());
    }

    #[tokio::test]
    async fn test_reject_records_open_rejection() {
        let (engine, storage, ledger) = engine();
        engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"%PDF"))
            .await
            .unwrap();

        let ack = engine
            .reject(&file("resume.pdf"), "Wrong format")
            .await
            .unwrap();

        assert_eq!(ack.area, Area::Reject);
        assert!(storage.exists(Area::Reject, &ack.key).await.unwrap());
        assert!(!storage.exists(Area::Pending, &ack.key).await.unwrap());

        let open = engine.list_unresolved_rejections("101").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].reason, "Wrong format");
        assert_eq!(ledger.all().len(), 1);
    }

    #[tokio::test]
    async fn test_second_rejection_is_duplicate() {
        let (engine, storage, ledger) = engine();
        engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"v1"))
            .await
            .unwrap();
        engine
            .reject(&file("resume.pdf"), "Wrong format")
            .await
            .unwrap();

        // A stray pending copy appears without going through upload
        storage
            .put(
                Area::Pending,
                "CS/Drive/101/resume.pdf",
                Bytes::from_static(b"v2"),
            )
            .await
            .unwrap();

        let err = engine
            .reject(&file("resume.pdf"), "Still wrong")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DuplicateRejection { .. }));
        assert!(storage
            .exists(Area::Pending, "CS/Drive/101/resume.pdf")
            .await
            .unwrap());
        assert_eq!(ledger.all().len(), 1);
    }

    #[tokio::test]
    async fn test_rejecting_absent_file_is_not_found_even_when_rejected() {
        let (engine, _, ledger) = engine();
        engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"v1"))
            .await
            .unwrap();
        engine
            .reject(&file("resume.pdf"), "Wrong format")
            .await
            .unwrap();

        let err = engine
            .reject(&file("resume.pdf"), "Still wrong")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(ledger.all().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_write_failure_changes_nothing() {
        let (engine, storage, ledger) = engine();
        engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"v1"))
            .await
            .unwrap();
        engine
            .reject(&file("resume.pdf"), "Wrong format")
            .await
            .unwrap();
        storage.fail_puts_in(Area::Pending);

        let err = engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"v2"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::StorageWrite(_)));
        assert!(!storage
            .exists(Area::Pending, "CS/Drive/101/resume.pdf")
            .await
            .unwrap());
        let records = ledger.all();
        assert_eq!(records.len(), 1);
        assert!(!records[0].resolved);
        assert_eq!(engine.list_unresolved_rejections("101").await.unwrap().len(), 1);

        storage.heal_puts();
        let ack = engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"v2"))
            .await
            .unwrap();
        assert!(ack.resolved_rejection);
    }

    #[tokio::test]
    async fn test_file_name_with_double_dot_moves() {
        let (engine, storage, _) = engine();
        engine
            .upload(&file("resume..pdf"), Bytes::from_static(b"%PDF"))
            .await
            .unwrap();

        let ack = engine.move_to_archive(&file("resume..pdf")).await.unwrap();

        assert_eq!(ack.key, "CS/Drive/101/resume..pdf");
        assert!(storage.exists(Area::Archive, &ack.key).await.unwrap());
        assert!(!storage.exists(Area::Pending, &ack.key).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_move_records_nothing() {
        let (engine, storage, ledger) = engine();
        engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        storage.set_copy_fault(CopyFault::NeverCompletes);

        let err = engine
            .reject(&file("resume.pdf"), "Wrong format")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MoveTimeout { .. }));
        assert!(ledger.all().is_empty());
        assert!(!storage
            .exists(Area::Reject, "CS/Drive/101/resume.pdf")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_archive_many_reports_per_item() {
        let (engine, storage, _) = engine();
        engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"%PDF"))
            .await
            .unwrap();

        let results = engine
            .archive_many(&[file("resume.pdf"), file("missing.pdf")])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(AppError::NotFound(_))));
        assert!(storage
            .exists(Area::Archive, "CS/Drive/101/resume.pdf")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_reupload_resolves_only_matching_file() {
        let (engine, _, _) = engine();
        for name in ["resume.pdf", "marksheet.pdf"] {
            engine
                .upload(&file(name), Bytes::from_static(b"%PDF"))
                .await
                .unwrap();
        }
        let results = engine
            .reject_many(&[file("resume.pdf"), file("marksheet.pdf")], "Blurry scan")
            .await;
        assert!(results.iter().all(|r| r.is_ok()));

        let ack = engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"%PDF-2"))
            .await
            .unwrap();
        assert!(ack.resolved_rejection);

        let open = engine.list_unresolved_rejections("101").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].file_name, "marksheet.pdf");
    }

    #[tokio::test]
    async fn test_download_reads_area() {
        let (engine, _, _) = engine();
        engine
            .upload(&file("resume.pdf"), Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        engine.move_to_archive(&file("resume.pdf")).await.unwrap();

        let chunks: Vec<Bytes> = engine
            .download(Area::Archive, &file("resume.pdf"))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"%PDF");

        let err = engine
            .download(Area::Pending, &file("resume.pdf"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
