//! Move protocol: copy, verify, delete.
//!
//! The store has no rename, so a move starts a server-side copy into the destination
//! area, polls the destination's copy state with backoff until it succeeds, fails or
//! the configured timeout elapses, and only then deletes the source.
//!
//! ```text
//! Idle -> CopyInFlight <-> Verifying -> Committing -> Done
//!              \              |             |
//!               `-------------+-------------+--> Failed
//! ```
//!
//! Any failure before `Committing` removes the unfinished destination and leaves the
//! source untouched. A failed source delete after a confirmed copy is not retried and
//! is reported as [`AppError::ReconciliationRequired`].

use placedoc_core::{AppError, Area, MoveConfig};
use placedoc_storage::{CopyId, CopyState, Storage, StorageError};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::in_flight::InFlightMoves;

/// Observable state of a single move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    Idle,
    CopyInFlight,
    Verifying,
    Committing,
    Done,
    Failed,
}

impl MoveState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MoveState::Done | MoveState::Failed)
    }
}

/// Receiver side of a move's state
pub type MoveProgress = watch::Receiver<MoveState>;

/// Cancellation and progress for one move.
///
/// Cancelling before the copy is confirmed aborts the copy, removes the unfinished
/// destination and leaves the source intact. Cancelling once the source delete has
/// started has no effect.
#[derive(Debug, Clone)]
pub struct MoveControl {
    cancel: CancellationToken,
    progress: Arc<watch::Sender<MoveState>>,
}

impl Default for MoveControl {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveControl {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Control driven by an existing token, e.g. a child of a request-wide token
    pub fn with_token(cancel: CancellationToken) -> Self {
        let (progress, _) = watch::channel(MoveState::Idle);
        Self {
            cancel,
            progress: Arc::new(progress),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> MoveProgress {
        self.progress.subscribe()
    }

    pub fn state(&self) -> MoveState {
        *self.progress.borrow()
    }

    fn set(&self, state: MoveState) {
        self.progress.send_replace(state);
    }
}

/// How a poll loop ended without a confirmed copy
enum PollError {
    /// The destination belongs to this move and must be removed
    Abort(AppError),
    /// The destination was replaced or removed by someone else; leave it alone
    Leave(AppError),
}

/// Executes moves between areas
#[derive(Clone)]
pub struct Mover {
    storage: Arc<dyn Storage>,
    config: MoveConfig,
    in_flight: InFlightMoves,
}

impl Mover {
    pub fn new(storage: Arc<dyn Storage>, config: MoveConfig, in_flight: InFlightMoves) -> Self {
        Self {
            storage,
            config,
            in_flight,
        }
    }

    pub fn config(&self) -> &MoveConfig {
        &self.config
    }

    /// Move `key` from `from` to `to`, keeping the same relative path
    #[tracing::instrument(skip(self, control))]
    pub async fn move_file(
        &self,
        from: Area,
        to: Area,
        key: &str,
        control: &MoveControl,
    ) -> Result<(), AppError> {
        let start = Instant::now();
        control.set(MoveState::Idle);

        if control.cancel.is_cancelled() {
            control.set(MoveState::Failed);
            return Err(AppError::MoveCancelled(key.to_string()));
        }

        // Readers must not see the destination until the source is gone
        let _marker = self.in_flight.register(to, key);

        let copy_id = match self.storage.start_copy(from, to, key).await {
            Ok(id) => id,
            Err(e) => {
                control.set(MoveState::Failed);
                return Err(match e {
                    StorageError::NotFound(_) => AppError::NotFound(key.to_string()),
                    other => AppError::MoveFailed {
                        key: key.to_string(),
                        reason: other.to_string(),
                    },
                });
            }
        };
        control.set(MoveState::CopyInFlight);

        match self.await_copy(to, key, copy_id, control, start).await {
            Ok(()) => {}
            Err(PollError::Abort(err)) => {
                control.set(MoveState::Failed);
                self.discard_destination(to, key).await;
                tracing::warn!(key = %key, error = %err, "Move aborted, source left in place");
                return Err(err);
            }
            Err(PollError::Leave(err)) => {
                control.set(MoveState::Failed);
                tracing::warn!(key = %key, error = %err, "Move abandoned, source left in place");
                return Err(err);
            }
        }

        if let Err(e) = self.storage.finish_copy(to, key).await {
            tracing::warn!(key = %key, area = %to, error = %e, "Failed to release copy record");
        }

        control.set(MoveState::Committing);
        if let Err(e) = self.storage.delete(from, key).await {
            control.set(MoveState::Failed);
            tracing::error!(
                reconciliation_required = true,
                key = %key,
                from_area = %from,
                to_area = %to,
                error = %e,
                "Source delete failed after confirmed copy; file exists in both areas"
            );
            return Err(AppError::ReconciliationRequired(format!(
                "{} exists in both {} and {}",
                key, from, to
            )));
        }

        control.set(MoveState::Done);
        tracing::info!(
            key = %key,
            from_area = %from,
            to_area = %to,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Move completed"
        );

        Ok(())
    }

    async fn await_copy(
        &self,
        to: Area,
        key: &str,
        copy_id: CopyId,
        control: &MoveControl,
        start: Instant,
    ) -> Result<(), PollError> {
        let deadline = start + self.config.timeout;
        let mut delay = self.config.poll_initial;
        let mut polls: u32 = 0;

        loop {
            if control.cancel.is_cancelled() {
                return Err(PollError::Abort(AppError::MoveCancelled(key.to_string())));
            }

            control.set(MoveState::Verifying);
            polls += 1;

            match self.storage.properties(to, key).await {
                Ok(props) => match props.copy {
                    Some((id, CopyState::Success)) if id == copy_id => {
                        tracing::debug!(key = %key, polls = polls, "Copy confirmed");
                        return Ok(());
                    }
                    Some((id, CopyState::Failed(reason))) if id == copy_id => {
                        return Err(PollError::Abort(AppError::MoveFailed {
                            key: key.to_string(),
                            reason,
                        }));
                    }
                    Some((id, CopyState::Aborted)) if id == copy_id => {
                        return Err(PollError::Abort(AppError::MoveFailed {
                            key: key.to_string(),
                            reason: "copy was aborted".to_string(),
                        }));
                    }
                    Some((id, CopyState::Pending)) if id == copy_id => {}
                    _ => {
                        return Err(PollError::Leave(AppError::MoveFailed {
                            key: key.to_string(),
                            reason: "destination was overwritten during the copy".to_string(),
                        }));
                    }
                },
                Err(StorageError::NotFound(_)) => {
                    return Err(PollError::Leave(AppError::MoveFailed {
                        key: key.to_string(),
                        reason: "destination was removed during the copy".to_string(),
                    }));
                }
                // Status reads are retried until the deadline
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Copy status read failed, retrying");
                }
            }

            control.set(MoveState::CopyInFlight);

            let now = Instant::now();
            if now >= deadline {
                return Err(PollError::Abort(AppError::MoveTimeout {
                    key: key.to_string(),
                    waited_ms: start.elapsed().as_millis() as u64,
                }));
            }

            tokio::select! {
                biased;
                _ = control.cancel.cancelled() => {
                    return Err(PollError::Abort(AppError::MoveCancelled(key.to_string())));
                }
                _ = tokio::time::sleep(delay.min(deadline - now)) => {}
            }

            delay = self.config.next_delay(delay);
        }
    }

    async fn discard_destination(&self, to: Area, key: &str) {
        if let Err(e) = self.storage.abort_copy(to, key).await {
            tracing::error!(
                key = %key,
                area = %to,
                error = %e,
                "Failed to remove unfinished destination"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CopyFault, FaultyStorage};
    use bytes::Bytes;
    use std::time::Duration;

    const KEY: &str = "CS/Drive/101/resume.pdf";

    fn quick_moves() -> MoveConfig {
        MoveConfig {
            timeout: Duration::from_millis(200),
            poll_initial: Duration::from_millis(5),
            poll_max: Duration::from_millis(20),
            backoff_factor: 2.0,
        }
    }

    async fn setup(fault: CopyFault) -> (Arc<FaultyStorage>, Mover, InFlightMoves) {
        let storage = Arc::new(FaultyStorage::in_memory());
        storage.set_copy_fault(fault);
        storage
            .put(Area::Pending, KEY, Bytes::from_static(b"%PDF-1.7"))
            .await
            .unwrap();
        let in_flight = InFlightMoves::new();
        let mover = Mover::new(storage.clone(), quick_moves(), in_flight.clone());
        (storage, mover, in_flight)
    }

    #[tokio::test]
    async fn test_move_relocates_file() {
        let (storage, mover, in_flight) = setup(CopyFault::None).await;
        let control = MoveControl::new();

        mover
            .move_file(Area::Pending, Area::Archive, KEY, &control)
            .await
            .unwrap();

        assert!(!storage.exists(Area::Pending, KEY).await.unwrap());
        assert!(storage.exists(Area::Archive, KEY).await.unwrap());
        assert_eq!(control.state(), MoveState::Done);
        assert!(in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_completed_moves_release_copy_records() {
        let storage = Arc::new(FaultyStorage::in_memory());
        let mover = Mover::new(storage.clone(), quick_moves(), InFlightMoves::new());

        for n in 0..20 {
            let key = format!("CS/Drive/{}/resume.pdf", n);
            storage
                .put(Area::Pending, &key, Bytes::from_static(b"%PDF"))
                .await
                .unwrap();
            mover
                .move_file(Area::Pending, Area::Archive, &key, &MoveControl::new())
                .await
                .unwrap();

            let props = storage.properties(Area::Archive, &key).await.unwrap();
            assert_eq!(props.copy, None);
        }
    }

    #[tokio::test]
    async fn test_missing_source_is_not_found() {
        let (storage, mover, _) = setup(CopyFault::None).await;
        let control = MoveControl::new();

        let err = mover
            .move_file(Area::Pending, Area::Archive, "CS/Drive/101/other.pdf", &control)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(storage.list(Area::Archive, "").await.unwrap().is_empty());
        assert_eq!(control.state(), MoveState::Failed);
    }

    #[tokio::test]
    async fn test_timeout_removes_partial_destination() {
        let (storage, mover, _) = setup(CopyFault::NeverCompletes).await;
        let control = MoveControl::new();

        let err = mover
            .move_file(Area::Pending, Area::Archive, KEY, &control)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MoveTimeout { .. }));
        assert!(storage.exists(Area::Pending, KEY).await.unwrap());
        assert!(!storage.exists(Area::Archive, KEY).await.unwrap());
        assert_eq!(control.state(), MoveState::Failed);
    }

    #[tokio::test]
    async fn test_failed_copy_is_move_failed() {
        let (storage, mover, _) = setup(CopyFault::Fails("quota exceeded".to_string())).await;

        let err = mover
            .move_file(Area::Pending, Area::Reject, KEY, &MoveControl::new())
            .await
            .unwrap_err();

        match err {
            AppError::MoveFailed { reason, .. } => assert_eq!(reason, "quota exceeded"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(storage.exists(Area::Pending, KEY).await.unwrap());
        assert!(!storage.exists(Area::Reject, KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_mid_copy_leaves_source() {
        let (storage, mover, _) = setup(CopyFault::NeverCompletes).await;
        let control = MoveControl::new();
        let mut progress = control.subscribe();

        let task = {
            let mover = mover.clone();
            let control = control.clone();
            tokio::spawn(async move {
                mover
                    .move_file(Area::Pending, Area::Archive, KEY, &control)
                    .await
            })
        };

        progress
            .wait_for(|state| *state == MoveState::CopyInFlight)
            .await
            .unwrap();
        control.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::MoveCancelled(_)));
        assert!(storage.exists(Area::Pending, KEY).await.unwrap());
        assert!(!storage.exists(Area::Archive, KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_read_errors_are_retried() {
        let (storage, mover, _) = setup(CopyFault::None).await;
        storage.fail_status_reads(3);

        mover
            .move_file(Area::Pending, Area::Archive, KEY, &MoveControl::new())
            .await
            .unwrap();

        assert!(storage.exists(Area::Archive, KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_source_delete_requires_reconciliation() {
        let (storage, mover, _) = setup(CopyFault::None).await;
        storage.fail_deletes_in(Area::Pending);

        let err = mover
            .move_file(Area::Pending, Area::Archive, KEY, &MoveControl::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ReconciliationRequired(_)));
        assert!(storage.exists(Area::Pending, KEY).await.unwrap());
        assert!(storage.exists(Area::Archive, KEY).await.unwrap());
        // The copy itself was confirmed, so its record is released
        let props = storage.properties(Area::Archive, KEY).await.unwrap();
        assert_eq!(props.copy, None);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (storage, mover, _) = setup(CopyFault::None).await;
        let control = MoveControl::new();
        control.cancel();

        let err = mover
            .move_file(Area::Pending, Area::Archive, KEY, &control)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MoveCancelled(_)));
        assert!(!storage.exists(Area::Archive, KEY).await.unwrap());
    }
}
