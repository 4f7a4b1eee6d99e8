use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::config::UploadConfig;
use crate::core::error::{AppError, Result};
use crate::features::files::classify::classify;
use crate::features::files::models::NewFileRecord;
use crate::features::files::repository::FileRepository;
use crate::features::plans::Plan;
use crate::features::uploads::quota::{quota_exceeded_message, BatchAdmission};
use crate::features::uploads::task::{IncomingUpload, UploadEvent, UploadHandle, UploadState};
use crate::features::users::models::User;
use crate::modules::storage::{BlobStore, ProgressSink};
use crate::shared::format::format_bytes;

/// Orchestrates one batch of concurrent file transfers.
///
/// Admission (count, size and quota gates) runs sequentially at submission;
/// admitted tasks then transfer in parallel, each owning exactly one blob and
/// one prospective record. The plan's concurrency cap bounds the batch size,
/// so no additional scheduling is layered on top of the spawned tasks.
pub struct UploadSessionManager {
    files: Arc<dyn FileRepository>,
    blobs: Arc<dyn BlobStore>,
    config: UploadConfig,
    active: Mutex<HashMap<Uuid, Arc<UploadHandle>>>,
}

impl UploadSessionManager {
    pub fn new(
        files: Arc<dyn FileRepository>,
        blobs: Arc<dyn BlobStore>,
        config: UploadConfig,
    ) -> Self {
        Self {
            files,
            blobs,
            config,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Submit a batch. Returns the event stream for the batch; the stream
    /// ends once every task has reached a terminal state.
    pub async fn submit_batch(
        self: &Arc<Self>,
        owner: &User,
        batch: Vec<IncomingUpload>,
    ) -> Result<UnboundedReceiverStream<UploadEvent>> {
        if batch.is_empty() {
            return Err(AppError::BadRequest("No files in upload batch".to_string()));
        }

        let plan = owner.plan();
        let rule = plan.limits();
        let (tx, rx) = mpsc::unbounded_channel();

        // The stored total is recomputed per batch, never cached; within the
        // batch the accumulator advances synchronously per admitted file.
        let existing = self.files.total_size(owner.id).await?;
        let mut admission = BatchAdmission::new(existing, rule.max_bytes);

        info!(
            "Upload batch submitted: owner={}, files={}, stored_bytes={}",
            owner.id,
            batch.len(),
            existing
        );

        for (index, file) in batch.into_iter().enumerate() {
            let handle = UploadHandle::new(owner.id, file.name.clone());
            emit(&tx, &handle, UploadState::Queued, 0, None, None);
            emit(&tx, &handle, UploadState::Checking, 0, None, None);

            // Count gate: tasks beyond the plan cap never start transferring.
            if index >= rule.max_concurrent_uploads {
                let error = AppError::ConcurrencyLimit(concurrency_limit_message(
                    plan,
                    rule.max_concurrent_uploads,
                ));
                emit(
                    &tx,
                    &handle,
                    UploadState::Rejected,
                    0,
                    Some(error.to_string()),
                    None,
                );
                continue;
            }

            // Size gate
            if file.size() > self.config.max_file_bytes {
                emit(
                    &tx,
                    &handle,
                    UploadState::Rejected,
                    0,
                    Some(format!(
                        "Maximum file size is {}",
                        format_bytes(self.config.max_file_bytes)
                    )),
                    None,
                );
                continue;
            }

            // Quota gate, sequential against the running total
            if !admission.admit(file.size()) {
                let error = AppError::QuotaExceeded(quota_exceeded_message(
                    admission.used(),
                    rule.max_bytes,
                    plan,
                ));
                emit(
                    &tx,
                    &handle,
                    UploadState::Rejected,
                    0,
                    Some(error.to_string()),
                    None,
                );
                continue;
            }

            self.active
                .lock()
                .await
                .insert(handle.id, Arc::clone(&handle));

            let manager = Arc::clone(self);
            let owner_id = owner.id;
            let task_tx = tx.clone();
            tokio::spawn(async move {
                manager.run_transfer(owner_id, file, handle, task_tx).await;
            });
        }

        Ok(UnboundedReceiverStream::new(rx))
    }

    /// Flag a task for cooperative cancellation. The transfer reacts at the
    /// checkpoint after blob creation completes; the blob is then deleted and
    /// no record persisted.
    pub async fn cancel(&self, task_id: Uuid, requesting_user_id: Uuid) -> Result<()> {
        match self.active.lock().await.get(&task_id) {
            Some(handle) => {
                if handle.owner_id != requesting_user_id {
                    return Err(AppError::Forbidden(
                        "You do not have permission to cancel this upload".to_string(),
                    ));
                }
                handle.cancel();
                debug!("Cancellation requested: task={}", task_id);
                Ok(())
            }
            None => Err(AppError::NotFound("Upload task not found".to_string())),
        }
    }

    async fn run_transfer(
        &self,
        owner_id: Uuid,
        file: IncomingUpload,
        handle: Arc<UploadHandle>,
        tx: UnboundedSender<UploadEvent>,
    ) {
        let IncomingUpload {
            name,
            content_type,
            data,
        } = file;

        emit(&tx, &handle, UploadState::Transferring, 0, None, None);

        let (_, extension) = classify(&name);
        let blob_key = if extension.is_empty() {
            format!("{}/{}", owner_id, Uuid::new_v4())
        } else {
            format!("{}/{}.{}", owner_id, Uuid::new_v4(), extension)
        };

        let sink: ProgressSink = {
            let tx = tx.clone();
            let handle = Arc::clone(&handle);
            Arc::new(move |sent, total| {
                let percent = if total == 0 {
                    100
                } else {
                    (sent.saturating_mul(100) / total) as u8
                };
                if let Some(advanced) = handle.advance_progress(percent) {
                    let _ = tx.send(UploadEvent {
                        task_id: handle.id,
                        file_name: handle.file_name.clone(),
                        state: UploadState::Transferring,
                        progress: advanced,
                        message: None,
                        file_id: None,
                    });
                }
            })
        };

        let transfer = timeout(
            self.config.transfer_timeout,
            self.blobs.put(&blob_key, data, &content_type, sink),
        )
        .await;

        let blob = match transfer {
            Err(_) => {
                warn!("Transfer timed out: task={}, key={}", handle.id, blob_key);
                self.cleanup_blob(&blob_key).await;
                emit(
                    &tx,
                    &handle,
                    UploadState::Failed,
                    handle.progress(),
                    Some("Transfer timed out".to_string()),
                    None,
                );
                self.finish(handle.id).await;
                return;
            }
            Ok(Err(e)) => {
                self.cleanup_blob(&blob_key).await;
                emit(
                    &tx,
                    &handle,
                    UploadState::Failed,
                    handle.progress(),
                    Some(e.to_string()),
                    None,
                );
                self.finish(handle.id).await;
                return;
            }
            Ok(Ok(blob)) => blob,
        };

        // Cooperative cancellation checkpoint. The transfer ran to
        // completion; a set flag discards its result.
        if handle.is_cancelled() {
            self.cleanup_blob(&blob.key).await;
            debug!("Upload cancelled: task={}, key={}", handle.id, blob.key);
            emit(
                &tx,
                &handle,
                UploadState::Cancelled,
                handle.progress(),
                None,
                None,
            );
            self.finish(handle.id).await;
            return;
        }

        emit(&tx, &handle, UploadState::Committing, 100, None, None);

        let (kind, extension) = classify(&name);
        let record = NewFileRecord {
            name,
            kind,
            extension,
            size: blob.size,
            url: blob.url,
            blob_key: blob.key.clone(),
            owner_id,
        };

        match self.files.insert(record).await {
            Ok(stored) => {
                info!(
                    "Upload committed: task={}, file={}, kind={}, size={}",
                    handle.id, stored.id, stored.kind, stored.size
                );
                emit(
                    &tx,
                    &handle,
                    UploadState::Committed,
                    100,
                    None,
                    Some(stored.id),
                );
            }
            Err(e) => {
                warn!(
                    "Record create failed after transfer, removing blob '{}': {}",
                    blob.key, e
                );
                self.cleanup_blob(&blob.key).await;
                emit(
                    &tx,
                    &handle,
                    UploadState::Failed,
                    100,
                    Some(e.to_string()),
                    None,
                );
            }
        }

        self.finish(handle.id).await;
    }

    /// Best-effort orphan cleanup; failures are logged, never re-raised.
    async fn cleanup_blob(&self, key: &str) {
        if let Err(e) = self.blobs.delete(key).await {
            warn!("Orphaned blob cleanup failed for '{}': {}", key, e);
        }
    }

    async fn finish(&self, task_id: Uuid) {
        self.active.lock().await.remove(&task_id);
    }
}

fn concurrency_limit_message(plan: Plan, cap: usize) -> String {
    format!(
        "Your {} plan allows up to {} file uploads at a time",
        plan, cap
    )
}

fn emit(
    tx: &UnboundedSender<UploadEvent>,
    handle: &UploadHandle,
    state: UploadState,
    progress: u8,
    message: Option<String>,
    file_id: Option<Uuid>,
) {
    // A dropped receiver means nobody is watching; transfers still finish.
    let _ = tx.send(UploadEvent {
        task_id: handle.id,
        file_name: handle.file_name.clone(),
        state,
        progress,
        message,
        file_id,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio_stream::StreamExt;

    use crate::features::files::classify::FileKind;
    use crate::shared::test_helpers::{
        file_record_of_size, sample_user, MemoryBlobStore, MemoryFileRepository,
    };

    fn test_config() -> UploadConfig {
        UploadConfig {
            max_file_bytes: crate::shared::constants::MAX_FILE_SIZE,
            transfer_timeout: Duration::from_secs(5),
        }
    }

    fn manager_with(
        files: &Arc<MemoryFileRepository>,
        blobs: &Arc<MemoryBlobStore>,
        config: UploadConfig,
    ) -> Arc<UploadSessionManager> {
        Arc::new(UploadSessionManager::new(
            Arc::clone(files) as Arc<dyn FileRepository>,
            Arc::clone(blobs) as Arc<dyn BlobStore>,
            config,
        ))
    }

    fn upload(name: &str, size: usize) -> IncomingUpload {
        IncomingUpload {
            name: name.to_string(),
            content_type: "application/octet-stream".to_string(),
            data: vec![0u8; size],
        }
    }

    fn last_state(events: &[UploadEvent], file_name: &str) -> UploadState {
        events
            .iter()
            .filter(|e| e.file_name == file_name)
            .next_back()
            .expect("no events for file")
            .state
    }

    #[tokio::test]
    async fn commit_persists_classified_record() {
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let manager = manager_with(&files, &blobs, test_config());
        let user = sample_user(crate::features::plans::Plan::Free);

        let stream = manager
            .submit_batch(&user, vec![upload("report.pdf", 1024)])
            .await
            .expect("batch rejected");
        let events: Vec<UploadEvent> = stream.collect().await;

        assert_eq!(last_state(&events, "report.pdf"), UploadState::Committed);
        let committed = events
            .iter()
            .find(|e| e.state == UploadState::Committed)
            .expect("no committed event");
        assert!(committed.file_id.is_some());

        let stored = files.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "report.pdf");
        assert_eq!(stored[0].kind, FileKind::Document);
        assert_eq!(stored[0].extension, "pdf");
        assert_eq!(stored[0].size, 1024);
        assert_eq!(stored[0].owner_id, user.id);
        assert!(stored[0].shared_with.is_empty());
        assert!(blobs.contains(&stored[0].blob_key));
        assert!(blobs.exists(&stored[0].blob_key).await.expect("head failed"));
    }

    #[tokio::test]
    async fn state_sequence_follows_the_machine() {
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let manager = manager_with(&files, &blobs, test_config());
        let user = sample_user(crate::features::plans::Plan::Free);

        let stream = manager
            .submit_batch(&user, vec![upload("a.txt", 64)])
            .await
            .expect("batch rejected");
        let events: Vec<UploadEvent> = stream.collect().await;

        let states: Vec<UploadState> = events.iter().map(|e| e.state).collect();
        assert_eq!(states.first(), Some(&UploadState::Queued));
        assert_eq!(states.get(1), Some(&UploadState::Checking));
        assert!(states.contains(&UploadState::Transferring));
        assert!(states.contains(&UploadState::Committing));
        assert_eq!(states.last(), Some(&UploadState::Committed));
    }

    #[tokio::test]
    async fn files_beyond_the_plan_cap_are_rejected_at_submission() {
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let manager = manager_with(&files, &blobs, test_config());
        // Free plan: three uploads per batch
        let user = sample_user(crate::features::plans::Plan::Free);

        let batch = vec![
            upload("f1.txt", 16),
            upload("f2.txt", 16),
            upload("f3.txt", 16),
            upload("f4.txt", 16),
        ];
        let stream = manager.submit_batch(&user, batch).await.expect("batch");
        let events: Vec<UploadEvent> = stream.collect().await;

        assert_eq!(last_state(&events, "f1.txt"), UploadState::Committed);
        assert_eq!(last_state(&events, "f2.txt"), UploadState::Committed);
        assert_eq!(last_state(&events, "f3.txt"), UploadState::Committed);
        assert_eq!(last_state(&events, "f4.txt"), UploadState::Rejected);

        let rejection = events
            .iter()
            .find(|e| e.state == UploadState::Rejected)
            .expect("no rejection");
        assert!(rejection
            .message
            .as_deref()
            .is_some_and(|m| m.contains("3 file uploads")));
        assert_eq!(files.all().len(), 3);
    }

    #[tokio::test]
    async fn oversized_files_fail_the_size_gate() {
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let config = UploadConfig {
            max_file_bytes: 256,
            transfer_timeout: Duration::from_secs(5),
        };
        let manager = manager_with(&files, &blobs, config);
        let user = sample_user(crate::features::plans::Plan::Free);

        let stream = manager
            .submit_batch(&user, vec![upload("big.iso", 257)])
            .await
            .expect("batch");
        let events: Vec<UploadEvent> = stream.collect().await;

        assert_eq!(last_state(&events, "big.iso"), UploadState::Rejected);
        assert!(events
            .iter()
            .any(|e| e.message.as_deref().is_some_and(|m| m.contains("Maximum file size"))));
        assert!(files.all().is_empty());
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn quota_admission_uses_a_running_total() {
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let manager = manager_with(&files, &blobs, test_config());
        let user = sample_user(crate::features::plans::Plan::Free);

        // Leave 3 KiB of headroom; two 2 KiB files fit one at a time but not
        // together.
        let ceiling = crate::features::plans::Plan::Free.limits().max_bytes;
        files.seed(file_record_of_size(user.id, "old.bin", ceiling - 3 * 1024));

        let batch = vec![upload("first.txt", 2048), upload("second.txt", 2048)];
        let stream = manager.submit_batch(&user, batch).await.expect("batch");
        let events: Vec<UploadEvent> = stream.collect().await;

        assert_eq!(last_state(&events, "first.txt"), UploadState::Committed);
        assert_eq!(last_state(&events, "second.txt"), UploadState::Rejected);
        assert!(events
            .iter()
            .any(|e| e.message.as_deref().is_some_and(|m| m.contains("storage quota"))));
        // The seeded record plus the single committed upload
        assert_eq!(files.all().len(), 2);
    }

    #[tokio::test]
    async fn cancellation_deletes_blob_and_skips_record() {
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::gated());
        let manager = manager_with(&files, &blobs, test_config());
        let user = sample_user(crate::features::plans::Plan::Free);

        let mut stream = manager
            .submit_batch(&user, vec![upload("clip.mp4", 4096)])
            .await
            .expect("batch");

        // Wait for the transfer to start, then cancel while the blob store
        // is still holding the transfer open.
        let mut task_id = None;
        let mut seen: Vec<UploadEvent> = Vec::new();
        while let Some(event) = stream.next().await {
            if event.state == UploadState::Transferring {
                task_id = Some(event.task_id);
                seen.push(event);
                break;
            }
            seen.push(event);
        }
        let task_id = task_id.expect("transfer never started");

        // A stranger cannot cancel someone else's task
        let stranger = Uuid::new_v4();
        assert!(matches!(
            manager.cancel(task_id, stranger).await,
            Err(AppError::Forbidden(_))
        ));

        manager.cancel(task_id, user.id).await.expect("cancel failed");
        blobs.release();

        let rest: Vec<UploadEvent> = stream.collect().await;
        seen.extend(rest);

        assert_eq!(last_state(&seen, "clip.mp4"), UploadState::Cancelled);
        assert!(files.all().is_empty());
        assert!(blobs.is_empty());
        // The task left the active set; cancelling again is NotFound.
        assert!(manager.cancel(task_id, user.id).await.is_err());
    }

    #[tokio::test]
    async fn record_failure_compensates_by_deleting_the_blob() {
        let files = Arc::new(MemoryFileRepository::new());
        files.fail_next_insert();
        let blobs = Arc::new(MemoryBlobStore::new());
        let manager = manager_with(&files, &blobs, test_config());
        let user = sample_user(crate::features::plans::Plan::Free);

        let stream = manager
            .submit_batch(&user, vec![upload("photo.jpg", 512)])
            .await
            .expect("batch");
        let events: Vec<UploadEvent> = stream.collect().await;

        assert_eq!(last_state(&events, "photo.jpg"), UploadState::Failed);
        assert!(files.all().is_empty());
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn transfer_errors_surface_per_file_and_spare_the_batch() {
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.fail_put_for(".bin");
        let manager = manager_with(&files, &blobs, test_config());
        let user = sample_user(crate::features::plans::Plan::Free);

        let batch = vec![upload("good.txt", 64), upload("bad.bin", 64)];
        let stream = manager.submit_batch(&user, batch).await.expect("batch");
        let events: Vec<UploadEvent> = stream.collect().await;

        assert_eq!(last_state(&events, "good.txt"), UploadState::Committed);
        assert_eq!(last_state(&events, "bad.bin"), UploadState::Failed);
        assert!(events
            .iter()
            .any(|e| e.state == UploadState::Failed && e.message.is_some()));
        assert_eq!(files.all().len(), 1);
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_reaches_completion() {
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let manager = manager_with(&files, &blobs, test_config());
        let user = sample_user(crate::features::plans::Plan::Free);

        let stream = manager
            .submit_batch(&user, vec![upload("song.mp3", 8192)])
            .await
            .expect("batch");
        let events: Vec<UploadEvent> = stream.collect().await;

        let progress: Vec<u8> = events
            .iter()
            .filter(|e| e.state == UploadState::Transferring)
            .map(|e| e.progress)
            .collect();
        assert!(!progress.is_empty());
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last(), Some(&100));
    }

    #[tokio::test]
    async fn stalled_transfers_fail_after_the_timeout() {
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::gated());
        let config = UploadConfig {
            max_file_bytes: crate::shared::constants::MAX_FILE_SIZE,
            transfer_timeout: Duration::from_millis(50),
        };
        let manager = manager_with(&files, &blobs, config);
        let user = sample_user(crate::features::plans::Plan::Free);

        let stream = manager
            .submit_batch(&user, vec![upload("stuck.bin", 128)])
            .await
            .expect("batch");
        let events: Vec<UploadEvent> = stream.collect().await;

        assert_eq!(last_state(&events, "stuck.bin"), UploadState::Failed);
        assert!(events
            .iter()
            .any(|e| e.message.as_deref().is_some_and(|m| m.contains("timed out"))));
        assert!(files.all().is_empty());
    }

    #[tokio::test]
    async fn cancelling_an_unknown_task_is_not_found() {
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let manager = manager_with(&files, &blobs, test_config());

        let result = manager.cancel(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn empty_batches_are_rejected_outright() {
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let manager = manager_with(&files, &blobs, test_config());
        let user = sample_user(crate::features::plans::Plan::Free);

        let result = manager.submit_batch(&user, Vec::new()).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
