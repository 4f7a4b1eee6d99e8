use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Per-task upload lifecycle.
///
/// `Queued → Checking → Transferring → Committing` on the happy path;
/// `Committed`, `Cancelled`, `Rejected` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Queued,
    Checking,
    Transferring,
    Committing,
    Committed,
    Cancelled,
    Rejected,
    Failed,
}

impl UploadState {
    #[allow(dead_code)]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Committed
                | UploadState::Cancelled
                | UploadState::Rejected
                | UploadState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Queued => "queued",
            UploadState::Checking => "checking",
            UploadState::Transferring => "transferring",
            UploadState::Committing => "committing",
            UploadState::Committed => "committed",
            UploadState::Cancelled => "cancelled",
            UploadState::Rejected => "rejected",
            UploadState::Failed => "failed",
        }
    }
}

/// One progress or state-change notification on the batch event stream
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadEvent {
    pub task_id: Uuid,
    pub file_name: String,
    pub state: UploadState,
    /// Percentage, monotonically non-decreasing per task
    pub progress: u8,
    /// Rejection or failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Id of the persisted record, present on `committed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<Uuid>,
}

/// A file taken from the submitted batch
#[derive(Debug)]
pub struct IncomingUpload {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl IncomingUpload {
    pub fn size(&self) -> i64 {
        self.data.len() as i64
    }
}

/// Shared mutable state of one active task: the cancellation flag and the
/// progress high-water mark.
#[derive(Debug)]
pub struct UploadHandle {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub file_name: String,
    cancelled: AtomicBool,
    progress: AtomicU8,
}

impl UploadHandle {
    pub fn new(owner_id: Uuid, file_name: String) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            owner_id,
            file_name,
            cancelled: AtomicBool::new(false),
            progress: AtomicU8::new(0),
        })
    }

    /// Request cooperative cancellation. The transfer reacts at its next
    /// checkpoint, after blob creation completes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Raise the progress high-water mark. Returns the new value when it
    /// actually advanced, keeping emitted percentages non-decreasing.
    pub fn advance_progress(&self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        let previous = self.progress.fetch_max(percent, Ordering::SeqCst);
        (percent > previous).then_some(percent)
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }
}
