use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::classify::FileKind;
use crate::features::files::models::FileRecord;
use crate::features::files::repository::FileRepository;
use crate::features::plans::Plan;
use crate::features::users::repository::UserRepository;

/// Used space and freshest change for one dashboard category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketUsage {
    pub used_space: i64,
    pub last_update: Option<DateTime<Utc>>,
}

impl BucketUsage {
    fn absorb(&mut self, record: &FileRecord) {
        self.used_space += record.size;
        self.last_update = match self.last_update {
            Some(current) => Some(current.max(record.updated_at)),
            None => Some(record.updated_at),
        };
    }
}

/// Per-category usage, recomputed from the live record set on every call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSummary {
    pub documents: BucketUsage,
    pub images: BucketUsage,
    /// Video and audio fold into one dashboard category
    pub media: BucketUsage,
    pub others: BucketUsage,
    pub total_used: i64,
}

/// Fold a user's records into the dashboard buckets. Pure; O(n) in file
/// count; integer accumulation throughout.
pub fn summarize_records(records: &[FileRecord]) -> UsageSummary {
    let mut summary = UsageSummary::default();

    for record in records {
        let bucket = match record.kind {
            FileKind::Document => &mut summary.documents,
            FileKind::Image => &mut summary.images,
            FileKind::Video | FileKind::Audio => &mut summary.media,
            FileKind::Other => &mut summary.others,
        };
        bucket.absorb(record);
        summary.total_used += record.size;
    }

    summary
}

/// Usage summary plus the plan context the dashboard renders it against
#[derive(Debug)]
pub struct UsageReport {
    pub summary: UsageSummary,
    pub capacity: i64,
    pub plan: Plan,
}

/// On-demand analytics over a user's stored files.
pub struct UsageService {
    files: Arc<dyn FileRepository>,
    users: Arc<dyn UserRepository>,
}

impl UsageService {
    pub fn new(files: Arc<dyn FileRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { files, users }
    }

    pub async fn summarize(&self, user_id: Uuid) -> Result<UsageReport> {
        let user = self
            .users
            .find(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let records = self.files.list_owned(user_id).await?;
        let summary = summarize_records(&records);

        Ok(UsageReport {
            summary,
            capacity: user.plan().limits().max_bytes,
            plan: user.plan(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::shared::test_helpers::{
        file_record_created_at, sample_user, MemoryFileRepository, MemoryUserRepository,
    };

    fn record(owner: Uuid, name: &str, size: i64, age_secs: i64) -> FileRecord {
        file_record_created_at(owner, name, size, Utc::now() - Duration::seconds(age_secs))
    }

    #[test]
    fn fold_accumulates_sizes_per_bucket() {
        let owner = Uuid::new_v4();
        let records = vec![
            record(owner, "a.pdf", 10, 30),
            record(owner, "b.png", 20, 20),
            record(owner, "c.docx", 30, 10),
        ];

        let summary = summarize_records(&records);
        assert_eq!(summary.documents.used_space, 40);
        assert_eq!(summary.images.used_space, 20);
        assert_eq!(summary.media.used_space, 0);
        assert_eq!(summary.others.used_space, 0);
        assert_eq!(summary.total_used, 60);
    }

    #[test]
    fn video_and_audio_fold_into_media() {
        let owner = Uuid::new_v4();
        let records = vec![
            record(owner, "clip.mp4", 100, 10),
            record(owner, "song.mp3", 50, 5),
        ];

        let summary = summarize_records(&records);
        assert_eq!(summary.media.used_space, 150);
        assert_eq!(summary.total_used, 150);
    }

    #[test]
    fn last_update_is_the_bucket_maximum() {
        let owner = Uuid::new_v4();
        let older = record(owner, "old.pdf", 1, 3600);
        let newer = record(owner, "new.pdf", 1, 60);
        let newest_ts = newer.updated_at;

        let summary = summarize_records(&[older, newer]);
        assert_eq!(summary.documents.last_update, Some(newest_ts));
        assert_eq!(summary.images.last_update, None);
    }

    #[test]
    fn empty_sets_summarize_to_zero() {
        let summary = summarize_records(&[]);
        assert_eq!(summary, UsageSummary::default());
    }

    #[tokio::test]
    async fn report_carries_the_plan_ceiling() {
        let files = Arc::new(MemoryFileRepository::new());
        let users = Arc::new(MemoryUserRepository::new());
        let user = sample_user(Plan::Starter);
        users.seed(user.clone());
        files.seed(record(user.id, "a.pdf", 1024, 10));

        let service = UsageService::new(
            Arc::clone(&files) as Arc<dyn FileRepository>,
            Arc::clone(&users) as Arc<dyn UserRepository>,
        );
        let report = service.summarize(user.id).await.expect("summarize failed");

        assert_eq!(report.plan, Plan::Starter);
        assert_eq!(report.capacity, Plan::Starter.limits().max_bytes);
        assert_eq!(report.summary.total_used, 1024);
    }

    #[tokio::test]
    async fn unknown_users_are_not_found() {
        let files = Arc::new(MemoryFileRepository::new());
        let users = Arc::new(MemoryUserRepository::new());
        let service = UsageService::new(
            Arc::clone(&files) as Arc<dyn FileRepository>,
            Arc::clone(&users) as Arc<dyn UserRepository>,
        );

        let result = service.summarize(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
