use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::models::FileRecord;
use crate::features::files::query::FileQuery;
use crate::features::files::repository::FileRepository;
use crate::features::users::repository::UserRepository;
use crate::modules::storage::BlobStore;
use crate::shared::validation::FILE_BASE_NAME_REGEX;

/// One page of a cursor-paginated listing. A missing `next_cursor` means the
/// final page was reached.
#[derive(Debug)]
pub struct FilePage {
    pub records: Vec<FileRecord>,
    pub next_cursor: Option<Uuid>,
}

/// Query and mutation operations over a user's accessible files.
pub struct DirectoryService {
    files: Arc<dyn FileRepository>,
    users: Arc<dyn UserRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl DirectoryService {
    pub fn new(
        files: Arc<dyn FileRepository>,
        users: Arc<dyn UserRepository>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            files,
            users,
            blobs,
        }
    }

    /// List files visible to the user: owned, or shared with their email.
    pub async fn list(&self, user_id: Uuid, email: &str, query: &FileQuery) -> Result<FilePage> {
        let records = self.files.list_visible(user_id, email, query).await?;

        // A short page is the termination signal; only a full page yields a
        // cursor for the next one.
        let next_cursor = if records.len() as i64 == query.limit() {
            records.last().map(|r| r.id)
        } else {
            None
        };

        Ok(FilePage {
            records,
            next_cursor,
        })
    }

    /// Fetch a single record. Files outside the user's visible set are
    /// reported as absent rather than forbidden.
    pub async fn detail(&self, file_id: Uuid, user_id: Uuid, email: &str) -> Result<FileRecord> {
        let record = self.find_visible(file_id, user_id, email).await?;
        Ok(record)
    }

    /// Rename a file, reconstructing `name` from the new base name and the
    /// extension the record already carries. The stored extension and the
    /// derived kind never change.
    pub async fn rename(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        email: &str,
        new_base_name: &str,
        extension: &str,
    ) -> Result<String> {
        if !FILE_BASE_NAME_REGEX.is_match(new_base_name) {
            return Err(AppError::Validation(format!(
                "Invalid file name: '{}'",
                new_base_name
            )));
        }

        let record = self.find_visible(file_id, user_id, email).await?;

        let new_name = if extension.is_empty() {
            new_base_name.to_string()
        } else {
            format!("{}.{}", new_base_name, extension)
        };

        self.files.set_name(record.id, &new_name).await?;
        debug!("File renamed: id={}, name={}", record.id, new_name);

        Ok(new_name)
    }

    /// Grant read access to another user by email. Adding an existing
    /// grantee is a no-op; the owner cannot be a grantee of their own file.
    pub async fn share(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        email: &str,
        grantee_email: &str,
    ) -> Result<()> {
        let record = self.find_visible(file_id, user_id, email).await?;

        let grantee = self
            .users
            .find_by_email(grantee_email)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No user found with email '{}'", grantee_email))
            })?;

        if grantee.id == record.owner_id {
            return Err(AppError::BadRequest(
                "Cannot share a file with its owner".to_string(),
            ));
        }

        let mut shared_with = record.shared_with.clone();
        if shared_with.iter().any(|e| e == grantee_email) {
            return Ok(());
        }
        shared_with.push(grantee_email.to_string());

        self.files.set_shared_with(record.id, &shared_with).await?;
        info!("File shared: id={}, grantee={}", record.id, grantee_email);

        Ok(())
    }

    /// Revoke a grant. Removing an absent grantee is a no-op.
    pub async fn unshare(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        email: &str,
        grantee_email: &str,
    ) -> Result<()> {
        let record = self.find_visible(file_id, user_id, email).await?;

        if !record.shared_with.iter().any(|e| e == grantee_email) {
            return Ok(());
        }

        let shared_with: Vec<String> = record
            .shared_with
            .into_iter()
            .filter(|e| e != grantee_email)
            .collect();

        self.files.set_shared_with(record.id, &shared_with).await?;
        info!("File unshared: id={}, grantee={}", file_id, grantee_email);

        Ok(())
    }

    /// Delete a file and its blob. Owner-only; grantees cannot delete.
    pub async fn delete(&self, file_id: Uuid, requesting_user_id: Uuid) -> Result<()> {
        let record = self
            .files
            .find(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        if record.owner_id != requesting_user_id {
            return Err(AppError::Forbidden(
                "You do not have permission to delete this file".to_string(),
            ));
        }

        self.blobs.delete(&record.blob_key).await?;
        self.files.delete(record.id).await?;
        info!("File deleted: id={}, key={}", record.id, record.blob_key);

        Ok(())
    }

    async fn find_visible(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        email: &str,
    ) -> Result<FileRecord> {
        let record = self
            .files
            .find(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        if !record.is_visible_to(user_id, email) {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use chrono::{Duration, Utc};

    use crate::features::files::classify::FileKind;
    use crate::features::files::query::{FileSort, SortDir, SortKey};
    use crate::features::plans::Plan;
    use crate::modules::storage::{silent_progress, BlobStore};
    use crate::shared::test_helpers::{
        file_record_created_at, file_record_of_size, sample_user, user_with_email,
        MemoryBlobStore, MemoryFileRepository, MemoryUserRepository,
    };

    struct Fixture {
        files: Arc<MemoryFileRepository>,
        users: Arc<MemoryUserRepository>,
        blobs: Arc<MemoryBlobStore>,
        service: DirectoryService,
    }

    fn fixture() -> Fixture {
        let files = Arc::new(MemoryFileRepository::new());
        let users = Arc::new(MemoryUserRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = DirectoryService::new(
            Arc::clone(&files) as Arc<dyn FileRepository>,
            Arc::clone(&users) as Arc<dyn UserRepository>,
            Arc::clone(&blobs) as Arc<dyn BlobStore>,
        );
        Fixture {
            files,
            users,
            blobs,
            service,
        }
    }

    #[tokio::test]
    async fn share_is_idempotent() {
        let fx = fixture();
        let owner = sample_user(Plan::Free);
        let grantee = user_with_email(Plan::Free, "friend@example.com");
        fx.users.seed(owner.clone());
        fx.users.seed(grantee);

        let record = file_record_of_size(owner.id, "notes.txt", 10);
        let file_id = record.id;
        fx.files.seed(record);

        for _ in 0..2 {
            fx.service
                .share(file_id, owner.id, &owner.email, "friend@example.com")
                .await
                .expect("share failed");
        }

        let stored = fx.files.all();
        assert_eq!(stored[0].shared_with, vec!["friend@example.com"]);
    }

    #[tokio::test]
    async fn sharing_with_the_owner_is_rejected() {
        let fx = fixture();
        let owner = sample_user(Plan::Free);
        fx.users.seed(owner.clone());

        let record = file_record_of_size(owner.id, "notes.txt", 10);
        let file_id = record.id;
        fx.files.seed(record);

        let result = fx
            .service
            .share(file_id, owner.id, &owner.email, &owner.email)
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(fx.files.all()[0].shared_with.is_empty());
    }

    #[tokio::test]
    async fn sharing_with_an_unknown_email_is_not_found() {
        let fx = fixture();
        let owner = sample_user(Plan::Free);
        fx.users.seed(owner.clone());

        let record = file_record_of_size(owner.id, "notes.txt", 10);
        let file_id = record.id;
        fx.files.seed(record);

        let result = fx
            .service
            .share(file_id, owner.id, &owner.email, "nobody@example.com")
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn unshare_removes_the_file_from_the_grantees_listing() {
        let fx = fixture();
        let owner = sample_user(Plan::Free);
        let grantee = user_with_email(Plan::Free, "friend@example.com");
        fx.users.seed(owner.clone());
        fx.users.seed(grantee.clone());

        let record = file_record_of_size(owner.id, "shared.pdf", 10);
        let file_id = record.id;
        fx.files.seed(record);

        fx.service
            .share(file_id, owner.id, &owner.email, &grantee.email)
            .await
            .expect("share failed");

        let page = fx
            .service
            .list(grantee.id, &grantee.email, &FileQuery::default())
            .await
            .expect("list failed");
        assert_eq!(page.records.len(), 1);

        fx.service
            .unshare(file_id, owner.id, &owner.email, &grantee.email)
            .await
            .expect("unshare failed");

        let page = fx
            .service
            .list(grantee.id, &grantee.email, &FileQuery::default())
            .await
            .expect("list failed");
        assert!(page.records.is_empty());

        // Idempotent: a second revoke is a quiet no-op
        fx.service
            .unshare(file_id, owner.id, &owner.email, &grantee.email)
            .await
            .expect("unshare failed");
    }

    #[tokio::test]
    async fn only_the_owner_can_delete() {
        let fx = fixture();
        let owner = sample_user(Plan::Free);
        let grantee = user_with_email(Plan::Free, "friend@example.com");
        fx.users.seed(owner.clone());
        fx.users.seed(grantee.clone());

        let mut record = file_record_of_size(owner.id, "keep.txt", 10);
        record.shared_with = vec![grantee.email.clone()];
        let blob_key = record.blob_key.clone();
        let file_id = record.id;
        fx.files.seed(record);
        fx.blobs
            .put(&blob_key, vec![0u8; 10], "text/plain", silent_progress())
            .await
            .expect("seed blob");

        let result = fx.service.delete(file_id, grantee.id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        // Record and blob are intact after the refusal
        assert_eq!(fx.files.all().len(), 1);
        assert!(fx.blobs.contains(&blob_key));

        fx.service
            .delete(file_id, owner.id)
            .await
            .expect("owner delete failed");
        assert!(fx.files.all().is_empty());
        assert!(!fx.blobs.contains(&blob_key));
    }

    #[tokio::test]
    async fn pagination_terminates_without_duplicates() {
        let fx = fixture();
        let owner = sample_user(Plan::Free);
        fx.users.seed(owner.clone());

        let base = Utc::now();
        for i in 0..30 {
            fx.files.seed(file_record_created_at(
                owner.id,
                &format!("file-{:02}.txt", i),
                i,
                base + Duration::seconds(i),
            ));
        }

        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut cursor = None;
        let mut pages = 0;
        loop {
            let query = FileQuery {
                cursor,
                page_size: Some(12),
                ..Default::default()
            };
            let page = fx
                .service
                .list(owner.id, &owner.email, &query)
                .await
                .expect("list failed");
            pages += 1;
            for record in &page.records {
                assert!(seen.insert(record.id), "duplicate id across pages");
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
            assert!(pages < 10, "pagination did not terminate");
        }

        assert_eq!(seen.len(), 30);
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn search_matches_name_substrings() {
        let fx = fixture();
        let owner = sample_user(Plan::Free);
        fx.users.seed(owner.clone());
        fx.files
            .seed(file_record_of_size(owner.id, "Quarterly Report.pdf", 10));
        fx.files.seed(file_record_of_size(owner.id, "photo.png", 10));

        let query = FileQuery {
            search: Some("report".to_string()),
            ..Default::default()
        };
        let page = fx
            .service
            .list(owner.id, &owner.email, &query)
            .await
            .expect("list failed");

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].name, "Quarterly Report.pdf");
    }

    #[tokio::test]
    async fn kind_filter_and_sort_orders_apply() {
        let fx = fixture();
        let owner = sample_user(Plan::Free);
        fx.users.seed(owner.clone());
        fx.files.seed(file_record_of_size(owner.id, "b.txt", 20));
        fx.files.seed(file_record_of_size(owner.id, "a.txt", 30));
        fx.files.seed(file_record_of_size(owner.id, "c.png", 10));

        let query = FileQuery {
            kinds: vec![FileKind::Document],
            sort: FileSort {
                key: SortKey::Name,
                dir: SortDir::Asc,
            },
            ..Default::default()
        };
        let page = fx
            .service
            .list(owner.id, &owner.email, &query)
            .await
            .expect("list failed");
        let names: Vec<&str> = page.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        let query = FileQuery {
            sort: FileSort {
                key: SortKey::Size,
                dir: SortDir::Desc,
            },
            ..Default::default()
        };
        let page = fx
            .service
            .list(owner.id, &owner.email, &query)
            .await
            .expect("list failed");
        let sizes: Vec<i64> = page.records.iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![30, 20, 10]);
    }

    #[tokio::test]
    async fn listing_excludes_files_of_other_users() {
        let fx = fixture();
        let owner = sample_user(Plan::Free);
        let stranger = user_with_email(Plan::Free, "stranger@example.com");
        fx.users.seed(owner.clone());
        fx.users.seed(stranger.clone());
        fx.files.seed(file_record_of_size(owner.id, "private.txt", 10));

        let page = fx
            .service
            .list(stranger.id, &stranger.email, &FileQuery::default())
            .await
            .expect("list failed");
        assert!(page.records.is_empty());

        let file_id = fx.files.all()[0].id;
        let result = fx
            .service
            .detail(file_id, stranger.id, &stranger.email)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn rename_reconstructs_the_full_name() {
        let fx = fixture();
        let owner = sample_user(Plan::Free);
        fx.users.seed(owner.clone());

        let record = file_record_of_size(owner.id, "draft.docx", 10);
        let file_id = record.id;
        fx.files.seed(record);

        let new_name = fx
            .service
            .rename(file_id, owner.id, &owner.email, "final", "docx")
            .await
            .expect("rename failed");
        assert_eq!(new_name, "final.docx");

        let stored = fx.files.all();
        assert_eq!(stored[0].name, "final.docx");
        // Extension and derived kind are untouched
        assert_eq!(stored[0].extension, "docx");
        assert_eq!(stored[0].kind, FileKind::Document);
    }

    #[tokio::test]
    async fn rename_rejects_invalid_base_names() {
        let fx = fixture();
        let owner = sample_user(Plan::Free);
        fx.users.seed(owner.clone());

        let record = file_record_of_size(owner.id, "draft.docx", 10);
        let file_id = record.id;
        fx.files.seed(record);

        for bad in ["", "a/b", ".."] {
            let result = fx
                .service
                .rename(file_id, owner.id, &owner.email, bad, "docx")
                .await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{}", bad);
        }
    }
}
