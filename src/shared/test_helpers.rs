//! In-memory fakes standing in for the external stores in unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::classify::classify;
use crate::features::files::models::{FileRecord, NewFileRecord};
use crate::features::files::query::{FileQuery, SortDir, SortKey};
use crate::features::files::repository::FileRepository;
use crate::features::plans::Plan;
use crate::features::users::models::{NewUser, User};
use crate::features::users::repository::UserRepository;
use crate::modules::storage::{BlobStore, ProgressSink, StoredBlob};
use crate::shared::constants::AVATAR_PLACEHOLDER_URL;

pub fn sample_user(plan: Plan) -> User {
    user_with_email(plan, "owner@example.com")
}

pub fn user_with_email(plan: Plan, email: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        full_name: "Test User".to_string(),
        email: email.to_string(),
        avatar_url: AVATAR_PLACEHOLDER_URL.to_string(),
        avatar_key: None,
        plan: plan.as_str().to_string(),
        billing_customer_id: None,
        otp_digest: None,
        otp_expires_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn file_record_of_size(owner_id: Uuid, name: &str, size: i64) -> FileRecord {
    file_record_created_at(owner_id, name, size, Utc::now())
}

pub fn file_record_created_at(
    owner_id: Uuid,
    name: &str,
    size: i64,
    created_at: DateTime<Utc>,
) -> FileRecord {
    let (kind, extension) = classify(name);
    let blob_key = format!("{}/{}", owner_id, Uuid::new_v4());
    FileRecord {
        id: Uuid::new_v4(),
        name: name.to_string(),
        kind,
        extension,
        size,
        url: format!("memory://{}", blob_key),
        blob_key,
        owner_id,
        shared_with: Vec::new(),
        created_at,
        updated_at: created_at,
    }
}

// ============================================================================
// File repository fake
// ============================================================================

#[derive(Default)]
pub struct MemoryFileRepository {
    files: Mutex<Vec<FileRecord>>,
    fail_next_insert: AtomicBool,
}

impl MemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: FileRecord) {
        self.files.lock().unwrap().push(record);
    }

    pub fn all(&self) -> Vec<FileRecord> {
        self.files.lock().unwrap().clone()
    }

    /// Make the next insert fail, simulating a record-store outage after a
    /// completed transfer.
    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }
}

/// Mirror of the keyset ordering used by the Postgres repository:
/// sort column first, record id as tie-breaker.
fn compare(a: &FileRecord, b: &FileRecord, key: SortKey) -> std::cmp::Ordering {
    let by_key = match key {
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Size => a.size.cmp(&b.size),
    };
    by_key.then(a.id.cmp(&b.id))
}

#[async_trait]
impl FileRepository for MemoryFileRepository {
    async fn insert(&self, file: NewFileRecord) -> Result<FileRecord> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(AppError::ExternalService(
                "record store unavailable".to_string(),
            ));
        }

        let now = Utc::now();
        let record = FileRecord {
            id: Uuid::new_v4(),
            name: file.name,
            kind: file.kind,
            extension: file.extension,
            size: file.size,
            url: file.url,
            blob_key: file.blob_key,
            owner_id: file.owner_id,
            shared_with: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.files.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find(&self, id: Uuid) -> Result<Option<FileRecord>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == id)
            .cloned())
    }

    async fn list_visible(
        &self,
        user_id: Uuid,
        email: &str,
        query: &FileQuery,
    ) -> Result<Vec<FileRecord>> {
        let files = self.files.lock().unwrap();

        let cursor = match query.cursor {
            Some(cursor_id) => Some(
                files
                    .iter()
                    .find(|f| f.id == cursor_id)
                    .cloned()
                    .ok_or_else(|| {
                        AppError::BadRequest("Unknown pagination cursor".to_string())
                    })?,
            ),
            None => None,
        };

        let search = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut visible: Vec<FileRecord> = files
            .iter()
            .filter(|f| f.is_visible_to(user_id, email))
            .filter(|f| query.kinds.is_empty() || query.kinds.contains(&f.kind))
            .filter(|f| {
                search
                    .as_deref()
                    .map(|s| f.name.to_lowercase().contains(s))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        drop(files);

        visible.sort_by(|a, b| {
            let ordering = compare(a, b, query.sort.key);
            match query.sort.dir {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            }
        });

        if let Some(cursor) = cursor {
            visible.retain(|f| {
                let ordering = compare(f, &cursor, query.sort.key);
                match query.sort.dir {
                    SortDir::Asc => ordering == std::cmp::Ordering::Greater,
                    SortDir::Desc => ordering == std::cmp::Ordering::Less,
                }
            });
        }

        visible.truncate(query.limit() as usize);
        Ok(visible)
    }

    async fn list_owned(&self, owner_id: Uuid) -> Result<Vec<FileRecord>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn total_size(&self, owner_id: Uuid) -> Result<i64> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.owner_id == owner_id)
            .map(|f| f.size)
            .sum())
    }

    async fn set_name(&self, id: Uuid, name: &str) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        let record = files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;
        record.name = name.to_string();
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn set_shared_with(&self, id: Uuid, emails: &[String]) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        let record = files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;
        record.shared_with = emails.to_vec();
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.files.lock().unwrap().retain(|f| f.id != id);
        Ok(())
    }
}

// ============================================================================
// User repository fake
// ============================================================================

#[derive(Default)]
pub struct MemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }

    pub fn all(&self) -> Vec<User> {
        self.users.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            full_name: user.full_name,
            email: user.email,
            avatar_url: user.avatar_url,
            avatar_key: None,
            plan: Plan::Free.as_str().to_string(),
            billing_customer_id: None,
            otp_digest: None,
            otp_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn find(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn set_plan(&self, id: Uuid, plan: Plan) -> Result<()> {
        self.update(id, |u| u.plan = plan.as_str().to_string())
    }

    async fn set_email(&self, id: Uuid, email: &str) -> Result<()> {
        self.update(id, |u| u.email = email.to_string())
    }

    async fn set_avatar(&self, id: Uuid, url: &str, key: Option<&str>) -> Result<()> {
        self.update(id, |u| {
            u.avatar_url = url.to_string();
            u.avatar_key = key.map(str::to_string);
        })
    }

    async fn set_otp(&self, id: Uuid, digest: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.update(id, |u| {
            u.otp_digest = Some(digest.to_string());
            u.otp_expires_at = Some(expires_at);
        })
    }

    async fn clear_otp(&self, id: Uuid) -> Result<()> {
        self.update(id, |u| {
            u.otp_digest = None;
            u.otp_expires_at = None;
        })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.users.lock().unwrap().retain(|u| u.id != id);
        Ok(())
    }
}

impl MemoryUserRepository {
    fn update(&self, id: Uuid, apply: impl FnOnce(&mut User)) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        apply(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}

// ============================================================================
// Blob store fake
// ============================================================================

pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    /// When present, `put` holds the transfer open until a permit arrives
    gate: Option<Arc<Semaphore>>,
    /// Transfers to keys with this suffix fail
    fail_suffix: Mutex<Option<String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            gate: None,
            fail_suffix: Mutex::new(None),
        }
    }

    /// A store whose transfers block until [`release`](Self::release).
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new()
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn fail_put_for(&self, suffix: &str) {
        *self.fail_suffix.lock().unwrap() = Some(suffix.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().unwrap().is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
        progress: ProgressSink,
    ) -> Result<StoredBlob> {
        let total = data.len() as u64;
        progress(0, total);

        let failing = self
            .fail_suffix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|suffix| key.ends_with(suffix));
        if failing {
            return Err(AppError::Transfer(format!(
                "simulated transfer failure for '{}'",
                key
            )));
        }

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| AppError::Transfer("gate closed".to_string()))?;
            permit.forget();
        }

        // Report quarter-step progress the way a chunked transfer would
        for step in 1..=4u64 {
            progress(total * step / 4, total);
        }

        let size = data.len() as i64;
        self.blobs.lock().unwrap().insert(key.to_string(), data);

        Ok(StoredBlob {
            key: key.to_string(),
            size,
            url: format!("memory://{}", key),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.contains(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}
