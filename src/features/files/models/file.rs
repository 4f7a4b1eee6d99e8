use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::features::files::classify::FileKind;

/// Database model for file metadata
#[derive(Debug, Clone, FromRow)]
pub struct FileRecord {
    pub id: Uuid,
    /// Display name including extension
    pub name: String,
    /// Semantic category, always derived from `extension`
    #[sqlx(try_from = "String")]
    pub kind: FileKind,
    pub extension: String,
    pub size: i64,
    pub url: String,
    pub blob_key: String,
    pub owner_id: Uuid,
    /// Grantee emails; set semantics, never contains the owner's email
    pub shared_with: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn is_visible_to(&self, user_id: Uuid, email: &str) -> bool {
        self.owner_id == user_id || self.shared_with.iter().any(|e| e == email)
    }
}

/// Data for persisting a freshly committed upload
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub name: String,
    pub kind: FileKind,
    pub extension: String,
    pub size: i64,
    pub url: String,
    pub blob_key: String,
    pub owner_id: Uuid,
}
