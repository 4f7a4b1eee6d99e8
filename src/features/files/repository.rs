use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::models::{FileRecord, NewFileRecord};
use crate::features::files::query::{FileQuery, SortDir, SortKey};

const FILE_COLUMNS: &str = "id, name, kind, extension, size, url, blob_key, owner_id, \
                            shared_with, created_at, updated_at";

/// Persistence port for file metadata.
///
/// The service layer talks to this trait so the record store stays an
/// external collaborator; `PgFileRepository` is the production
/// implementation.
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn insert(&self, file: NewFileRecord) -> Result<FileRecord>;

    async fn find(&self, id: Uuid) -> Result<Option<FileRecord>>;

    /// Records visible to the user: owned or shared with their email.
    /// Applies kind filter, name search, ordering and keyset cursor.
    async fn list_visible(
        &self,
        user_id: Uuid,
        email: &str,
        query: &FileQuery,
    ) -> Result<Vec<FileRecord>>;

    /// Every record owned by the user, unfiltered.
    async fn list_owned(&self, owner_id: Uuid) -> Result<Vec<FileRecord>>;

    /// Sum of `size` over the owner's records. Recomputed per call; the
    /// admission gate must never rely on a cached value.
    async fn total_size(&self, owner_id: Uuid) -> Result<i64>;

    async fn set_name(&self, id: Uuid, name: &str) -> Result<()>;

    async fn set_shared_with(&self, id: Uuid, emails: &[String]) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Postgres-backed file metadata repository
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn sort_column(key: SortKey) -> &'static str {
    match key {
        SortKey::CreatedAt => "created_at",
        SortKey::Name => "name",
        SortKey::Size => "size",
    }
}

fn sort_direction(dir: SortDir) -> &'static str {
    match dir {
        SortDir::Asc => "ASC",
        SortDir::Desc => "DESC",
    }
}

/// Escape LIKE wildcards so search text is matched literally
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn insert(&self, file: NewFileRecord) -> Result<FileRecord> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "INSERT INTO files (name, kind, extension, size, url, blob_key, owner_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(&file.name)
        .bind(file.kind.as_str())
        .bind(&file.extension)
        .bind(file.size)
        .bind(&file.url)
        .bind(&file.blob_key)
        .bind(file.owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find(&self, id: Uuid) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_visible(
        &self,
        user_id: Uuid,
        email: &str,
        query: &FileQuery,
    ) -> Result<Vec<FileRecord>> {
        // Keyset pagination orders by (sort column, id); the cursor row is
        // looked up to recover its sort value.
        let cursor_row = match query.cursor {
            Some(cursor_id) => Some(self.find(cursor_id).await?.ok_or_else(|| {
                AppError::BadRequest("Unknown pagination cursor".to_string())
            })?),
            None => None,
        };

        let column = sort_column(query.sort.key);
        let direction = sort_direction(query.sort.dir);
        let comparator = match query.sort.dir {
            SortDir::Asc => ">",
            SortDir::Desc => "<",
        };

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {FILE_COLUMNS} FROM files WHERE (owner_id = "));
        builder.push_bind(user_id);
        builder.push(" OR ");
        builder.push_bind(email);
        builder.push(" = ANY(shared_with))");

        if !query.kinds.is_empty() {
            let kinds: Vec<String> = query.kinds.iter().map(|k| k.as_str().to_string()).collect();
            builder.push(" AND kind = ANY(");
            builder.push_bind(kinds);
            builder.push(")");
        }

        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            builder.push(" AND name ILIKE ");
            builder.push_bind(format!("%{}%", escape_like(search)));
        }

        if let Some(cursor) = &cursor_row {
            builder.push(format!(" AND ({column}, id) {comparator} ("));
            match query.sort.key {
                SortKey::CreatedAt => {
                    builder.push_bind(cursor.created_at);
                }
                SortKey::Name => {
                    builder.push_bind(cursor.name.clone());
                }
                SortKey::Size => {
                    builder.push_bind(cursor.size);
                }
            }
            builder.push(", ");
            builder.push_bind(cursor.id);
            builder.push(")");
        }

        builder.push(format!(
            " ORDER BY {column} {direction}, id {direction} LIMIT "
        ));
        builder.push_bind(query.limit());

        let records = builder
            .build_query_as::<FileRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn list_owned(&self, owner_id: Uuid) -> Result<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn total_size(&self, owner_id: Uuid) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(size), 0)::BIGINT FROM files WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn set_name(&self, id: Uuid, name: &str) -> Result<()> {
        let result = sqlx::query("UPDATE files SET name = $1, updated_at = NOW() WHERE id = $2")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("File not found".to_string()));
        }
        Ok(())
    }

    async fn set_shared_with(&self, id: Uuid, emails: &[String]) -> Result<()> {
        let result =
            sqlx::query("UPDATE files SET shared_with = $1, updated_at = NOW() WHERE id = $2")
                .bind(emails)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("File not found".to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }
}
