use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::files::classify::FileKind;
use crate::features::files::models::FileRecord;
use crate::features::files::query::{FileQuery, FileSort};

/// Query parameters for the file listing endpoint
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListFilesParams {
    /// Comma-separated kind filter. Accepts the sidebar section names
    /// (`documents`, `images`, `media`, `others`) as well as raw kinds.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Substring match on the file name
    pub search: Option<String>,
    /// `created_at|name|size` + `-asc|-desc`, default `created_at-desc`
    pub sort: Option<String>,
    /// Id of the last record of the previous page
    pub cursor: Option<Uuid>,
    #[param(minimum = 1, maximum = 100)]
    pub page_size: Option<i64>,
}

impl ListFilesParams {
    pub fn into_query(self) -> Result<FileQuery> {
        let mut kinds: Vec<FileKind> = Vec::new();
        if let Some(filter) = self.kind.as_deref().filter(|s| !s.is_empty()) {
            for token in filter.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                for &kind in parse_kind_token(token)? {
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
            }
        }

        let sort = match self.sort.as_deref() {
            Some(value) => FileSort::parse(value)?,
            None => FileSort::default(),
        };

        Ok(FileQuery {
            kinds,
            search: self.search,
            sort,
            cursor: self.cursor,
            page_size: self.page_size,
        })
    }
}

fn parse_kind_token(token: &str) -> Result<&'static [FileKind]> {
    match token {
        "document" | "documents" => Ok(&[FileKind::Document]),
        "image" | "images" => Ok(&[FileKind::Image]),
        // The media section folds both audiovisual kinds together
        "media" => Ok(&[FileKind::Video, FileKind::Audio]),
        "video" => Ok(&[FileKind::Video]),
        "audio" => Ok(&[FileKind::Audio]),
        "other" | "others" => Ok(&[FileKind::Other]),
        _ => Err(AppError::BadRequest(format!(
            "Unknown file type filter: '{}'",
            token
        ))),
    }
}

/// Response DTO for a single file record
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileResponseDto {
    pub id: Uuid,
    pub name: String,
    pub kind: FileKind,
    pub extension: String,
    pub size: i64,
    pub url: String,
    pub owner_id: Uuid,
    pub shared_with: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FileRecord> for FileResponseDto {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            kind: record.kind,
            extension: record.extension,
            size: record.size,
            url: record.url,
            owner_id: record.owner_id,
            shared_with: record.shared_with,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Response DTO for the listing endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct ListFilesResponseDto {
    pub files: Vec<FileResponseDto>,
    /// Cursor for the next page; absent on the final page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Uuid>,
}

/// Request DTO for renaming a file
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RenameFileDto {
    /// New base name, without the extension
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,
    /// Extension the record already carries; never re-derived
    #[validate(length(max = 32, message = "extension too long"))]
    pub extension: String,
}

/// Response DTO for rename
#[derive(Debug, Serialize, ToSchema)]
pub struct RenameFileResponseDto {
    /// The reconstructed full name
    pub name: String,
}

/// Request DTO for granting access
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ShareFileDto {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
}

/// Request DTO for revoking access
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UnshareFileDto {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
}

/// Response DTO for delete operations
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteFileResponseDto {
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::files::query::{SortDir, SortKey};

    #[test]
    fn media_section_expands_to_both_kinds() {
        let params = ListFilesParams {
            kind: Some("media".to_string()),
            ..Default::default()
        };
        let query = params.into_query().unwrap();
        assert_eq!(query.kinds, vec![FileKind::Video, FileKind::Audio]);
    }

    #[test]
    fn kind_tokens_deduplicate() {
        let params = ListFilesParams {
            kind: Some("documents,document, media".to_string()),
            ..Default::default()
        };
        let query = params.into_query().unwrap();
        assert_eq!(
            query.kinds,
            vec![FileKind::Document, FileKind::Video, FileKind::Audio]
        );
    }

    #[test]
    fn unknown_kind_token_is_rejected() {
        let params = ListFilesParams {
            kind: Some("archives".to_string()),
            ..Default::default()
        };
        assert!(params.into_query().is_err());
    }

    #[test]
    fn missing_sort_defaults_to_created_at_desc() {
        let query = ListFilesParams::default().into_query().unwrap();
        assert_eq!(query.sort.key, SortKey::CreatedAt);
        assert_eq!(query.sort.dir, SortDir::Desc);
        assert!(query.kinds.is_empty());
    }
}
