use serde::Deserialize;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::classify::FileKind;
use crate::shared::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Sortable columns for file listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    CreatedAt,
    Name,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSort {
    pub key: SortKey,
    pub dir: SortDir,
}

impl Default for FileSort {
    fn default() -> Self {
        Self {
            key: SortKey::CreatedAt,
            dir: SortDir::Desc,
        }
    }
}

impl FileSort {
    /// Parse the `sort` query parameter, e.g. `created_at-desc`, `name-asc`,
    /// `size-desc`. An empty value yields the default ordering.
    pub fn parse(value: &str) -> Result<Self> {
        if value.is_empty() {
            return Ok(Self::default());
        }

        let (key, dir) = value
            .rsplit_once('-')
            .ok_or_else(|| AppError::BadRequest(format!("Invalid sort: '{}'", value)))?;

        let key = match key {
            "created_at" => SortKey::CreatedAt,
            "name" => SortKey::Name,
            "size" => SortKey::Size,
            _ => return Err(AppError::BadRequest(format!("Unknown sort key: '{}'", key))),
        };

        let dir = match dir {
            "asc" => SortDir::Asc,
            "desc" => SortDir::Desc,
            _ => {
                return Err(AppError::BadRequest(format!(
                    "Unknown sort direction: '{}'",
                    dir
                )))
            }
        };

        Ok(Self { key, dir })
    }
}

/// A fully parsed listing query
#[derive(Debug, Clone, Default)]
pub struct FileQuery {
    /// Keep only these kinds; empty means all
    pub kinds: Vec<FileKind>,
    /// Substring match on the display name
    pub search: Option<String>,
    pub sort: FileSort,
    /// Id of the last record of the previous page
    pub cursor: Option<Uuid>,
    pub page_size: Option<i64>,
}

impl FileQuery {
    /// Clamped page size
    pub fn limit(&self) -> i64 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}
