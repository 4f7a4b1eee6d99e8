use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::features::dashboard::services::{BucketUsage, UsageReport};
use crate::features::plans::Plan;

#[derive(Debug, Serialize, ToSchema)]
pub struct BucketUsageDto {
    /// Bytes stored in this category
    pub used_space: i64,
    /// Freshest change in this category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl From<BucketUsage> for BucketUsageDto {
    fn from(bucket: BucketUsage) -> Self {
        Self {
            used_space: bucket.used_space,
            last_update: bucket.last_update,
        }
    }
}

/// Response DTO for the usage dashboard
#[derive(Debug, Serialize, ToSchema)]
pub struct UsageResponseDto {
    pub documents: BucketUsageDto,
    pub images: BucketUsageDto,
    pub media: BucketUsageDto,
    pub others: BucketUsageDto,
    pub total_used: i64,
    /// Plan byte ceiling
    pub capacity: i64,
    pub plan: Plan,
}

impl From<UsageReport> for UsageResponseDto {
    fn from(report: UsageReport) -> Self {
        Self {
            documents: report.summary.documents.into(),
            images: report.summary.images.into(),
            media: report.summary.media.into(),
            others: report.summary.others.into(),
            total_used: report.summary.total_used,
            capacity: report.capacity,
            plan: report.plan,
        }
    }
}
