pub mod usage_service;

pub use usage_service::{BucketUsage, UsageReport, UsageService, UsageSummary};
