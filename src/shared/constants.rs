/// Default page size for file listings
pub const DEFAULT_PAGE_SIZE: i64 = 12;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

/// Per-file upload cap in bytes (50 MiB)
pub const MAX_FILE_SIZE: i64 = 50 * 1024 * 1024;

/// Avatar image cap in bytes (5 MiB)
pub const MAX_AVATAR_SIZE: i64 = 5 * 1024 * 1024;

/// Avatar shown for accounts that never uploaded one
pub const AVATAR_PLACEHOLDER_URL: &str =
    "https://img.freepik.com/free-psd/3d-illustration-person-with-sunglasses_23-2149436188.jpg";

/// Content types accepted for avatar uploads
pub const ALLOWED_AVATAR_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];
