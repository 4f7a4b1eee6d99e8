use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::features::plans::Plan;
use crate::features::users::models::User;
use crate::shared::validation::OTP_CODE_REGEX;

/// Response DTO for account data
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponseDto {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub avatar_url: String,
    pub plan: Plan,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponseDto {
    fn from(user: User) -> Self {
        let plan = user.plan();
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            avatar_url: user.avatar_url,
            plan,
            created_at: user.created_at,
        }
    }
}

/// Request DTO for a plan change.
///
/// This is the hook a billing webhook drives after checkout; the payment
/// provider's own lifecycle stays outside this service.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePlanDto {
    pub plan: Plan,
}

/// Request DTO for starting an email change. The confirmation code is sent
/// to the address being claimed.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequestEmailChangeDto {
    #[validate(email(message = "Invalid email"))]
    pub new_email: String,
}

/// Request DTO for confirming an email change
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangeEmailDto {
    #[validate(email(message = "Invalid email"))]
    pub new_email: String,
    #[validate(regex(path = *OTP_CODE_REGEX, message = "OTP must be exactly 6 digits"))]
    pub code: String,
}

/// Avatar upload form, for OpenAPI documentation only; the handler reads the
/// multipart stream directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UpdateAvatarDto {
    /// PNG or JPEG image, at most 5 MiB
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub avatar: String,
}

/// Response DTO for account deletion
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteAccountResponseDto {
    pub deleted: bool,
}
