use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::features::users::dtos::UserResponseDto;
use crate::shared::validation::OTP_CODE_REGEX;

/// Request DTO for sending a one-time passcode.
///
/// `full_name` turns an unknown email into a sign-up.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequestOtpDto {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 2, max = 100, message = "Full name must be at least 2 characters"))]
    pub full_name: Option<String>,
}

/// Request DTO for verifying a passcode
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpDto {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(regex(path = *OTP_CODE_REGEX, message = "OTP must be exactly 6 digits"))]
    pub code: String,
}

/// Response DTO for a freshly opened session
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponseDto {
    /// Bearer token for subsequent requests
    pub token: String,
    pub user: UserResponseDto,
}

/// Response DTO acknowledging a sent passcode
#[derive(Debug, Serialize, ToSchema)]
pub struct OtpSentResponseDto {
    pub sent: bool,
}
