use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use validator::Validate;

use crate::core::error::AppError;
use crate::features::auth::dtos::{
    OtpSentResponseDto, RequestOtpDto, SessionResponseDto, VerifyOtpDto,
};
use crate::features::auth::services::AuthService;
use crate::features::users::dtos::UserResponseDto;
use crate::shared::types::ApiResponse;

/// Request a one-time passcode
///
/// Sends a six-digit code to the given email. Supplying `full_name` creates
/// the account on first contact.
#[utoipa::path(
    post,
    path = "/api/auth/otp/request",
    tag = "auth",
    request_body = RequestOtpDto,
    responses(
        (status = 200, description = "Code sent", body = ApiResponse<OtpSentResponseDto>),
        (status = 400, description = "Invalid email"),
        (status = 404, description = "Unknown email without sign-up data")
    )
)]
pub async fn request_otp(
    State(service): State<Arc<AuthService>>,
    Json(dto): Json<RequestOtpDto>,
) -> Result<Json<ApiResponse<OtpSentResponseDto>>, AppError> {
    dto.validate()?;

    service
        .request_otp(&dto.email, dto.full_name.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(
        Some(OtpSentResponseDto { sent: true }),
        Some("Verification code sent".to_string()),
        None,
    )))
}

/// Verify a one-time passcode and open a session
#[utoipa::path(
    post,
    path = "/api/auth/otp/verify",
    tag = "auth",
    request_body = VerifyOtpDto,
    responses(
        (status = 201, description = "Session opened", body = ApiResponse<SessionResponseDto>),
        (status = 400, description = "Malformed code"),
        (status = 401, description = "Wrong, expired or missing code"),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn verify_otp(
    State(service): State<Arc<AuthService>>,
    Json(dto): Json<VerifyOtpDto>,
) -> Result<(StatusCode, Json<ApiResponse<SessionResponseDto>>), AppError> {
    dto.validate()?;

    let (token, user) = service.verify_otp(&dto.email, &dto.code).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(SessionResponseDto {
                token,
                user: UserResponseDto::from(user),
            }),
            None,
            None,
        )),
    ))
}
