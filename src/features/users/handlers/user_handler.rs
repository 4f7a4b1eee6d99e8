use axum::{
    extract::{Multipart, State},
    Json,
};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::users::dtos::{
    ChangeEmailDto, DeleteAccountResponseDto, RequestEmailChangeDto, UpdateAvatarDto,
    UpdatePlanDto, UserResponseDto,
};
use crate::features::users::services::UserService;
use crate::shared::types::ApiResponse;

/// Fetch the current account
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Account data", body = ApiResponse<UserResponseDto>),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    user: AuthenticatedUser,
    State(service): State<Arc<UserService>>,
) -> Result<Json<ApiResponse<UserResponseDto>>, AppError> {
    let account = service.me(user.user_id).await?;
    Ok(Json(ApiResponse::success(
        Some(UserResponseDto::from(account)),
        None,
        None,
    )))
}

/// Change the subscription tier
///
/// Driven by the billing webhook after a completed checkout; the payment
/// provider's own flow is not part of this service.
#[utoipa::path(
    put,
    path = "/api/users/me/plan",
    tag = "users",
    request_body = UpdatePlanDto,
    responses(
        (status = 200, description = "Plan updated", body = ApiResponse<UserResponseDto>),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_plan(
    user: AuthenticatedUser,
    State(service): State<Arc<UserService>>,
    Json(dto): Json<UpdatePlanDto>,
) -> Result<Json<ApiResponse<UserResponseDto>>, AppError> {
    dto.validate()?;

    let account = service.update_plan(user.user_id, dto.plan).await?;
    Ok(Json(ApiResponse::success(
        Some(UserResponseDto::from(account)),
        Some("Plan updated".to_string()),
        None,
    )))
}

/// Start an email change
///
/// Sends a confirmation code to the address being claimed.
#[utoipa::path(
    post,
    path = "/api/users/me/email/request",
    tag = "users",
    request_body = RequestEmailChangeDto,
    responses(
        (status = 200, description = "Code sent to the new address"),
        (status = 400, description = "Invalid or already-used email"),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn request_email_change(
    user: AuthenticatedUser,
    State(service): State<Arc<UserService>>,
    Json(dto): Json<RequestEmailChangeDto>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    dto.validate()?;

    service
        .request_email_change(user.user_id, &dto.new_email)
        .await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Verification code sent to the new address".to_string()),
        None,
    )))
}

/// Confirm an email change
#[utoipa::path(
    put,
    path = "/api/users/me/email",
    tag = "users",
    request_body = ChangeEmailDto,
    responses(
        (status = 200, description = "Email updated", body = ApiResponse<UserResponseDto>),
        (status = 400, description = "Invalid or already-used email"),
        (status = 401, description = "Wrong, expired or missing code")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_email(
    user: AuthenticatedUser,
    State(service): State<Arc<UserService>>,
    Json(dto): Json<ChangeEmailDto>,
) -> Result<Json<ApiResponse<UserResponseDto>>, AppError> {
    dto.validate()?;

    let account = service
        .change_email(user.user_id, &dto.new_email, &dto.code)
        .await?;
    Ok(Json(ApiResponse::success(
        Some(UserResponseDto::from(account)),
        Some("Email updated".to_string()),
        None,
    )))
}

/// Upload a new avatar image
///
/// Accepts multipart/form-data with a single `avatar` image field.
#[utoipa::path(
    put,
    path = "/api/users/me/avatar",
    tag = "users",
    request_body(
        content = UpdateAvatarDto,
        content_type = "multipart/form-data",
        description = "Avatar image (PNG or JPEG, at most 5 MiB)",
    ),
    responses(
        (status = 200, description = "Avatar updated", body = ApiResponse<UserResponseDto>),
        (status = 400, description = "Missing, oversized or non-image file"),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_avatar(
    user: AuthenticatedUser,
    State(service): State<Arc<UserService>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UserResponseDto>>, AppError> {
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();
        if field_name == "avatar" {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let data = field.bytes().await.map_err(|e| {
                AppError::BadRequest(format!("Failed to read avatar data: {}", e))
            })?;
            image = Some((content_type, data.to_vec()));
        } else {
            debug!("Ignoring unknown field: {}", field_name);
        }
    }

    let (content_type, data) =
        image.ok_or_else(|| AppError::BadRequest("Avatar file is required".to_string()))?;

    let account = service
        .update_avatar(user.user_id, &content_type, data)
        .await?;
    Ok(Json(ApiResponse::success(
        Some(UserResponseDto::from(account)),
        Some("Avatar updated".to_string()),
        None,
    )))
}

/// Delete the account
///
/// Cascades to every owned file: blobs, records, then the account itself.
#[utoipa::path(
    delete,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Account deleted", body = ApiResponse<DeleteAccountResponseDto>),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_account(
    user: AuthenticatedUser,
    State(service): State<Arc<UserService>>,
) -> Result<Json<ApiResponse<DeleteAccountResponseDto>>, AppError> {
    service.delete_account(user.user_id).await?;
    Ok(Json(ApiResponse::success(
        Some(DeleteAccountResponseDto { deleted: true }),
        Some("Account deleted".to_string()),
        None,
    )))
}
