use axum::{extract::State, Json};
use std::sync::Arc;

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::dashboard::dtos::UsageResponseDto;
use crate::features::dashboard::services::UsageService;
use crate::shared::types::ApiResponse;

/// Per-category storage usage for the current user
///
/// Recomputed from the live record set on every call; nothing is cached.
#[utoipa::path(
    get,
    path = "/api/dashboard/usage",
    tag = "dashboard",
    responses(
        (status = 200, description = "Usage summary", body = ApiResponse<UsageResponseDto>),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_usage(
    user: AuthenticatedUser,
    State(service): State<Arc<UsageService>>,
) -> Result<Json<ApiResponse<UsageResponseDto>>, AppError> {
    let report = service.summarize(user.user_id).await?;
    Ok(Json(ApiResponse::success(
        Some(UsageResponseDto::from(report)),
        None,
        None,
    )))
}
