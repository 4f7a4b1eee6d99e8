use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::files::dtos::{
    DeleteFileResponseDto, FileResponseDto, ListFilesParams, ListFilesResponseDto, RenameFileDto,
    RenameFileResponseDto, ShareFileDto, UnshareFileDto,
};
use crate::features::files::services::DirectoryService;
use crate::shared::types::ApiResponse;

/// List files visible to the current user
///
/// Owned files plus files shared with the user's email, with kind filter,
/// name search, sorting and cursor pagination.
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    params(ListFilesParams),
    responses(
        (status = 200, description = "One page of files", body = ApiResponse<ListFilesResponseDto>),
        (status = 400, description = "Invalid filter, sort or cursor"),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_files(
    user: AuthenticatedUser,
    State(service): State<Arc<DirectoryService>>,
    Query(params): Query<ListFilesParams>,
) -> Result<Json<ApiResponse<ListFilesResponseDto>>, AppError> {
    let query = params.into_query()?;
    let page = service.list(user.user_id, &user.email, &query).await?;

    let response = ListFilesResponseDto {
        files: page.records.into_iter().map(FileResponseDto::from).collect(),
        next_cursor: page.next_cursor,
    };

    Ok(Json(ApiResponse::success(Some(response), None, None)))
}

/// Fetch a single file record
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File id")),
    responses(
        (status = 200, description = "File record", body = ApiResponse<FileResponseDto>),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "File not found or not visible")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_file(
    user: AuthenticatedUser,
    State(service): State<Arc<DirectoryService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FileResponseDto>>, AppError> {
    let record = service.detail(id, user.user_id, &user.email).await?;
    Ok(Json(ApiResponse::success(
        Some(FileResponseDto::from(record)),
        None,
        None,
    )))
}

/// Rename a file
///
/// The new name is reconstructed from the base name and the record's
/// extension; the extension itself never changes.
#[utoipa::path(
    patch,
    path = "/api/files/{id}/rename",
    tag = "files",
    params(("id" = Uuid, Path, description = "File id")),
    request_body = RenameFileDto,
    responses(
        (status = 200, description = "File renamed", body = ApiResponse<RenameFileResponseDto>),
        (status = 400, description = "Invalid name"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "File not found or not visible")
    ),
    security(("bearer_auth" = []))
)]
pub async fn rename_file(
    user: AuthenticatedUser,
    State(service): State<Arc<DirectoryService>>,
    Path(id): Path<Uuid>,
    Json(dto): Json<RenameFileDto>,
) -> Result<Json<ApiResponse<RenameFileResponseDto>>, AppError> {
    dto.validate()?;

    let name = service
        .rename(id, user.user_id, &user.email, &dto.name, &dto.extension)
        .await?;

    Ok(Json(ApiResponse::success(
        Some(RenameFileResponseDto { name }),
        Some("File renamed successfully".to_string()),
        None,
    )))
}

/// Share a file with another user
///
/// Idempotent: granting an existing grantee again is a no-op.
#[utoipa::path(
    post,
    path = "/api/files/{id}/share",
    tag = "files",
    params(("id" = Uuid, Path, description = "File id")),
    request_body = ShareFileDto,
    responses(
        (status = 200, description = "Access granted", body = ApiResponse<FileResponseDto>),
        (status = 400, description = "Invalid email or self-share"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "File or grantee not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn share_file(
    user: AuthenticatedUser,
    State(service): State<Arc<DirectoryService>>,
    Path(id): Path<Uuid>,
    Json(dto): Json<ShareFileDto>,
) -> Result<Json<ApiResponse<FileResponseDto>>, AppError> {
    dto.validate()?;

    service
        .share(id, user.user_id, &user.email, &dto.email)
        .await?;
    let record = service.detail(id, user.user_id, &user.email).await?;

    Ok(Json(ApiResponse::success(
        Some(FileResponseDto::from(record)),
        Some("File shared successfully".to_string()),
        None,
    )))
}

/// Revoke a grant
///
/// Idempotent: revoking an absent grantee is a no-op.
#[utoipa::path(
    post,
    path = "/api/files/{id}/unshare",
    tag = "files",
    params(("id" = Uuid, Path, description = "File id")),
    request_body = UnshareFileDto,
    responses(
        (status = 200, description = "Access revoked", body = ApiResponse<FileResponseDto>),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "File not found or not visible")
    ),
    security(("bearer_auth" = []))
)]
pub async fn unshare_file(
    user: AuthenticatedUser,
    State(service): State<Arc<DirectoryService>>,
    Path(id): Path<Uuid>,
    Json(dto): Json<UnshareFileDto>,
) -> Result<Json<ApiResponse<FileResponseDto>>, AppError> {
    dto.validate()?;

    service
        .unshare(id, user.user_id, &user.email, &dto.email)
        .await?;
    let record = service.detail(id, user.user_id, &user.email).await?;

    Ok(Json(ApiResponse::success(
        Some(FileResponseDto::from(record)),
        Some("Access revoked".to_string()),
        None,
    )))
}

/// Delete a file
///
/// Owner-only. Deletes the blob and the metadata record.
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File id")),
    responses(
        (status = 200, description = "File deleted", body = ApiResponse<DeleteFileResponseDto>),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_file(
    user: AuthenticatedUser,
    State(service): State<Arc<DirectoryService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeleteFileResponseDto>>, AppError> {
    service.delete(id, user.user_id).await?;

    Ok(Json(ApiResponse::success(
        Some(DeleteFileResponseDto { deleted: true }),
        Some("File deleted successfully".to_string()),
        None,
    )))
}
