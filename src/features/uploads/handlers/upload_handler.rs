use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    Json,
};
use serde::Serialize;
use tokio_stream::StreamExt;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::uploads::manager::UploadSessionManager;
use crate::features::uploads::task::IncomingUpload;
use crate::features::users::repository::UserRepository;
use crate::shared::types::ApiResponse;

/// State for upload handlers
#[derive(Clone)]
pub struct UploadApiState {
    pub manager: Arc<UploadSessionManager>,
    pub users: Arc<dyn UserRepository>,
}

/// Multipart upload form, for OpenAPI documentation only; the handler reads
/// the multipart stream directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadBatchDto {
    /// One or more `files` fields
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub files: String,
}

/// Response DTO for a cancellation request
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelUploadResponseDto {
    pub cancelled: bool,
}

/// Upload a batch of files
///
/// Accepts multipart/form-data with one or more `files` fields and answers
/// with an SSE stream of per-task events: state transitions and progress
/// percentages. The stream ends when every task is terminal.
#[utoipa::path(
    post,
    path = "/api/files/upload",
    tag = "uploads",
    request_body(
        content = UploadBatchDto,
        content_type = "multipart/form-data",
        description = "Upload batch; repeat the `files` field per file",
    ),
    responses(
        (status = 200, description = "SSE stream of upload events", content_type = "text/event-stream"),
        (status = 400, description = "Empty or malformed batch"),
        (status = 401, description = "Authentication required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_files(
    user: AuthenticatedUser,
    State(state): State<UploadApiState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut batch: Vec<IncomingUpload> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
            debug!("Ignoring non-file field: {}", field.name().unwrap_or(""));
            continue;
        };

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let data = field.bytes().await.map_err(|e| {
            debug!("Failed to read file bytes: {}", e);
            AppError::BadRequest(format!("Failed to read file data: {}", e))
        })?;

        batch.push(IncomingUpload {
            name: file_name,
            content_type,
            data: data.to_vec(),
        });
    }

    let account = state
        .users
        .find(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let events = state.manager.submit_batch(&account, batch).await?;

    let stream = events.map(|event| Event::default().event(event.state.as_str()).json_data(&event));

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    );

    Ok(sse.into_response())
}

/// Cancel an in-flight upload task
///
/// Cooperative: the transfer reacts at its next checkpoint, deleting the
/// already-created blob and skipping the metadata record.
#[utoipa::path(
    post,
    path = "/api/files/uploads/{task_id}/cancel",
    tag = "uploads",
    params(("task_id" = Uuid, Path, description = "Upload task id")),
    responses(
        (status = 202, description = "Cancellation requested", body = ApiResponse<CancelUploadResponseDto>),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Task belongs to another user"),
        (status = 404, description = "No active task with that id")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_upload(
    user: AuthenticatedUser,
    State(state): State<UploadApiState>,
    Path(task_id): Path<Uuid>,
) -> Result<(axum::http::StatusCode, Json<ApiResponse<CancelUploadResponseDto>>)> {
    state.manager.cancel(task_id, user.user_id).await?;

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(ApiResponse::success(
            Some(CancelUploadResponseDto { cancelled: true }),
            Some("Cancellation requested".to_string()),
            None,
        )),
    ))
}
