use axum::{extract::DefaultBodyLimit, routing::post, Router};

use crate::features::uploads::handlers::{cancel_upload, upload_files, UploadApiState};

/// Create routes for the upload pipeline
pub fn routes(state: UploadApiState, max_batch_bytes: usize) -> Router {
    Router::new()
        .route(
            "/api/files/upload",
            // Allow body size up to the largest admissible batch plus
            // multipart overhead
            post(upload_files).layer(DefaultBodyLimit::max(max_batch_bytes + 1024 * 1024)),
        )
        .route("/api/files/uploads/{task_id}/cancel", post(cancel_upload))
        .with_state(state)
}
