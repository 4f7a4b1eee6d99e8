use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::features::files::handlers::{
    delete_file, get_file, list_files, rename_file, share_file, unshare_file,
};
use crate::features::files::services::DirectoryService;

/// Create routes for the files feature
pub fn routes(service: Arc<DirectoryService>) -> Router {
    Router::new()
        .route("/api/files", get(list_files))
        .route("/api/files/{id}", get(get_file).delete(delete_file))
        .route("/api/files/{id}/rename", patch(rename_file))
        .route("/api/files/{id}/share", post(share_file))
        .route("/api/files/{id}/unshare", post(unshare_file))
        .with_state(service)
}
