use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::features::users::handlers::{
    change_email, delete_account, get_me, request_email_change, update_avatar, update_plan,
};
use crate::features::users::services::UserService;
use crate::shared::constants::MAX_AVATAR_SIZE;

/// Create routes for the users feature
pub fn routes(service: Arc<UserService>) -> Router {
    Router::new()
        .route("/api/users/me", get(get_me).delete(delete_account))
        .route("/api/users/me/plan", put(update_plan))
        .route("/api/users/me/email/request", post(request_email_change))
        .route("/api/users/me/email", put(change_email))
        .route(
            "/api/users/me/avatar",
            // Allow multipart overhead on top of the avatar cap
            put(update_avatar)
                .layer(DefaultBodyLimit::max(MAX_AVATAR_SIZE as usize + 1024 * 1024)),
        )
        .with_state(service)
}
