use axum::{routing::get, Router};
use std::sync::Arc;

use crate::features::dashboard::handlers::get_usage;
use crate::features::dashboard::services::UsageService;

/// Create routes for the dashboard feature
pub fn routes(service: Arc<UsageService>) -> Router {
    Router::new()
        .route("/api/dashboard/usage", get(get_usage))
        .with_state(service)
}
