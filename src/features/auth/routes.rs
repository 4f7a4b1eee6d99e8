use axum::{routing::post, Router};
use std::sync::Arc;

use crate::features::auth::handlers::{request_otp, verify_otp};
use crate::features::auth::services::AuthService;

/// Public routes for the OTP login flow
pub fn routes(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/api/auth/otp/request", post(request_otp))
        .route("/api/auth/otp/verify", post(verify_otp))
        .with_state(service)
}
