use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::auth::{dtos as auth_dtos, handlers as auth_handlers};
use crate::features::dashboard::{dtos as dashboard_dtos, handlers as dashboard_handlers};
use crate::features::files::{classify::FileKind, dtos as files_dtos, handlers as files_handlers};
use crate::features::plans::Plan;
use crate::features::uploads::handlers as uploads_handlers;
use crate::features::uploads::task::{UploadEvent, UploadState};
use crate::features::users::{dtos as users_dtos, handlers as users_handlers};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth
        auth_handlers::request_otp,
        auth_handlers::verify_otp,
        // Users
        users_handlers::get_me,
        users_handlers::update_plan,
        users_handlers::request_email_change,
        users_handlers::change_email,
        users_handlers::update_avatar,
        users_handlers::delete_account,
        // Uploads
        uploads_handlers::upload_files,
        uploads_handlers::cancel_upload,
        // Files
        files_handlers::list_files,
        files_handlers::get_file,
        files_handlers::rename_file,
        files_handlers::share_file,
        files_handlers::unshare_file,
        files_handlers::delete_file,
        // Dashboard
        dashboard_handlers::get_usage,
    ),
    components(
        schemas(
            // Shared
            Meta,
            Plan,
            FileKind,
            // Auth
            auth_dtos::RequestOtpDto,
            auth_dtos::VerifyOtpDto,
            auth_dtos::OtpSentResponseDto,
            auth_dtos::SessionResponseDto,
            ApiResponse<auth_dtos::OtpSentResponseDto>,
            ApiResponse<auth_dtos::SessionResponseDto>,
            // Users
            users_dtos::UserResponseDto,
            users_dtos::UpdatePlanDto,
            users_dtos::RequestEmailChangeDto,
            users_dtos::ChangeEmailDto,
            users_dtos::UpdateAvatarDto,
            users_dtos::DeleteAccountResponseDto,
            ApiResponse<users_dtos::UserResponseDto>,
            ApiResponse<users_dtos::DeleteAccountResponseDto>,
            // Uploads
            UploadState,
            UploadEvent,
            uploads_handlers::UploadBatchDto,
            uploads_handlers::CancelUploadResponseDto,
            ApiResponse<uploads_handlers::CancelUploadResponseDto>,
            // Files
            files_dtos::FileResponseDto,
            files_dtos::ListFilesResponseDto,
            files_dtos::RenameFileDto,
            files_dtos::RenameFileResponseDto,
            files_dtos::ShareFileDto,
            files_dtos::UnshareFileDto,
            files_dtos::DeleteFileResponseDto,
            ApiResponse<files_dtos::FileResponseDto>,
            ApiResponse<files_dtos::ListFilesResponseDto>,
            ApiResponse<files_dtos::RenameFileResponseDto>,
            ApiResponse<files_dtos::DeleteFileResponseDto>,
            // Dashboard
            dashboard_dtos::BucketUsageDto,
            dashboard_dtos::UsageResponseDto,
            ApiResponse<dashboard_dtos::UsageResponseDto>,
        )
    ),
    tags(
        (name = "auth", description = "One-time-passcode login"),
        (name = "users", description = "Account management"),
        (name = "uploads", description = "Quota-aware upload pipeline"),
        (name = "files", description = "File listing, sharing and management"),
        (name = "dashboard", description = "Storage usage analytics"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Drivo API",
        version = "0.1.0",
        description = "API documentation for Drivo",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
