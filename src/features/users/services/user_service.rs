use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::services::AuthService;
use crate::features::files::repository::FileRepository;
use crate::features::plans::Plan;
use crate::features::users::models::User;
use crate::features::users::repository::UserRepository;
use crate::modules::storage::{silent_progress, BlobStore};
use crate::shared::constants::{ALLOWED_AVATAR_TYPES, MAX_AVATAR_SIZE};
use crate::shared::format::format_bytes;

/// Account operations: profile, plan, email and avatar changes, deletion.
pub struct UserService {
    users: Arc<dyn UserRepository>,
    files: Arc<dyn FileRepository>,
    blobs: Arc<dyn BlobStore>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        files: Arc<dyn FileRepository>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<AuthService>,
    ) -> Self {
        Self {
            users,
            files,
            blobs,
            auth,
        }
    }

    pub async fn me(&self, user_id: Uuid) -> Result<User> {
        self.users
            .find(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Move the account to another tier. Driven by the billing webhook after
    /// a completed checkout.
    pub async fn update_plan(&self, user_id: Uuid, plan: Plan) -> Result<User> {
        let user = self.me(user_id).await?;
        self.users.set_plan(user.id, plan).await?;
        info!("Plan changed: user={}, plan={}", user.id, plan);
        self.me(user_id).await
    }

    /// Send a confirmation code to the address being claimed.
    pub async fn request_email_change(&self, user_id: Uuid, new_email: &str) -> Result<()> {
        let user = self.me(user_id).await?;
        self.ensure_email_free(new_email).await?;
        self.auth.issue_code_to(&user, new_email).await
    }

    /// Confirm the pending code and move the account to the new address.
    pub async fn change_email(&self, user_id: Uuid, new_email: &str, code: &str) -> Result<User> {
        let user = self.me(user_id).await?;
        self.ensure_email_free(new_email).await?;
        self.auth.verify_code(&user, code).await?;

        self.users.set_email(user.id, new_email).await?;
        info!("Email changed: user={}", user.id);
        self.me(user_id).await
    }

    /// Store a new avatar image and point the account at it. The previous
    /// avatar blob, if any, is removed best-effort.
    pub async fn update_avatar(
        &self,
        user_id: Uuid,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<User> {
        if !ALLOWED_AVATAR_TYPES.contains(&content_type) {
            return Err(AppError::Validation(
                "Invalid file type. Only PNG, JPG, and JPEG files are allowed.".to_string(),
            ));
        }
        if data.len() as i64 > MAX_AVATAR_SIZE {
            return Err(AppError::Validation(format!(
                "File is too large. Max size is {}.",
                format_bytes(MAX_AVATAR_SIZE)
            )));
        }

        let user = self.me(user_id).await?;
        let extension = match content_type {
            "image/png" => "png",
            _ => "jpg",
        };
        let key = format!("avatars/{}/{}.{}", user.id, Uuid::new_v4(), extension);

        let blob = self
            .blobs
            .put(&key, data, content_type, silent_progress())
            .await?;

        if let Some(old_key) = user.avatar_key.as_deref() {
            if let Err(e) = self.blobs.delete(old_key).await {
                warn!("Failed to remove previous avatar '{}': {}", old_key, e);
            }
        }

        self.users
            .set_avatar(user.id, &blob.url, Some(&blob.key))
            .await?;
        info!("Avatar updated: user={}", user.id);
        self.me(user_id).await
    }

    /// Delete the account and everything it owns: file blobs, file records,
    /// the avatar blob, then the user row.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<()> {
        let user = self.me(user_id).await?;

        let owned = self.files.list_owned(user.id).await?;
        for record in owned {
            if let Err(e) = self.blobs.delete(&record.blob_key).await {
                warn!(
                    "Failed to remove blob '{}' during account deletion: {}",
                    record.blob_key, e
                );
            }
            self.files.delete(record.id).await?;
        }

        if let Some(avatar_key) = user.avatar_key.as_deref() {
            if let Err(e) = self.blobs.delete(avatar_key).await {
                warn!("Failed to remove avatar '{}': {}", avatar_key, e);
            }
        }

        self.users.delete(user.id).await?;
        info!("Account deleted: user={}", user.id);
        Ok(())
    }

    async fn ensure_email_free(&self, email: &str) -> Result<()> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AppError::BadRequest(
                "That email is already in use".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::core::config::AuthConfig;
    use crate::features::auth::mailer::OtpMailer;
    use crate::features::auth::token::TokenService;
    use crate::shared::test_helpers::{
        file_record_of_size, sample_user, user_with_email, MemoryBlobStore, MemoryFileRepository,
        MemoryUserRepository,
    };

    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl CapturingMailer {
        fn last_code(&self) -> Option<String> {
            self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
        }
    }

    #[async_trait]
    impl OtpMailer for CapturingMailer {
        async fn send_code(
            &self,
            email: &str,
            _full_name: &str,
            code: &str,
        ) -> crate::core::error::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), code.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        users: Arc<MemoryUserRepository>,
        files: Arc<MemoryFileRepository>,
        blobs: Arc<MemoryBlobStore>,
        mailer: Arc<CapturingMailer>,
        service: UserService,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserRepository::new());
        let files = Arc::new(MemoryFileRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let mailer = Arc::new(CapturingMailer::default());
        let tokens = Arc::new(TokenService::new(&AuthConfig {
            jwt_secret: "a-test-secret-that-is-long-enough!!".to_string(),
            token_ttl: Duration::from_secs(3600),
            otp_ttl: Duration::from_secs(600),
        }));
        let auth = Arc::new(AuthService::new(
            Arc::clone(&users) as Arc<dyn crate::features::users::repository::UserRepository>,
            Arc::clone(&mailer) as Arc<dyn OtpMailer>,
            tokens,
            Duration::from_secs(600),
        ));
        let service = UserService::new(
            Arc::clone(&users) as Arc<dyn crate::features::users::repository::UserRepository>,
            Arc::clone(&files) as Arc<dyn FileRepository>,
            Arc::clone(&blobs) as Arc<dyn BlobStore>,
            auth,
        );
        Fixture {
            users,
            files,
            blobs,
            mailer,
            service,
        }
    }

    #[tokio::test]
    async fn plan_changes_persist() {
        let fx = fixture();
        let user = sample_user(Plan::Free);
        fx.users.seed(user.clone());

        let updated = fx
            .service
            .update_plan(user.id, Plan::Pro)
            .await
            .expect("update failed");
        assert_eq!(updated.plan(), Plan::Pro);
    }

    #[tokio::test]
    async fn avatar_uploads_validate_type_and_size() {
        let fx = fixture();
        let user = sample_user(Plan::Free);
        fx.users.seed(user.clone());

        let result = fx
            .service
            .update_avatar(user.id, "image/gif", vec![0u8; 10])
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let oversized = vec![0u8; (MAX_AVATAR_SIZE + 1) as usize];
        let result = fx.service.update_avatar(user.id, "image/png", oversized).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let updated = fx
            .service
            .update_avatar(user.id, "image/png", vec![0u8; 128])
            .await
            .expect("upload failed");
        let key = updated.avatar_key.clone().expect("no avatar key");
        assert!(fx.blobs.contains(&key));
        assert_eq!(updated.avatar_url, fx.blobs.url_for(&key));
    }

    #[tokio::test]
    async fn replacing_an_avatar_removes_the_old_blob() {
        let fx = fixture();
        let user = sample_user(Plan::Free);
        fx.users.seed(user.clone());

        let first = fx
            .service
            .update_avatar(user.id, "image/png", vec![0u8; 64])
            .await
            .expect("first upload failed");
        let first_key = first.avatar_key.clone().expect("no key");

        let second = fx
            .service
            .update_avatar(user.id, "image/jpeg", vec![0u8; 64])
            .await
            .expect("second upload failed");
        let second_key = second.avatar_key.clone().expect("no key");

        assert_ne!(first_key, second_key);
        assert!(!fx.blobs.contains(&first_key));
        assert!(fx.blobs.contains(&second_key));
    }

    #[tokio::test]
    async fn email_change_requires_the_confirmation_code() {
        let fx = fixture();
        let user = sample_user(Plan::Free);
        fx.users.seed(user.clone());

        fx.service
            .request_email_change(user.id, "next@example.com")
            .await
            .expect("request failed");

        let code = fx.mailer.last_code().expect("no code sent");
        let wrong = if code == "000000" { "000001" } else { "000000" };
        let result = fx
            .service
            .change_email(user.id, "next@example.com", wrong)
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let updated = fx
            .service
            .change_email(user.id, "next@example.com", &code)
            .await
            .expect("change failed");
        assert_eq!(updated.email, "next@example.com");
    }

    #[tokio::test]
    async fn taken_emails_cannot_be_claimed() {
        let fx = fixture();
        let user = sample_user(Plan::Free);
        let other = user_with_email(Plan::Free, "taken@example.com");
        fx.users.seed(user.clone());
        fx.users.seed(other);

        let result = fx
            .service
            .request_email_change(user.id, "taken@example.com")
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn account_deletion_cascades_to_owned_files() {
        let fx = fixture();
        let user = sample_user(Plan::Free);
        fx.users.seed(user.clone());

        for name in ["a.txt", "b.png"] {
            let record = file_record_of_size(user.id, name, 10);
            fx.blobs
                .put(
                    &record.blob_key,
                    vec![0u8; 10],
                    "application/octet-stream",
                    silent_progress(),
                )
                .await
                .expect("seed blob");
            fx.files.seed(record);
        }

        fx.service
            .delete_account(user.id)
            .await
            .expect("delete failed");

        assert!(fx.users.all().is_empty());
        assert!(fx.files.all().is_empty());
        assert!(fx.blobs.is_empty());
    }
}
