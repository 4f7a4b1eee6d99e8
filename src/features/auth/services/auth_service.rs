use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::core::error::{AppError, Result};
use crate::features::auth::mailer::OtpMailer;
use crate::features::auth::otp::{code_digest, generate_code};
use crate::features::auth::token::TokenService;
use crate::features::users::models::{NewUser, User};
use crate::features::users::repository::UserRepository;
use crate::shared::constants::AVATAR_PLACEHOLDER_URL;

/// One-time-passcode login: request a code, verify it, receive a session
/// token. Sign-up is the first OTP request for an unknown email.
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn OtpMailer>,
    tokens: Arc<TokenService>,
    otp_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn OtpMailer>,
        tokens: Arc<TokenService>,
        otp_ttl: Duration,
    ) -> Self {
        Self {
            users,
            mailer,
            tokens,
            otp_ttl,
        }
    }

    /// Send a passcode to the given email. With `full_name` present an
    /// unknown email creates a fresh account (sign-up); without it an
    /// unknown email is an error (sign-in).
    pub async fn request_otp(&self, email: &str, full_name: Option<&str>) -> Result<()> {
        let user = match self.users.find_by_email(email).await? {
            Some(user) => user,
            None => {
                let full_name = full_name.ok_or_else(|| {
                    AppError::NotFound(
                        "No account found for this email. Sign up first.".to_string(),
                    )
                })?;
                let user = self
                    .users
                    .insert(NewUser {
                        full_name: full_name.to_string(),
                        email: email.to_string(),
                        avatar_url: AVATAR_PLACEHOLDER_URL.to_string(),
                    })
                    .await?;
                info!("Account created: id={}, email={}", user.id, user.email);
                user
            }
        };

        self.issue_code(&user).await
    }

    /// Store a fresh passcode digest on the user row and hand the code to
    /// the mail transport. Also used for email-change confirmation, where
    /// the code goes to the address being claimed.
    pub async fn issue_code_to(&self, user: &User, recipient: &str) -> Result<()> {
        let code = generate_code();
        let digest = code_digest(user.id, &code);
        let expires_at = Utc::now() + chrono::Duration::seconds(self.otp_ttl.as_secs() as i64);

        self.users.set_otp(user.id, &digest, expires_at).await?;
        self.mailer
            .send_code(recipient, &user.full_name, &code)
            .await?;

        info!("OTP issued: user={}, recipient={}", user.id, recipient);
        Ok(())
    }

    async fn issue_code(&self, user: &User) -> Result<()> {
        self.issue_code_to(user, &user.email).await
    }

    /// Verify a pending passcode for the account. Consumes the code on
    /// success.
    pub async fn verify_code(&self, user: &User, code: &str) -> Result<()> {
        let digest = user
            .otp_digest
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("No pending code for this account".to_string()))?;
        let expires_at = user
            .otp_expires_at
            .ok_or_else(|| AppError::Unauthorized("No pending code for this account".to_string()))?;

        if expires_at < Utc::now() {
            return Err(AppError::Unauthorized(
                "Code expired. Request a new one.".to_string(),
            ));
        }

        if code_digest(user.id, code) != digest {
            return Err(AppError::Unauthorized("Invalid code".to_string()));
        }

        self.users.clear_otp(user.id).await?;
        Ok(())
    }

    /// Verify the passcode sent to `email` and open a session.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<(String, User)> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("No account found for this email".to_string()))?;

        self.verify_code(&user, code).await?;

        let token = self.tokens.issue(&user)?;
        info!("Session opened: user={}", user.id);

        Ok((token, user))
    }
}
