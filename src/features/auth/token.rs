use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::core::config::AuthConfig;
use crate::core::error::{AppError, Result};
use crate::features::auth::model::{AuthenticatedUser, SessionClaims};
use crate::features::users::models::User;

/// Issues and validates HS256 session tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_secs: i64,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl_secs: config.token_ttl.as_secs() as i64,
        }
    }

    /// Issue a session token after a verified one-time passcode.
    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now,
            exp: now + self.token_ttl_secs,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to issue session token: {}", e)))
    }

    /// Validate a bearer token and recover the session identity.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AppError::Unauthorized(format!("Invalid session token: {}", e)))?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid session token subject".to_string()))?;

        Ok(AuthenticatedUser {
            user_id,
            email: data.claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::assert_ok;

    use crate::features::plans::Plan;
    use crate::shared::test_helpers::sample_user;

    fn service(secret: &str) -> TokenService {
        TokenService::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            token_ttl: Duration::from_secs(3600),
            otp_ttl: Duration::from_secs(600),
        })
    }

    #[test]
    fn issued_tokens_verify_round_trip() {
        let tokens = service("a-test-secret-that-is-long-enough!!");
        let user = sample_user(Plan::Starter);

        let token = tokio_test::assert_ok!(tokens.issue(&user));
        let identity = tokio_test::assert_ok!(tokens.verify(&token));

        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.email, user.email);
    }

    #[test]
    fn garbage_tokens_are_unauthorized() {
        let tokens = service("a-test-secret-that-is-long-enough!!");
        assert!(matches!(
            tokens.verify("not-a-token"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let issuer = service("a-test-secret-that-is-long-enough!!");
        let verifier = service("a-different-secret-also-long-enough");
        let user = sample_user(Plan::Free);

        let token = issuer.issue(&user).expect("issue failed");
        assert!(matches!(
            verifier.verify(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let secret = "a-test-secret-that-is-long-enough!!";
        let tokens = service(secret);
        let user = sample_user(Plan::Free);

        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let stale = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode failed");

        assert!(matches!(
            tokens.verify(&stale),
            Err(AppError::Unauthorized(_))
        ));
    }
}
