use async_trait::async_trait;

use crate::core::error::Result;

/// Outbound transport for one-time passcodes. The delivery mechanism is an
/// external capability; the core only hands over the code.
#[async_trait]
pub trait OtpMailer: Send + Sync {
    async fn send_code(&self, email: &str, full_name: &str, code: &str) -> Result<()>;
}

/// Development transport: logs the code instead of sending mail.
pub struct LogMailer;

#[async_trait]
impl OtpMailer for LogMailer {
    async fn send_code(&self, email: &str, full_name: &str, code: &str) -> Result<()> {
        tracing::info!("OTP for {} <{}>: {}", full_name, email, code);
        Ok(())
    }
}
