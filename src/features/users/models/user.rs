use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::features::plans::Plan;

/// Database model for user accounts
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub avatar_url: String,
    /// Blob key of an uploaded avatar, if any
    pub avatar_key: Option<String>,
    /// Stored plan name; read through [`User::plan`]
    pub plan: String,
    /// Customer id at the external payment provider
    pub billing_customer_id: Option<String>,
    /// Pending one-time passcode, stored as a sha-256 digest
    pub otp_digest: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Subscription tier; unknown stored names fall back to Free.
    pub fn plan(&self) -> Plan {
        Plan::from_name(&self.plan)
    }
}

/// Data for creating an account on first sign-up
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub avatar_url: String,
}
