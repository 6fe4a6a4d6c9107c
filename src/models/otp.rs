use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Short numeric one-time code for two-factor login and email-change
/// confirmation. Looked up by code; the lookup itself consumes it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Otp {
    pub id: Uuid,
    pub user_id: Uuid,
    pub otp_code: String,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// OTP row joined with its owner's email, as returned by the consuming
/// lookup.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpWithOwner {
    pub id: Uuid,
    pub user_id: Uuid,
    pub otp_code: String,
    pub expires_at: DateTime<Utc>,
    pub email: String,
}
