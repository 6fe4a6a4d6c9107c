use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One-time verification token backing account activation and password reset
/// links. `Active(unverified) -> Verified(inactive)` is the only legal
/// transition; there is no re-activation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Verification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub verified_token: String,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
