use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Append-only record of previously used password hashes.
///
/// `old_password` is the full Argon2id PHC string (salt embedded), so a
/// candidate password can be re-verified against it directly.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub old_password: String,
    pub reason_status: i16,
    pub created_at: DateTime<Utc>,
}

/// Why a password entered the history table.
pub mod password_reason {
    pub const VERIFICATION: i16 = 1;
    pub const RESET: i16 = 2;
    pub const CHANGE: i16 = 3;
}
