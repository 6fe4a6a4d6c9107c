use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account row. Created inactive and password-less at registration;
/// activated (and given a generated password) by email verification.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub gender: Option<i16>,
    pub hidden_email: Option<String>,
    pub hidden_phone: Option<String>,
    pub two_factor_enabled: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection of a user row for profile reads.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub gender: Option<i16>,
    pub hidden_email: Option<String>,
    pub hidden_phone: Option<String>,
    pub two_factor_enabled: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
