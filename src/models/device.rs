use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One row per caller-supplied device identifier.
///
/// `public_key` holds the PEM of the key pair minted at the device's most
/// recent token issuance; overwriting it invalidates every token previously
/// signed for this device.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Device {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub device_type: Option<String>,
    pub ip: Option<String>,
    pub public_key: String,
    pub logged_in_at: DateTime<Utc>,
    pub logged_out_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
