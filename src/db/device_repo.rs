/// Device registry database operations
///
/// One row per caller-supplied device identifier, upserted on every token
/// issuance. Concurrent issuances for the same device race on the upsert;
/// the last writer's public key wins, which is exactly the intended
/// single-session-per-device behavior.
use crate::error::{AppError, Result};
use crate::models::Device;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug)]
pub struct UpsertDeviceParams<'a> {
    pub user_id: Uuid,
    pub device_id: &'a str,
    pub device_type: Option<&'a str>,
    pub ip: Option<&'a str>,
    /// Empty for pre-verification flows where no signing key applies yet.
    pub public_key: &'a str,
}

/// Insert or refresh a device row.
///
/// An unseen `device_id` is a fresh device, never an error. On conflict the
/// mutable fields are overwritten, the row re-activated and the logout stamp
/// cleared; replacing `public_key` invalidates any token signed for the
/// previous key pair.
pub async fn upsert(pool: &PgPool, params: UpsertDeviceParams<'_>) -> Result<Device> {
    let device = sqlx::query_as::<_, Device>(
        r#"
        INSERT INTO devices (
            id, user_id, device_id, device_type, ip, public_key,
            logged_in_at, logged_out_at, is_active, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, NOW(), NULL, TRUE, NOW(), NOW()
        )
        ON CONFLICT (device_id) DO UPDATE SET
            user_id = EXCLUDED.user_id,
            device_type = EXCLUDED.device_type,
            ip = EXCLUDED.ip,
            public_key = EXCLUDED.public_key,
            logged_in_at = EXCLUDED.logged_in_at,
            logged_out_at = NULL,
            is_active = TRUE,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(params.user_id)
    .bind(params.device_id)
    .bind(params.device_type)
    .bind(params.ip)
    .bind(params.public_key)
    .fetch_one(pool)
    .await?;

    Ok(device)
}

/// Look up a device by its identifier.
pub async fn find_by_device_id(pool: &PgPool, device_id: &str, is_active: bool) -> Result<Device> {
    sqlx::query_as::<_, Device>(
        "SELECT * FROM devices WHERE device_id = $1 AND is_active = $2 LIMIT 1",
    )
    .bind(device_id)
    .bind(is_active)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("device not found".to_string()))
}

/// Stamp the logout time for a device.
pub async fn mark_logged_out(pool: &PgPool, device_id: &str) -> Result<()> {
    sqlx::query(
        "UPDATE devices SET logged_out_at = NOW(), updated_at = NOW() WHERE device_id = $1",
    )
    .bind(device_id)
    .execute(pool)
    .await?;

    Ok(())
}
