/// Password history database operations
use crate::error::Result;
use crate::models::PasswordHistoryEntry;
use sqlx::PgPool;
use uuid::Uuid;

/// Append a history row recording the hash a user is moving away from (or,
/// at activation, the hash they start with).
pub async fn insert(
    pool: &PgPool,
    user_id: Uuid,
    old_password: &str,
    reason_status: i16,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO password_history (id, user_id, old_password, reason_status)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(old_password)
    .bind(reason_status)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch up to `limit` most recent history rows for a user.
pub async fn recent_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<PasswordHistoryEntry>> {
    let entries = sqlx::query_as::<_, PasswordHistoryEntry>(
        r#"
        SELECT * FROM password_history
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}
