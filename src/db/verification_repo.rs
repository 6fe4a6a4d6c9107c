/// Verification ledger database operations
///
/// One-time tokens proving control of an email, used for account activation
/// and password reset links.
use crate::db;
use crate::error::{AppError, Result};
use crate::models::Verification;
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgPool;
use uuid::Uuid;

/// Token length for verification links
const TOKEN_LENGTH: usize = 32;

/// How many rows a single expiry sweep may deactivate
const EXPIRE_BATCH_SIZE: i64 = 50;

/// Generate a random verification token.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Create a verification record for a user.
///
/// A collision on the random token is astronomically rare; it surfaces as
/// `Conflict` so the caller can regenerate and retry.
pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO verifications (id, user_id, verified_token, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Conflict("verification token already exists".to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    Ok(id)
}

/// Consume a verification token for a user.
///
/// Checks run in a fixed order so callers can surface distinct errors:
/// unknown token, owner mismatch or already-consumed record, then expiry.
/// On success the record moves to its terminal state
/// (`is_verified = TRUE, is_active = FALSE`) and can never be reused.
pub async fn consume(pool: &PgPool, token: &str, user_id: Uuid) -> Result<Verification> {
    let record = sqlx::query_as::<_, Verification>(
        "SELECT * FROM verifications WHERE verified_token = $1 LIMIT 1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("verification token not found".to_string()))?;

    if record.user_id != user_id || !record.is_active || record.is_verified {
        return Err(AppError::InvalidState(
            "verification token is not valid for this account".to_string(),
        ));
    }

    if record.expires_at < Utc::now() {
        return Err(AppError::Expired(
            "verification token has expired".to_string(),
        ));
    }

    let consumed = sqlx::query_as::<_, Verification>(
        r#"
        UPDATE verifications
        SET is_verified = TRUE, is_active = FALSE, verified_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND is_active = TRUE
        RETURNING *
        "#,
    )
    .bind(record.id)
    .fetch_optional(pool)
    .await?
    // A concurrent consume may have won the race between the read and the
    // update; treat the loser the same as a reused token.
    .ok_or_else(|| {
        AppError::InvalidState("verification token is not valid for this account".to_string())
    })?;

    Ok(consumed)
}

/// Count unverified records for a user, backing the resend cap.
///
/// The count never resets, so the cap is a lifetime limit per account.
pub async fn count_pending(pool: &PgPool, user_id: Uuid) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM verifications WHERE user_id = $1 AND is_verified = FALSE",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Deactivate a bounded batch of expired-but-still-active records.
///
/// Intended to run on a periodic schedule; returns the number of rows
/// deactivated so the caller can log progress.
pub async fn expire_stale(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        WITH rows_to_update AS (
            SELECT id
            FROM verifications
            WHERE expires_at < NOW() AND is_active = TRUE
            LIMIT $1
        )
        UPDATE verifications AS v
        SET is_active = FALSE, updated_at = NOW()
        FROM rows_to_update AS r
        WHERE v.id = r.id
        "#,
    )
    .bind(EXPIRE_BATCH_SIZE)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_has_fixed_length() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }
}
