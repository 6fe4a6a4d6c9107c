/// OTP ledger database operations
use crate::error::Result;
use crate::models::{Otp, OtpWithOwner};
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

/// Default number of digits in a code
pub const OTP_LENGTH: usize = 6;

/// Generate a fixed-length numeric code.
pub fn generate_otp(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length).map(|_| rng.gen_range(0..10).to_string()).collect()
}

/// Store a new code for a user.
pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    code: &str,
    expires_at: DateTime<Utc>,
) -> Result<Otp> {
    let otp = sqlx::query_as::<_, Otp>(
        r#"
        INSERT INTO otps (id, user_id, otp_code, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(code)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(otp)
}

/// Consume an active, unexpired code and return it with its owner's email.
///
/// The lookup itself deactivates the row, so a code matches at most once;
/// never call this speculatively. Returns `None` for unknown, expired or
/// already-used codes.
pub async fn take_active(pool: &PgPool, code: &str) -> Result<Option<OtpWithOwner>> {
    let row = sqlx::query_as::<_, OtpWithOwner>(
        r#"
        UPDATE otps o
        SET is_active = FALSE
        FROM users u
        WHERE o.user_id = u.id
          AND o.otp_code = $1
          AND o.is_active = TRUE
          AND o.expires_at > NOW()
        RETURNING o.id, o.user_id, o.otp_code, o.expires_at, u.email
        "#,
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_has_fixed_digit_length() {
        let code = generate_otp(OTP_LENGTH);
        assert_eq!(code.len(), OTP_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn otp_respects_custom_length() {
        assert_eq!(generate_otp(8).len(), 8);
    }
}
