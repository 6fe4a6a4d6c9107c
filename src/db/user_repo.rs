/// User account database operations
use crate::error::{AppError, Result};
use crate::models::{Profile, User};
use crate::validators::IdentifierKind;
use uuid::Uuid;

use sqlx::PgPool;

/// Find a user by email regardless of activation state.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Create an inactive, password-less account for a new registration.
pub async fn create(pool: &PgPool, email: &str) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, is_active)
        VALUES ($1, $2, FALSE)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

/// Find a verified user by login identifier.
///
/// Only accounts with at least one consumed verification record qualify,
/// mirroring the activation flow: a user without a verified email cannot log
/// in by any identifier.
pub async fn find_verified_by_identifier(
    pool: &PgPool,
    kind: IdentifierKind,
    identifier: &str,
) -> Result<Option<User>> {
    let column = match kind {
        IdentifierKind::Email => "u.email",
        IdentifierKind::Phone => "u.phone",
        IdentifierKind::Username => "u.username",
    };

    let query = format!(
        r#"
        SELECT DISTINCT u.*
        FROM users u
        JOIN verifications v ON v.user_id = u.id AND v.is_verified = TRUE
        WHERE {} = $1
        LIMIT 1
        "#,
        column
    );

    let user = sqlx::query_as::<_, User>(&query)
        .bind(identifier)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Activate an account after verification: set the generated password hash,
/// the masked email, and flip it active. Returns the id and email used for
/// token issuance.
pub async fn activate_with_password(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
    hidden_email: &str,
) -> Result<(Uuid, String)> {
    let row = sqlx::query_as::<_, (Uuid, String)>(
        r#"
        UPDATE users
        SET password_hash = $2, hidden_email = $3, is_active = TRUE, updated_at = NOW()
        WHERE id = $1
        RETURNING id, email
        "#,
    )
    .bind(user_id)
    .bind(password_hash)
    .bind(hidden_email)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    Ok(row)
}

/// Replace the stored password hash.
pub async fn update_password(pool: &PgPool, user_id: Uuid, password_hash: &str) -> Result<()> {
    sqlx::query(
        "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(user_id)
    .bind(password_hash)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch the public profile projection of an active user.
pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        SELECT id, email, username, phone, full_name, avatar, gender,
               hidden_email, hidden_phone, two_factor_enabled, is_active, created_at
        FROM users
        WHERE id = $1 AND is_active = TRUE
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}

/// Optional fields for profile updates; COALESCE keeps omitted columns.
#[derive(Debug, Default)]
pub struct UpdateProfileFields {
    pub username: Option<String>,
    pub phone: Option<String>,
    pub hidden_phone: Option<String>,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub gender: Option<i16>,
}

pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    fields: UpdateProfileFields,
) -> Result<Profile> {
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        UPDATE users
        SET username = COALESCE($2, username),
            phone = COALESCE($3, phone),
            hidden_phone = COALESCE($4, hidden_phone),
            full_name = COALESCE($5, full_name),
            avatar = COALESCE($6, avatar),
            gender = COALESCE($7, gender),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, email, username, phone, full_name, avatar, gender,
                  hidden_email, hidden_phone, two_factor_enabled, is_active, created_at
        "#,
    )
    .bind(user_id)
    .bind(fields.username)
    .bind(fields.phone)
    .bind(fields.hidden_phone)
    .bind(fields.full_name)
    .bind(fields.avatar)
    .bind(fields.gender)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    Ok(profile)
}

/// Toggle the two-factor flag.
pub async fn set_two_factor(pool: &PgPool, user_id: Uuid, enabled: bool) -> Result<()> {
    sqlx::query(
        "UPDATE users SET two_factor_enabled = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(user_id)
    .bind(enabled)
    .execute(pool)
    .await?;

    Ok(())
}

/// True when another account already owns this email.
pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)",
    )
    .bind(email)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Replace the account email after an email-change OTP was consumed.
pub async fn update_email(
    pool: &PgPool,
    user_id: Uuid,
    email: &str,
    hidden_email: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE users SET email = $2, hidden_email = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(user_id)
    .bind(email)
    .bind(hidden_email)
    .execute(pool)
    .await?;

    Ok(())
}
