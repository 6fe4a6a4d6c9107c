/// Account-scoped operations for an authenticated user: profile reads and
/// updates, password change, two-factor toggle, email change and logout.
use crate::db::{device_repo, otp_repo, password_history_repo, user_repo};
use crate::error::{AppError, Result};
use crate::models::{password_reason, Profile};
use crate::redis::keys::ProfileCacheKey;
use crate::redis::operations::{redis_delete, redis_get, redis_set_ex};
use crate::security::password;
use crate::services::auth::AuthService;
use crate::services::email::OutboundEmail;
use crate::services::otp::OTP_TTL_MINUTES;
use crate::services::password_guard::{self, PASSWORD_HISTORY_LIMIT};
use crate::services::RequestContext;
use crate::validators;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

/// Upper bound for the randomized profile-cache TTL (days)
const PROFILE_CACHE_MAX_DAYS: u64 = 7;

fn profile_cache_ttl_secs() -> u64 {
    let days = rand::thread_rng().gen_range(1..=PROFILE_CACHE_MAX_DAYS);
    days * 24 * 3600
}

impl AuthService {
    /// Fetch an active user's profile, served from the Redis cache when
    /// possible. Cache failures fall through to the database.
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Profile> {
        let cache_key = ProfileCacheKey::profile(user_id);

        match redis_get(&self.redis, &cache_key).await {
            Ok(Some(cached)) => {
                if let Ok(profile) = serde_json::from_str::<Profile>(&cached) {
                    return Ok(profile);
                }
            }
            Ok(None) => {}
            Err(err) => warn!(user_id = %user_id, error = %err, "profile cache read failed"),
        }

        let profile = user_repo::get_profile(&self.db, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

        self.cache_profile(&cache_key, &profile).await;

        Ok(profile)
    }

    /// Update profile fields, refreshing the cache with the new projection.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        username: Option<String>,
        phone: Option<String>,
        full_name: Option<String>,
        avatar: Option<String>,
        gender: Option<i16>,
    ) -> Result<Profile> {
        if let Some(ref username) = username {
            if !validators::validate_username(username) {
                return Err(AppError::Validation("invalid username".to_string()));
            }
        }
        if let Some(ref phone) = phone {
            if !validators::validate_phone(phone) {
                return Err(AppError::Validation("invalid phone number".to_string()));
            }
        }

        let hidden_phone = phone.as_deref().map(validators::hide_phone);

        let profile = user_repo::update_profile(
            &self.db,
            user_id,
            user_repo::UpdateProfileFields {
                username,
                phone,
                hidden_phone,
                full_name,
                avatar,
                gender,
            },
        )
        .await?;

        self.cache_profile(&ProfileCacheKey::profile(user_id), &profile)
            .await;

        Ok(profile)
    }

    /// Change the password of an authenticated user.
    pub async fn change_password(&self, user_id: Uuid, new_password: &str) -> Result<Uuid> {
        password::validate_password_strength(new_password)?;

        let password_hash = password_guard::check_and_hash(
            &self.db,
            user_id,
            new_password,
            PASSWORD_HISTORY_LIMIT,
        )
        .await?;

        password_history_repo::insert(&self.db, user_id, &password_hash, password_reason::CHANGE)
            .await?;
        user_repo::update_password(&self.db, user_id, &password_hash).await?;

        info!(user_id = %user_id, "password changed");

        Ok(user_id)
    }

    /// Toggle two-factor authentication.
    pub async fn enable_two_factor(&self, user_id: Uuid, enabled: bool) -> Result<()> {
        user_repo::set_two_factor(&self.db, user_id, enabled).await?;
        self.invalidate_profile_cache(user_id).await;
        info!(user_id = %user_id, enabled, "two-factor flag updated");
        Ok(())
    }

    /// Send an email-change confirmation code to the address the user wants
    /// to move to. The code shares the OTP ledger with the login challenge.
    pub async fn send_otp_update_email(
        &self,
        user_id: Uuid,
        new_email: &str,
    ) -> Result<DateTime<Utc>> {
        if !validators::validate_email(new_email) {
            return Err(AppError::Validation("invalid email address".to_string()));
        }

        if user_repo::email_exists(&self.db, new_email).await? {
            return Err(AppError::Conflict("email is already in use".to_string()));
        }

        let code = otp_repo::generate_otp(otp_repo::OTP_LENGTH);
        let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);

        otp_repo::create(&self.db, user_id, &code, expires_at).await?;

        self.mailer
            .enqueue(OutboundEmail::otp_code(new_email, &code, OTP_TTL_MINUTES));

        Ok(expires_at)
    }

    /// Complete an email change: consume the code, re-check availability,
    /// swap the address.
    pub async fn update_email(
        &self,
        user_id: Uuid,
        code: &str,
        new_email: &str,
    ) -> Result<()> {
        if !validators::validate_email(new_email) {
            return Err(AppError::Validation("invalid email address".to_string()));
        }

        let otp = otp_repo::take_active(&self.db, code)
            .await?
            .ok_or_else(|| {
                AppError::InvalidState("one-time code is invalid or expired".to_string())
            })?;

        if otp.user_id != user_id {
            return Err(AppError::InvalidState(
                "one-time code does not belong to this account".to_string(),
            ));
        }

        if user_repo::email_exists(&self.db, new_email).await? {
            return Err(AppError::Conflict("email is already in use".to_string()));
        }

        user_repo::update_email(
            &self.db,
            user_id,
            new_email,
            &validators::hide_email(new_email),
        )
        .await?;

        self.invalidate_profile_cache(user_id).await;

        info!(user_id = %user_id, "email address updated");

        Ok(())
    }

    /// Log the calling device out: stamp the device row and let the handler
    /// clear the refresh cookie. The device's key stays in place until the
    /// next issuance overwrites it.
    pub async fn logout(&self, ctx: &RequestContext, user_id: Uuid) -> Result<()> {
        device_repo::mark_logged_out(&self.db, &ctx.device_id).await?;
        info!(user_id = %user_id, device_id = %ctx.device_id, "user logged out");
        Ok(())
    }

    async fn cache_profile(&self, cache_key: &str, profile: &Profile) {
        let Ok(serialized) = serde_json::to_string(profile) else {
            return;
        };
        if let Err(err) =
            redis_set_ex(&self.redis, cache_key, &serialized, profile_cache_ttl_secs()).await
        {
            warn!(error = %err, "profile cache write failed");
        }
    }

    async fn invalidate_profile_cache(&self, user_id: Uuid) {
        let cache_key = ProfileCacheKey::profile(user_id);
        if let Err(err) = redis_delete(&self.redis, &cache_key).await {
            warn!(user_id = %user_id, error = %err, "profile cache invalidation failed");
        }
    }
}
