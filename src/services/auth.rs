/// Authentication orchestration: registration, verification, login,
/// password reset and token renewal.
///
/// Every flow follows the same outline: spam check, business validation,
/// ledger reads/writes, then token issuance with a fresh key pair whose
/// public half lands on the device row. Emails are enqueued, never awaited.
use crate::config::Config;
use crate::db::device_repo::{self, UpsertDeviceParams};
use crate::db::{user_repo, verification_repo};
use crate::error::{AppError, Result};
use crate::db::password_history_repo;
use crate::models::password_reason;
use crate::redis::{SpamClass, SpamGuard};
use crate::security::jwt::TokenPair;
use crate::security::{self, password};
use crate::services::email::{Mailer, OutboundEmail};
use crate::services::password_guard::{self, PASSWORD_HISTORY_LIMIT};
use crate::services::RequestContext;
use crate::validators;
use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Lifetime of an account-activation link
const VERIFICATION_LINK_TTL_HOURS: i64 = 24;

/// Lifetime of a password-reset link
const RESET_LINK_TTL_MINUTES: i64 = 15;

/// Lifetime verification-request cap per account; deliberately never reset
const RESEND_LIMIT: i64 = 5;

/// Length of the server-generated activation password
const GENERATED_PASSWORD_LENGTH: usize = 10;

/// Retries on the (astronomically rare) random-token collision
const TOKEN_CREATE_ATTEMPTS: u32 = 3;

/// Which link shape a verification record backs.
#[derive(Debug, Clone, Copy)]
enum LinkKind {
    Activate,
    Reset,
}

#[derive(Debug, Serialize)]
pub struct RegistrationOutcome {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ForgetOutcome {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

/// A fully issued session: the device row now holds the public key matching
/// these tokens.
#[derive(Debug)]
pub struct SessionOutcome {
    pub user_id: Uuid,
    pub device_id: String,
    pub email: String,
    pub tokens: TokenPair,
}

/// Login either completes with a session or parks at the 2FA challenge.
#[derive(Debug)]
pub enum LoginOutcome {
    Session(SessionOutcome),
    PendingTwoFactor {
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    },
}

#[derive(Clone)]
pub struct AuthService {
    pub(crate) db: PgPool,
    pub(crate) redis: ConnectionManager,
    pub(crate) spam: SpamGuard,
    pub(crate) mailer: Mailer,
    pub(crate) config: Arc<Config>,
}

impl AuthService {
    pub fn new(
        db: PgPool,
        redis: ConnectionManager,
        mailer: Mailer,
        config: Arc<Config>,
    ) -> Self {
        let spam = SpamGuard::new(redis.clone());
        Self {
            db,
            redis,
            spam,
            mailer,
            config,
        }
    }

    /// Register a new account: created inactive, activated later by the
    /// emailed verification link.
    pub async fn register(&self, ctx: &RequestContext, email: &str) -> Result<RegistrationOutcome> {
        self.guard_spam(SpamClass::Register, ctx).await?;

        if !validators::validate_email(email) {
            return Err(AppError::Validation("invalid email address".to_string()));
        }

        if user_repo::find_by_email(&self.db, email).await?.is_some() {
            return Err(AppError::Conflict("account already exists".to_string()));
        }

        let user = user_repo::create(&self.db, email).await?;

        let (token, link) = self
            .create_verification_link(
                user.id,
                email,
                LinkKind::Activate,
                Utc::now() + Duration::hours(VERIFICATION_LINK_TTL_HOURS),
            )
            .await?;

        // Register the device without a signing key; none applies until the
        // account is verified and a session is issued.
        self.upsert_device(ctx, user.id, "").await?;

        self.mailer
            .enqueue(OutboundEmail::verification_link(email, &link));

        info!(user_id = %user.id, email = %validators::hide_email(email), "user registered");

        Ok(RegistrationOutcome {
            id: user.id,
            email: email.to_string(),
            token,
        })
    }

    /// Consume an activation link: set a generated password, activate the
    /// identity and open the first session for the calling device.
    pub async fn verify_account(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        email: &str,
        token: &str,
    ) -> Result<SessionOutcome> {
        verification_repo::consume(&self.db, token, user_id).await?;

        let generated_password = password::generate_random_password(GENERATED_PASSWORD_LENGTH);
        let password_hash = password::hash_password(&generated_password)?;

        password_history_repo::insert(
            &self.db,
            user_id,
            &password_hash,
            password_reason::VERIFICATION,
        )
        .await?;

        let (id, account_email) = user_repo::activate_with_password(
            &self.db,
            user_id,
            &password_hash,
            &validators::hide_email(email),
        )
        .await?;

        let session = self.issue_session(ctx, id, &account_email).await?;

        self.mailer.enqueue(OutboundEmail::activation_success(
            &account_email,
            &generated_password,
        ));

        info!(user_id = %id, "account verified and activated");

        Ok(session)
    }

    /// Log in with an email, phone number or username plus password.
    ///
    /// Accounts with two-factor enabled receive an OTP challenge instead of
    /// tokens; the session is only issued once the code is verified.
    pub async fn login_identifier(
        &self,
        ctx: &RequestContext,
        identifier: &str,
        candidate_password: &str,
    ) -> Result<LoginOutcome> {
        self.guard_spam(SpamClass::Login, ctx).await?;

        let kind = validators::identify(identifier);
        let user = user_repo::find_verified_by_identifier(&self.db, kind, identifier)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid credentials".to_string()))?;

        if !user.is_active {
            return Err(AppError::Forbidden("account is blocked".to_string()));
        }

        let password_hash = user
            .password_hash
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("invalid credentials".to_string()))?;

        if !password::verify_password(candidate_password, password_hash)? {
            return Err(AppError::Unauthorized("invalid credentials".to_string()));
        }

        if user.two_factor_enabled {
            let expires_at = self.send_login_otp(&user).await?;
            info!(
                user_id = %user.id,
                identifier_kind = ?kind,
                "login pending two-factor challenge"
            );
            return Ok(LoginOutcome::PendingTwoFactor {
                user_id: user.id,
                expires_at,
            });
        }

        let session = self.issue_session(ctx, user.id, &user.email).await?;
        info!(user_id = %user.id, identifier_kind = ?kind, "user logged in");

        Ok(LoginOutcome::Session(session))
    }

    /// Re-send an activation link for a not-yet-verified account.
    pub async fn resend_verification_link(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<RegistrationOutcome> {
        self.guard_spam(SpamClass::LinkResend, ctx).await?;

        let user = user_repo::find_by_email(&self.db, email)
            .await?
            .ok_or_else(|| AppError::NotFound("account not found".to_string()))?;

        let pending = verification_repo::count_pending(&self.db, user.id).await?;
        if pending >= RESEND_LIMIT {
            return Err(AppError::Forbidden(format!(
                "verification was already sent {} times",
                RESEND_LIMIT
            )));
        }

        if user.is_active {
            return Err(AppError::Conflict(
                "account is already verified".to_string(),
            ));
        }

        let (token, link) = self
            .create_verification_link(
                user.id,
                email,
                LinkKind::Activate,
                Utc::now() + Duration::hours(VERIFICATION_LINK_TTL_HOURS),
            )
            .await?;

        self.upsert_device(ctx, user.id, "").await?;

        self.mailer
            .enqueue(OutboundEmail::verification_link(email, &link));

        Ok(RegistrationOutcome {
            id: user.id,
            email: email.to_string(),
            token,
        })
    }

    /// Start a password reset for an active account.
    pub async fn forget_password(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<ForgetOutcome> {
        self.guard_spam(SpamClass::Forget, ctx).await?;

        let user = user_repo::find_by_email(&self.db, email)
            .await?
            .ok_or_else(|| AppError::NotFound("account not found".to_string()))?;

        if !user.is_active {
            return Err(AppError::Forbidden("account is not active".to_string()));
        }

        let (token, link) = self
            .create_verification_link(
                user.id,
                email,
                LinkKind::Reset,
                Utc::now() + Duration::minutes(RESET_LINK_TTL_MINUTES),
            )
            .await?;

        self.mailer
            .enqueue(OutboundEmail::password_reset_link(email, &link));

        Ok(ForgetOutcome {
            id: user.id,
            email: user.email,
            token,
        })
    }

    /// Complete a password reset: consume the link, enforce strength and
    /// reuse rules, persist the new hash.
    pub async fn reset_password(
        &self,
        user_id: Uuid,
        token: &str,
        new_password: &str,
    ) -> Result<Uuid> {
        verification_repo::consume(&self.db, token, user_id).await?;

        password::validate_password_strength(new_password)?;

        let password_hash = password_guard::check_and_hash(
            &self.db,
            user_id,
            new_password,
            PASSWORD_HISTORY_LIMIT,
        )
        .await?;

        password_history_repo::insert(&self.db, user_id, &password_hash, password_reason::RESET)
            .await?;
        user_repo::update_password(&self.db, user_id, &password_hash).await?;

        info!(user_id = %user_id, "password reset completed");

        Ok(user_id)
    }

    /// Rotate the session for an already-verified refresh context.
    ///
    /// Credentials are not re-checked here: trust comes entirely from the
    /// refresh-cookie verification the middleware performed against the
    /// device's stored public key.
    pub async fn renew_token(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        email: &str,
    ) -> Result<SessionOutcome> {
        let session = self.issue_session(ctx, user_id, email).await?;
        info!(user_id = %user_id, "token pair renewed");
        Ok(session)
    }

    // ========== Shared building blocks ==========

    /// Run the spam guard for one abuse class and translate a block into a
    /// rate-limit error carrying the remaining seconds.
    pub(crate) async fn guard_spam(&self, class: SpamClass, ctx: &RequestContext) -> Result<()> {
        let verdict = self.spam.check(class, ctx.spam_subject()).await?;
        if verdict.is_blocked {
            return Err(AppError::RateLimited {
                retry_after_secs: verdict.retry_after_secs,
            });
        }
        Ok(())
    }

    /// Mint a fresh key pair, sign an access/refresh pair with it and bind
    /// the public half to the calling device.
    pub(crate) async fn issue_session(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        email: &str,
    ) -> Result<SessionOutcome> {
        // RSA generation is CPU-bound; keep it off the async workers.
        let key_pair = tokio::task::spawn_blocking(security::generate_key_pair)
            .await
            .map_err(|e| AppError::Internal(format!("key generation task failed: {}", e)))??;

        let tokens = security::issue_token_pair(
            user_id,
            email,
            &key_pair.private_key_pem,
            self.config.jwt.access_ttl_secs,
            self.config.jwt.refresh_ttl_secs,
        )?;

        let device = self
            .upsert_device(ctx, user_id, &key_pair.public_key_pem)
            .await?;

        Ok(SessionOutcome {
            user_id,
            device_id: device.device_id,
            email: email.to_string(),
            tokens,
        })
    }

    pub(crate) async fn upsert_device(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        public_key: &str,
    ) -> Result<crate::models::Device> {
        device_repo::upsert(
            &self.db,
            UpsertDeviceParams {
                user_id,
                device_id: &ctx.device_id,
                device_type: ctx.user_agent.as_deref(),
                ip: ctx.ip.as_deref(),
                public_key,
            },
        )
        .await
    }

    /// Create a verification record and the matching frontend link,
    /// regenerating the random token on a collision.
    async fn create_verification_link(
        &self,
        user_id: Uuid,
        email: &str,
        kind: LinkKind,
        expires_at: DateTime<Utc>,
    ) -> Result<(String, String)> {
        let base = &self.config.frontend.base_url;

        for attempt in 0..TOKEN_CREATE_ATTEMPTS {
            let token = verification_repo::generate_token();

            match verification_repo::create(&self.db, user_id, &token, expires_at).await {
                Ok(_) => {
                    let link = match kind {
                        LinkKind::Activate => format!(
                            "{}/create/account/{}/{}/{}/{}",
                            base,
                            email,
                            expires_at.timestamp(),
                            user_id,
                            token
                        ),
                        LinkKind::Reset => format!(
                            "{}/reset/password/{}/{}/{}",
                            base,
                            expires_at.timestamp(),
                            user_id,
                            token
                        ),
                    };
                    return Ok((token, link));
                }
                Err(AppError::Conflict(_)) if attempt + 1 < TOKEN_CREATE_ATTEMPTS => continue,
                Err(err) => return Err(err),
            }
        }

        Err(AppError::Internal(
            "could not create a unique verification token".to_string(),
        ))
    }
}
