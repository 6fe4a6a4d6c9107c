/// One-time-code flows: the two-factor login challenge and its completion.
///
/// Codes live in the shared OTP ledger; looking one up consumes it, so a
/// code can complete exactly one challenge.
use crate::db::otp_repo::{self, OTP_LENGTH};
use crate::error::{AppError, Result};
use crate::models::User;
use crate::services::auth::{AuthService, SessionOutcome};
use crate::services::email::OutboundEmail;
use crate::services::RequestContext;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

/// Lifetime of a one-time code
pub(crate) const OTP_TTL_MINUTES: i64 = 5;

impl AuthService {
    /// Create and email the two-factor challenge code for a login attempt.
    pub(crate) async fn send_login_otp(&self, user: &User) -> Result<DateTime<Utc>> {
        let code = otp_repo::generate_otp(OTP_LENGTH);
        let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);

        otp_repo::create(&self.db, user.id, &code, expires_at).await?;

        self.mailer
            .enqueue(OutboundEmail::otp_code(&user.email, &code, OTP_TTL_MINUTES));

        Ok(expires_at)
    }

    /// Complete a pending two-factor login.
    ///
    /// The ledger lookup consumes the code; on a match the session is issued
    /// exactly as a password login would have.
    pub async fn verify_otp(&self, ctx: &RequestContext, code: &str) -> Result<SessionOutcome> {
        if code.len() != OTP_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::Validation(
                "invalid one-time code format".to_string(),
            ));
        }

        let otp = otp_repo::take_active(&self.db, code)
            .await?
            .ok_or_else(|| {
                AppError::InvalidState("one-time code is invalid or expired".to_string())
            })?;

        let session = self.issue_session(ctx, otp.user_id, &otp.email).await?;

        info!(user_id = %otp.user_id, "two-factor login completed");

        Ok(session)
    }
}
