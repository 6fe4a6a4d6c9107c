use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::error::Result;
use crate::middleware::{RefreshContext, REFRESH_COOKIE};
use crate::services::auth::{LoginOutcome, SessionOutcome};
use crate::services::RequestContext;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyAccountQuery {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub identifier: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 1))]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResendLinkRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgetPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    pub user_id: Uuid,

    #[validate(length(min = 1))]
    pub token: String,

    #[validate(length(min = 8))]
    pub password: String,
}

/// Session response body; the refresh token travels in the cookie only.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub device_id: String,
    pub email: String,
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorPendingResponse {
    pub two_factor_required: bool,
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub id: Uuid,
    pub message: &'static str,
}

fn refresh_cookie(state: &AppState, value: String) -> Cookie<'static> {
    let hardened = state.config.is_production();
    Cookie::build(REFRESH_COOKIE, value)
        .path("/")
        .http_only(hardened)
        .secure(hardened)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(state.config.jwt.refresh_ttl_secs))
        .finish()
}

fn session_response(state: &AppState, session: SessionOutcome) -> HttpResponse {
    let cookie = refresh_cookie(state, session.tokens.refresh_token);
    HttpResponse::Ok().cookie(cookie).json(SessionResponse {
        id: session.user_id,
        device_id: session.device_id,
        email: session.email,
        access_token: session.tokens.access_token,
        expires_in: session.tokens.expires_in,
    })
}

/// POST /auth/register
pub async fn register(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    let outcome = state.auth.register(&ctx, &body.email).await?;
    Ok(HttpResponse::Created().json(outcome))
}

/// GET /auth/verify-account
///
/// Target of the emailed activation link; issues the first session for the
/// verifying device.
pub async fn verify_account(
    state: web::Data<AppState>,
    ctx: RequestContext,
    query: web::Query<VerifyAccountQuery>,
) -> Result<HttpResponse> {
    let session = state
        .auth
        .verify_account(&ctx, query.user_id, &query.email, &query.token)
        .await?;
    Ok(session_response(&state, session))
}

/// POST /auth/login
pub async fn login(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    match state
        .auth
        .login_identifier(&ctx, &body.identifier, &body.password)
        .await?
    {
        LoginOutcome::Session(session) => Ok(session_response(&state, session)),
        LoginOutcome::PendingTwoFactor {
            user_id,
            expires_at,
        } => Ok(HttpResponse::Ok().json(TwoFactorPendingResponse {
            two_factor_required: true,
            id: user_id,
            expires_at,
        })),
    }
}

/// POST /auth/verify-otp
pub async fn verify_otp(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: web::Json<VerifyOtpRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    let session = state.auth.verify_otp(&ctx, &body.otp).await?;
    Ok(session_response(&state, session))
}

/// POST /auth/resend-link
pub async fn resend_verification_link(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: web::Json<ResendLinkRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    let outcome = state.auth.resend_verification_link(&ctx, &body.email).await?;
    Ok(HttpResponse::Created().json(outcome))
}

/// POST /auth/forget-password
pub async fn forget_password(
    state: web::Data<AppState>,
    ctx: RequestContext,
    body: web::Json<ForgetPasswordRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    let outcome = state.auth.forget_password(&ctx, &body.email).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /auth/reset-password
pub async fn reset_password(
    state: web::Data<AppState>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    let id = state
        .auth
        .reset_password(body.user_id, &body.token, &body.password)
        .await?;
    Ok(HttpResponse::Ok().json(ResetPasswordResponse {
        id,
        message: "password reset successfully",
    }))
}

/// GET /auth/renew-token
///
/// Runs behind `RefreshAuthMiddleware`: the refresh cookie has already been
/// verified against the device's stored public key.
pub async fn renew_token(
    state: web::Data<AppState>,
    ctx: RequestContext,
    refresh: RefreshContext,
) -> Result<HttpResponse> {
    let session = state
        .auth
        .renew_token(&ctx, refresh.user_id, &refresh.email)
        .await?;
    Ok(session_response(&state, session))
}

/// Build the cookie that clears a refresh session.
pub fn clear_refresh_cookie() -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, "")
        .path("/")
        .max_age(time::Duration::ZERO)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_refresh_cookie();
        assert_eq!(cookie.name(), REFRESH_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}
