use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::error::Result;
use crate::handlers::auth::clear_refresh_cookie;
use crate::middleware::AuthedUser;
use crate::services::RequestContext;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub gender: Option<i16>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TwoFactorRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpUpdateEmailRequest {
    #[validate(email)]
    pub new_email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEmailRequest {
    #[validate(length(min = 1))]
    pub otp: String,

    #[validate(email)]
    pub new_email: String,
}

#[derive(Debug, Serialize)]
pub struct AccountActionResponse {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct OtpSentResponse {
    pub expires_at: DateTime<Utc>,
}

/// GET /user/profile/{id}
pub async fn get_profile(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let profile = state.auth.get_profile(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// POST /user/update-profile
pub async fn update_profile(
    state: web::Data<AppState>,
    user: AuthedUser,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    let body = body.into_inner();
    let profile = state
        .auth
        .update_profile(
            user.user_id,
            body.username,
            body.phone,
            body.full_name,
            body.avatar,
            body.gender,
        )
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// POST /user/change-password
pub async fn change_password(
    state: web::Data<AppState>,
    user: AuthedUser,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    let id = state.auth.change_password(user.user_id, &body.password).await?;
    Ok(HttpResponse::Ok().json(AccountActionResponse {
        id,
        email: user.email,
    }))
}

/// POST /user/enable-two-factor
pub async fn enable_two_factor(
    state: web::Data<AppState>,
    user: AuthedUser,
    body: web::Json<TwoFactorRequest>,
) -> Result<HttpResponse> {
    state
        .auth
        .enable_two_factor(user.user_id, body.enabled)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": user.user_id,
        "two_factor_enabled": body.enabled,
    })))
}

/// POST /user/send-otp-update-email
pub async fn send_otp_update_email(
    state: web::Data<AppState>,
    user: AuthedUser,
    body: web::Json<SendOtpUpdateEmailRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    let expires_at = state
        .auth
        .send_otp_update_email(user.user_id, &body.new_email)
        .await?;
    Ok(HttpResponse::Ok().json(OtpSentResponse { expires_at }))
}

/// POST /user/update-email
pub async fn update_email(
    state: web::Data<AppState>,
    user: AuthedUser,
    body: web::Json<UpdateEmailRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    state
        .auth
        .update_email(user.user_id, &body.otp, &body.new_email)
        .await?;
    Ok(HttpResponse::Ok().json(AccountActionResponse {
        id: user.user_id,
        email: body.into_inner().new_email,
    }))
}

/// POST /user/logout
pub async fn logout(
    state: web::Data<AppState>,
    ctx: RequestContext,
    user: AuthedUser,
) -> Result<HttpResponse> {
    state.auth.logout(&ctx, user.user_id).await?;
    Ok(HttpResponse::Ok()
        .cookie(clear_refresh_cookie())
        .json(AccountActionResponse {
            id: user.user_id,
            email: user.email,
        }))
}
