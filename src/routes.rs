//! Route configuration
//!
//! Auth endpoints are public (guarded inside the flows by the spam
//! counters); user endpoints sit behind device-bound access-token
//! authentication, token renewal behind the refresh-cookie variant.

use crate::handlers;
use crate::middleware::{AccessAuthMiddleware, RefreshAuthMiddleware};
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health::health_check))
            .service(
                web::scope("/auth")
                    .service(
                        web::resource("/renew-token")
                            .route(web::get().to(handlers::auth::renew_token))
                            .wrap(RefreshAuthMiddleware),
                    )
                    .route("/register", web::post().to(handlers::auth::register))
                    .route(
                        "/verify-account",
                        web::get().to(handlers::auth::verify_account),
                    )
                    .route("/login", web::post().to(handlers::auth::login))
                    .route("/verify-otp", web::post().to(handlers::auth::verify_otp))
                    .route(
                        "/resend-link",
                        web::post().to(handlers::auth::resend_verification_link),
                    )
                    .route(
                        "/forget-password",
                        web::post().to(handlers::auth::forget_password),
                    )
                    .route(
                        "/reset-password",
                        web::post().to(handlers::auth::reset_password),
                    ),
            )
            .service(
                web::scope("/user")
                    .wrap(AccessAuthMiddleware)
                    .route("/profile/{id}", web::get().to(handlers::user::get_profile))
                    .route(
                        "/update-profile",
                        web::post().to(handlers::user::update_profile),
                    )
                    .route(
                        "/change-password",
                        web::post().to(handlers::user::change_password),
                    )
                    .route(
                        "/enable-two-factor",
                        web::post().to(handlers::user::enable_two_factor),
                    )
                    .route(
                        "/send-otp-update-email",
                        web::post().to(handlers::user::send_otp_update_email),
                    )
                    .route(
                        "/update-email",
                        web::post().to(handlers::user::update_email),
                    )
                    .route("/logout", web::post().to(handlers::user::logout)),
            ),
    );
}
