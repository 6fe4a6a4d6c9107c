/// Device-bound token verification middleware.
///
/// Tokens are never validated against a service-wide key: the calling
/// device's row holds the public half of the pair minted at its latest
/// issuance, and only a token signed by that pair verifies. A device that
/// has re-authenticated since therefore rejects all earlier tokens.
///
/// Two variants share the verification path:
/// - `AccessAuthMiddleware` reads the bearer access token,
/// - `RefreshAuthMiddleware` reads the refresh cookie, feeding token
///   renewal without re-checking credentials.
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorInternalServerError, ErrorUnauthorized},
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::device_repo;
use crate::middleware::device::DEVICE_ID_HEADER;
use crate::security::jwt::{self, TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH};

/// Cookie transporting the refresh token
pub const REFRESH_COOKIE: &str = "user_login";

/// Identity attached to the request by `AccessAuthMiddleware`.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub user_id: Uuid,
    pub email: String,
}

/// Identity attached to the request by `RefreshAuthMiddleware`.
#[derive(Debug, Clone)]
pub struct RefreshContext {
    pub user_id: Uuid,
    pub email: String,
}

impl FromRequest for AuthedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthedUser>().cloned() {
            Some(user) => ready(Ok(user)),
            None => ready(Err(ErrorUnauthorized("authentication required"))),
        }
    }
}

impl FromRequest for RefreshContext {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<RefreshContext>().cloned() {
            Some(ctx) => ready(Ok(ctx)),
            None => ready(Err(ErrorUnauthorized("refresh authentication required"))),
        }
    }
}

/// Verify a token against the public key stored for the calling device.
async fn verify_against_device(
    state: &AppState,
    device_id: &str,
    token: &str,
    expected_type: &str,
) -> Result<(Uuid, String), Error> {
    let device = device_repo::find_by_device_id(&state.db, device_id, true)
        .await
        .map_err(|_| ErrorUnauthorized("unknown device"))?;

    let claims = jwt::decode_token(token, &device.public_key).map_err(|e| {
        tracing::debug!(device_id = %device_id, error = %e, "token verification failed");
        ErrorUnauthorized("invalid or expired token")
    })?;

    if claims.token_type != expected_type {
        return Err(ErrorUnauthorized("wrong token type"));
    }

    let user_id = claims
        .user_id()
        .map_err(|_| ErrorUnauthorized("invalid token subject"))?;

    if user_id != device.user_id {
        return Err(ErrorUnauthorized("token does not match device"));
    }

    Ok((user_id, claims.email))
}

fn device_id_from(req: &ServiceRequest) -> Result<String, Error> {
    req.headers()
        .get(DEVICE_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ErrorUnauthorized("missing X-Device-Id header"))
}

fn state_from(req: &ServiceRequest) -> Result<AppState, Error> {
    req.app_data::<web::Data<AppState>>()
        .map(|data| data.get_ref().clone())
        .ok_or_else(|| ErrorInternalServerError("application state missing"))
}

/// Bearer access-token authentication middleware factory.
pub struct AccessAuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AccessAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AccessAuthService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AccessAuthService {
            service: Rc::new(service),
        }))
    }
}

pub struct AccessAuthService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AccessAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            // Extract owned values before touching extensions_mut; mixed
            // borrows of the request trip actix's RefCell at runtime.
            let device_id = device_id_from(&req)?;
            let state = state_from(&req)?;

            let auth_header = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| ErrorUnauthorized("missing Authorization header"))?;

            let token = auth_header
                .strip_prefix("Bearer ")
                .ok_or_else(|| ErrorUnauthorized("expected Bearer authorization"))?;

            let (user_id, email) =
                verify_against_device(&state, &device_id, token, TOKEN_TYPE_ACCESS).await?;

            req.extensions_mut().insert(AuthedUser { user_id, email });

            service.call(req).await
        })
    }
}

/// Refresh-cookie authentication middleware factory.
pub struct RefreshAuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for RefreshAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RefreshAuthService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RefreshAuthService {
            service: Rc::new(service),
        }))
    }
}

pub struct RefreshAuthService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RefreshAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let device_id = device_id_from(&req)?;
            let state = state_from(&req)?;

            let refresh_token = req
                .cookie(REFRESH_COOKIE)
                .map(|c| c.value().to_string())
                .ok_or_else(|| ErrorUnauthorized("missing refresh cookie"))?;

            let (user_id, email) =
                verify_against_device(&state, &device_id, &refresh_token, TOKEN_TYPE_REFRESH)
                    .await?;

            req.extensions_mut().insert(RefreshContext { user_id, email });

            service.call(req).await
        })
    }
}
