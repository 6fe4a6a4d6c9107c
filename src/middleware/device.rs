/// Caller context extraction.
///
/// Every request must carry a stable per-device identifier header; it is the
/// device registry key and the anchor for device-bound token verification.
/// The identifier is caller-supplied and opaque, this layer only requires
/// its presence.
use crate::services::RequestContext;
use actix_web::dev::Payload;
use actix_web::error::ErrorBadRequest;
use actix_web::{Error, FromRequest, HttpRequest};
use futures::future::{ready, Ready};

pub const DEVICE_ID_HEADER: &str = "X-Device-Id";

/// Client IP, preferring proxy headers over the peer address.
fn extract_ip(req: &HttpRequest) -> Option<String> {
    if let Some(forwarded) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
    {
        return forwarded.split(',').next().map(|s| s.trim().to_string());
    }

    if let Some(real_ip) = req.headers().get("X-Real-IP").and_then(|h| h.to_str().ok()) {
        return Some(real_ip.to_string());
    }

    req.peer_addr().map(|addr| addr.ip().to_string())
}

impl FromRequest for RequestContext {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let device_id = req
            .headers()
            .get(DEVICE_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let Some(device_id) = device_id else {
            return ready(Err(ErrorBadRequest("missing X-Device-Id header")));
        };

        let user_agent = req
            .headers()
            .get("User-Agent")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        ready(Ok(RequestContext {
            device_id,
            user_agent,
            ip: extract_ip(req),
        }))
    }
}
