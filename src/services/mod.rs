pub mod auth;
pub mod email;
pub mod otp;
pub mod password_guard;
pub mod user;

pub use auth::AuthService;
pub use email::{EmailTransport, Mailer, OutboundEmail};

/// Caller context assembled by the HTTP layer for every request: the
/// mandatory device identifier header plus best-effort client metadata.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub device_id: String,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

impl RequestContext {
    /// Subject key for the spam counters; the client IP when known,
    /// otherwise the device identifier.
    pub fn spam_subject(&self) -> &str {
        self.ip.as_deref().unwrap_or(&self.device_id)
    }
}
