pub mod auth;
pub mod device;

pub use auth::{AccessAuthMiddleware, AuthedUser, RefreshAuthMiddleware, RefreshContext, REFRESH_COOKIE};
pub use device::DEVICE_ID_HEADER;
