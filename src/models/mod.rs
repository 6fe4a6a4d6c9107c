pub mod device;
pub mod otp;
pub mod password_history;
pub mod user;
pub mod verification;

pub use device::Device;
pub use otp::{Otp, OtpWithOwner};
pub use password_history::{password_reason, PasswordHistoryEntry};
pub use user::{Profile, User};
pub use verification::Verification;
