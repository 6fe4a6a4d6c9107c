pub mod keys;
pub mod operations;
pub mod spam;

pub use spam::{SpamClass, SpamGuard, SpamVerdict};
