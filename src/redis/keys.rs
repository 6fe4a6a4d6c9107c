/// Redis key naming conventions
/// Establishes consistent, predictable key naming across all Redis usage
use crate::redis::spam::SpamClass;
use uuid::Uuid;

/// Base namespace for all Redis keys
const AUTH_NAMESPACE: &str = "auth";

/// Abuse counter keys
pub struct SpamKey;

impl SpamKey {
    /// Counter for one abuse class and subject (usually the client IP).
    /// The key's TTL doubles as the remaining block duration.
    pub fn counter(class: SpamClass, subject: &str) -> String {
        format!("{}:spam:{}:{}", AUTH_NAMESPACE, class.as_str(), subject)
    }
}

/// Profile cache keys
pub struct ProfileCacheKey;

impl ProfileCacheKey {
    pub fn profile(user_id: Uuid) -> String {
        format!("{}:profile:{}", AUTH_NAMESPACE, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spam_key_includes_class_and_subject() {
        let key = SpamKey::counter(SpamClass::Login, "203.0.113.9");
        assert_eq!(key, "auth:spam:login:203.0.113.9");
    }
}
