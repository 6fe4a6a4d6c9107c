use once_cell::sync::Lazy;
use regex::Regex;

/// Input validation utilities shared by the auth flows

// Compile regex patterns once at startup
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("hardcoded email regex is invalid - fix source code")
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?([0-9]{1,3})?[-. ]?([0-9]{1,4})[-. ]?([0-9]{1,4})[-. ]?([0-9]{9,10})$")
        .expect("hardcoded phone regex is invalid - fix source code")
});

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{3,32}$")
        .expect("hardcoded username regex is invalid - fix source code")
});

/// What kind of login identifier the caller supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Email,
    Phone,
    Username,
}

/// Classify a login identifier by shape: email first, then phone number,
/// anything else is treated as a username.
pub fn identify(identifier: &str) -> IdentifierKind {
    if EMAIL_REGEX.is_match(identifier) {
        IdentifierKind::Email
    } else if PHONE_REGEX.is_match(identifier) {
        IdentifierKind::Phone
    } else {
        IdentifierKind::Username
    }
}

/// Validate email format (RFC 5322 simplified)
pub fn validate_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Validate username format (3-32 characters, alphanumeric with - and _)
pub fn validate_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

/// Validate phone number format
pub fn validate_phone(phone: &str) -> bool {
    PHONE_REGEX.is_match(phone)
}

/// Mask the local part of an email, keeping the last two characters.
pub fn hide_email(email: &str) -> String {
    let Some(at) = email.rfind('@') else {
        return email.to_string();
    };

    let local = &email[..at];
    let domain = &email[at..];

    if local.len() > 2 {
        let visible = &local[local.len() - 2..];
        format!("{}{}{}", "*".repeat(local.len() - 2), visible, domain)
    } else {
        format!("{}{}", local, domain)
    }
}

/// Mask a phone number, keeping the last three digits.
pub fn hide_phone(phone: &str) -> String {
    if phone.len() > 3 {
        format!("{}{}", "*".repeat(phone.len() - 3), &phone[phone.len() - 3..])
    } else {
        phone.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifies_emails() {
        assert_eq!(identify("user@example.com"), IdentifierKind::Email);
        assert_eq!(
            identify("first.last+tag@sub.example.co.uk"),
            IdentifierKind::Email
        );
    }

    #[test]
    fn identifies_phone_numbers() {
        assert_eq!(identify("+84-123-456-123456789"), IdentifierKind::Phone);
        assert_eq!(identify("84123456789"), IdentifierKind::Phone);
    }

    #[test]
    fn falls_back_to_username() {
        assert_eq!(identify("some_user"), IdentifierKind::Username);
        assert_eq!(identify("not-an-email@"), IdentifierKind::Username);
    }

    #[test]
    fn validates_email_shape() {
        assert!(validate_email("user@example.com"));
        assert!(!validate_email(""));
        assert!(!validate_email("missing-domain@"));
    }

    #[test]
    fn validates_username_shape() {
        assert!(validate_username("valid_user-1"));
        assert!(!validate_username("ab"));
        assert!(!validate_username("has spaces"));
    }

    #[test]
    fn hides_email_local_part() {
        assert_eq!(hide_email("johndoe@example.com"), "*****oe@example.com");
        assert_eq!(hide_email("ab@example.com"), "ab@example.com");
        assert_eq!(hide_email("not-an-email"), "not-an-email");
    }

    #[test]
    fn hides_phone_digits() {
        assert_eq!(hide_phone("0901234567"), "*******567");
    }
}
