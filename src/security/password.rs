/// Password hashing and verification using Argon2id
use crate::error::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;

/// Charset for server-generated passwords handed out at account activation.
const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";

/// Hash a password using Argon2id with a random per-password salt.
///
/// Returns a PHC-formatted string safe for database storage; the salt is
/// embedded, so the same string is used for later verification.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Crypto(format!("password hashing failed: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a PHC-formatted hash.
///
/// Uses argon2's constant-time comparison; a mismatch is `Ok(false)`, not an
/// error.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AppError::Crypto(format!("invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Crypto(format!(
            "password verification failed: {}",
            e
        ))),
    }
}

/// Validate password strength for user-chosen passwords.
///
/// Composition rules plus a zxcvbn entropy floor of 3. Server-generated
/// activation passwords skip this check.
pub fn validate_password_strength(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if !has_uppercase || !has_lowercase || !has_digit || !has_special {
        return Err(AppError::Validation(
            "password must contain uppercase, lowercase, digit and special characters".to_string(),
        ));
    }

    let entropy = zxcvbn::zxcvbn(password, &[])
        .map_err(|e| AppError::Internal(format!("password entropy calculation failed: {}", e)))?;

    if entropy.score() < 3 {
        return Err(AppError::Validation(
            "password is too weak, please choose a stronger one".to_string(),
        ));
    }

    Ok(())
}

/// Generate a random password of the given length.
///
/// Used at account verification, where the user receives a server-chosen
/// initial password by email.
pub fn generate_random_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let password = "StrongP@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verification should succeed"));
        assert!(!verify_password("WrongPassword123!", &hash).unwrap());
    }

    #[test]
    fn different_salts_produce_different_hashes() {
        let password = "StrongP@ssw0rd!";
        let hash1 = hash_password(password).unwrap();
        let hash2 = hash_password(password).unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn strength_rejects_short_passwords() {
        assert!(validate_password_strength("Sh0rt!").is_err());
    }

    #[test]
    fn strength_rejects_missing_character_classes() {
        assert!(validate_password_strength("alllowercase1!").is_err());
        assert!(validate_password_strength("NoDigitsHere!").is_err());
        assert!(validate_password_strength("NoSpecials123").is_err());
    }

    #[test]
    fn strength_accepts_strong_password() {
        assert!(validate_password_strength("Tr1cky&Unguessable#Pass").is_ok());
    }

    #[test]
    fn generated_password_has_requested_length() {
        let password = generate_random_password(10);
        assert_eq!(password.len(), 10);
        assert!(password
            .bytes()
            .all(|b| PASSWORD_CHARSET.contains(&b)));
    }

    #[test]
    fn generated_passwords_differ() {
        assert_ne!(generate_random_password(10), generate_random_password(10));
    }
}
