/// JWT encoding/decoding using RS256 against per-device key pairs.
///
/// Unlike a service-wide signing key, every successful authentication event
/// mints its own pair (see `security::keys`), so verification always goes
/// through the public key stored on the caller's device row.
use crate::error::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Strongly typed claims; decoded directly instead of through a generic map.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Email address
    pub email: String,
    /// Token type: "access" or "refresh"
    pub token_type: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::InvalidState("invalid user id in token".to_string()))
    }
}

/// Access/refresh token pair issued together from one key pair.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Sign a single token with the given private key PEM.
pub fn sign_token(
    user_id: Uuid,
    email: &str,
    token_type: &str,
    private_key_pem: &str,
    ttl_secs: i64,
) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        token_type: token_type.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
    };

    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| AppError::Crypto(format!("invalid signing key: {}", e)))?;

    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| AppError::Crypto(format!("token signing failed: {}", e)))
}

/// Issue an access + refresh token pair signed with the same private key.
pub fn issue_token_pair(
    user_id: Uuid,
    email: &str,
    private_key_pem: &str,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
) -> Result<TokenPair> {
    let access_token = sign_token(
        user_id,
        email,
        TOKEN_TYPE_ACCESS,
        private_key_pem,
        access_ttl_secs,
    )?;
    let refresh_token = sign_token(
        user_id,
        email,
        TOKEN_TYPE_REFRESH,
        private_key_pem,
        refresh_ttl_secs,
    )?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_in: access_ttl_secs,
    })
}

/// Decode and validate a token against a device's stored public key PEM.
///
/// Expiry is checked as part of validation; a token signed with a key pair
/// that has since been superseded on the device row fails here with a
/// signature error.
pub fn decode_token(token: &str, public_key_pem: &str) -> Result<Claims> {
    let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map_err(|_| AppError::InvalidState("invalid token".to_string()))?;

    let data = decode::<Claims>(token, &key, &Validation::new(Algorithm::RS256))?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::keys::{generate_key_pair, KeyPair};
    use once_cell::sync::Lazy;

    // RSA generation is slow; share one pair across the test module.
    static TEST_KEYS: Lazy<KeyPair> =
        Lazy::new(|| generate_key_pair().expect("test key generation"));

    #[test]
    fn round_trip_access_token() {
        let user_id = Uuid::new_v4();
        let token = sign_token(
            user_id,
            "test@example.com",
            TOKEN_TYPE_ACCESS,
            &TEST_KEYS.private_key_pem,
            3600,
        )
        .expect("signing should succeed");

        assert_eq!(token.matches('.').count(), 2);

        let claims = decode_token(&token, &TEST_KEYS.public_key_pem).expect("decode");
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.token_type, TOKEN_TYPE_ACCESS);
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn pair_carries_both_token_types() {
        let pair = issue_token_pair(
            Uuid::new_v4(),
            "pair@example.com",
            &TEST_KEYS.private_key_pem,
            3600,
            86400,
        )
        .expect("pair issuance");

        let access = decode_token(&pair.access_token, &TEST_KEYS.public_key_pem).unwrap();
        let refresh = decode_token(&pair.refresh_token, &TEST_KEYS.public_key_pem).unwrap();

        assert_eq!(access.token_type, TOKEN_TYPE_ACCESS);
        assert_eq!(refresh.token_type, TOKEN_TYPE_REFRESH);
        assert!(refresh.exp > access.exp);
        assert_eq!(pair.expires_in, 3600);
    }

    #[test]
    fn decode_fails_against_superseding_key() {
        let token = sign_token(
            Uuid::new_v4(),
            "old@example.com",
            TOKEN_TYPE_REFRESH,
            &TEST_KEYS.private_key_pem,
            3600,
        )
        .unwrap();

        // A re-authentication replaces the device's public key; the old
        // token must no longer verify.
        let new_pair = generate_key_pair().unwrap();
        let result = decode_token(&token, &new_pair.public_key_pem);
        assert!(result.is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign_token(
            Uuid::new_v4(),
            "late@example.com",
            TOKEN_TYPE_ACCESS,
            &TEST_KEYS.private_key_pem,
            -120,
        )
        .unwrap();

        let result = decode_token(&token, &TEST_KEYS.public_key_pem);
        assert!(matches!(result, Err(AppError::Expired(_))));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let result = decode_token("not.a.token", &TEST_KEYS.public_key_pem);
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }
}
