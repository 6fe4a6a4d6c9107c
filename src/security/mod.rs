/// Security primitives for the authentication core:
/// - ephemeral RSA key pairs, one per successful authentication event
/// - RS256 token signing/verification with strongly typed claims
/// - Argon2id password hashing and strength validation
pub mod jwt;
pub mod keys;
pub mod password;

pub use jwt::{decode_token, issue_token_pair, Claims, TokenPair};
pub use keys::{generate_key_pair, KeyPair};
pub use password::{generate_random_password, hash_password, verify_password};
