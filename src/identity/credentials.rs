//! Password hashing and opaque token generation for the in-memory provider.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::Rng;
use sha2::{Digest, Sha256};

const TOKEN_PREFIX: &str = "psg-";
const TOKEN_RANDOM_LEN: usize = 40;
/// Salt length in bytes (16 bytes = 22 base64 chars, well within argon2 limits).
const SALT_LEN: usize = 16;

/// Hash a password using argon2id.
///
/// The password is first SHA-256'd so argon2 always sees a fixed-length
/// input.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let sha_digest = fingerprint(password);
    let salt = generate_salt()?;
    let hash = Argon2::default().hash_password(sha_digest.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against an argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let sha_digest = fingerprint(password);
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(sha_digest.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a new opaque access token (`psg-{40 alphanumeric}`).
pub fn generate_access_token() -> String {
    format!("{TOKEN_PREFIX}{}", generate_random_alphanumeric(TOKEN_RANDOM_LEN))
}

/// SHA-256 of a secret as a hex string. Used as the lookup key wherever a
/// token has to be remembered without keeping the token itself.
pub fn fingerprint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_salt() -> Result<SaltString, argon2::password_hash::Error> {
    let mut rng = rand::rng();
    let mut salt_bytes = [0u8; SALT_LEN];
    rng.fill(&mut salt_bytes);
    SaltString::encode_b64(&salt_bytes)
}

fn generate_random_alphanumeric(len: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
