//! Credential hashing.
//!
//! All writes use argon2. Accounts created under the retired scheme (an
//! unsalted SHA-256 hex digest) still verify, and callers re-hash such
//! accounts to argon2 on the next successful login so the legacy format
//! drains out of the table over time.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};

use crate::errors::ServiceError;

/// Outcome of checking a plaintext against a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMatch {
    No,
    Yes,
    /// Matched against the legacy SHA-256 digest; the stored hash should be
    /// upgraded to argon2 now that the plaintext is known to be correct.
    YesLegacy,
}

impl PasswordMatch {
    pub fn is_match(self) -> bool {
        !matches!(self, PasswordMatch::No)
    }
}

/// Hash a plaintext password with argon2.
pub fn hash_password(plain: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

/// Verify a plaintext against a stored hash under either scheme.
pub fn verify_password(plain: &str, stored: &str) -> Result<PasswordMatch, ServiceError> {
    if let Ok(parsed) = PasswordHash::new(stored) {
        return Ok(
            match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
                Ok(()) => PasswordMatch::Yes,
                Err(_) => PasswordMatch::No,
            },
        );
    }

    if is_legacy_digest(stored) {
        let digest = legacy_digest(plain);
        return Ok(if digest.eq_ignore_ascii_case(stored) {
            PasswordMatch::YesLegacy
        } else {
            PasswordMatch::No
        });
    }

    tracing::warn!("stored password hash is in an unrecognized format");
    Ok(PasswordMatch::No)
}

/// Legacy hashes are bare SHA-256 digests rendered as 64 hex characters.
fn is_legacy_digest(stored: &str) -> bool {
    stored.len() == 64 && stored.bytes().all(|b| b.is_ascii_hexdigit())
}

fn legacy_digest(plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_round_trip() {
        let hash = hash_password("pw1").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert_eq!(verify_password("pw1", &hash).unwrap(), PasswordMatch::Yes);
        assert_eq!(verify_password("pw2", &hash).unwrap(), PasswordMatch::No);
    }

    #[test]
    fn legacy_digest_still_verifies() {
        let stored = legacy_digest("old-password");
        assert_eq!(
            verify_password("old-password", &stored).unwrap(),
            PasswordMatch::YesLegacy
        );
        assert_eq!(
            verify_password("wrong", &stored).unwrap(),
            PasswordMatch::No
        );
    }

    #[test]
    fn legacy_digest_matches_case_insensitively() {
        let stored = legacy_digest("old-password").to_uppercase();
        assert_eq!(
            verify_password("old-password", &stored).unwrap(),
            PasswordMatch::YesLegacy
        );
    }

    #[test]
    fn unknown_format_never_matches() {
        assert_eq!(
            verify_password("pw", "not-a-hash").unwrap(),
            PasswordMatch::No
        );
    }
}
