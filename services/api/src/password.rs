//! services/api/src/password.rs
//!
//! Argon2 hashing for stored account credentials.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use docchat_core::ports::{PortError, PortResult};

pub fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortError::Unexpected(format!("Failed to hash password: {}", e)))
}

/// Checks `password` against a stored credential. Stores written by older
/// dashboards keep plaintext passwords; anything that is not a PHC string is
/// compared directly.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => !stored.is_empty() && stored == password,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_passwords_verify() {
        let hash = hash_password("admin123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("admin123", &hash));
        assert!(!verify_password("admin124", &hash));
    }

    #[test]
    fn legacy_plaintext_is_accepted() {
        assert!(verify_password("admin123", "admin123"));
        assert!(!verify_password("", ""));
    }
}
