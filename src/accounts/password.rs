//! Password rules for account forms and Argon2 credential storage.

use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::error;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Checks the `password1`/`password2` pair of the registration and reset
/// forms. A mismatch is reported on `password2`, a short password on
/// `password1`. Length counts characters, not bytes.
pub fn check_new_password(password1: &str, password2: &str) -> Result<(), AppError> {
    if password1 != password2 {
        return Err(AppError::validation("password2", "The two password fields didn't match."));
    }
    if password1.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "password1",
            format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."),
        ));
    }
    Ok(())
}

/// PHC string for storage in `users.password_hash`.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash failed");
            anyhow::anyhow!("hash password: {e}")
        })
}

/// Whether `plain` matches the stored hash. A stored value that is not a
/// valid PHC string is an error rather than a mismatch.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        anyhow::anyhow!("parse stored hash: {e}")
    })?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("verify password: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(err: AppError) -> Option<&'static str> {
        match err {
            AppError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn mismatch_is_reported_on_confirmation_field() {
        let err = check_new_password("password123", "password124").unwrap_err();
        assert_eq!(field(err), Some("password2"));
    }

    #[test]
    fn short_password_is_reported_on_first_field() {
        let err = check_new_password("short", "short").unwrap_err();
        assert_eq!(field(err), Some("password1"));
    }

    #[test]
    fn length_counts_characters() {
        assert!(check_new_password("pässwörd", "pässwörd").is_ok());
        assert!(check_new_password("ääääääää", "ääääääää").is_ok());
        assert!(check_new_password("äääääää", "äääääää").is_err());
    }

    #[test]
    fn stored_hash_verifies_only_the_same_password() {
        let stored = hash_password("password123").unwrap();
        assert!(stored.starts_with("$argon2"));
        assert!(verify_password("password123", &stored).unwrap());
        assert!(!verify_password("password124", &stored).unwrap());
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        assert_ne!(hash_password("password123").unwrap(), hash_password("password123").unwrap());
    }

    #[test]
    fn corrupt_stored_hash_is_an_error() {
        assert!(verify_password("password123", "plaintext-leftover").is_err());
    }
}
