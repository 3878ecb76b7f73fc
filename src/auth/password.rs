//! Argon2id password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::ValidationError;

use super::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password using Argon2id. Returns a PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Verify a password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Password rule for registration: at least 8 characters with a letter and a digit.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LENGTH;
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_letter && has_digit {
        return Ok(());
    }

    let mut err = ValidationError::new("password");
    err.message = Some(
        format!(
            "Password must be at least {} characters and contain at least one letter and one number",
            MIN_PASSWORD_LENGTH
        )
        .into(),
    );
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("learnqkart1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("learnqkart1", &hash).is_ok());
        assert!(matches!(
            verify_password("learnqkart2", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything1", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[rstest]
    #[case("password1", true)]
    #[case("12345678a", true)]
    #[case("short1", false)]
    #[case("onlyletters", false)]
    #[case("1234567890", false)]
    fn password_strength(#[case] password: &str, #[case] ok: bool) {
        assert_eq!(validate_password_strength(password).is_ok(), ok);
    }
}
