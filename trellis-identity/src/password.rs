// Password hashing and policy

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
    },
};
use trellis_core::{ManagementError, Result};

/// Argon2 password hasher
#[derive(Clone, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn new() -> Self {
        Self
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ManagementError::problem(format!("Password hashing failed: {}", e)))
    }

    pub fn verify(&self, password: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

/// Minimum requirements for new and reset passwords.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 6,
            require_digit: true,
        }
    }
}

impl PasswordPolicy {
    pub fn check(&self, password: &str) -> Result<()> {
        let mut errors = Vec::new();
        if password.chars().count() < self.min_length {
            errors.push(format!(
                "Passwords must be at least {} characters.",
                self.min_length
            ));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Passwords must have at least one digit ('0'-'9').".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ManagementError::invalid("Password does not meet requirements.")
                .with_detail("errors", errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash("s3cret!").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify("s3cret!", &hash));
        assert!(!hasher.verify("wrong", &hash));
        assert!(!hasher.verify("s3cret!", "not-a-hash"));
    }

    #[test]
    fn test_policy() {
        let policy = PasswordPolicy::default();
        assert!(policy.check("abc123").is_ok());

        let err = policy.check("abc").unwrap_err();
        let errors = err.detail("errors").unwrap().as_array().unwrap();
        assert_eq!(errors.len(), 2);
    }
}
