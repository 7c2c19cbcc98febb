use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_letter: bool,
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 10,
            max_length: 128,
            require_letter: true,
            require_digit: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordIssue {
    TooShort { min: usize, actual: usize },
    TooLong { max: usize, actual: usize },
    MissingLetter,
    MissingDigit,
    CommonPassword,
    ContainsUsername,
}

impl PasswordIssue {
    pub fn message(&self) -> String {
        match self {
            Self::TooShort { min, actual } => {
                format!("Password must be at least {min} characters (currently {actual})")
            }
            Self::TooLong { max, actual } => {
                format!("Password must be at most {max} characters (currently {actual})")
            }
            Self::MissingLetter => "Password must contain at least one letter".into(),
            Self::MissingDigit => "Password must contain at least one digit".into(),
            Self::CommonPassword => "This password is too common and easily guessed".into(),
            Self::ContainsUsername => "Password must not contain your username".into(),
        }
    }
}

impl PasswordPolicy {
    pub fn check(&self, password: &str, username: Option<&str>) -> Vec<PasswordIssue> {
        let mut issues = Vec::new();

        let length = password.chars().count();
        if length < self.min_length {
            issues.push(PasswordIssue::TooShort {
                min: self.min_length,
                actual: length,
            });
        }
        if length > self.max_length {
            issues.push(PasswordIssue::TooLong {
                max: self.max_length,
                actual: length,
            });
        }
        if self.require_letter && !password.chars().any(|c| c.is_alphabetic()) {
            issues.push(PasswordIssue::MissingLetter);
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            issues.push(PasswordIssue::MissingDigit);
        }
        if is_common_password(password) {
            issues.push(PasswordIssue::CommonPassword);
        }
        if let Some(uname) = username.map(str::trim).filter(|u| !u.is_empty()) {
            if password.to_lowercase().contains(&uname.to_lowercase()) {
                issues.push(PasswordIssue::ContainsUsername);
            }
        }

        issues
    }

    /// Joins every issue into one message, or `Ok` when the password passes.
    pub fn enforce(&self, password: &str, username: Option<&str>) -> Result<(), String> {
        let issues = self.check(password, username);
        if issues.is_empty() {
            return Ok(());
        }
        Err(issues
            .iter()
            .map(PasswordIssue::message)
            .collect::<Vec<_>>()
            .join("; "))
    }
}

fn is_common_password(password: &str) -> bool {
    const COMMON_PASSWORDS: &[&str] = &[
        "password",
        "123456",
        "12345678",
        "123456789",
        "qwerty",
        "letmein",
        "welcome",
        "admin",
        "changeme",
        "passw0rd",
        "p@ssw0rd",
        "qwerty123",
        "1234567890",
        "tabdeel",
    ];

    let lower = password.to_lowercase();
    COMMON_PASSWORDS
        .iter()
        .any(|&common| {
            lower == common || (lower.starts_with(common) && lower.len() < common.len() + 4)
        })
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {e}")),
    }
}

static DECOY_HASH: std::sync::OnceLock<Option<String>> = std::sync::OnceLock::new();

/// Runs a full verification against a fixed hash and discards the result.
/// Login calls this for unknown usernames so both branches pay the same
/// argon2 cost.
pub fn verify_decoy(password: &str) {
    let decoy = DECOY_HASH.get_or_init(|| hash_password("pulse-decoy-credential").ok());
    match decoy {
        Some(hash) => {
            let _ = verify_password(password, hash);
        }
        None => debug!("Decoy hash unavailable, skipping decoy verification"),
    }
}

/// Temporary password handed out by an administrator reset. Always
/// satisfies the default policy.
pub fn generate_temporary_password(length: usize) -> String {
    use rand::Rng;

    const LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    const DIGITS: &[u8] = b"23456789";
    const SPECIAL: &[u8] = b"!@#$%*-_";

    let length = length.max(12);
    let mut rng = rand::rng();
    let mut password = Vec::with_capacity(length);

    password.push(LETTERS[rng.random_range(0..LETTERS.len())]);
    password.push(DIGITS[rng.random_range(0..DIGITS.len())]);
    password.push(SPECIAL[rng.random_range(0..SPECIAL.len())]);

    let all_chars: Vec<u8> = [LETTERS, DIGITS, SPECIAL].concat();
    for _ in 3..length {
        password.push(all_chars[rng.random_range(0..all_chars.len())]);
    }

    for i in (1..password.len()).rev() {
        let j = rng.random_range(0..=i);
        password.swap(i, j);
    }

    String::from_utf8(password).unwrap_or_else(|_| {
        debug!("Generated password contained invalid UTF-8, regenerating");
        generate_temporary_password(length)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Harbour2026!").expect("Failed to hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Harbour2026!", &hash).expect("Verify failed"));
        assert!(!verify_password("harbour2026!", &hash).expect("Verify failed"));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_decoy_hash_is_real_argon2() {
        verify_decoy("Harbour2026!");
        let decoy = DECOY_HASH.get().cloned().flatten().expect("decoy initialised");
        assert!(decoy.starts_with("$argon2"));
        assert!(!verify_password("Harbour2026!", &decoy).unwrap());
    }

    #[test]
    fn test_policy_accepts_reasonable_password() {
        let policy = PasswordPolicy::default();
        assert!(policy.check("Harbour2026!", Some("amal")).is_empty());
    }

    #[test]
    fn test_policy_too_short_and_missing_digit() {
        let issues = PasswordPolicy::default().check("short", None);
        assert!(issues.iter().any(|i| matches!(i, PasswordIssue::TooShort { .. })));
        assert!(issues.contains(&PasswordIssue::MissingDigit));
    }

    #[test]
    fn test_policy_common_password() {
        let issues = PasswordPolicy::default().check("password123", None);
        assert!(issues.contains(&PasswordIssue::CommonPassword));
    }

    #[test]
    fn test_policy_username_in_password() {
        let issues = PasswordPolicy::default().check("Fatima2026xyz", Some("fatima"));
        assert!(issues.contains(&PasswordIssue::ContainsUsername));
    }

    #[test]
    fn test_enforce_joins_messages() {
        let err = PasswordPolicy::default().enforce("abc", None).unwrap_err();
        assert!(err.contains("at least 10 characters"));
        assert!(err.contains("digit"));
    }

    #[test]
    fn test_generated_password_passes_policy() {
        for _ in 0..20 {
            let password = generate_temporary_password(14);
            assert_eq!(password.len(), 14);
            assert!(PasswordPolicy::default().check(&password, None).is_empty());
        }
    }
}
