use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::error::AppError;

lazy_static! {
    /// Stand-in hash checked when a login names an unknown email, so both
    /// rejection paths pay for one Argon2 evaluation.
    static ref DUMMY_HASH: String =
        hash_password("userbase-dummy-password").unwrap_or_default();
}

/// Hashes `plain` with Argon2id and a fresh random salt into a PHC string.
pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            AppError::Internal(anyhow::anyhow!("argon2 hash_password: {e}"))
        })?
        .to_string();
    Ok(hash)
}

/// Checks `plain` against a stored PHC string. Never fails: a malformed
/// stored hash or an empty candidate is simply a mismatch.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    if plain.is_empty() {
        return false;
    }
    let parsed = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "stored password hash is malformed");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

/// Runs [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("hash_password task panicked")?
}

/// Runs [`verify_password`] on the blocking pool. `None` checks against the
/// dummy hash and always yields `false`.
pub async fn verify_password_blocking(plain: String, hash: Option<String>) -> bool {
    let task = tokio::task::spawn_blocking(move || match hash {
        Some(h) => verify_password(&plain, &h),
        None => {
            verify_password(&plain, &DUMMY_HASH);
            false
        }
    });
    match task.await {
        Ok(ok) => ok,
        Err(e) => {
            error!(error = %e, "verify_password task panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash));
    }

    #[test]
    fn hash_is_phc_and_never_plaintext() {
        let hash = hash_password("secret1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("secret1"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("secret1").unwrap();
        let b = hash_password("secret1").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("secret1", &a));
        assert!(verify_password("secret1", &b));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("anything", "not-a-valid-hash"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn empty_candidate_is_a_mismatch() {
        let hash = hash_password("secret1").unwrap();
        assert!(!verify_password("", &hash));
    }

    #[tokio::test]
    async fn blocking_wrappers_match_sync_versions() {
        let hash = hash_password_blocking("secret1".into()).await.unwrap();
        assert!(verify_password_blocking("secret1".into(), Some(hash.clone())).await);
        assert!(!verify_password_blocking("secret2".into(), Some(hash)).await);
    }

    #[tokio::test]
    async fn missing_user_never_verifies() {
        assert!(!verify_password_blocking("userbase-dummy-password".into(), None).await);
    }
}
