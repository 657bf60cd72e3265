//! Argon2 hashing, moved off the async workers since each call costs
//! tens of milliseconds of CPU.

use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tokio::task::spawn_blocking;
use tracing::error;

/// PHC-encoded Argon2id hash of `plain` with a fresh random salt.
pub async fn hash_password(plain: String) -> anyhow::Result<String> {
    spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })
    })
    .await
    .context("password hashing task")?
}

/// `Ok(false)` on mismatch; `Err` only when `stored` is not a PHC string.
pub async fn verify_password(plain: String, stored: String) -> anyhow::Result<bool> {
    spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .context("password verification task")?
}
