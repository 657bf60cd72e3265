use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, error, warn};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::UserRepository;
use crate::auth::repo_types::{NewUser, User, UserId};
use crate::error::{AppError, AppResult};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Create an account. The password is stored only as an Argon2 hash.
pub async fn register(
    users: &dyn UserRepository,
    username: &str,
    email: &str,
    raw_password: &str,
    contact: Option<&str>,
) -> AppResult<UserId> {
    let username = username.trim();
    let email = email.trim().to_lowercase();

    if username.is_empty() || email.is_empty() || raw_password.is_empty() {
        return Err(AppError::InvalidInput("All fields are required!"));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::InvalidInput("Invalid email address!"));
    }

    let hash = hash_password(raw_password.to_string())
        .await
        .map_err(AppError::StorageUnavailable)?;
    let mobile = contact.map(str::trim).filter(|m| !m.is_empty());

    users
        .create(
            NewUser {
                username,
                email: &email,
                password_hash: &hash,
                mobile,
            },
            OffsetDateTime::now_utc(),
        )
        .await
}

/// Check credentials and stamp `last_login`.
///
/// Unknown usernames and wrong passwords produce the same error.
pub async fn authenticate(
    users: &dyn UserRepository,
    username: &str,
    raw_password: &str,
) -> AppResult<User> {
    let Some(mut user) = users.find_by_username(username.trim()).await? else {
        debug!(username = %username, "login for unknown username");
        return Err(AppError::InvalidCredentials);
    };

    let ok = verify_password(raw_password.to_string(), user.password_hash.clone())
        .await
        .map_err(|e| {
            error!(error = %e, user_id = user.id, "stored password hash unreadable");
            AppError::StorageUnavailable(e)
        })?;
    if !ok {
        debug!(user_id = user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let now = OffsetDateTime::now_utc();
    users.touch_last_login(user.id, now).await?;
    user.last_login = Some(now);
    Ok(user)
}
