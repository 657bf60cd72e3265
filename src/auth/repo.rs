use async_trait::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::auth::repo_types::{NewUser, User, UserId};
use crate::error::AppResult;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Fails with `DuplicateIdentity` on a username or email clash.
    async fn create(&self, user: NewUser<'_>, now: OffsetDateTime) -> AppResult<UserId>;
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>>;
    async fn touch_last_login(&self, id: UserId, at: OffsetDateTime) -> AppResult<()>;
}

#[derive(Clone)]
pub struct SqliteUserRepository {
    db: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: NewUser<'_>, now: OffsetDateTime) -> AppResult<UserId> {
        let done = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, mobile, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.mobile)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(done.last_insert_rowid())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, mobile, created_at, last_login
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, mobile, created_at, last_login
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn touch_last_login(&self, id: UserId, at: OffsetDateTime) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
