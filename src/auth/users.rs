use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use ts_rs::TS;

use super::password::{hash_password, verify_password};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::time::now_ms;

const INVALID_CREDENTIALS: &str = "invalid username or password";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct User {
    #[ts(type = "number")]
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    #[ts(type = "number")]
    pub created_at: i64,
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,
}

impl TryFrom<&SqliteRow> for User {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            username: row.try_get("username").map_err(AppError::from)?,
            is_admin: row
                .try_get::<i64, _>("is_admin")
                .map(|value| value != 0)
                .map_err(AppError::from)?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            password_hash: row.try_get("password_hash").map_err(AppError::from)?,
        })
    }
}

/// PBKDF2 is deliberately slow; keep it off the async workers.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| AppError::new("AUTH/HASH_TASK", err.to_string()))
}

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    is_admin: bool,
    iterations: u32,
) -> AppResult<User> {
    let username = username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::validation("username must not be empty").with_context("field", "username"));
    }
    if password.is_empty() {
        return Err(AppError::validation("password must not be empty").with_context("field", "password"));
    }

    let password = password.to_string();
    let password_hash = blocking(move || hash_password(&password, iterations)).await?;

    let row = sqlx::query(
        "INSERT INTO users (username, password_hash, is_admin, created_at) VALUES (?, ?, ?, ?) \
         RETURNING id, username, password_hash, is_admin, created_at",
    )
    .bind(&username)
    .bind(&password_hash)
    .bind(is_admin)
    .bind(now_ms())
    .fetch_one(pool)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::conflict("user already exists").with_context("username", username.clone())
        } else {
            AppError::from(err)
                .with_context("operation", "create_user")
                .with_context("table", "users")
        }
    })?;
    let user = User::try_from(&row)?;
    tracing::info!(
        target: "accountdeck",
        event = "user_created",
        user_id = user.id,
        username = %user.username,
        is_admin = user.is_admin
    );
    Ok(user)
}

pub async fn find_user_by_username(pool: &SqlitePool, username: &str) -> AppResult<Option<User>> {
    let row = sqlx::query(
        "SELECT id, username, password_hash, is_admin, created_at FROM users WHERE username = ?",
    )
    .bind(username.trim())
    .fetch_optional(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "find_user")
            .with_context("table", "users")
    })?;
    row.as_ref().map(|row| User::try_from(row)).transpose()
}

/// Resolves credentials to a user. Unknown users, wrong passwords and
/// unreadable stored hashes all produce the same `Unauthorized` error.
pub async fn authenticate(pool: &SqlitePool, username: &str, password: &str) -> AppResult<User> {
    let Some(user) = find_user_by_username(pool, username).await? else {
        tracing::info!(target: "accountdeck", event = "login_rejected", reason = "unknown_user");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    let password = password.to_string();
    let stored = user.password_hash.clone();
    match blocking(move || verify_password(&password, &stored)).await? {
        Ok(true) => Ok(user),
        Ok(false) => {
            tracing::info!(
                target: "accountdeck",
                event = "login_rejected",
                reason = "bad_password",
                user_id = user.id
            );
            Err(AppError::unauthorized(INVALID_CREDENTIALS))
        }
        Err(err) => {
            tracing::warn!(
                target: "accountdeck",
                event = "login_rejected",
                reason = "unreadable_hash",
                user_id = user.id,
                error = %err
            );
            Err(AppError::unauthorized(INVALID_CREDENTIALS))
        }
    }
}
