use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use std::io::Error as IoError;
use ts_rs::TS;

/// Duplicate unique name (app, account or username).
pub const CONFLICT_CODE: &str = "CATALOG/CONFLICT";
/// Operation addressed an id that does not exist.
pub const NOT_FOUND_CODE: &str = "CATALOG/NOT_FOUND";
/// Payload rejected before it reached the store.
pub const VALIDATION_CODE: &str = "CATALOG/VALIDATION";
/// Missing, expired or invalid credentials.
pub const UNAUTHORIZED_CODE: &str = "AUTH/UNAUTHORIZED";
/// Login endpoints called while login is switched off.
pub const AUTH_DISABLED_CODE: &str = "AUTH/DISABLED";

/// SQLite extended result codes surfaced by sqlx as strings.
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";

/// A structured application error that can be serialized and surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppError {
    /// Machine readable error code.
    pub code: String,
    /// Human friendly message that can be shown directly to the user.
    pub message: String,
    /// Arbitrary key/value pairs that provide additional context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[ts(type = "Record<string, string>")]
    pub context: HashMap<String, String>,
    /// Optional nested cause that preserves the error chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cause: Option<Box<AppError>>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Coarse classification used by the presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    NotFound,
    Validation,
    Unauthorized,
    Disabled,
    Store,
}

impl AppError {
    /// Construct a new application error with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::new(CONFLICT_CODE, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::new(NOT_FOUND_CODE, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::new(VALIDATION_CODE, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::new(UNAUTHORIZED_CODE, message)
    }

    /// Returns the error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the contextual metadata associated with the error.
    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    /// Returns the nested cause if one is present.
    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    /// Classifies the error by its code. Anything that is not a known domain
    /// code is treated as a store failure.
    pub fn kind(&self) -> ErrorKind {
        match self.code.as_str() {
            CONFLICT_CODE => ErrorKind::Conflict,
            NOT_FOUND_CODE => ErrorKind::NotFound,
            VALIDATION_CODE => ErrorKind::Validation,
            UNAUTHORIZED_CODE => ErrorKind::Unauthorized,
            AUTH_DISABLED_CODE => ErrorKind::Disabled,
            _ => ErrorKind::Store,
        }
    }

    /// Adds a contextual key/value pair to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets the nested cause for the error.
    pub fn with_cause(mut self, cause: impl Into<AppError>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {} ({:?})", self.code, self.message, self.context)
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// True when the store rejected a write because of a UNIQUE or PRIMARY KEY constraint.
pub fn is_unique_violation(error: &SqlxError) -> bool {
    match error {
        SqlxError::Database(db) => {
            matches!(
                db.code().as_deref(),
                Some(SQLITE_CONSTRAINT_UNIQUE) | Some(SQLITE_CONSTRAINT_PRIMARYKEY)
            ) || db.message().starts_with("UNIQUE constraint failed")
        }
        _ => false,
    }
}

/// True when the store rejected a write because a referenced row is missing.
pub fn is_foreign_key_violation(error: &SqlxError) -> bool {
    match error {
        SqlxError::Database(db) => {
            db.code().as_deref() == Some(SQLITE_CONSTRAINT_FOREIGNKEY)
                || db.message().starts_with("FOREIGN KEY constraint failed")
        }
        _ => false,
    }
}

impl From<IoError> for AppError {
    fn from(error: IoError) -> Self {
        let code = format!("IO/{:?}", error.kind());
        let mut app_error = AppError::new(code, error.to_string());
        if let Some(os_code) = error.raw_os_error() {
            app_error = app_error.with_context("os_code", os_code.to_string());
        }
        app_error
    }
}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => AppError::new("SQLX/ROW_NOT_FOUND", "Record not found"),
            SqlxError::ColumnNotFound(name) => {
                AppError::new("SQLX/COLUMN_NOT_FOUND", format!("Column not found: {name}"))
            }
            SqlxError::PoolTimedOut => AppError::new(
                "SQLX/POOL_TIMEOUT",
                "Timed out acquiring a database connection",
            ),
            SqlxError::PoolClosed => AppError::new("SQLX/POOL_CLOSED", "Database pool is closed"),
            SqlxError::Io(err) => {
                AppError::new("SQLX/IO", "Database I/O failed").with_cause(AppError::from(err))
            }
            SqlxError::Database(db) => {
                let code = db
                    .code()
                    .map(|code| format!("Sqlite/{code}"))
                    .unwrap_or_else(|| "SQLX/DATABASE".to_string());
                let mut app_error = AppError::new(code, db.message().to_string());
                if let Some(constraint) = db.constraint() {
                    app_error = app_error.with_context("constraint", constraint.to_string());
                }
                app_error
            }
            SqlxError::ColumnDecode { index, source } => {
                AppError::new("SQLX/COLUMN_DECODE", source.to_string())
                    .with_context("column_index", index.to_string())
            }
            SqlxError::Decode(decode_err) => AppError::new("SQLX/DECODE", decode_err.to_string()),
            other => AppError::new("SQLX/ERROR", other.to_string()),
        }
    }
}
