use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use ts_rs::TS;

use super::{get, not_found, Account, App, CatalogEntity};
use crate::error::{is_foreign_key_violation, AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Association {
    #[ts(type = "number")]
    pub app_id: i64,
    #[ts(type = "number")]
    pub account_id: i64,
}

impl TryFrom<&SqliteRow> for Association {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            app_id: row.try_get("app_id").map_err(AppError::from)?,
            account_id: row.try_get("account_id").map_err(AppError::from)?,
        })
    }
}

fn link_error(err: sqlx::Error, operation: &str, app_id: i64, account_id: i64) -> AppError {
    let base = if is_foreign_key_violation(&err) {
        AppError::not_found("app or account not found")
    } else {
        AppError::from(err)
    };
    base.with_context("operation", operation.to_string())
        .with_context("table", "app_accounts")
        .with_context("app_id", app_id.to_string())
        .with_context("account_id", account_id.to_string())
}

/// Links an account to an app. Returns true when a new row was written;
/// linking an existing pair is a no-op.
pub async fn link(pool: &SqlitePool, app_id: i64, account_id: i64) -> AppResult<bool> {
    let res = sqlx::query("INSERT OR IGNORE INTO app_accounts (app_id, account_id) VALUES (?, ?)")
        .bind(app_id)
        .bind(account_id)
        .execute(pool)
        .await
        .map_err(|err| link_error(err, "link", app_id, account_id))?;
    let changed = res.rows_affected() > 0;
    tracing::debug!(target: "accountdeck", event = "catalog_linked", app_id, account_id, changed);
    Ok(changed)
}

/// Removes a link. Returns true when a row was removed; a missing pair is not an error.
pub async fn unlink(pool: &SqlitePool, app_id: i64, account_id: i64) -> AppResult<bool> {
    let res = sqlx::query("DELETE FROM app_accounts WHERE app_id = ? AND account_id = ?")
        .bind(app_id)
        .bind(account_id)
        .execute(pool)
        .await
        .map_err(|err| link_error(err, "unlink", app_id, account_id))?;
    let changed = res.rows_affected() > 0;
    tracing::debug!(target: "accountdeck", event = "catalog_unlinked", app_id, account_id, changed);
    Ok(changed)
}

pub async fn list_links(pool: &SqlitePool) -> AppResult<Vec<Association>> {
    let rows = sqlx::query("SELECT app_id, account_id FROM app_accounts ORDER BY app_id, account_id")
        .fetch_all(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "list_links")
                .with_context("table", "app_accounts")
        })?;
    rows.iter().map(|row| Association::try_from(row)).collect()
}

/// Every account linked to `app_id`, hidden ones included.
pub async fn accounts_for_app(pool: &SqlitePool, app_id: i64) -> AppResult<Vec<Account>> {
    if get::<App>(pool, app_id).await?.is_none() {
        return Err(not_found::<App>(app_id));
    }
    linked::<Account>(pool, "app_id", app_id).await
}

/// Every app linked to `account_id`, hidden ones included.
pub async fn apps_for_account(pool: &SqlitePool, account_id: i64) -> AppResult<Vec<App>> {
    if get::<Account>(pool, account_id).await?.is_none() {
        return Err(not_found::<Account>(account_id));
    }
    linked::<App>(pool, "account_id", account_id).await
}

/// Rows of `E` joined through `app_accounts` where `filter_column` equals `id`.
async fn linked<E: CatalogEntity>(
    pool: &SqlitePool,
    filter_column: &str,
    id: i64,
) -> AppResult<Vec<E>> {
    let sql = format!(
        r#"SELECT {columns} FROM {table}
           WHERE id IN (SELECT {link} FROM app_accounts WHERE {filter_column} = ?)
           ORDER BY "order", name, id"#,
        columns = E::COLUMNS,
        table = E::TABLE,
        link = E::LINK_COLUMN,
    );
    let rows = sqlx::query(&sql)
        .bind(id)
        .fetch_all(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "linked")
                .with_context("table", E::TABLE)
                .with_context(filter_column.to_string(), id.to_string())
        })?;
    rows.iter().map(E::from_row).collect()
}
