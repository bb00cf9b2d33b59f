//! CRUD façade over apps, accounts and their associations.
//!
//! The list/get/settings/delete paths are written once against
//! [`CatalogEntity`] metadata; only creation and full edits are typed per
//! entity because their payloads differ.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;
use ts_rs::TS;

use crate::db::run_in_tx;
use crate::error::{is_unique_violation, AppError, AppResult};

pub mod accounts;
pub mod apps;
pub mod links;

pub use accounts::{create_account, edit_account, Account, AccountPatch, NewAccount};
pub use apps::{create_app, edit_app, App, AppPatch, NewApp};
pub use links::{
    accounts_for_app, apps_for_account, link, list_links, unlink, Association,
};

/// Table metadata shared by the generic operations.
pub trait CatalogEntity: Sized + Send + Unpin + 'static {
    /// Backing table.
    const TABLE: &'static str;
    /// Singular name used in messages and log fields.
    const LABEL: &'static str;
    /// Column in `app_accounts` that references this table.
    const LINK_COLUMN: &'static str;
    /// Select list, in the order [`CatalogEntity::from_row`] expects.
    const COLUMNS: &'static str;

    fn from_row(row: &SqliteRow) -> AppResult<Self>;
}

/// Display settings written by a settings update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Settings {
    #[ts(type = "number")]
    pub order: i64,
    pub is_hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeleteOutcome {
    /// False when the id did not exist; deleting a missing row is not an error.
    pub removed: bool,
    #[ts(type = "number")]
    pub links_removed: u64,
}

pub(crate) fn decode_flag(row: &SqliteRow, column: &str) -> AppResult<bool> {
    use sqlx::Row;
    row.try_get::<i64, _>(column)
        .map(|value| value != 0)
        .map_err(AppError::from)
}

/// Trims a user-supplied name and rejects blank ones.
pub(crate) fn require_name<E: CatalogEntity>(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation(format!("{} name must not be empty", E::LABEL))
            .with_context("table", E::TABLE)
            .with_context("field", "name"));
    }
    Ok(name.to_string())
}

/// Maps a failed write: unique violations become conflicts, everything else
/// stays a store error annotated with the operation.
pub(crate) fn write_error<E: CatalogEntity>(
    err: sqlx::Error,
    operation: &str,
    name: Option<&str>,
) -> AppError {
    if is_unique_violation(&err) {
        let mut conflict = AppError::conflict(format!("{} already exists", E::LABEL))
            .with_context("operation", operation.to_string())
            .with_context("table", E::TABLE);
        if let Some(name) = name {
            conflict = conflict.with_context("name", name.to_string());
        }
        return conflict;
    }
    AppError::from(err)
        .with_context("operation", operation.to_string())
        .with_context("table", E::TABLE)
}

pub(crate) fn not_found<E: CatalogEntity>(id: i64) -> AppError {
    AppError::not_found(format!("{} not found", E::LABEL))
        .with_context("table", E::TABLE)
        .with_context("id", id.to_string())
}

/// Every row ordered by `("order", name, id)`.
pub async fn list_all<E: CatalogEntity>(pool: &SqlitePool) -> AppResult<Vec<E>> {
    let sql = format!(
        r#"SELECT {} FROM {} ORDER BY "order", name, id"#,
        E::COLUMNS,
        E::TABLE
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await.map_err(|err| {
        AppError::from(err)
            .with_context("operation", "list")
            .with_context("table", E::TABLE)
    })?;
    rows.iter()
        .map(|row| E::from_row(row).map_err(|err| err.with_context("operation", "list")))
        .collect()
}

pub async fn get<E: CatalogEntity>(pool: &SqlitePool, id: i64) -> AppResult<Option<E>> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?", E::COLUMNS, E::TABLE);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "get")
                .with_context("table", E::TABLE)
                .with_context("id", id.to_string())
        })?;
    row.as_ref().map(E::from_row).transpose()
}

/// Writes `order` and `is_hidden`. A missing id is reported as not found.
pub async fn update_settings<E: CatalogEntity>(
    pool: &SqlitePool,
    id: i64,
    settings: Settings,
) -> AppResult<E> {
    let sql = format!(
        r#"UPDATE {} SET "order" = ?, is_hidden = ? WHERE id = ? RETURNING {}"#,
        E::TABLE,
        E::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(settings.order)
        .bind(settings.is_hidden)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|err| write_error::<E>(err, "update_settings", None).with_context("id", id.to_string()))?;
    let row = row.ok_or_else(|| not_found::<E>(id))?;
    tracing::debug!(
        target: "accountdeck",
        event = "catalog_settings_updated",
        table = E::TABLE,
        id,
        order = settings.order,
        is_hidden = settings.is_hidden
    );
    E::from_row(&row)
}

/// Removes every association referencing `id`, then the row itself, in one
/// transaction.
pub async fn delete<E: CatalogEntity>(pool: &SqlitePool, id: i64) -> AppResult<DeleteOutcome> {
    let unlink_sql = format!("DELETE FROM app_accounts WHERE {} = ?", E::LINK_COLUMN);
    let delete_sql = format!("DELETE FROM {} WHERE id = ?", E::TABLE);

    let outcome = run_in_tx(pool, move |conn| {
        async move {
            let links = sqlx::query(&unlink_sql)
                .bind(id)
                .execute(&mut *conn)
                .await
                .map_err(|err| write_error::<E>(err, "delete_links", None))?;
            let rows = sqlx::query(&delete_sql)
                .bind(id)
                .execute(&mut *conn)
                .await
                .map_err(|err| write_error::<E>(err, "delete", None))?;
            Ok::<_, AppError>(DeleteOutcome {
                removed: rows.rows_affected() > 0,
                links_removed: links.rows_affected(),
            })
        }
        .boxed()
    })
    .await
    .map_err(|err| err.with_context("id", id.to_string()))?;

    tracing::debug!(
        target: "accountdeck",
        event = "catalog_deleted",
        table = E::TABLE,
        id,
        removed = outcome.removed,
        links_removed = outcome.links_removed
    );
    Ok(outcome)
}
