use futures::FutureExt;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use ts_rs::TS;

use super::{decode_flag, not_found, require_name, write_error, CatalogEntity};
use crate::db::run_in_tx;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Account {
    #[ts(type = "number")]
    pub id: i64,
    /// Usually an email address; stored verbatim.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub abbreviation: Option<String>,
    #[ts(type = "number")]
    pub order: i64,
    pub is_hidden: bool,
}

impl CatalogEntity for Account {
    const TABLE: &'static str = "accounts";
    const LABEL: &'static str = "account";
    const LINK_COLUMN: &'static str = "account_id";
    const COLUMNS: &'static str = r#"id, name, abbreviation, "order", is_hidden"#;

    fn from_row(row: &SqliteRow) -> AppResult<Self> {
        Self::try_from(row)
    }
}

impl TryFrom<&SqliteRow> for Account {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            name: row.try_get("name").map_err(AppError::from)?,
            abbreviation: row
                .try_get::<Option<String>, _>("abbreviation")
                .map_err(AppError::from)?,
            order: row.try_get("order").map_err(AppError::from)?,
            is_hidden: decode_flag(row, "is_hidden")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewAccount {
    pub name: String,
    #[serde(default)]
    #[ts(optional)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    #[ts(type = "number")]
    pub order: i64,
    #[serde(default)]
    pub is_hidden: bool,
}

/// Partial edit; absent fields keep their stored value. An empty
/// `abbreviation` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountPatch {
    #[serde(default)]
    #[ts(optional)]
    pub name: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub order: Option<i64>,
    #[serde(default)]
    #[ts(optional)]
    pub is_hidden: Option<bool>,
}

fn normalize_abbreviation(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub async fn create_account(pool: &SqlitePool, new: NewAccount) -> AppResult<Account> {
    let name = require_name::<Account>(&new.name)?;
    let abbreviation = normalize_abbreviation(new.abbreviation.as_deref());

    let sql = format!(
        r#"INSERT INTO accounts (name, abbreviation, "order", is_hidden) VALUES (?, ?, ?, ?) RETURNING {}"#,
        Account::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(&name)
        .bind(&abbreviation)
        .bind(new.order)
        .bind(new.is_hidden)
        .fetch_one(pool)
        .await
        .map_err(|err| write_error::<Account>(err, "create", Some(&name)))?;
    let account = Account::try_from(&row)?;
    tracing::debug!(
        target: "accountdeck",
        event = "catalog_created",
        table = Account::TABLE,
        id = account.id
    );
    Ok(account)
}

pub async fn edit_account(pool: &SqlitePool, id: i64, patch: AccountPatch) -> AppResult<Account> {
    let name = patch
        .name
        .as_deref()
        .map(require_name::<Account>)
        .transpose()?;
    // Some(None) clears the abbreviation, None leaves it alone.
    let abbreviation = patch
        .abbreviation
        .as_deref()
        .map(|raw| normalize_abbreviation(Some(raw)));

    let account = run_in_tx(pool, move |conn| {
        async move {
            let sql = format!("SELECT {} FROM accounts WHERE id = ?", Account::COLUMNS);
            let current = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|err| write_error::<Account>(err, "edit", None))?
                .ok_or_else(|| not_found::<Account>(id))?;
            let current = Account::try_from(&current)?;

            let next = Account {
                id,
                name: name.unwrap_or(current.name),
                abbreviation: abbreviation.unwrap_or(current.abbreviation),
                order: patch.order.unwrap_or(current.order),
                is_hidden: patch.is_hidden.unwrap_or(current.is_hidden),
            };
            sqlx::query(
                r#"UPDATE accounts SET name = ?, abbreviation = ?, "order" = ?, is_hidden = ? WHERE id = ?"#,
            )
            .bind(&next.name)
            .bind(&next.abbreviation)
            .bind(next.order)
            .bind(next.is_hidden)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(|err| write_error::<Account>(err, "edit", Some(&next.name)))?;
            Ok::<_, AppError>(next)
        }
        .boxed()
    })
    .await
    .map_err(|err| err.with_context("id", id.to_string()))?;

    tracing::debug!(target: "accountdeck", event = "catalog_edited", table = Account::TABLE, id);
    Ok(account)
}
