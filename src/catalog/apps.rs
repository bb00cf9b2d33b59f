use futures::FutureExt;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use ts_rs::TS;

use super::{decode_flag, not_found, require_name, write_error, CatalogEntity};
use crate::db::run_in_tx;
use crate::error::{AppError, AppResult};
use crate::folder::FolderRules;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct App {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub folder: String,
    #[ts(type = "number")]
    pub order: i64,
    pub is_hidden: bool,
}

impl CatalogEntity for App {
    const TABLE: &'static str = "apps";
    const LABEL: &'static str = "app";
    const LINK_COLUMN: &'static str = "app_id";
    const COLUMNS: &'static str = r#"id, name, folder, "order", is_hidden"#;

    fn from_row(row: &SqliteRow) -> AppResult<Self> {
        Self::try_from(row)
    }
}

impl TryFrom<&SqliteRow> for App {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            name: row.try_get("name").map_err(AppError::from)?,
            folder: row.try_get("folder").map_err(AppError::from)?,
            order: row.try_get("order").map_err(AppError::from)?,
            is_hidden: decode_flag(row, "is_hidden")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewApp {
    pub name: String,
    /// Missing or blank folders land in the configured fallback folder.
    #[serde(default)]
    #[ts(optional)]
    pub folder: Option<String>,
    #[serde(default)]
    #[ts(type = "number")]
    pub order: i64,
    #[serde(default)]
    pub is_hidden: bool,
}

/// Partial edit; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppPatch {
    #[serde(default)]
    #[ts(optional)]
    pub name: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub folder: Option<String>,
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub order: Option<i64>,
    #[serde(default)]
    #[ts(optional)]
    pub is_hidden: Option<bool>,
}

pub async fn create_app(pool: &SqlitePool, folders: &FolderRules, new: NewApp) -> AppResult<App> {
    let name = require_name::<App>(&new.name)?;
    let folder = folders.normalize(new.folder.as_deref());

    let sql = format!(
        r#"INSERT INTO apps (name, folder, "order", is_hidden) VALUES (?, ?, ?, ?) RETURNING {}"#,
        App::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(&name)
        .bind(&folder)
        .bind(new.order)
        .bind(new.is_hidden)
        .fetch_one(pool)
        .await
        .map_err(|err| write_error::<App>(err, "create", Some(&name)))?;
    let app = App::try_from(&row)?;
    tracing::debug!(
        target: "accountdeck",
        event = "catalog_created",
        table = App::TABLE,
        id = app.id,
        folder = %app.folder
    );
    Ok(app)
}

pub async fn edit_app(
    pool: &SqlitePool,
    folders: &FolderRules,
    id: i64,
    patch: AppPatch,
) -> AppResult<App> {
    let name = patch
        .name
        .as_deref()
        .map(require_name::<App>)
        .transpose()?;
    let folder = patch.folder.as_deref().map(|f| folders.normalize(Some(f)));

    let app = run_in_tx(pool, move |conn| {
        async move {
            let sql = format!("SELECT {} FROM apps WHERE id = ?", App::COLUMNS);
            let current = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|err| write_error::<App>(err, "edit", None))?
                .ok_or_else(|| not_found::<App>(id))?;
            let current = App::try_from(&current)?;

            let next = App {
                id,
                name: name.unwrap_or(current.name),
                folder: folder.unwrap_or(current.folder),
                order: patch.order.unwrap_or(current.order),
                is_hidden: patch.is_hidden.unwrap_or(current.is_hidden),
            };
            sqlx::query(r#"UPDATE apps SET name = ?, folder = ?, "order" = ?, is_hidden = ? WHERE id = ?"#)
                .bind(&next.name)
                .bind(&next.folder)
                .bind(next.order)
                .bind(next.is_hidden)
                .bind(id)
                .execute(&mut *conn)
                .await
                .map_err(|err| write_error::<App>(err, "edit", Some(&next.name)))?;
            Ok::<_, AppError>(next)
        }
        .boxed()
    })
    .await
    .map_err(|err| err.with_context("id", id.to_string()))?;

    tracing::debug!(target: "accountdeck", event = "catalog_edited", table = App::TABLE, id);
    Ok(app)
}
