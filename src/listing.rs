//! Grouped listing: visible apps bucketed by folder, each carrying its visible
//! accounts, with a total and deterministic order at both levels.
//!
//! The work is split in two stages. [`fetch_rows`] runs a single join against
//! the store; [`group_rows`] is pure and shapes any iterator of
//! [`ListingRow`]s. The grouping stage applies the visibility filter again so
//! its contract holds whatever the rows came from.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use ts_rs::TS;

use crate::error::{AppError, AppResult};

/// One row of `apps LEFT JOIN app_accounts LEFT JOIN accounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub app_id: i64,
    pub app_name: String,
    pub folder: String,
    pub app_order: i64,
    pub app_hidden: bool,
    pub account_id: Option<i64>,
    pub account_name: Option<String>,
    pub account_order: Option<i64>,
    pub account_hidden: Option<bool>,
}

impl TryFrom<&SqliteRow> for ListingRow {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        let flag = |column: &str| -> AppResult<Option<bool>> {
            row.try_get::<Option<i64>, _>(column)
                .map(|value| value.map(|v| v != 0))
                .map_err(AppError::from)
        };
        Ok(Self {
            app_id: row.try_get("app_id").map_err(AppError::from)?,
            app_name: row.try_get("app_name").map_err(AppError::from)?,
            folder: row.try_get("folder").map_err(AppError::from)?,
            app_order: row.try_get("app_order").map_err(AppError::from)?,
            app_hidden: flag("app_hidden")?.unwrap_or(false),
            account_id: row.try_get("account_id").map_err(AppError::from)?,
            account_name: row.try_get("account_name").map_err(AppError::from)?,
            account_order: row.try_get("account_order").map_err(AppError::from)?,
            account_hidden: flag("account_hidden")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountView {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    #[ts(type = "number")]
    pub order: i64,
    pub is_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppView {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub folder: String,
    #[ts(type = "number")]
    pub order: i64,
    pub is_hidden: bool,
    pub accounts: Vec<AccountView>,
}

/// Folder label to the apps filed under it. A `BTreeMap` so folders serialise
/// in a stable byte-wise order.
pub type FolderListing = BTreeMap<String, Vec<AppView>>;

/// Sort key shared by every displayed entity: `order`, then `name` compared
/// byte-wise, then `id`.
pub trait DisplayOrder {
    fn display_key(&self) -> (i64, &str, i64);

    fn display_cmp(&self, other: &Self) -> Ordering {
        self.display_key().cmp(&other.display_key())
    }
}

impl DisplayOrder for AppView {
    fn display_key(&self) -> (i64, &str, i64) {
        (self.order, &self.name, self.id)
    }
}

impl DisplayOrder for AccountView {
    fn display_key(&self) -> (i64, &str, i64) {
        (self.order, &self.name, self.id)
    }
}

impl DisplayOrder for crate::catalog::App {
    fn display_key(&self) -> (i64, &str, i64) {
        (self.order, &self.name, self.id)
    }
}

impl DisplayOrder for crate::catalog::Account {
    fn display_key(&self) -> (i64, &str, i64) {
        (self.order, &self.name, self.id)
    }
}

pub fn sort_for_display<T: DisplayOrder>(items: &mut [T]) {
    items.sort_by(|a, b| a.display_cmp(b));
}

/// Shapes join rows into the grouped listing. Never fails; empty input gives
/// an empty map.
pub fn group_rows<I>(rows: I) -> FolderListing
where
    I: IntoIterator<Item = ListingRow>,
{
    let mut by_app: HashMap<i64, AppView> = HashMap::new();

    for row in rows {
        if row.app_hidden {
            continue;
        }
        let app = by_app.entry(row.app_id).or_insert_with(|| AppView {
            id: row.app_id,
            name: row.app_name.clone(),
            folder: row.folder.clone(),
            order: row.app_order,
            is_hidden: false,
            accounts: Vec::new(),
        });

        let (Some(id), Some(name)) = (row.account_id, row.account_name) else {
            continue;
        };
        if row.account_hidden.unwrap_or(false) {
            continue;
        }
        let account = AccountView {
            id,
            name,
            order: row.account_order.unwrap_or(0),
            is_hidden: false,
        };
        if !app.accounts.contains(&account) {
            app.accounts.push(account);
        }
    }

    let mut listing = FolderListing::new();
    for (_, mut app) in by_app {
        sort_for_display(&mut app.accounts);
        listing.entry(app.folder.clone()).or_default().push(app);
    }
    for apps in listing.values_mut() {
        sort_for_display(apps);
    }
    listing
}

const LISTING_SQL: &str = r#"
SELECT a.id          AS app_id,
       a.name        AS app_name,
       a.folder      AS folder,
       a."order"     AS app_order,
       a.is_hidden   AS app_hidden,
       acc.id        AS account_id,
       acc.name      AS account_name,
       acc."order"   AS account_order,
       acc.is_hidden AS account_hidden
  FROM apps a
  LEFT JOIN app_accounts aa ON aa.app_id = a.id
  LEFT JOIN accounts acc ON acc.id = aa.account_id AND acc.is_hidden = 0
 WHERE a.is_hidden = 0
 ORDER BY a.id, acc.id
"#;

/// Runs the listing join. Hidden accounts are filtered in the join condition,
/// not the WHERE clause, so an app whose accounts are all hidden still comes
/// back as a row with null account columns.
pub async fn fetch_rows(pool: &SqlitePool) -> AppResult<Vec<ListingRow>> {
    let rows = sqlx::query(LISTING_SQL)
        .fetch_all(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "listing"))?;
    rows.iter()
        .map(|row| ListingRow::try_from(row).map_err(|err| err.with_context("operation", "listing")))
        .collect()
}

pub async fn grouped_listing(pool: &SqlitePool) -> AppResult<FolderListing> {
    let rows = fetch_rows(pool).await?;
    let row_count = rows.len();
    let listing = group_rows(rows);
    tracing::debug!(
        target: "accountdeck",
        event = "listing_built",
        rows = row_count,
        folders = listing.len()
    );
    Ok(listing)
}
