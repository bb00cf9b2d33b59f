#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use accountdeck_lib::catalog::{self, Account, App, NewAccount, NewApp};
use accountdeck_lib::folder::FolderRules;
use accountdeck_lib::migrate::apply_migrations;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// In-memory database with foreign keys on and the schema applied. One
/// connection, so every query sees the same memory database.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .unwrap();
    apply_migrations(&pool).await.expect("apply migrations");
    pool
}

pub async fn add_app(pool: &SqlitePool, name: &str, folder: &str, order: i64, hidden: bool) -> App {
    catalog::create_app(
        pool,
        &FolderRules::default(),
        NewApp {
            name: name.into(),
            folder: Some(folder.into()),
            order,
            is_hidden: hidden,
        },
    )
    .await
    .expect("create app")
}

pub async fn add_account(pool: &SqlitePool, name: &str, order: i64, hidden: bool) -> Account {
    catalog::create_account(
        pool,
        NewAccount {
            name: name.into(),
            abbreviation: None,
            order,
            is_hidden: hidden,
        },
    )
    .await
    .expect("create account")
}

pub async fn link_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM app_accounts")
        .fetch_one(pool)
        .await
        .unwrap()
}
