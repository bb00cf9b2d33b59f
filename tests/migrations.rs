use anyhow::Result;
use accountdeck_lib::catalog::{self, Account, App};
use accountdeck_lib::migrate::{apply_migrations, MIGRATIONS};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

async fn bare_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;").execute(&pool).await?;
    Ok(pool)
}

async fn columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    Ok(sqlx::query_scalar("SELECT name FROM pragma_table_info(?) ORDER BY cid")
        .bind(table)
        .fetch_all(pool)
        .await?)
}

#[tokio::test]
async fn fresh_database_applies_everything_once() -> Result<()> {
    let pool = bare_pool().await?;
    let first = apply_migrations(&pool).await?;
    assert_eq!(first.len(), MIGRATIONS.len());

    let second = apply_migrations(&pool).await?;
    assert!(second.is_empty());

    assert_eq!(
        columns(&pool, "apps").await?,
        vec!["id", "name", "folder", "order", "is_hidden"]
    );
    assert_eq!(
        columns(&pool, "accounts").await?,
        vec!["id", "name", "abbreviation", "order", "is_hidden"]
    );
    assert_eq!(
        columns(&pool, "users").await?,
        vec!["id", "username", "password_hash", "is_admin", "created_at"]
    );
    Ok(())
}

#[tokio::test]
async fn legacy_schema_upgrades_in_place() -> Result<()> {
    let pool = bare_pool().await?;
    for stmt in [
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE, abbreviation TEXT)",
        "CREATE TABLE apps (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE, folder TEXT NOT NULL)",
        "CREATE TABLE app_accounts (app_id INTEGER NOT NULL, account_id INTEGER NOT NULL, \
         FOREIGN KEY (app_id) REFERENCES apps (id), FOREIGN KEY (account_id) REFERENCES accounts (id), \
         PRIMARY KEY (app_id, account_id))",
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, username TEXT NOT NULL UNIQUE, \
         password_hash TEXT NOT NULL, is_admin INTEGER NOT NULL DEFAULT 0)",
        "INSERT INTO accounts (name, abbreviation) VALUES ('a@x', 'A')",
        "INSERT INTO apps (name, folder) VALUES ('Mail', 'Work')",
        "INSERT INTO app_accounts (app_id, account_id) VALUES (1, 1)",
    ] {
        sqlx::query(stmt).execute(&pool).await?;
    }

    apply_migrations(&pool).await?;

    let apps = catalog::list_all::<App>(&pool).await?;
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].order, 0);
    assert!(!apps[0].is_hidden);
    let accounts = catalog::list_all::<Account>(&pool).await?;
    assert_eq!(accounts[0].abbreviation.as_deref(), Some("A"));
    assert!(columns(&pool, "users").await?.contains(&"created_at".to_string()));

    let listing = accountdeck_lib::grouped_listing(&pool).await?;
    assert_eq!(listing["Work"][0].accounts.len(), 1);
    Ok(())
}

#[tokio::test]
async fn partially_upgraded_schema_skips_existing_columns() -> Result<()> {
    let pool = bare_pool().await?;
    for stmt in [
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE, \
         abbreviation TEXT, \"order\" INTEGER NOT NULL DEFAULT 0, is_hidden INTEGER NOT NULL DEFAULT 0)",
        "CREATE TABLE apps (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE, folder TEXT NOT NULL)",
    ] {
        sqlx::query(stmt).execute(&pool).await?;
    }

    apply_migrations(&pool).await?;
    assert_eq!(
        columns(&pool, "accounts").await?,
        vec!["id", "name", "abbreviation", "order", "is_hidden"]
    );
    assert_eq!(
        columns(&pool, "apps").await?,
        vec!["id", "name", "folder", "order", "is_hidden"]
    );
    Ok(())
}

#[tokio::test]
async fn edited_migration_is_refused() -> Result<()> {
    let pool = bare_pool().await?;
    apply_migrations(&pool).await?;
    sqlx::query("UPDATE schema_migrations SET checksum = 'stale' WHERE version = ?")
        .bind(MIGRATIONS[0].0)
        .execute(&pool)
        .await?;

    let err = apply_migrations(&pool).await.expect_err("checksum mismatch");
    assert!(err.to_string().contains("edited after application"));
    Ok(())
}
