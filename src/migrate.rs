use anyhow::Context;
use regex::Regex;
use sha2::{Digest, Sha256};
use sqlx::{Executor, Row, SqlitePool};
use std::collections::HashMap;

use crate::time::now_ms;
use tracing::{error, info};

fn preview(sql: &str) -> String {
    let one_line = sql.replace(['\n', '\t'], " ");
    let trimmed = one_line.trim();
    match trimmed.char_indices().nth(160) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

pub static MIGRATIONS: &[(&str, &str)] = &[
    (
        "202501010900_initial.sql",
        include_str!("../migrations/202501010900_initial.sql"),
    ),
    (
        "202501011000_order_visibility.sql",
        include_str!("../migrations/202501011000_order_visibility.sql"),
    ),
    (
        "202501011100_users.sql",
        include_str!("../migrations/202501011100_users.sql"),
    ),
    (
        "202501011200_listing_indexes.sql",
        include_str!("../migrations/202501011200_listing_indexes.sql"),
    ),
];

/// Strips blank and comment-only lines; the checksum is taken over the result
/// so reformatting comments never counts as an edit.
fn clean(raw_sql: &str) -> String {
    raw_sql
        .lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.is_empty() || t.starts_with("--"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn checksum(cleaned: &str) -> String {
    format!("{:x}", Sha256::digest(cleaned.as_bytes()))
}

/// Applies every embedded migration not yet recorded in `schema_migrations`
/// and returns the files applied by this call, in order.
///
/// Each file runs in its own transaction. `ADD COLUMN` statements are skipped
/// when the column already exists so databases created by older tools that
/// already carry the column upgrade cleanly.
pub async fn apply_migrations(pool: &SqlitePool) -> anyhow::Result<Vec<&'static str>> {
    pool.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
           version   TEXT PRIMARY KEY,\
           applied_at INTEGER NOT NULL,\
           checksum TEXT NOT NULL\
         )",
    )
    .await?;

    let rows = sqlx::query("SELECT version, checksum FROM schema_migrations")
        .fetch_all(pool)
        .await?;
    let mut applied: HashMap<String, String> = HashMap::new();
    for r in rows {
        if let (Ok(v), Ok(c)) = (
            r.try_get::<String, _>("version"),
            r.try_get::<String, _>("checksum"),
        ) {
            applied.insert(v, c);
        }
    }
    let add_col_re = Regex::new(r#"(?i)^ALTER\s+TABLE\s+"?(\w+)"?\s+ADD\s+COLUMN\s+"?(\w+)"?"#)
        .context("compile ADD COLUMN guard")?;

    let mut newly_applied = Vec::new();
    for (filename, raw_sql) in MIGRATIONS {
        let cleaned = clean(raw_sql);
        let checksum = checksum(&cleaned);

        if let Some(stored) = applied.get(*filename) {
            if stored != &checksum {
                anyhow::bail!("migration {} edited after application", filename);
            }
            info!(target: "accountdeck", event = "migration_skip_file", file = %filename);
            continue;
        }

        let mut tx = pool.begin().await?;
        for stmt in cleaned.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            let upper = s.to_ascii_uppercase();
            if upper == "BEGIN" || upper == "COMMIT" {
                continue;
            }
            if let Some(caps) = add_col_re.captures(s) {
                if let (Some(table), Some(col)) = (caps.get(1), caps.get(2)) {
                    let exists: Option<i64> = sqlx::query_scalar(
                        "SELECT 1 FROM pragma_table_info(?) WHERE name = ?",
                    )
                    .bind(table.as_str())
                    .bind(col.as_str())
                    .fetch_optional(&mut *tx)
                    .await?;
                    if exists.is_some() {
                        info!(target: "accountdeck", event = "migration_stmt_skip", file = %filename, sql = %preview(s));
                        continue;
                    }
                }
            }
            info!(target: "accountdeck", event = "migration_stmt", file = %filename, sql = %preview(s));
            if let Err(e) = sqlx::query(s).execute(&mut *tx).await {
                error!(target: "accountdeck", event = "migration_stmt_error", file = %filename, sql = %preview(s), error = %e);
                return Err(anyhow::Error::new(e).context(format!("apply {filename}")));
            }
        }

        sqlx::query(
            "INSERT INTO schema_migrations (version, applied_at, checksum) VALUES (?, ?, ?)",
        )
        .bind(*filename)
        .bind(now_ms())
        .bind(&checksum)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(target: "accountdeck", event = "migration_file_applied", file = %filename);
        newly_applied.push(*filename);
    }

    Ok(newly_applied)
}
