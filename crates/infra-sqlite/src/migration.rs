// Schema versioning for the embedded SQL files

use netbill_core::error::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::map_sqlx_error;

/// Ordered migrations: (version, name, sql)
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "Billing & payroll",
        include_str!("../migrations/001_billing_schema.sql"),
    ),
    (
        2,
        "Notification queue & quotas",
        include_str!("../migrations/002_notification_queue.sql"),
    ),
];

/// Bring the schema up to the latest version
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let table_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
    )
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    let current_version: i64 = if table_exists > 0 {
        sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await
            .map_err(map_sqlx_error)?
            .unwrap_or(0)
    } else {
        0
    };

    let pending = MIGRATIONS.iter().filter(|(version, _, _)| *version > current_version);
    for (version, name, sql) in pending {
        info!(version, name, "Applying schema migration");
        apply_migration(pool, sql).await?;
    }

    info!(from = current_version, "Schema up to date");
    Ok(())
}

/// A failing statement rolls back the whole file
async fn apply_migration(pool: &SqlitePool, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

    for statement in split_statements(sql) {
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
    }

    tx.commit().await.map_err(map_sqlx_error)?;
    Ok(())
}

/// Comment lines are dropped before splitting on `;`, so prose in them never reaches SQLite
fn split_statements(sql: &str) -> Vec<String> {
    let code = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    code.split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .collect()
}
