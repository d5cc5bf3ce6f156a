// SQLite JobRunStore Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netbill_core::domain::JobId;
use netbill_core::error::Result;
use netbill_core::port::JobRunStore;
use sqlx::SqlitePool;

use crate::error::{from_millis, map_sqlx_error};

pub struct SqliteJobRunStore {
    pool: SqlitePool,
}

impl SqliteJobRunStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRunStore for SqliteJobRunStore {
    async fn record_success(&self, job_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_runs (job_id, last_success_at) VALUES (?, ?)
            ON CONFLICT(job_id) DO UPDATE SET last_success_at = excluded.last_success_at
            "#,
        )
        .bind(job_id)
        .bind(at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn last_success(&self, job_id: &str) -> Result<Option<DateTime<Utc>>> {
        let millis: Option<i64> =
            sqlx::query_scalar("SELECT last_success_at FROM job_runs WHERE job_id = ?")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        millis.map(|m| from_millis("job_runs.last_success_at", m)).transpose()
    }

    async fn list(&self) -> Result<Vec<(JobId, DateTime<Utc>)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT job_id, last_success_at FROM job_runs ORDER BY job_id")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(job_id, m)| -> Result<(JobId, DateTime<Utc>)> {
                Ok((job_id, from_millis("job_runs.last_success_at", m)?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::migrated_pool;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_marker_overwritten_by_later_run() {
        let store = SqliteJobRunStore::new(migrated_pool().await);
        let first = Utc.with_ymd_and_hms(2026, 3, 1, 0, 1, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 4, 1, 0, 1, 0).unwrap();

        assert!(store.last_success("salary_accrual").await.unwrap().is_none());
        store.record_success("salary_accrual", first).await.unwrap();
        store.record_success("salary_accrual", second).await.unwrap();
        store.record_success("dispatch", first).await.unwrap();

        assert_eq!(store.last_success("salary_accrual").await.unwrap(), Some(second));
        assert_eq!(
            store.list().await.unwrap(),
            vec![("dispatch".to_string(), first), ("salary_accrual".to_string(), second)]
        );
    }
}
