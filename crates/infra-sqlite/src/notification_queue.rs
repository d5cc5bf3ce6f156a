// SQLite NotificationQueue & RateLimiter Implementation

use async_trait::async_trait;
use chrono::NaiveDate;
use netbill_core::domain::{MessageStatus, MessageType, NotificationMessage, RateLimitQuota};
use netbill_core::error::{AppError, Result};
use netbill_core::port::{
    DeliveryTransaction, EnqueueOutcome, NotificationQueue, RateLimiter, TransactionalDelivery,
};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::error::{map_sqlx_error, to_u32};
use crate::transaction::SqliteDeliveryTransaction;

const SELECT_MESSAGE: &str = r#"
    SELECT id, tenant_id, customer_id, recipient, content, media_kind, media_url,
           message_type, priority, status, related_invoice_id, created_at, sent_at,
           api_response, error_message
    FROM notification_messages
"#;

/// Outbound queue, daily quota and delivery transactions over one pool
pub struct SqliteNotificationQueue {
    pool: SqlitePool,
}

impl SqliteNotificationQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Create the quota row for `(tenant_id, date)` from the tenant's limit if missing
pub(crate) async fn ensure_quota_row<'e, E>(
    executor: E,
    tenant_id: &str,
    date: NaiveDate,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO rate_limit_quotas (tenant_id, quota_date, sent_count, daily_limit)
        SELECT tenant_id, ?, 0, daily_send_limit FROM tenant_configs WHERE tenant_id = ?
        ON CONFLICT(tenant_id, quota_date) DO NOTHING
        "#,
    )
    .bind(date)
    .bind(tenant_id)
    .execute(executor)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

/// Single conditional increment; false when the limit was already reached
pub(crate) async fn try_increment<'e, E>(
    executor: E,
    tenant_id: &str,
    date: NaiveDate,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE rate_limit_quotas
        SET sent_count = sent_count + 1
        WHERE tenant_id = ? AND quota_date = ? AND sent_count < daily_limit
        "#,
    )
    .bind(tenant_id)
    .bind(date)
    .execute(executor)
    .await
    .map_err(map_sqlx_error)?;
    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl NotificationQueue for SqliteNotificationQueue {
    async fn enqueue(&self, message: &NotificationMessage) -> Result<EnqueueOutcome> {
        let api_response = message.api_response.as_ref().map(|v| v.to_string());

        // Only the (related_invoice_id, message_type) index yields Duplicate
        let result = sqlx::query(
            r#"
            INSERT INTO notification_messages (
                id, tenant_id, customer_id, recipient, content, media_kind, media_url,
                message_type, priority, status, related_invoice_id, created_at, sent_at,
                api_response, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(related_invoice_id, message_type) WHERE related_invoice_id IS NOT NULL
            DO NOTHING
            "#,
        )
        .bind(&message.id)
        .bind(&message.tenant_id)
        .bind(&message.customer_id)
        .bind(&message.recipient)
        .bind(&message.content)
        .bind(message.media_kind.as_str())
        .bind(&message.media_url)
        .bind(message.message_type.as_str())
        .bind(message.priority)
        .bind(message.status.as_str())
        .bind(&message.related_invoice_id)
        .bind(message.created_at)
        .bind(message.sent_at)
        .bind(&api_response)
        .bind(&message.error_message)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            Ok(EnqueueOutcome::Duplicate)
        } else {
            Ok(EnqueueOutcome::Enqueued(message.id.clone()))
        }
    }

    async fn dequeue_batch(&self, tenant_id: &str, limit: u32) -> Result<Vec<NotificationMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "{} WHERE tenant_id = ? AND status = ? \
             ORDER BY priority DESC, created_at ASC, rowid ASC LIMIT ?",
            SELECT_MESSAGE
        ))
        .bind(tenant_id)
        .bind(MessageStatus::Pending.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }

    async fn exists_for_invoice(
        &self,
        invoice_id: &str,
        message_type: MessageType,
    ) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM notification_messages
                WHERE related_invoice_id = ? AND message_type = ?
            )
            "#,
        )
        .bind(invoice_id)
        .bind(message_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(exists == 1)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<NotificationMessage>> {
        let row: Option<MessageRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_MESSAGE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(MessageRow::into_message).transpose()
    }

    async fn count_by_status(&self, tenant_id: &str, status: MessageStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_messages WHERE tenant_id = ? AND status = ?",
        )
        .bind(tenant_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn mark_failed(&self, id: &str, reason: &str) -> Result<bool> {
        // Conditional update keeps the status monotonic
        let result = sqlx::query(
            "UPDATE notification_messages SET status = ?, error_message = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(MessageStatus::Failed.as_str())
        .bind(reason)
        .bind(id)
        .bind(MessageStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl RateLimiter for SqliteNotificationQueue {
    async fn quota(&self, tenant_id: &str, date: NaiveDate) -> Result<Option<RateLimitQuota>> {
        // Read-only: a day without a row reads as untouched, at the tenant's limit
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT COALESCE(q.sent_count, 0), COALESCE(q.daily_limit, t.daily_send_limit)
            FROM tenant_configs t
            LEFT JOIN rate_limit_quotas q ON q.tenant_id = t.tenant_id AND q.quota_date = ?
            WHERE t.tenant_id = ?
            "#,
        )
        .bind(date)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|(sent_count, daily_limit)| -> Result<RateLimitQuota> {
            Ok(RateLimitQuota {
                tenant_id: tenant_id.to_string(),
                quota_date: date,
                sent_count: to_u32("rate_limit_quotas.sent_count", sent_count)?,
                daily_limit: to_u32("rate_limit_quotas.daily_limit", daily_limit)?,
            })
        })
        .transpose()
    }

    async fn increment_sent(&self, tenant_id: &str, date: NaiveDate) -> Result<bool> {
        ensure_quota_row(&self.pool, tenant_id, date).await?;
        try_increment(&self.pool, tenant_id, date).await
    }

    async fn reset_daily(&self, date: NaiveDate) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO rate_limit_quotas (tenant_id, quota_date, sent_count, daily_limit)
            SELECT tenant_id, ?, 0, daily_send_limit FROM tenant_configs WHERE 1
            ON CONFLICT(tenant_id, quota_date) DO UPDATE SET
                sent_count = 0,
                daily_limit = excluded.daily_limit
            "#,
        )
        .bind(date)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TransactionalDelivery for SqliteNotificationQueue {
    async fn begin_delivery(&self) -> Result<Box<dyn DeliveryTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteDeliveryTransaction::new(tx)))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: String,
    tenant_id: String,
    customer_id: Option<String>,
    recipient: String,
    content: String,
    media_kind: String,
    media_url: Option<String>,
    message_type: String,
    priority: i32,
    status: String,
    related_invoice_id: Option<String>,
    created_at: i64,
    sent_at: Option<i64>,
    api_response: Option<String>,
    error_message: Option<String>,
}

impl MessageRow {
    fn into_message(self) -> Result<NotificationMessage> {
        let api_response = self
            .api_response
            .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
            .transpose()
            .map_err(|e| {
                AppError::Database(format!("invalid api_response for {}: {}", self.id, e))
            })?;

        Ok(NotificationMessage {
            media_kind: self.media_kind.parse()?,
            message_type: self.message_type.parse()?,
            status: self.status.parse()?,
            api_response,
            id: self.id,
            tenant_id: self.tenant_id,
            customer_id: self.customer_id,
            recipient: self.recipient,
            content: self.content,
            media_url: self.media_url,
            priority: self.priority,
            related_invoice_id: self.related_invoice_id,
            created_at: self.created_at,
            sent_at: self.sent_at,
            error_message: self.error_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{migrated_pool, seed_tenant_with_limit};
    use netbill_core::domain::NewNotification;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn message(id: &str, priority: i32, created_at: i64) -> NotificationMessage {
        NotificationMessage::new(
            id,
            created_at,
            NewNotification::text(
                "t1",
                "+92300",
                format!("body {}", id),
                MessageType::General,
                priority,
            ),
        )
    }

    async fn queue() -> SqliteNotificationQueue {
        let pool = migrated_pool().await;
        seed_tenant_with_limit(&pool, "t1", 3).await;
        SqliteNotificationQueue::new(pool)
    }

    #[tokio::test]
    async fn test_dequeue_order_priority_then_age_then_insertion() {
        let queue = queue().await;
        let seeds = [
            ("a", 5, 10),
            ("b", 10, 30),
            ("c", 10, 20),
            ("d", 10, 20),
            ("e", 1, 0),
        ];
        for (id, priority, created_at) in seeds {
            queue.enqueue(&message(id, priority, created_at)).await.unwrap();
        }
        queue.mark_failed("c", "bad number").await.unwrap();

        let batch = queue.dequeue_batch("t1", 10).await.unwrap();
        let ids: Vec<&str> = batch.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "a", "e"]);

        let limited = queue.dequeue_batch("t1", 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert!(queue.dequeue_batch("t1", 0).await.unwrap().is_empty());
        assert!(queue.dequeue_batch("other", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_invoice_alert_rejected() {
        let queue = queue().await;
        let alert = |id: &str| {
            NotificationMessage::new(
                id,
                1,
                NewNotification::text("t1", "+92300", "due soon", MessageType::DeadlineAlert, 10)
                    .for_invoice("inv-1"),
            )
        };

        assert_eq!(
            queue.enqueue(&alert("m1")).await.unwrap(),
            EnqueueOutcome::Enqueued("m1".to_string())
        );
        assert_eq!(queue.enqueue(&alert("m2")).await.unwrap(), EnqueueOutcome::Duplicate);
        assert!(queue.exists_for_invoice("inv-1", MessageType::DeadlineAlert).await.unwrap());
        assert!(!queue.exists_for_invoice("inv-1", MessageType::InvoiceNotice).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_is_terminal() {
        let queue = queue().await;
        queue.enqueue(&message("m1", 5, 1)).await.unwrap();

        assert!(queue.mark_failed("m1", "rejected").await.unwrap());
        assert!(!queue.mark_failed("m1", "again").await.unwrap());

        let stored = queue.find_by_id("m1").await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("rejected"));
        assert_eq!(queue.count_by_status("t1", MessageStatus::Failed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_quota_never_exceeds_limit() {
        let queue = queue().await;
        assert_eq!(queue.remaining_quota("t1", today()).await.unwrap(), 3);

        for expected in [2, 1, 0] {
            assert!(queue.increment_sent("t1", today()).await.unwrap());
            assert_eq!(queue.remaining_quota("t1", today()).await.unwrap(), expected);
        }
        assert!(!queue.increment_sent("t1", today()).await.unwrap());
        assert_eq!(queue.remaining_quota("t1", today()).await.unwrap(), 0);

        assert_eq!(queue.reset_daily(today()).await.unwrap(), 1);
        assert_eq!(queue.remaining_quota("t1", today()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_tenant_has_no_quota() {
        let queue = queue().await;
        assert!(queue.quota("ghost", today()).await.unwrap().is_none());
        assert_eq!(queue.remaining_quota("ghost", today()).await.unwrap(), 0);
        assert!(!queue.increment_sent("ghost", today()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delivery_commit_applies_sent_and_quota_together() {
        let queue = queue().await;
        queue.enqueue(&message("m1", 5, 1)).await.unwrap();
        queue.enqueue(&message("m2", 5, 2)).await.unwrap();

        let mut tx = queue.begin_delivery().await.unwrap();
        assert!(tx.consume_quota("t1", today()).await.unwrap());
        assert!(tx.mark_sent("m1", &serde_json::json!({"id": 1}), 99).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = queue.begin_delivery().await.unwrap();
        assert!(tx.consume_quota("t1", today()).await.unwrap());
        assert!(tx.mark_sent("m2", &serde_json::json!({"id": 2}), 100).await.unwrap());
        tx.rollback().await.unwrap();

        let m1 = queue.find_by_id("m1").await.unwrap().unwrap();
        assert_eq!(m1.status, MessageStatus::Sent);
        assert_eq!(m1.sent_at, Some(99));
        assert_eq!(m1.api_response, Some(serde_json::json!({"id": 1})));

        let m2 = queue.find_by_id("m2").await.unwrap().unwrap();
        assert_eq!(m2.status, MessageStatus::Pending);
        assert_eq!(queue.remaining_quota("t1", today()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reading_quota_does_not_create_a_row() {
        let queue = queue().await;
        let quota = queue.quota("t1", today()).await.unwrap().unwrap();
        assert_eq!((quota.sent_count, quota.daily_limit), (0, 3));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rate_limit_quotas")
            .fetch_one(&queue.pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);

        assert!(queue.increment_sent("t1", today()).await.unwrap());
        assert_eq!(queue.remaining_quota("t1", today()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reused_message_id_is_conflict_not_duplicate() {
        let queue = queue().await;
        queue.enqueue(&message("m1", 5, 1)).await.unwrap();

        let err = queue.enqueue(&message("m1", 7, 2)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);
    }
}
