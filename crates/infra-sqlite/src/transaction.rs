// SQLite Delivery Transaction Implementation

use async_trait::async_trait;
use chrono::NaiveDate;
use netbill_core::domain::MessageStatus;
use netbill_core::error::Result;
use netbill_core::port::{DeliveryTransaction, Transaction};
use sqlx::{Sqlite, Transaction as SqlxTransaction};

use crate::error::map_sqlx_error;
use crate::notification_queue::{ensure_quota_row, try_increment};

/// Quota consumption and the `sent` transition of one message
pub struct SqliteDeliveryTransaction {
    tx: SqlxTransaction<'static, Sqlite>,
}

impl SqliteDeliveryTransaction {
    pub fn new(tx: SqlxTransaction<'static, Sqlite>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transaction for SqliteDeliveryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl DeliveryTransaction for SqliteDeliveryTransaction {
    async fn consume_quota(&mut self, tenant_id: &str, date: NaiveDate) -> Result<bool> {
        ensure_quota_row(&mut *self.tx, tenant_id, date).await?;
        try_increment(&mut *self.tx, tenant_id, date).await
    }

    async fn mark_sent(
        &mut self,
        message_id: &str,
        response: &serde_json::Value,
        sent_at: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notification_messages
            SET status = ?, sent_at = ?, api_response = ?, error_message = NULL
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(MessageStatus::Sent.as_str())
        .bind(sent_at)
        .bind(response.to_string())
        .bind(message_id)
        .bind(MessageStatus::Pending.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}
