// Delivery bookkeeping ports

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;

/// Unit of work that ends in exactly one of commit or rollback
#[async_trait]
pub trait Transaction: Send {
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every write made through this transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Opens delivery transactions (quota + message status)
#[async_trait]
pub trait TransactionalDelivery: Send + Sync {
    async fn begin_delivery(&self) -> Result<Box<dyn DeliveryTransaction>>;
}

/// Delivery bookkeeping applied as one unit
///
/// A quota unit is consumed only together with the `sent` transition.
#[async_trait]
pub trait DeliveryTransaction: Transaction {
    /// Take one unit of today's quota; false when it is already exhausted
    async fn consume_quota(&mut self, tenant_id: &str, date: NaiveDate) -> Result<bool>;

    /// pending -> sent; false when the message was no longer pending
    async fn mark_sent(
        &mut self,
        message_id: &str,
        response: &serde_json::Value,
        sent_at: i64,
    ) -> Result<bool>;
}
