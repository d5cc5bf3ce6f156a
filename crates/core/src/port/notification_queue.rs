// Notification Queue & Rate Limiter Ports

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{MessageId, MessageStatus, MessageType, NotificationMessage, RateLimitQuota};
use crate::error::Result;

/// Result of an enqueue attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued(MessageId),
    /// A message with the same `(related_invoice_id, message_type)` already exists
    Duplicate,
}

/// Outbound message store
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Insert a pending message
    async fn enqueue(&self, message: &NotificationMessage) -> Result<EnqueueOutcome>;

    /// Up to `limit` pending messages of `tenant_id`
    ///
    /// Ordered by priority descending, then created_at ascending, then enqueue order.
    async fn dequeue_batch(&self, tenant_id: &str, limit: u32) -> Result<Vec<NotificationMessage>>;

    async fn exists_for_invoice(&self, invoice_id: &str, message_type: MessageType) -> Result<bool>;

    async fn find_by_id(&self, id: &str) -> Result<Option<NotificationMessage>>;

    async fn count_by_status(&self, tenant_id: &str, status: MessageStatus) -> Result<i64>;

    /// pending -> failed; false when the message was no longer pending
    async fn mark_failed(&self, id: &str, reason: &str) -> Result<bool>;
}

/// Per-tenant daily send quota
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Quota for `tenant_id` on `date`; a day with no sends yet reads as
    /// `sent_count = 0` at the tenant's limit. Never writes. None for unknown tenants.
    async fn quota(&self, tenant_id: &str, date: NaiveDate) -> Result<Option<RateLimitQuota>>;

    /// Sends left today, in `[0, daily_limit]`
    async fn remaining_quota(&self, tenant_id: &str, date: NaiveDate) -> Result<u32> {
        Ok(self
            .quota(tenant_id, date)
            .await?
            .map_or(0, |q| q.remaining()))
    }

    /// Count one send; false (no-op) when already at the limit
    async fn increment_sent(&self, tenant_id: &str, date: NaiveDate) -> Result<bool>;

    /// Zero `sent_count` for every tenant on `date`, refreshing `daily_limit`
    ///
    /// Returns the number of tenant rows reset.
    async fn reset_daily(&self, date: NaiveDate) -> Result<u64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::transaction::{DeliveryTransaction, Transaction, TransactionalDelivery};
    use std::cmp::Reverse;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    #[derive(Default)]
    struct OutboxState {
        messages: Vec<NotificationMessage>,
        limits: HashMap<String, u32>,
        quotas: HashMap<(String, NaiveDate), RateLimitQuota>,
    }

    impl OutboxState {
        fn quota_mut(&mut self, tenant_id: &str, date: NaiveDate) -> Option<&mut RateLimitQuota> {
            let limit = *self.limits.get(tenant_id)?;
            Some(
                self.quotas
                    .entry((tenant_id.to_string(), date))
                    .or_insert_with(|| RateLimitQuota {
                        tenant_id: tenant_id.to_string(),
                        quota_date: date,
                        sent_count: 0,
                        daily_limit: limit,
                    }),
            )
        }

        fn pending_mut(&mut self, id: &str) -> Option<&mut NotificationMessage> {
            self.messages
                .iter_mut()
                .find(|m| m.id == id && m.status == MessageStatus::Pending)
        }
    }

    /// In-memory queue, rate limiter and delivery transaction sharing one state
    #[derive(Clone, Default)]
    pub struct InMemoryOutbox {
        state: Arc<Mutex<OutboxState>>,
    }

    impl InMemoryOutbox {
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> MutexGuard<'_, OutboxState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        pub fn with_limit(self, tenant_id: &str, daily_limit: u32) -> Self {
            self.lock().limits.insert(tenant_id.to_string(), daily_limit);
            self
        }

        /// Force the sent counter (simulates sends by another dispatcher)
        pub fn set_sent_count(&self, tenant_id: &str, date: NaiveDate, sent_count: u32) {
            if let Some(q) = self.lock().quota_mut(tenant_id, date) {
                q.sent_count = sent_count.min(q.daily_limit);
            }
        }

        pub fn messages(&self) -> Vec<NotificationMessage> {
            self.lock().messages.clone()
        }
    }

    #[async_trait]
    impl NotificationQueue for InMemoryOutbox {
        async fn enqueue(&self, message: &NotificationMessage) -> Result<EnqueueOutcome> {
            let mut state = self.lock();
            if let Some(invoice_id) = &message.related_invoice_id {
                let duplicate = state.messages.iter().any(|m| {
                    m.related_invoice_id.as_ref() == Some(invoice_id)
                        && m.message_type == message.message_type
                });
                if duplicate {
                    return Ok(EnqueueOutcome::Duplicate);
                }
            }
            state.messages.push(message.clone());
            Ok(EnqueueOutcome::Enqueued(message.id.clone()))
        }

        async fn dequeue_batch(
            &self,
            tenant_id: &str,
            limit: u32,
        ) -> Result<Vec<NotificationMessage>> {
            let state = self.lock();
            let mut pending: Vec<NotificationMessage> = state
                .messages
                .iter()
                .filter(|m| m.tenant_id == tenant_id && m.status == MessageStatus::Pending)
                .cloned()
                .collect();
            // Stable sort keeps enqueue order within ties
            pending.sort_by_key(|m| (Reverse(m.priority), m.created_at));
            pending.truncate(limit as usize);
            Ok(pending)
        }

        async fn exists_for_invoice(
            &self,
            invoice_id: &str,
            message_type: MessageType,
        ) -> Result<bool> {
            Ok(self.lock().messages.iter().any(|m| {
                m.related_invoice_id.as_deref() == Some(invoice_id)
                    && m.message_type == message_type
            }))
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<NotificationMessage>> {
            Ok(self.lock().messages.iter().find(|m| m.id == id).cloned())
        }

        async fn count_by_status(&self, tenant_id: &str, status: MessageStatus) -> Result<i64> {
            Ok(self
                .lock()
                .messages
                .iter()
                .filter(|m| m.tenant_id == tenant_id && m.status == status)
                .count() as i64)
        }

        async fn mark_failed(&self, id: &str, reason: &str) -> Result<bool> {
            let mut state = self.lock();
            match state.pending_mut(id) {
                Some(msg) => {
                    msg.mark_failed(reason)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    #[async_trait]
    impl RateLimiter for InMemoryOutbox {
        async fn quota(&self, tenant_id: &str, date: NaiveDate) -> Result<Option<RateLimitQuota>> {
            Ok(self.lock().quota_mut(tenant_id, date).map(|q| q.clone()))
        }

        async fn increment_sent(&self, tenant_id: &str, date: NaiveDate) -> Result<bool> {
            let mut state = self.lock();
            match state.quota_mut(tenant_id, date) {
                Some(q) if q.sent_count < q.daily_limit => {
                    q.sent_count += 1;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn reset_daily(&self, date: NaiveDate) -> Result<u64> {
            let mut state = self.lock();
            let limits: Vec<(String, u32)> =
                state.limits.iter().map(|(t, l)| (t.clone(), *l)).collect();
            for (tenant_id, daily_limit) in &limits {
                state.quotas.insert(
                    (tenant_id.clone(), date),
                    RateLimitQuota {
                        tenant_id: tenant_id.clone(),
                        quota_date: date,
                        sent_count: 0,
                        daily_limit: *daily_limit,
                    },
                );
            }
            Ok(limits.len() as u64)
        }
    }

    /// Buffers delivery writes and applies them on commit
    pub struct InMemoryDelivery {
        outbox: InMemoryOutbox,
        quota_taken: Vec<(String, NaiveDate)>,
        sent: Vec<(String, serde_json::Value, i64)>,
    }

    #[async_trait]
    impl TransactionalDelivery for InMemoryOutbox {
        async fn begin_delivery(&self) -> Result<Box<dyn DeliveryTransaction>> {
            Ok(Box::new(InMemoryDelivery {
                outbox: self.clone(),
                quota_taken: Vec::new(),
                sent: Vec::new(),
            }))
        }
    }

    #[async_trait]
    impl Transaction for InMemoryDelivery {
        async fn commit(self: Box<Self>) -> Result<()> {
            let mut state = self.outbox.lock();
            for (tenant_id, date) in &self.quota_taken {
                if let Some(q) = state.quota_mut(tenant_id, *date) {
                    q.sent_count = (q.sent_count + 1).min(q.daily_limit);
                }
            }
            for (id, response, sent_at) in &self.sent {
                if let Some(msg) = state.pending_mut(id) {
                    msg.mark_sent(*sent_at, response.clone())?;
                }
            }
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl DeliveryTransaction for InMemoryDelivery {
        async fn consume_quota(&mut self, tenant_id: &str, date: NaiveDate) -> Result<bool> {
            let already = self
                .quota_taken
                .iter()
                .filter(|(t, d)| t == tenant_id && *d == date)
                .count() as u32;
            let remaining = self
                .outbox
                .lock()
                .quota_mut(tenant_id, date)
                .map_or(0, |q| q.remaining());
            if remaining > already {
                self.quota_taken.push((tenant_id.to_string(), date));
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn mark_sent(
            &mut self,
            message_id: &str,
            response: &serde_json::Value,
            sent_at: i64,
        ) -> Result<bool> {
            let pending = self.outbox.lock().pending_mut(message_id).is_some();
            if pending && !self.sent.iter().any(|(id, _, _)| id == message_id) {
                self.sent
                    .push((message_id.to_string(), response.clone(), sent_at));
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }
}
