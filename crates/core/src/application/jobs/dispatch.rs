//! Queue dispatch
//!
//! Drains each sending tenant's pending messages, highest priority first, up
//! to what is left of the tenant's daily quota. A quota unit is consumed in the
//! same transaction that marks the message sent.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

use super::{DispatchSummary, TenantDispatch};
use crate::application::scheduler::{
    execute_guarded_async, JobContext, JobHandler, JobSummary, PanicGuardResult,
};
use crate::domain::{MediaKind, NotificationMessage, TenantConfig};
use crate::error::Result;
use crate::port::{
    DeliveryOutcome, MessageTransport, MessageTransportFactory, NotificationQueue, RateLimiter,
    TenantConfigRepository, TimeProvider, TransactionalDelivery, TransportError,
};

/// Reason stored when the quota ran out between dequeue and commit
pub const QUOTA_EXHAUSTED_REASON: &str = "daily send quota exhausted";

enum Delivery {
    Sent,
    Failed,
    QuotaExhausted,
    /// Another dispatcher already finished the message
    Stale,
}

pub struct DispatchJob {
    tenants: Arc<dyn TenantConfigRepository>,
    queue: Arc<dyn NotificationQueue>,
    limiter: Arc<dyn RateLimiter>,
    delivery: Arc<dyn TransactionalDelivery>,
    transports: Arc<dyn MessageTransportFactory>,
    time_provider: Arc<dyn TimeProvider>,
    /// Serializes dispatch per tenant inside this process
    tenant_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DispatchJob {
    pub fn new(
        tenants: Arc<dyn TenantConfigRepository>,
        queue: Arc<dyn NotificationQueue>,
        limiter: Arc<dyn RateLimiter>,
        delivery: Arc<dyn TransactionalDelivery>,
        transports: Arc<dyn MessageTransportFactory>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            tenants,
            queue,
            limiter,
            delivery,
            transports,
            time_provider,
            tenant_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn dispatch(&self, ctx: &JobContext) -> Result<DispatchSummary> {
        let tenants = self.tenants.list_tenants().await?;
        let mut summary = DispatchSummary::default();

        for tenant in tenants.iter().filter(|t| t.auto_send_invoices) {
            if ctx.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            let report = match self.dispatch_tenant(tenant, ctx).await {
                Ok(report) => report,
                Err(e) => {
                    error!(tenant_id = %tenant.tenant_id, error = %e, "Tenant dispatch failed");
                    TenantDispatch {
                        tenant_id: tenant.tenant_id.clone(),
                        error: Some(e.to_string()),
                        ..Default::default()
                    }
                }
            };
            summary.tenants.push(report);
        }

        info!(
            job_id = %ctx.job_id,
            tenants = summary.tenants.len(),
            sent = summary.sent(),
            failed = summary.failed(),
            "Dispatch finished"
        );
        Ok(summary)
    }

    fn tenant_lock(&self, tenant_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .tenant_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(tenant_id.to_string()).or_default())
    }

    async fn dispatch_tenant(
        &self,
        tenant: &TenantConfig,
        ctx: &JobContext,
    ) -> Result<TenantDispatch> {
        let _serial = self.tenant_lock(&tenant.tenant_id).lock_owned().await;
        let tenant_id = tenant.tenant_id.as_str();
        let mut report = TenantDispatch {
            tenant_id: tenant_id.to_string(),
            ..Default::default()
        };

        let remaining = self.limiter.remaining_quota(tenant_id, ctx.today).await?;
        if remaining == 0 {
            info!(tenant_id = %tenant_id, "Quota exhausted, skipping tenant");
            report.quota_exhausted = true;
            return Ok(report);
        }

        let batch = self.queue.dequeue_batch(tenant_id, remaining).await?;
        if batch.is_empty() {
            return Ok(report);
        }

        let client = self.transports.client_for(tenant)?;
        info!(
            tenant_id = %tenant_id,
            batch = batch.len(),
            remaining,
            "Dispatching messages"
        );

        for message in &batch {
            if ctx.is_cancelled() {
                break;
            }

            let attempt = self.deliver(client.as_ref(), message, ctx.today);
            let delivery = match execute_guarded_async(attempt).await {
                PanicGuardResult::Success(result) => result,
                PanicGuardResult::Panicked(msg) => {
                    self.fail(message, &format!("transport panicked: {}", msg)).await
                }
            };

            match delivery {
                Ok(Delivery::Sent) => report.sent += 1,
                Ok(Delivery::Failed) => report.failed += 1,
                Ok(Delivery::Stale) => {}
                Ok(Delivery::QuotaExhausted) => {
                    report.failed += 1;
                    report.quota_exhausted = true;
                    warn!(tenant_id = %tenant_id, "Quota consumed concurrently, stopping batch");
                    break;
                }
                Err(e) => {
                    report.failed += 1;
                    error!(message_id = %message.id, error = %e, "Failed to record delivery");
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            sent = report.sent,
            failed = report.failed,
            "Tenant dispatch finished"
        );
        Ok(report)
    }

    async fn deliver(
        &self,
        client: &dyn MessageTransport,
        message: &NotificationMessage,
        today: NaiveDate,
    ) -> Result<Delivery> {
        let response = match send(client, message).await {
            Ok(DeliveryOutcome::Accepted(response)) => response,
            Ok(DeliveryOutcome::Rejected(reason)) => return self.fail(message, &reason).await,
            Err(e) => return self.fail(message, &e.to_string()).await,
        };

        let mut tx = self.delivery.begin_delivery().await?;
        if !tx.consume_quota(&message.tenant_id, today).await? {
            tx.rollback().await?;
            self.queue.mark_failed(&message.id, QUOTA_EXHAUSTED_REASON).await?;
            return Ok(Delivery::QuotaExhausted);
        }
        if !tx
            .mark_sent(&message.id, &response, self.time_provider.now_millis())
            .await?
        {
            tx.rollback().await?;
            warn!(message_id = %message.id, "Message no longer pending, quota untouched");
            return Ok(Delivery::Stale);
        }
        tx.commit().await?;
        Ok(Delivery::Sent)
    }

    async fn fail(&self, message: &NotificationMessage, reason: &str) -> Result<Delivery> {
        warn!(message_id = %message.id, reason = %reason, "Message delivery failed");
        if self.queue.mark_failed(&message.id, reason).await? {
            Ok(Delivery::Failed)
        } else {
            Ok(Delivery::Stale)
        }
    }
}

/// Route to the transport call matching the media kind
async fn send(
    client: &dyn MessageTransport,
    message: &NotificationMessage,
) -> std::result::Result<DeliveryOutcome, TransportError> {
    let media_url = || {
        message
            .media_url
            .as_deref()
            .ok_or_else(|| TransportError::InvalidResponse("missing media_url".to_string()))
    };

    match message.media_kind {
        MediaKind::Text => {
            client
                .send_text(&message.recipient, &message.content, message.priority)
                .await
        }
        MediaKind::Image => {
            client
                .send_image(&message.recipient, media_url()?, &message.content, message.priority)
                .await
        }
        MediaKind::Document => {
            client
                .send_document(&message.recipient, media_url()?, &message.content, message.priority)
                .await
        }
    }
}

#[async_trait]
impl JobHandler for DispatchJob {
    async fn run(&self, ctx: JobContext) -> Result<JobSummary> {
        self.dispatch(&ctx).await.map(JobSummary::Dispatch)
    }
}
