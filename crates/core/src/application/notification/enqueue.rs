// Enqueue Use Case

use tracing::{debug, info};

use crate::domain::{NewNotification, NotificationMessage};
use crate::error::{AppError, Result};
use crate::port::{EnqueueOutcome, IdProvider, NotificationQueue, TimeProvider};

/// Reject malformed requests before touching the queue
pub fn validate_request(req: &NewNotification) -> Result<()> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// Execute enqueue use case
///
/// # Arguments
///
/// * `queue` - Outbound message store
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `req` - Enqueue request
pub async fn execute(
    queue: &dyn NotificationQueue,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: NewNotification,
) -> Result<EnqueueOutcome> {
    validate_request(&req)?;

    let message = NotificationMessage::new(
        id_provider.generate_id(),
        time_provider.now_millis(),
        req,
    );

    let outcome = queue.enqueue(&message).await?;
    match &outcome {
        EnqueueOutcome::Enqueued(id) => info!(
            message_id = %id,
            tenant_id = %message.tenant_id,
            message_type = %message.message_type,
            priority = message.priority,
            "Message enqueued"
        ),
        EnqueueOutcome::Duplicate => debug!(
            tenant_id = %message.tenant_id,
            message_type = %message.message_type,
            related_invoice_id = ?message.related_invoice_id,
            "Duplicate message rejected"
        ),
    }
    Ok(outcome)
}
