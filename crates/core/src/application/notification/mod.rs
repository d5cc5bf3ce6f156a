// Notification Service - enqueue entry point shared by jobs and the RPC surface

pub mod enqueue;

pub use enqueue::validate_request;

use crate::domain::NewNotification;
use crate::error::Result;
use crate::port::{EnqueueOutcome, IdProvider, NotificationQueue, TimeProvider};
use std::sync::Arc;

pub struct NotificationService {
    queue: Arc<dyn NotificationQueue>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl NotificationService {
    pub fn new(
        queue: Arc<dyn NotificationQueue>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            queue,
            id_provider,
            time_provider,
        }
    }

    /// Enqueue a new outbound message
    pub async fn enqueue(&self, req: NewNotification) -> Result<EnqueueOutcome> {
        enqueue::execute(
            self.queue.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await
    }

    pub fn queue(&self) -> &Arc<dyn NotificationQueue> {
        &self.queue
    }
}
