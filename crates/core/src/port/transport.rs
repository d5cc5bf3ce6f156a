// Message Transport Port
// Opaque client for the outbound messaging provider

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{Priority, TenantConfig};

/// Classified provider answer
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// Provider accepted the message; payload is kept on the message row
    Accepted(serde_json::Value),
    /// Provider refused the message
    Rejected(String),
}

/// Transport errors (network, configuration, malformed replies)
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// One client per tenant
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_text(
        &self,
        recipient: &str,
        content: &str,
        priority: Priority,
    ) -> Result<DeliveryOutcome, TransportError>;

    async fn send_image(
        &self,
        recipient: &str,
        image_url: &str,
        caption: &str,
        priority: Priority,
    ) -> Result<DeliveryOutcome, TransportError>;

    async fn send_document(
        &self,
        recipient: &str,
        document_url: &str,
        caption: &str,
        priority: Priority,
    ) -> Result<DeliveryOutcome, TransportError>;
}

/// Builds a transport client from tenant credentials
pub trait MessageTransportFactory: Send + Sync {
    fn client_for(
        &self,
        tenant: &TenantConfig,
    ) -> Result<Arc<dyn MessageTransport>, TransportError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    /// Scripted answer for a recipient
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Accept,
        Reject(String),
        Error(String),
        /// Panic inside the send (for panic isolation testing)
        Panic(String),
    }

    /// One recorded send
    #[derive(Debug, Clone, PartialEq)]
    pub struct SentCall {
        pub kind: &'static str,
        pub recipient: String,
        pub body: String,
        pub media_url: Option<String>,
        pub priority: Priority,
    }

    type SendHook = Box<dyn Fn(&SentCall) + Send + Sync>;

    /// Accepts everything unless a recipient is scripted otherwise
    #[derive(Default)]
    pub struct ScriptedTransport {
        behaviors: Mutex<HashMap<String, MockBehavior>>,
        calls: Mutex<Vec<SentCall>>,
        hook: Option<SendHook>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(self, recipient: &str, behavior: MockBehavior) -> Self {
            lock(&self.behaviors).insert(recipient.to_string(), behavior);
            self
        }

        /// Run `hook` on every send, before the answer is produced
        pub fn on_send(mut self, hook: impl Fn(&SentCall) + Send + Sync + 'static) -> Self {
            self.hook = Some(Box::new(hook));
            self
        }

        pub fn calls(&self) -> Vec<SentCall> {
            lock(&self.calls).clone()
        }

        fn answer(&self, call: SentCall) -> Result<DeliveryOutcome, TransportError> {
            if let Some(hook) = &self.hook {
                hook(&call);
            }
            let behavior = lock(&self.behaviors)
                .get(&call.recipient)
                .cloned()
                .unwrap_or(MockBehavior::Accept);
            let n = {
                let mut calls = lock(&self.calls);
                calls.push(call);
                calls.len()
            };

            match behavior {
                MockBehavior::Accept => Ok(DeliveryOutcome::Accepted(json!({ "message_id": n }))),
                MockBehavior::Reject(reason) => Ok(DeliveryOutcome::Rejected(reason)),
                MockBehavior::Error(msg) => Err(TransportError::Http(msg)),
                MockBehavior::Panic(msg) => panic!("{}", msg),
            }
        }
    }

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[async_trait]
    impl MessageTransport for ScriptedTransport {
        async fn send_text(
            &self,
            recipient: &str,
            content: &str,
            priority: Priority,
        ) -> Result<DeliveryOutcome, TransportError> {
            self.answer(SentCall {
                kind: "text",
                recipient: recipient.to_string(),
                body: content.to_string(),
                media_url: None,
                priority,
            })
        }

        async fn send_image(
            &self,
            recipient: &str,
            image_url: &str,
            caption: &str,
            priority: Priority,
        ) -> Result<DeliveryOutcome, TransportError> {
            self.answer(SentCall {
                kind: "image",
                recipient: recipient.to_string(),
                body: caption.to_string(),
                media_url: Some(image_url.to_string()),
                priority,
            })
        }

        async fn send_document(
            &self,
            recipient: &str,
            document_url: &str,
            caption: &str,
            priority: Priority,
        ) -> Result<DeliveryOutcome, TransportError> {
            self.answer(SentCall {
                kind: "document",
                recipient: recipient.to_string(),
                body: caption.to_string(),
                media_url: Some(document_url.to_string()),
                priority,
            })
        }
    }

    /// Hands the same client to every tenant
    pub struct SharedTransportFactory(pub Arc<ScriptedTransport>);

    impl MessageTransportFactory for SharedTransportFactory {
        fn client_for(
            &self,
            _tenant: &TenantConfig,
        ) -> Result<Arc<dyn MessageTransport>, TransportError> {
            Ok(self.0.clone())
        }
    }
}
