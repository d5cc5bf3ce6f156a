// Notification Message Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::{DomainError, Result};

/// Message ID (UUID v4)
pub type MessageId = String;

/// Tenant (company) identifier
pub type TenantId = String;

/// Priority (higher number = sent sooner)
pub type Priority = i32;

pub const MIN_PRIORITY: Priority = 0;
pub const MAX_PRIORITY: Priority = 100;

/// Longest message body accepted by the queue
pub const MAX_CONTENT_LEN: usize = 4096;

/// Payload shape handed to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Text,
    Image,
    Document,
}

/// Why a message was queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    InvoiceNotice,
    DeadlineAlert,
    PaymentReceipt,
    General,
}

/// Delivery status: pending -> sent | failed, never back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

macro_rules! string_enum {
    ($ty:ty, $($variant:path => $s:literal),+ $(,)?) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($s => Ok($variant),)+
                    other => Err(DomainError::ValidationError(format!(
                        "unknown {}: {}",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

string_enum!(MediaKind,
    MediaKind::Text => "text",
    MediaKind::Image => "image",
    MediaKind::Document => "document",
);

string_enum!(MessageType,
    MessageType::InvoiceNotice => "invoice_notice",
    MessageType::DeadlineAlert => "deadline_alert",
    MessageType::PaymentReceipt => "payment_receipt",
    MessageType::General => "general",
);

string_enum!(MessageStatus,
    MessageStatus::Pending => "pending",
    MessageStatus::Sent => "sent",
    MessageStatus::Failed => "failed",
);

/// Outbound message (append-only audit trail)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub id: MessageId,
    pub tenant_id: TenantId,
    pub customer_id: Option<String>,
    pub recipient: String,
    pub content: String,
    pub media_kind: MediaKind,
    pub media_url: Option<String>,
    pub message_type: MessageType,
    pub priority: Priority,
    pub status: MessageStatus,
    pub related_invoice_id: Option<String>,

    pub created_at: i64, // epoch ms
    pub sent_at: Option<i64>,

    pub api_response: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

impl NotificationMessage {
    /// Build a pending message from a validated request
    ///
    /// ID and timestamp are injected, never generated here.
    pub fn new(id: impl Into<String>, created_at: i64, req: NewNotification) -> Self {
        Self {
            id: id.into(),
            tenant_id: req.tenant_id,
            customer_id: req.customer_id,
            recipient: req.recipient,
            content: req.content,
            media_kind: req.media_kind,
            media_url: req.media_url,
            message_type: req.message_type,
            priority: req.priority,
            status: MessageStatus::Pending,
            related_invoice_id: req.related_invoice_id,
            created_at,
            sent_at: None,
            api_response: None,
            error_message: None,
        }
    }

    /// Transition pending -> sent
    pub fn mark_sent(&mut self, now_millis: i64, response: serde_json::Value) -> Result<()> {
        self.ensure_pending(MessageStatus::Sent)?;
        self.status = MessageStatus::Sent;
        self.sent_at = Some(now_millis);
        self.api_response = Some(response);
        Ok(())
    }

    /// Transition pending -> failed
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        self.ensure_pending(MessageStatus::Failed)?;
        self.status = MessageStatus::Failed;
        self.error_message = Some(reason.into());
        Ok(())
    }

    fn ensure_pending(&self, to: MessageStatus) -> Result<()> {
        if self.status != MessageStatus::Pending {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}

/// Enqueue request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub tenant_id: TenantId,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub recipient: String,
    pub content: String,
    pub media_kind: MediaKind,
    #[serde(default)]
    pub media_url: Option<String>,
    pub message_type: MessageType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub related_invoice_id: Option<String>,
}

impl NewNotification {
    /// Plain text message
    pub fn text(
        tenant_id: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
        message_type: MessageType,
        priority: Priority,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            customer_id: None,
            recipient: recipient.into(),
            content: content.into(),
            media_kind: MediaKind::Text,
            media_url: None,
            message_type,
            priority,
            related_invoice_id: None,
        }
    }

    pub fn for_invoice(mut self, invoice_id: impl Into<String>) -> Self {
        self.related_invoice_id = Some(invoice_id.into());
        self
    }

    pub fn for_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_media(mut self, kind: MediaKind, url: impl Into<String>) -> Self {
        self.media_kind = kind;
        self.media_url = Some(url.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "tenant_id cannot be empty".to_string(),
            ));
        }
        if self.recipient.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "recipient cannot be empty".to_string(),
            ));
        }
        if self.content.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "content cannot be empty".to_string(),
            ));
        }
        if self.content.chars().count() > MAX_CONTENT_LEN {
            return Err(DomainError::ValidationError(format!(
                "content too long (max {} chars)",
                MAX_CONTENT_LEN
            )));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(DomainError::InvalidPriority(self.priority));
        }
        if self.media_kind != MediaKind::Text
            && self.media_url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(DomainError::ValidationError(format!(
                "{} message requires media_url",
                self.media_kind
            )));
        }
        Ok(())
    }
}
