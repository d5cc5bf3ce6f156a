// Tenant Messaging Configuration

use serde::{Deserialize, Serialize};

use crate::domain::notification::{Priority, TenantId};

/// Per-tenant outbound messaging settings (read-only snapshot)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: TenantId,

    /// Dispatch the queue and send invoice notices
    pub auto_send_invoices: bool,

    pub auto_send_deadline_alerts: bool,
    pub deadline_alert_days_before: u32,

    pub default_alert_priority: Priority,
    pub invoice_notice_priority: Priority,

    pub daily_send_limit: u32,

    // Transport credentials
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
}

impl TenantConfig {
    /// Defaults for a freshly onboarded tenant
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            auto_send_invoices: false,
            auto_send_deadline_alerts: false,
            deadline_alert_days_before: 3,
            default_alert_priority: 10,
            invoice_notice_priority: 5,
            daily_send_limit: 100,
            api_base_url: None,
            api_token: None,
        }
    }
}
