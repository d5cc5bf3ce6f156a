// SQLite TenantConfigRepository Implementation

use async_trait::async_trait;
use netbill_core::domain::TenantConfig;
use netbill_core::error::{AppError, Result};
use netbill_core::port::TenantConfigRepository;
use sqlx::SqlitePool;

use crate::error::{map_sqlx_error, to_u32};

const SELECT_TENANT: &str = r#"
    SELECT tenant_id, auto_send_invoices, auto_send_deadline_alerts,
           deadline_alert_days_before, default_alert_priority, invoice_notice_priority,
           daily_send_limit, api_base_url, api_token
    FROM tenant_configs
"#;

pub struct SqliteTenantConfigRepository {
    pool: SqlitePool,
}

impl SqliteTenantConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a tenant's settings
    pub async fn upsert(&self, config: &TenantConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenant_configs (
                tenant_id, auto_send_invoices, auto_send_deadline_alerts,
                deadline_alert_days_before, default_alert_priority, invoice_notice_priority,
                daily_send_limit, api_base_url, api_token
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tenant_id) DO UPDATE SET
                auto_send_invoices = excluded.auto_send_invoices,
                auto_send_deadline_alerts = excluded.auto_send_deadline_alerts,
                deadline_alert_days_before = excluded.deadline_alert_days_before,
                default_alert_priority = excluded.default_alert_priority,
                invoice_notice_priority = excluded.invoice_notice_priority,
                daily_send_limit = excluded.daily_send_limit,
                api_base_url = excluded.api_base_url,
                api_token = excluded.api_token
            "#,
        )
        .bind(&config.tenant_id)
        .bind(config.auto_send_invoices)
        .bind(config.auto_send_deadline_alerts)
        .bind(i64::from(config.deadline_alert_days_before))
        .bind(config.default_alert_priority)
        .bind(config.invoice_notice_priority)
        .bind(i64::from(config.daily_send_limit))
        .bind(&config.api_base_url)
        .bind(&config.api_token)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl TenantConfigRepository for SqliteTenantConfigRepository {
    async fn list_tenants(&self) -> Result<Vec<TenantConfig>> {
        let rows: Vec<TenantRow> = sqlx::query_as(&format!("{} ORDER BY tenant_id", SELECT_TENANT))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(TenantRow::into_config).collect()
    }

    async fn find(&self, tenant_id: &str) -> Result<Option<TenantConfig>> {
        let row: Option<TenantRow> =
            sqlx::query_as(&format!("{} WHERE tenant_id = ?", SELECT_TENANT))
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        row.map(TenantRow::into_config).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    tenant_id: String,
    auto_send_invoices: bool,
    auto_send_deadline_alerts: bool,
    deadline_alert_days_before: i64,
    default_alert_priority: i32,
    invoice_notice_priority: i32,
    daily_send_limit: i64,
    api_base_url: Option<String>,
    api_token: Option<String>,
}

impl TenantRow {
    fn into_config(self) -> std::result::Result<TenantConfig, AppError> {
        Ok(TenantConfig {
            deadline_alert_days_before: to_u32(
                "deadline_alert_days_before",
                self.deadline_alert_days_before,
            )?,
            daily_send_limit: to_u32("daily_send_limit", self.daily_send_limit)?,
            tenant_id: self.tenant_id,
            auto_send_invoices: self.auto_send_invoices,
            auto_send_deadline_alerts: self.auto_send_deadline_alerts,
            default_alert_priority: self.default_alert_priority,
            invoice_notice_priority: self.invoice_notice_priority,
            api_base_url: self.api_base_url,
            api_token: self.api_token,
        })
    }
}
