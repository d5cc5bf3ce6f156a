// SQLite Customer & Invoice Repository Implementation

use async_trait::async_trait;
use chrono::NaiveDate;
use netbill_core::domain::{
    Customer, DueInvoice, Invoice, InvoiceDraft, InvoiceStatus, InvoiceType, MonthWindow,
    ServicePlan,
};
use netbill_core::error::{AppError, Result};
use netbill_core::port::{CustomerRepository, InvoiceRepository};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{map_sqlx_error, money, parse_money, parse_optional_money, to_u32};

pub struct SqliteBillingRepository {
    pool: SqlitePool,
}

impl SqliteBillingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for SqliteBillingRepository {
    async fn list_active_customers_with_anchor(
        &self,
        anchor_days: &[u32],
    ) -> Result<Vec<Customer>> {
        if anchor_days.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT id, tenant_id, first_name, last_name, phone, service_plan_id,
                   anchor_day, discount_amount
            FROM customers
            WHERE is_active = 1 AND anchor_day IN ("#,
        );
        let mut days = query.separated(", ");
        for day in anchor_days {
            days.push_bind(i64::from(*day));
        }
        days.push_unseparated(") ORDER BY tenant_id, id");

        let rows: Vec<CustomerRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(CustomerRow::into_customer).collect()
    }

    async fn find_service_plan(&self, plan_id: &str) -> Result<Option<ServicePlan>> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id, name, price FROM service_plans WHERE id = ?")
                .bind(plan_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        row.map(|(id, name, price)| -> Result<ServicePlan> {
            Ok(ServicePlan {
                price: parse_money("service_plans.price", &price)?,
                id,
                name,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl InvoiceRepository for SqliteBillingRepository {
    async fn find_invoice(
        &self,
        customer_id: &str,
        invoice_type: InvoiceType,
        window: MonthWindow,
    ) -> Result<Option<Invoice>> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT id, invoice_number, tenant_id, customer_id, billing_start, billing_end,
                   due_date, subtotal, discount_percentage, total, invoice_type, status,
                   notes, is_active
            FROM invoices
            WHERE customer_id = ? AND invoice_type = ?
              AND billing_start >= ? AND billing_start < ?
            ORDER BY billing_start ASC
            LIMIT 1
            "#,
        )
        .bind(customer_id)
        .bind(invoice_type.as_str())
        .bind(window.start)
        .bind(window.end)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(InvoiceRow::into_invoice).transpose()
    }

    async fn create_invoice(&self, draft: &InvoiceDraft) -> Result<Option<Invoice>> {
        // Only the (customer_id, billing_month) index is absorbed; an
        // invoice_number or id collision surfaces as Conflict
        let result = sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, tenant_id, customer_id,
                billing_start, billing_end, billing_month, due_date,
                subtotal, discount_percentage, total,
                invoice_type, status, notes, is_active, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
            ON CONFLICT(customer_id, billing_month) WHERE invoice_type = 'subscription'
            DO NOTHING
            "#,
        )
        .bind(&draft.id)
        .bind(&draft.invoice_number)
        .bind(&draft.tenant_id)
        .bind(&draft.customer_id)
        .bind(draft.billing_start)
        .bind(draft.billing_end)
        .bind(draft.billing_start.format("%Y-%m").to_string())
        .bind(draft.due_date)
        .bind(money(draft.amounts.subtotal))
        .bind(money(draft.amounts.discount_percentage))
        .bind(money(draft.amounts.total))
        .bind(draft.invoice_type.as_str())
        .bind(InvoiceStatus::Pending.as_str())
        .bind(&draft.notes)
        .bind(draft.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            debug!(
                customer_id = %draft.customer_id,
                billing_start = %draft.billing_start,
                "Invoice for billing month already exists"
            );
            return Ok(None);
        }
        Ok(Some(Invoice::from(draft.clone())))
    }

    async fn list_open_invoices_due_on(
        &self,
        tenant_id: &str,
        due_date: NaiveDate,
    ) -> Result<Vec<DueInvoice>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT i.id, i.invoice_number, i.tenant_id, i.customer_id,
                   c.first_name, c.phone, i.total, i.due_date
            FROM invoices i
            JOIN customers c ON c.id = i.customer_id
            WHERE i.is_active = 1 AND i.tenant_id = "#,
        );
        query.push_bind(tenant_id);
        query.push(" AND i.due_date = ");
        query.push_bind(due_date);
        query.push(" AND i.status IN (");
        let mut statuses = query.separated(", ");
        for status in InvoiceStatus::OPEN {
            statuses.push_bind(status.as_str());
        }
        statuses.push_unseparated(") ORDER BY i.invoice_number");

        let rows: Vec<DueInvoiceRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| -> Result<DueInvoice> {
                Ok(DueInvoice {
                    total: parse_money("invoices.total", &row.total)?,
                    invoice_id: row.id,
                    invoice_number: row.invoice_number,
                    tenant_id: row.tenant_id,
                    customer_id: row.customer_id,
                    customer_first_name: row.first_name,
                    customer_phone: row.phone,
                    due_date: row.due_date,
                })
            })
            .collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    tenant_id: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    service_plan_id: String,
    anchor_day: i64,
    discount_amount: Option<String>,
}

impl CustomerRow {
    fn into_customer(self) -> std::result::Result<Customer, AppError> {
        Ok(Customer {
            anchor_day: to_u32("customers.anchor_day", self.anchor_day)?,
            discount_amount: parse_optional_money(
                "customers.discount_amount",
                self.discount_amount,
            )?,
            id: self.id,
            tenant_id: self.tenant_id,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            service_plan_id: self.service_plan_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    invoice_number: String,
    tenant_id: String,
    customer_id: String,
    billing_start: NaiveDate,
    billing_end: NaiveDate,
    due_date: NaiveDate,
    subtotal: String,
    discount_percentage: String,
    total: String,
    invoice_type: String,
    status: String,
    notes: Option<String>,
    is_active: bool,
}

impl InvoiceRow {
    fn into_invoice(self) -> std::result::Result<Invoice, AppError> {
        Ok(Invoice {
            subtotal: parse_money("invoices.subtotal", &self.subtotal)?,
            discount_percentage: parse_money(
                "invoices.discount_percentage",
                &self.discount_percentage,
            )?,
            total: parse_money("invoices.total", &self.total)?,
            invoice_type: self.invoice_type.parse()?,
            status: self.status.parse()?,
            id: self.id,
            invoice_number: self.invoice_number,
            tenant_id: self.tenant_id,
            customer_id: self.customer_id,
            billing_start: self.billing_start,
            billing_end: self.billing_end,
            due_date: self.due_date,
            notes: self.notes,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DueInvoiceRow {
    id: String,
    invoice_number: String,
    tenant_id: String,
    customer_id: String,
    first_name: String,
    phone: Option<String>,
    total: String,
    due_date: NaiveDate,
}
