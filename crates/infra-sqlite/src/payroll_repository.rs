// SQLite Employee & Ledger Repository Implementation

use async_trait::async_trait;
use netbill_core::domain::{Employee, LedgerEntry, MonthWindow, Role, TransactionType};
use netbill_core::error::Result;
use netbill_core::port::{EmployeeRepository, LedgerRepository};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{map_sqlx_error, money, parse_money, parse_optional_money};

pub struct SqlitePayrollRepository {
    pool: SqlitePool,
}

impl SqlitePayrollRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmployeeRepository for SqlitePayrollRepository {
    async fn list_active_employees(&self, roles: &[Role]) -> Result<Vec<Employee>> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, tenant_id, first_name, last_name, role, salary \
             FROM employees WHERE is_active = 1 AND role IN (",
        );
        let mut in_roles = query.separated(", ");
        for role in roles {
            in_roles.push_bind(role.as_str());
        }
        in_roles.push_unseparated(") ORDER BY tenant_id, id");

        let rows: Vec<EmployeeRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| -> Result<Employee> {
                Ok(Employee {
                    role: row.role.parse()?,
                    salary: parse_optional_money("employees.salary", row.salary)?,
                    id: row.id,
                    tenant_id: row.tenant_id,
                    first_name: row.first_name,
                    last_name: row.last_name,
                })
            })
            .collect()
    }
}

#[async_trait]
impl LedgerRepository for SqlitePayrollRepository {
    async fn find_accrual(
        &self,
        employee_id: &str,
        month: MonthWindow,
    ) -> Result<Option<LedgerEntry>> {
        let row: Option<LedgerRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, employee_id, transaction_type, amount, description,
                   period, created_at
            FROM employee_ledger
            WHERE employee_id = ? AND transaction_type = ? AND period = ?
            "#,
        )
        .bind(employee_id)
        .bind(TransactionType::SalaryAccrual.as_str())
        .bind(month.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|row| -> Result<LedgerEntry> {
            Ok(LedgerEntry {
                transaction_type: row.transaction_type.parse()?,
                amount: parse_money("employee_ledger.amount", &row.amount)?,
                id: row.id,
                tenant_id: row.tenant_id,
                employee_id: row.employee_id,
                description: row.description,
                period: row.period,
                created_at: row.created_at,
            })
        })
        .transpose()
    }

    async fn append_entry(&self, entry: &LedgerEntry) -> Result<bool> {
        // Only a second accrual for the same (employee_id, period) is absorbed
        let result = sqlx::query(
            r#"
            INSERT INTO employee_ledger (
                id, tenant_id, employee_id, transaction_type, amount, description,
                period, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(employee_id, period) WHERE transaction_type = 'salary_accrual'
            DO NOTHING
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(&entry.employee_id)
        .bind(entry.transaction_type.as_str())
        .bind(money(entry.amount))
        .bind(&entry.description)
        .bind(&entry.period)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    id: String,
    tenant_id: String,
    first_name: String,
    last_name: String,
    role: String,
    salary: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: String,
    tenant_id: String,
    employee_id: String,
    transaction_type: String,
    amount: String,
    description: String,
    period: String,
    created_at: i64,
}
