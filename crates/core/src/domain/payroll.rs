// Payroll Domain Model (employees, ledger)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::{DomainError, Result};
use crate::domain::notification::TenantId;
use crate::domain::period::MonthWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Employee,
    Manager,
    Technician,
    RecoveryAgent,
}

impl Role {
    /// Roles that accrue a monthly salary
    pub const PAYROLL: [Role; 4] = [
        Role::Employee,
        Role::Manager,
        Role::Technician,
        Role::RecoveryAgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Technician => "technician",
            Role::RecoveryAgent => "recovery_agent",
        }
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "employee" => Ok(Role::Employee),
            "manager" => Ok(Role::Manager),
            "technician" => Ok(Role::Technician),
            "recovery_agent" => Ok(Role::RecoveryAgent),
            other => Err(DomainError::ValidationError(format!("unknown role: {}", other))),
        }
    }
}

/// Active employee snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub tenant_id: TenantId,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub salary: Option<Decimal>,
}

impl Employee {
    /// Salary when it is set and positive
    pub fn payable_salary(&self) -> Option<Decimal> {
        self.salary.filter(|s| *s > Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    SalaryAccrual,
    SalaryPayment,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::SalaryAccrual => "salary_accrual",
            TransactionType::SalaryPayment => "salary_payment",
            TransactionType::Adjustment => "adjustment",
        }
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "salary_accrual" => Ok(TransactionType::SalaryAccrual),
            "salary_payment" => Ok(TransactionType::SalaryPayment),
            "adjustment" => Ok(TransactionType::Adjustment),
            other => Err(DomainError::ValidationError(format!(
                "unknown transaction type: {}",
                other
            ))),
        }
    }
}

/// Employee ledger row (positive amount = owed to the employee)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub tenant_id: TenantId,
    pub employee_id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,

    /// Accrual period `YYYY-MM`
    pub period: String,

    pub created_at: i64,
}

impl LedgerEntry {
    /// Monthly salary accrual for `employee` in `month`
    pub fn salary_accrual(
        id: impl Into<String>,
        created_at: i64,
        employee: &Employee,
        month: MonthWindow,
    ) -> Result<Self> {
        let amount = employee.payable_salary().ok_or_else(|| {
            DomainError::ValidationError(format!("employee {} has no salary", employee.id))
        })?;

        Ok(Self {
            id: id.into(),
            tenant_id: employee.tenant_id.clone(),
            employee_id: employee.id.clone(),
            transaction_type: TransactionType::SalaryAccrual,
            amount: amount.round_dp(2),
            description: format!("Monthly Salary for {}", month.long_name()),
            period: month.to_string(),
            created_at,
        })
    }
}
