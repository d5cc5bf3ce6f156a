// Payroll Repository Ports (employees, ledger)

use async_trait::async_trait;

use crate::domain::{Employee, LedgerEntry, MonthWindow, Role};
use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmployeeRepository: Send + Sync {
    /// Active employees holding one of `roles`
    async fn list_active_employees(&self, roles: &[Role]) -> Result<Vec<Employee>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Salary accrual of `employee_id` for `month`, if any
    async fn find_accrual(
        &self,
        employee_id: &str,
        month: MonthWindow,
    ) -> Result<Option<LedgerEntry>>;

    /// Append a ledger row
    ///
    /// Returns false when a second salary accrual for the same employee and
    /// period was rejected.
    async fn append_entry(&self, entry: &LedgerEntry) -> Result<bool>;
}
