// Monthly salary accrual

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::AccrualSummary;
use crate::application::scheduler::{JobContext, JobHandler, JobSummary};
use crate::domain::{Employee, LedgerEntry, MonthWindow, Role};
use crate::error::Result;
use crate::port::{EmployeeRepository, IdProvider, LedgerRepository, TimeProvider};

pub struct SalaryAccrualJob {
    employees: Arc<dyn EmployeeRepository>,
    ledger: Arc<dyn LedgerRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SalaryAccrualJob {
    pub fn new(
        employees: Arc<dyn EmployeeRepository>,
        ledger: Arc<dyn LedgerRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            employees,
            ledger,
            id_provider,
            time_provider,
        }
    }

    pub async fn accrue(&self, ctx: &JobContext) -> Result<AccrualSummary> {
        let month = MonthWindow::containing(ctx.today);
        let employees: Vec<Employee> = self
            .employees
            .list_active_employees(&Role::PAYROLL)
            .await?
            .into_iter()
            .filter(|e| e.payable_salary().is_some())
            .collect();

        info!(
            job_id = %ctx.job_id,
            period = %month,
            eligible = employees.len(),
            "Accruing salaries"
        );

        let mut summary = AccrualSummary::default();
        for employee in &employees {
            if ctx.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            match self.accrue_one(employee, month).await {
                Ok(true) => {
                    summary.accrued += 1;
                    info!(
                        employee_id = %employee.id,
                        period = %month,
                        "Salary accrued"
                    );
                }
                Ok(false) => {
                    summary.skipped += 1;
                    debug!(employee_id = %employee.id, period = %month, "Salary already accrued");
                }
                Err(e) => {
                    summary.errors += 1;
                    error!(employee_id = %employee.id, error = %e, "Failed to accrue salary");
                }
            }
        }

        info!(
            job_id = %ctx.job_id,
            accrued = summary.accrued,
            skipped = summary.skipped,
            errors = summary.errors,
            "Salary accrual finished"
        );
        Ok(summary)
    }

    /// Returns false when the period was already accrued
    async fn accrue_one(&self, employee: &Employee, month: MonthWindow) -> Result<bool> {
        if self.ledger.find_accrual(&employee.id, month).await?.is_some() {
            return Ok(false);
        }

        let entry = LedgerEntry::salary_accrual(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            employee,
            month,
        )?;

        // The unique period key rejects a concurrent duplicate
        self.ledger.append_entry(&entry).await
    }
}

#[async_trait]
impl JobHandler for SalaryAccrualJob {
    async fn run(&self, ctx: JobContext) -> Result<JobSummary> {
        self.accrue(&ctx).await.map(JobSummary::Salaries)
    }
}
