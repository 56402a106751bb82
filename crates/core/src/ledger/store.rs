//! Persistence seam for the budget ledger.

use std::collections::BTreeMap;
use std::future::Future;

use rust_decimal::Decimal;

use budgetry_shared::types::{BudgetId, BudgetLineId};

use crate::audit::AuditEntry;
use crate::budget::{Budget, BudgetError, BudgetFilter, BudgetLine, BudgetStatus, Expenditure};

/// Changes a funds closure asks the store to persist alongside the line.
#[derive(Debug, Clone)]
pub struct LineMutation {
    /// Expenditure to append, if the operation records one.
    pub expenditure: Option<Expenditure>,
    /// Audit entry for the operation.
    pub audit: AuditEntry,
}

/// Result of a successful line mutation.
#[derive(Debug, Clone)]
pub struct LineOutcome {
    /// The line as persisted.
    pub line: BudgetLine,
    /// The expenditure as persisted, if one was recorded.
    pub expenditure: Option<Expenditure>,
}

/// A consistent read of one budget for analysis.
#[derive(Debug, Clone)]
pub struct BudgetSnapshot {
    /// The budget.
    pub budget: Budget,
    /// Its lines, ordered by category then subcategory.
    pub lines: Vec<BudgetLine>,
    /// Number of its expenditures without a receipt reference.
    pub missing_receipts: u64,
}

/// Ledger-wide aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    /// Budget count per status; absent statuses may be omitted.
    pub by_status: BTreeMap<BudgetStatus, u64>,
    /// Sum of all budget ceilings.
    pub total_budget_amount: Decimal,
    /// Sum of spent over all lines.
    pub total_spent: Decimal,
}

/// Storage backend for budgets, lines, expenditures, and audit entries.
///
/// Every mutating method is one atomic unit: the store loads the target rows
/// under exclusive access, runs the closure, and persists the changed rows
/// together with the returned audit entry. When the closure returns an error
/// nothing is written. The store never validates business rules itself.
///
/// Implemented in-process by [`super::InMemoryLedgerStore`] and for
/// PostgreSQL by the db crate.
pub trait LedgerStore: Send + Sync {
    /// Persists a new budget with its creation audit entry.
    fn insert_budget(
        &self,
        budget: Budget,
        audit: AuditEntry,
    ) -> impl Future<Output = Result<Budget, BudgetError>> + Send;

    /// Mutates a budget under exclusive access.
    ///
    /// Fails with `BudgetError::NotFound` if the budget does not exist.
    fn update_budget<F>(
        &self,
        id: BudgetId,
        f: F,
    ) -> impl Future<Output = Result<Budget, BudgetError>> + Send
    where
        F: FnOnce(&mut Budget) -> Result<AuditEntry, BudgetError> + Send;

    /// Creates a line under exclusive access to its budget.
    ///
    /// The closure may also touch the budget (e.g. `updated_at`); both are
    /// persisted. Fails with `BudgetError::NotFound` if the budget does not exist.
    fn insert_line<F>(
        &self,
        budget_id: BudgetId,
        f: F,
    ) -> impl Future<Output = Result<BudgetLine, BudgetError>> + Send
    where
        F: FnOnce(&mut Budget) -> Result<(BudgetLine, AuditEntry), BudgetError> + Send;

    /// Mutates a line under exclusive access.
    ///
    /// The owning budget is passed read-only so the closure can check its
    /// status. Fails with `BudgetError::LineNotFound` if the line does not exist.
    fn update_line<F>(
        &self,
        line_id: BudgetLineId,
        f: F,
    ) -> impl Future<Output = Result<LineOutcome, BudgetError>> + Send
    where
        F: FnOnce(&Budget, &mut BudgetLine) -> Result<LineMutation, BudgetError> + Send;

    /// Finds a budget by ID.
    fn budget(
        &self,
        id: BudgetId,
    ) -> impl Future<Output = Result<Option<Budget>, BudgetError>> + Send;

    /// Lists the lines of a budget, ordered by category then subcategory.
    fn lines(
        &self,
        budget_id: BudgetId,
    ) -> impl Future<Output = Result<Vec<BudgetLine>, BudgetError>> + Send;

    /// Reads a budget, its lines, and its missing-receipt count consistently.
    fn snapshot(
        &self,
        budget_id: BudgetId,
    ) -> impl Future<Output = Result<Option<BudgetSnapshot>, BudgetError>> + Send;

    /// Lists budgets matching the filter, newest first.
    fn list_budgets(
        &self,
        filter: BudgetFilter,
    ) -> impl Future<Output = Result<Vec<Budget>, BudgetError>> + Send;

    /// Lists the expenditures of a budget, most recent date first.
    fn expenditures(
        &self,
        budget_id: BudgetId,
    ) -> impl Future<Output = Result<Vec<Expenditure>, BudgetError>> + Send;

    /// Lists the audit entries of a budget, oldest first.
    fn audit_trail(
        &self,
        budget_id: BudgetId,
    ) -> impl Future<Output = Result<Vec<AuditEntry>, BudgetError>> + Send;

    /// Computes ledger-wide aggregates.
    fn totals(&self) -> impl Future<Output = Result<LedgerTotals, BudgetError>> + Send;
}
