//! In-process ledger store.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use budgetry_shared::types::{BudgetId, BudgetLineId};

use super::store::{BudgetSnapshot, LedgerStore, LedgerTotals, LineMutation, LineOutcome};
use crate::audit::AuditEntry;
use crate::budget::{Budget, BudgetError, BudgetFilter, BudgetLine, Expenditure, checked_total};

#[derive(Debug, Default)]
struct State {
    budgets: HashMap<BudgetId, Budget>,
    lines: HashMap<BudgetLineId, BudgetLine>,
    expenditures: Vec<Expenditure>,
    audit: Vec<AuditEntry>,
}

impl State {
    fn lines_of(&self, budget_id: BudgetId) -> Vec<BudgetLine> {
        let mut lines: Vec<BudgetLine> = self
            .lines
            .values()
            .filter(|l| l.budget_id == budget_id)
            .cloned()
            .collect();
        lines.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.subcategory.cmp(&b.subcategory))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        lines
    }

    fn expenditures_of(&self, budget_id: BudgetId) -> impl Iterator<Item = &Expenditure> {
        self.expenditures.iter().filter(move |e| {
            self.lines
                .get(&e.line_id)
                .is_some_and(|l| l.budget_id == budget_id)
        })
    }
}

/// Ledger store backed by process memory.
///
/// A single async mutex serializes every operation, so check-and-increment
/// on a line can never interleave. Closures run against copies that are
/// written back only on success.
#[derive(Debug)]
pub struct InMemoryLedgerStore {
    state: Mutex<State>,
    lock_timeout: Duration,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    ///
    /// Operations that cannot acquire the store within `lock_timeout` fail
    /// with `BudgetError::TransientStoreFailure`.
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            lock_timeout,
        }
    }

    async fn lock(&self) -> Result<MutexGuard<'_, State>, BudgetError> {
        tokio::time::timeout(self.lock_timeout, self.state.lock())
            .await
            .map_err(|_| {
                BudgetError::TransientStoreFailure(format!(
                    "store lock not acquired within {}ms",
                    self.lock_timeout.as_millis()
                ))
            })
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    async fn insert_budget(&self, budget: Budget, audit: AuditEntry) -> Result<Budget, BudgetError> {
        let mut state = self.lock().await?;
        state.budgets.insert(budget.id, budget.clone());
        state.audit.push(audit);
        Ok(budget)
    }

    async fn update_budget<F>(&self, id: BudgetId, f: F) -> Result<Budget, BudgetError>
    where
        F: FnOnce(&mut Budget) -> Result<AuditEntry, BudgetError> + Send,
    {
        let mut state = self.lock().await?;
        let mut budget = state
            .budgets
            .get(&id)
            .cloned()
            .ok_or(BudgetError::NotFound(id))?;

        let audit = f(&mut budget)?;

        state.budgets.insert(id, budget.clone());
        state.audit.push(audit);
        Ok(budget)
    }

    async fn insert_line<F>(&self, budget_id: BudgetId, f: F) -> Result<BudgetLine, BudgetError>
    where
        F: FnOnce(&mut Budget) -> Result<(BudgetLine, AuditEntry), BudgetError> + Send,
    {
        let mut state = self.lock().await?;
        let mut budget = state
            .budgets
            .get(&budget_id)
            .cloned()
            .ok_or(BudgetError::NotFound(budget_id))?;

        let (line, audit) = f(&mut budget)?;

        state.budgets.insert(budget_id, budget);
        state.lines.insert(line.id, line.clone());
        state.audit.push(audit);
        Ok(line)
    }

    async fn update_line<F>(&self, line_id: BudgetLineId, f: F) -> Result<LineOutcome, BudgetError>
    where
        F: FnOnce(&Budget, &mut BudgetLine) -> Result<LineMutation, BudgetError> + Send,
    {
        let mut state = self.lock().await?;
        let mut line = state
            .lines
            .get(&line_id)
            .cloned()
            .ok_or(BudgetError::LineNotFound(line_id))?;
        let budget = state
            .budgets
            .get(&line.budget_id)
            .ok_or(BudgetError::NotFound(line.budget_id))?;

        let mutation = f(budget, &mut line)?;

        state.lines.insert(line_id, line.clone());
        if let Some(expenditure) = &mutation.expenditure {
            state.expenditures.push(expenditure.clone());
        }
        state.audit.push(mutation.audit);
        Ok(LineOutcome {
            line,
            expenditure: mutation.expenditure,
        })
    }

    async fn budget(&self, id: BudgetId) -> Result<Option<Budget>, BudgetError> {
        let state = self.lock().await?;
        Ok(state.budgets.get(&id).cloned())
    }

    async fn lines(&self, budget_id: BudgetId) -> Result<Vec<BudgetLine>, BudgetError> {
        let state = self.lock().await?;
        Ok(state.lines_of(budget_id))
    }

    async fn snapshot(&self, budget_id: BudgetId) -> Result<Option<BudgetSnapshot>, BudgetError> {
        let state = self.lock().await?;
        let Some(budget) = state.budgets.get(&budget_id).cloned() else {
            return Ok(None);
        };

        let missing_receipts = state
            .expenditures_of(budget_id)
            .filter(|e| e.receipt_ref.is_none())
            .count();

        debug!(budget_id = %budget_id, "Snapshot read from memory");
        Ok(Some(BudgetSnapshot {
            lines: state.lines_of(budget_id),
            budget,
            missing_receipts: u64::try_from(missing_receipts).unwrap_or(u64::MAX),
        }))
    }

    async fn list_budgets(&self, filter: BudgetFilter) -> Result<Vec<Budget>, BudgetError> {
        let state = self.lock().await?;
        let mut budgets: Vec<Budget> = state
            .budgets
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        budgets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(budgets)
    }

    async fn expenditures(&self, budget_id: BudgetId) -> Result<Vec<Expenditure>, BudgetError> {
        let state = self.lock().await?;
        let mut expenditures: Vec<Expenditure> = state.expenditures_of(budget_id).cloned().collect();
        expenditures.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(expenditures)
    }

    async fn audit_trail(&self, budget_id: BudgetId) -> Result<Vec<AuditEntry>, BudgetError> {
        let state = self.lock().await?;
        let mut entries: Vec<AuditEntry> = state
            .audit
            .iter()
            .filter(|e| e.budget_id == Some(budget_id))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn totals(&self) -> Result<LedgerTotals, BudgetError> {
        let state = self.lock().await?;
        let mut totals = LedgerTotals::default();
        for budget in state.budgets.values() {
            *totals.by_status.entry(budget.status).or_insert(0) += 1;
        }
        totals.total_budget_amount = checked_total(state.budgets.values().map(|b| b.total_amount))?;
        totals.total_spent = checked_total(state.lines.values().map(|l| l.spent))?;
        Ok(totals)
    }
}
