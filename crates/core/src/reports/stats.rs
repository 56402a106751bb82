//! Ledger-wide statistics.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::budget::BudgetStatus;
use crate::budget::types::utilization_percent;
use crate::ledger::LedgerTotals;

/// Aggregate figures over every budget in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStats {
    /// Number of budgets.
    pub total_budgets: u64,
    /// Sum of budget ceilings.
    pub total_budget_amount: Decimal,
    /// Sum of spending over all lines.
    pub total_spent: Decimal,
    /// Total spent as a percentage of total ceilings.
    pub overall_utilization_pct: Decimal,
    /// Budget count for every status, zero-filled.
    pub by_status: BTreeMap<BudgetStatus, u64>,
}

impl BudgetStats {
    /// Builds the statistics from store aggregates.
    #[must_use]
    pub fn from_totals(totals: &LedgerTotals) -> Self {
        let by_status: BTreeMap<BudgetStatus, u64> = BudgetStatus::ALL
            .iter()
            .map(|status| (*status, totals.by_status.get(status).copied().unwrap_or(0)))
            .collect();

        Self {
            total_budgets: by_status.values().sum(),
            total_budget_amount: totals.total_budget_amount,
            total_spent: totals.total_spent,
            overall_utilization_pct: utilization_percent(
                totals.total_spent,
                totals.total_budget_amount,
            ),
            by_status,
        }
    }
}
