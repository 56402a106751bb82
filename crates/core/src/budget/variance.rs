//! Budget variance calculations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use budgetry_shared::types::{BudgetId, BudgetLineId};

use super::error::BudgetError;
use super::types::{Budget, BudgetLine, BudgetStatus, checked_total, utilization_percent};

/// Utilization above which a line is tagged `warning` in the variance view.
pub const WARNING_UTILIZATION_PCT: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

/// Display status of a line in the variance view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    /// Within allocation and at most 80% utilized.
    Ok,
    /// Within allocation but more than 80% utilized.
    Warning,
    /// Spent plus committed exceeds the allocation.
    OverBudget,
}

impl LineStatus {
    /// Classifies a line from its available amount and utilization.
    #[must_use]
    pub fn classify(available: Decimal, utilization_pct: Decimal) -> Self {
        if available < Decimal::ZERO {
            Self::OverBudget
        } else if utilization_pct > WARNING_UTILIZATION_PCT {
            Self::Warning
        } else {
            Self::Ok
        }
    }
}

/// Variance figures for a single line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineVariance {
    /// Budget line ID.
    pub line_id: BudgetLineId,
    /// Spending category.
    pub category: String,
    /// Spending subcategory.
    pub subcategory: String,
    /// Allocated amount.
    pub allocated: Decimal,
    /// Spent amount.
    pub spent: Decimal,
    /// Committed amount.
    pub committed: Decimal,
    /// Allocated minus spent minus committed.
    pub available: Decimal,
    /// Spent as a percentage of allocated.
    pub utilization_pct: Decimal,
    /// Display status.
    pub status: LineStatus,
}

impl From<&BudgetLine> for LineVariance {
    fn from(line: &BudgetLine) -> Self {
        let available = line.available();
        let utilization_pct = line.utilization_pct();
        Self {
            line_id: line.id,
            category: line.category.clone(),
            subcategory: line.subcategory.clone(),
            allocated: line.allocated,
            spent: line.spent,
            committed: line.committed,
            available,
            utilization_pct,
            status: LineStatus::classify(available, utilization_pct),
        }
    }
}

/// Planned vs actual figures for a whole budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceReport {
    /// Budget ID.
    pub budget_id: BudgetId,
    /// Budget title.
    pub title: String,
    /// Fiscal year.
    pub fiscal_year: i32,
    /// Owning department.
    pub department: String,
    /// Lifecycle status.
    pub status: BudgetStatus,
    /// Budget ceiling.
    pub total_budget: Decimal,
    /// Sum of line allocations.
    pub total_allocated: Decimal,
    /// Sum of line spending.
    pub total_spent: Decimal,
    /// Sum of line commitments.
    pub total_committed: Decimal,
    /// Allocated minus spent minus committed, over all lines.
    pub total_available: Decimal,
    /// Total spent as a percentage of total allocated.
    pub overall_utilization_pct: Decimal,
    /// Ceiling minus allocations; negative means over-allocated.
    pub unallocated: Decimal,
    /// Per-line figures.
    pub lines: Vec<LineVariance>,
}

/// Stateless variance analyzer.
pub struct VarianceService;

impl VarianceService {
    /// Computes the variance report for a budget and its lines.
    ///
    /// Lines are reported ordered by category, then subcategory.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidInput` if a total does not fit a `Decimal`.
    pub fn compute(budget: &Budget, lines: &[BudgetLine]) -> Result<VarianceReport, BudgetError> {
        let mut ordered: Vec<&BudgetLine> = lines.iter().collect();
        ordered.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.subcategory.cmp(&b.subcategory))
        });

        let total_allocated = checked_total(lines.iter().map(|l| l.allocated))?;
        let total_spent = checked_total(lines.iter().map(|l| l.spent))?;
        let total_committed = checked_total(lines.iter().map(|l| l.committed))?;
        let total_available = total_allocated
            .checked_sub(total_spent)
            .and_then(|rest| rest.checked_sub(total_committed))
            .ok_or_else(|| overflow("total available"))?;
        let unallocated = budget
            .total_amount
            .checked_sub(total_allocated)
            .ok_or_else(|| overflow("unallocated"))?;

        Ok(VarianceReport {
            budget_id: budget.id,
            title: budget.title.clone(),
            fiscal_year: budget.fiscal_year,
            department: budget.department.clone(),
            status: budget.status,
            total_budget: budget.total_amount,
            total_allocated,
            total_spent,
            total_committed,
            total_available,
            overall_utilization_pct: utilization_percent(total_spent, total_allocated),
            unallocated,
            lines: ordered.into_iter().map(LineVariance::from).collect(),
        })
    }
}

fn overflow(figure: &str) -> BudgetError {
    BudgetError::InvalidInput(format!("{figure} overflowed"))
}
