//! Budget data types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use budgetry_shared::types::{BudgetId, BudgetLineId, ExpenditureId};

use super::error::BudgetError;

/// Budget status in the approval lifecycle.
///
/// Budgets progress through these states in a strict order:
/// - Draft → Approved (approve)
/// - Approved → Active (activate)
/// - Active → Closed (close)
///
/// There is no way back; Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    /// Budget is being drafted; lines may be added.
    Draft,
    /// Budget has been approved; lines may still be added.
    Approved,
    /// Budget is in execution.
    Active,
    /// Budget is closed (terminal).
    Closed,
}

impl BudgetStatus {
    /// Every status in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Draft, Self::Approved, Self::Active, Self::Closed];

    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    /// Returns true if line items may be added in this status.
    #[must_use]
    pub fn accepts_lines(&self) -> bool {
        match self {
            Self::Draft | Self::Approved => true,
            Self::Active | Self::Closed => false,
        }
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A budget record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Budget ID.
    pub id: BudgetId,
    /// Budget title.
    pub title: String,
    /// Fiscal year the budget covers.
    pub fiscal_year: i32,
    /// Budget ceiling.
    pub total_amount: Decimal,
    /// Owning department.
    pub department: String,
    /// Lifecycle status.
    pub status: BudgetStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Who approved the budget, once approved.
    pub approved_by: Option<String>,
    /// When the budget was approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// Free-text notes.
    pub notes: String,
}

/// A budget line item with its funds accumulators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLine {
    /// Budget line ID.
    pub id: BudgetLineId,
    /// Parent budget ID.
    pub budget_id: BudgetId,
    /// Spending category.
    pub category: String,
    /// Spending subcategory.
    pub subcategory: String,
    /// Budgeted ceiling for this line.
    pub allocated: Decimal,
    /// Funds actually disbursed.
    pub spent: Decimal,
    /// Funds encumbered but not yet disbursed.
    pub committed: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl BudgetLine {
    /// Spendable remainder: allocated - spent - committed.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.allocated - self.spent - self.committed
    }

    /// Spent as a percentage of allocated, rounded to two places.
    #[must_use]
    pub fn utilization_pct(&self) -> Decimal {
        utilization_percent(self.spent, self.allocated)
    }
}

/// Exclusive upper bound on any single money amount, matching NUMERIC(19,4).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// Maximum number of decimal places kept for money amounts.
pub const MAX_AMOUNT_SCALE: u32 = 4;

/// Checks that a money amount fits the persisted range and precision.
///
/// # Errors
///
/// Returns `BudgetError::InvalidInput` when `|amount| >= MAX_AMOUNT` or the
/// amount has more than `MAX_AMOUNT_SCALE` significant decimal places.
pub fn validate_money(field: &str, amount: Decimal) -> Result<(), BudgetError> {
    if amount.abs() >= MAX_AMOUNT {
        return Err(BudgetError::InvalidInput(format!(
            "{field} must be below {MAX_AMOUNT}, got {amount}"
        )));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(BudgetError::InvalidInput(format!(
            "{field} allows at most {MAX_AMOUNT_SCALE} decimal places, got {amount}"
        )));
    }
    Ok(())
}

/// Sums amounts, failing instead of overflowing.
///
/// # Errors
///
/// Returns `BudgetError::InvalidInput` if the total does not fit a `Decimal`.
pub fn checked_total<I>(amounts: I) -> Result<Decimal, BudgetError>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or_else(|| BudgetError::InvalidInput("amount total overflowed".to_string()))
}

/// Computes `part / whole * 100` rounded to two decimal places.
///
/// Returns zero when `whole` is not positive and saturates at `Decimal::MAX`.
#[must_use]
pub fn utilization_percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(Decimal::MAX, |pct| pct.round_dp(2))
}

/// An expenditure recorded against a budget line. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expenditure {
    /// Expenditure ID.
    pub id: ExpenditureId,
    /// Budget line the expenditure was charged to.
    pub line_id: BudgetLineId,
    /// Paid vendor.
    pub vendor: String,
    /// Amount disbursed.
    pub amount: Decimal,
    /// What the money was spent on.
    pub description: String,
    /// Who approved the expenditure.
    pub approved_by: String,
    /// Date of the expenditure.
    pub date: NaiveDate,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Optional receipt reference.
    pub receipt_ref: Option<String>,
    /// Line category at the time of recording.
    pub category: String,
}

/// Input for creating a new budget.
#[derive(Debug, Clone)]
pub struct CreateBudgetInput {
    /// Budget title.
    pub title: String,
    /// Fiscal year.
    pub fiscal_year: i32,
    /// Budget ceiling.
    pub total_amount: Decimal,
    /// Owning department.
    pub department: String,
    /// Free-text notes.
    pub notes: String,
}

/// Input for adding a line to a budget.
#[derive(Debug, Clone)]
pub struct CreateBudgetLineInput {
    /// Spending category.
    pub category: String,
    /// Spending subcategory.
    pub subcategory: String,
    /// Amount allocated to the line.
    pub allocated: Decimal,
}

/// Input for recording an expenditure.
#[derive(Debug, Clone)]
pub struct RecordExpenditureInput {
    /// Paid vendor.
    pub vendor: String,
    /// Amount disbursed.
    pub amount: Decimal,
    /// What the money was spent on.
    pub description: String,
    /// Who approved the expenditure.
    pub approved_by: String,
    /// Date of the expenditure; today (UTC) when absent.
    pub date: Option<NaiveDate>,
    /// Optional receipt reference.
    pub receipt_ref: Option<String>,
}

/// Input for committing (encumbering) funds.
#[derive(Debug, Clone)]
pub struct CommitFundsInput {
    /// Amount to encumber.
    pub amount: Decimal,
    /// Reason for the commitment.
    pub description: String,
}

/// Filter for listing budgets.
#[derive(Debug, Clone, Default)]
pub struct BudgetFilter {
    /// Only budgets of this department.
    pub department: Option<String>,
    /// Only budgets of this fiscal year.
    pub fiscal_year: Option<i32>,
}

impl BudgetFilter {
    /// Returns true if the budget passes the filter.
    #[must_use]
    pub fn matches(&self, budget: &Budget) -> bool {
        self.department
            .as_deref()
            .is_none_or(|department| budget.department == department)
            && self
                .fiscal_year
                .is_none_or(|fiscal_year| budget.fiscal_year == fiscal_year)
    }
}
