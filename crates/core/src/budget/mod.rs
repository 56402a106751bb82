//! Budget lifecycle, funds arithmetic, and variance/compliance analysis.

pub mod compliance;
pub mod error;
pub mod funds;
pub mod lifecycle;
pub mod types;
pub mod variance;

#[cfg(test)]
mod props;

pub use compliance::{ComplianceIssue, ComplianceReport, ComplianceService, ComplianceWarning};
pub use error::{BudgetError, BudgetOperation};
pub use funds::FundsService;
pub use lifecycle::{LifecycleAction, LifecycleService};
pub use types::{
    Budget, BudgetFilter, BudgetLine, BudgetStatus, CommitFundsInput, CreateBudgetInput,
    CreateBudgetLineInput, Expenditure, MAX_AMOUNT, MAX_AMOUNT_SCALE, RecordExpenditureInput,
    checked_total, validate_money,
};
pub use variance::{LineStatus, LineVariance, VarianceReport, VarianceService};
