//! Budget error types.

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use budgetry_shared::AppError;
use budgetry_shared::types::{BudgetId, BudgetLineId};

use super::types::BudgetStatus;

/// Operations gated on budget status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetOperation {
    /// Adding a line item.
    AddLine,
    /// Draft → Approved.
    Approve,
    /// Approved → Active.
    Activate,
    /// Active → Closed.
    Close,
    /// Recording an expenditure.
    RecordExpenditure,
    /// Committing funds.
    CommitFunds,
}

impl BudgetOperation {
    /// Returns a human-readable verb phrase for the operation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddLine => "add lines to",
            Self::Approve => "approve",
            Self::Activate => "activate",
            Self::Close => "close",
            Self::RecordExpenditure => "record expenditures against",
            Self::CommitFunds => "commit funds against",
        }
    }
}

impl fmt::Display for BudgetOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Budget-related errors.
#[derive(Debug, Error)]
pub enum BudgetError {
    /// Budget not found.
    #[error("Budget not found: {0}")]
    NotFound(BudgetId),

    /// Budget line not found.
    #[error("Budget line not found: {0}")]
    LineNotFound(BudgetLineId),

    /// Operation is not permitted in the budget's current status.
    #[error("Cannot {operation} a budget in status {status}")]
    InvalidState {
        /// The attempted operation.
        operation: BudgetOperation,
        /// The budget's current status.
        status: BudgetStatus,
    },

    /// Amount exceeds what the line has available.
    #[error("Amount {requested} exceeds available {available}")]
    InsufficientFunds {
        /// The requested amount.
        requested: Decimal,
        /// What the line had available at the time of the check.
        available: Decimal,
    },

    /// Invalid argument.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Contention or timeout on the store; safe to retry.
    #[error("Store temporarily unavailable: {0}")]
    TransientStoreFailure(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl BudgetError {
    /// Returns the error code for structured output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "BUDGET_NOT_FOUND",
            Self::LineNotFound(_) => "BUDGET_LINE_NOT_FOUND",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::TransientStoreFailure(_) => "TRANSIENT_STORE_FAILURE",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStoreFailure(_))
    }
}

impl From<BudgetError> for AppError {
    fn from(err: BudgetError) -> Self {
        let message = err.to_string();
        match err {
            BudgetError::NotFound(_) | BudgetError::LineNotFound(_) => Self::NotFound(message),
            BudgetError::InvalidState { .. } => Self::InvalidState(message),
            BudgetError::InsufficientFunds { .. } => Self::BusinessRule(message),
            BudgetError::InvalidInput(_) => Self::Validation(message),
            BudgetError::TransientStoreFailure(_) => Self::Unavailable(message),
            BudgetError::Database(_) => Self::Database(message),
        }
    }
}
