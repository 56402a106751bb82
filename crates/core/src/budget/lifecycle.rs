//! Budget lifecycle state machine.
//!
//! Validates status transitions and line-item mutation rules. The service is
//! stateless: it inspects the current state and returns either the new
//! entity or a `LifecycleAction` describing the transition, which the caller
//! applies inside its atomic unit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use budgetry_shared::types::{BudgetId, BudgetLineId};

use super::error::{BudgetError, BudgetOperation};
use super::types::{
    Budget, BudgetLine, BudgetStatus, CreateBudgetInput, CreateBudgetLineInput, validate_money,
};
use crate::audit::AuditAction;

/// A validated status transition with its audit data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Approve a draft budget.
    Approve {
        /// The new status after approval.
        new_status: BudgetStatus,
        /// Who approved the budget.
        approved_by: String,
        /// When the budget was approved.
        approved_at: DateTime<Utc>,
    },
    /// Activate an approved budget.
    Activate {
        /// The new status after activation.
        new_status: BudgetStatus,
        /// When the budget was activated.
        activated_at: DateTime<Utc>,
    },
    /// Close an active budget.
    Close {
        /// The new status after closing.
        new_status: BudgetStatus,
        /// When the budget was closed.
        closed_at: DateTime<Utc>,
    },
}

impl LifecycleAction {
    /// Returns the new status resulting from this action.
    #[must_use]
    pub fn new_status(&self) -> BudgetStatus {
        match self {
            Self::Approve { new_status, .. }
            | Self::Activate { new_status, .. }
            | Self::Close { new_status, .. } => *new_status,
        }
    }

    /// Returns the audit tag for this action.
    #[must_use]
    pub fn audit_action(&self) -> AuditAction {
        match self {
            Self::Approve { .. } => AuditAction::ApproveBudget,
            Self::Activate { .. } => AuditAction::ActivateBudget,
            Self::Close { .. } => AuditAction::CloseBudget,
        }
    }

    /// Returns the audit details for this action.
    #[must_use]
    pub fn audit_details(&self) -> String {
        match self {
            Self::Approve { approved_by, .. } => format!("Approved by {approved_by}"),
            Self::Activate { .. } | Self::Close { .. } => String::new(),
        }
    }

    /// Returns when the transition happened.
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Approve { approved_at, .. } => *approved_at,
            Self::Activate { activated_at, .. } => *activated_at,
            Self::Close { closed_at, .. } => *closed_at,
        }
    }

    /// Writes the transition onto the budget.
    pub fn apply(&self, budget: &mut Budget) {
        budget.status = self.new_status();
        budget.updated_at = self.occurred_at();
        if let Self::Approve {
            approved_by,
            approved_at,
            ..
        } = self
        {
            budget.approved_by = Some(approved_by.clone());
            budget.approved_at = Some(*approved_at);
        }
    }
}

/// Stateless service for the budget lifecycle.
pub struct LifecycleService;

impl LifecycleService {
    /// Builds a new draft budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidInput` if the total amount is negative,
    /// not below `MAX_AMOUNT`, or has more than four decimal places.
    pub fn create_budget(
        input: CreateBudgetInput,
        now: DateTime<Utc>,
    ) -> Result<Budget, BudgetError> {
        if input.total_amount < Decimal::ZERO {
            return Err(BudgetError::InvalidInput(format!(
                "total amount must not be negative, got {}",
                input.total_amount
            )));
        }
        validate_money("total amount", input.total_amount)?;

        Ok(Budget {
            id: BudgetId::new(),
            title: input.title,
            fiscal_year: input.fiscal_year,
            total_amount: input.total_amount,
            department: input.department,
            status: BudgetStatus::Draft,
            created_at: now,
            updated_at: now,
            approved_by: None,
            approved_at: None,
            notes: input.notes,
        })
    }

    /// Builds a new line for the budget.
    ///
    /// The allocation is not checked against the budget ceiling; that is
    /// reported by the compliance check instead.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidState` unless the budget is Draft or Approved.
    /// Returns `BudgetError::InvalidInput` if the allocation is negative,
    /// not below `MAX_AMOUNT`, or has more than four decimal places.
    pub fn new_line(
        budget: &Budget,
        input: CreateBudgetLineInput,
        now: DateTime<Utc>,
    ) -> Result<BudgetLine, BudgetError> {
        if !budget.status.accepts_lines() {
            return Err(BudgetError::InvalidState {
                operation: BudgetOperation::AddLine,
                status: budget.status,
            });
        }

        if input.allocated < Decimal::ZERO {
            return Err(BudgetError::InvalidInput(format!(
                "allocated amount must not be negative, got {}",
                input.allocated
            )));
        }
        validate_money("allocated amount", input.allocated)?;

        Ok(BudgetLine {
            id: BudgetLineId::new(),
            budget_id: budget.id,
            category: input.category,
            subcategory: input.subcategory,
            allocated: input.allocated,
            spent: Decimal::ZERO,
            committed: Decimal::ZERO,
            created_at: now,
        })
    }

    /// Approve a draft budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidInput` if the approver is blank.
    /// Returns `BudgetError::InvalidState` if not in Draft status.
    pub fn approve(
        current_status: BudgetStatus,
        approved_by: &str,
        now: DateTime<Utc>,
    ) -> Result<LifecycleAction, BudgetError> {
        if approved_by.trim().is_empty() {
            return Err(BudgetError::InvalidInput("approver is required".to_string()));
        }

        match current_status {
            BudgetStatus::Draft => Ok(LifecycleAction::Approve {
                new_status: BudgetStatus::Approved,
                approved_by: approved_by.trim().to_string(),
                approved_at: now,
            }),
            BudgetStatus::Approved | BudgetStatus::Active | BudgetStatus::Closed => {
                Err(BudgetError::InvalidState {
                    operation: BudgetOperation::Approve,
                    status: current_status,
                })
            }
        }
    }

    /// Activate an approved budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidState` if not in Approved status.
    pub fn activate(
        current_status: BudgetStatus,
        now: DateTime<Utc>,
    ) -> Result<LifecycleAction, BudgetError> {
        match current_status {
            BudgetStatus::Approved => Ok(LifecycleAction::Activate {
                new_status: BudgetStatus::Active,
                activated_at: now,
            }),
            BudgetStatus::Draft | BudgetStatus::Active | BudgetStatus::Closed => {
                Err(BudgetError::InvalidState {
                    operation: BudgetOperation::Activate,
                    status: current_status,
                })
            }
        }
    }

    /// Close an active budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidState` if not in Active status.
    pub fn close(
        current_status: BudgetStatus,
        now: DateTime<Utc>,
    ) -> Result<LifecycleAction, BudgetError> {
        match current_status {
            BudgetStatus::Active => Ok(LifecycleAction::Close {
                new_status: BudgetStatus::Closed,
                closed_at: now,
            }),
            BudgetStatus::Draft | BudgetStatus::Approved | BudgetStatus::Closed => {
                Err(BudgetError::InvalidState {
                    operation: BudgetOperation::Close,
                    status: current_status,
                })
            }
        }
    }

    /// Check if a status transition is valid.
    ///
    /// Valid transitions:
    /// - Draft → Approved (approve)
    /// - Approved → Active (activate)
    /// - Active → Closed (close)
    #[must_use]
    pub fn is_valid_transition(from: BudgetStatus, to: BudgetStatus) -> bool {
        matches!(
            (from, to),
            (BudgetStatus::Draft, BudgetStatus::Approved)
                | (BudgetStatus::Approved, BudgetStatus::Active)
                | (BudgetStatus::Active, BudgetStatus::Closed)
        )
    }
}
