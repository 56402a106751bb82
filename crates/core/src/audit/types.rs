//! Audit domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use budgetry_shared::types::{AuditEntryId, BudgetId};

/// Action tag recorded on an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A budget was created.
    CreateBudget,
    /// A line was added to a budget.
    AddLine,
    /// A budget was approved.
    ApproveBudget,
    /// A budget was activated.
    ActivateBudget,
    /// A budget was closed.
    CloseBudget,
    /// An expenditure was recorded.
    RecordExpenditure,
    /// Funds were committed.
    CommitFunds,
}

impl AuditAction {
    /// Returns the persisted tag of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateBudget => "CREATE_BUDGET",
            Self::AddLine => "ADD_LINE",
            Self::ApproveBudget => "APPROVE_BUDGET",
            Self::ActivateBudget => "ACTIVATE_BUDGET",
            Self::CloseBudget => "CLOSE_BUDGET",
            Self::RecordExpenditure => "RECORD_EXPENDITURE",
            Self::CommitFunds => "COMMIT_FUNDS",
        }
    }

    /// Parses an action from its persisted tag.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE_BUDGET" => Some(Self::CreateBudget),
            "ADD_LINE" => Some(Self::AddLine),
            "APPROVE_BUDGET" => Some(Self::ApproveBudget),
            "ACTIVATE_BUDGET" => Some(Self::ActivateBudget),
            "CLOSE_BUDGET" => Some(Self::CloseBudget),
            "RECORD_EXPENDITURE" => Some(Self::RecordExpenditure),
            "COMMIT_FUNDS" => Some(Self::CommitFunds),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry ID.
    pub id: AuditEntryId,
    /// Budget the action concerns; `None` for ledger-wide actions.
    pub budget_id: Option<BudgetId>,
    /// Action tag.
    pub action: AuditAction,
    /// Free-text details.
    pub details: String,
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// Who performed the action.
    pub actor: String,
}

impl AuditEntry {
    /// Creates a new entry for a budget-scoped action.
    #[must_use]
    pub fn new(
        budget_id: BudgetId,
        action: AuditAction,
        details: impl Into<String>,
        actor: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            budget_id: Some(budget_id),
            action,
            details: details.into(),
            timestamp,
            actor: actor.into(),
        }
    }
}
