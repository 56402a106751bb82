//! Compliance checks over a variance report.
//!
//! Issues are hard violations and make a budget non-compliant. Warnings are
//! advisory only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use budgetry_shared::types::{BudgetId, BudgetLineId};

use super::variance::VarianceReport;
use crate::reports::format::{format_dollars, format_pct};

/// Utilization above which a line raises a high-utilization warning.
pub const HIGH_UTILIZATION_PCT: Decimal = Decimal::from_parts(90, 0, 0, false, 0);

/// A hard compliance violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComplianceIssue {
    /// Line allocations exceed the budget ceiling.
    OverAllocated {
        /// Amount by which allocations exceed the ceiling.
        excess: Decimal,
    },
    /// Spent plus committed exceeds a line's allocation.
    OverSpent {
        /// Offending line.
        line_id: BudgetLineId,
        /// Line category.
        category: String,
        /// Line subcategory.
        subcategory: String,
        /// Amount by which the line is overdrawn.
        overrun: Decimal,
    },
}

impl fmt::Display for ComplianceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverAllocated { excess } => write!(
                f,
                "OVER-ALLOCATED: Lines exceed total budget by {}",
                format_dollars(*excess)
            ),
            Self::OverSpent {
                category,
                subcategory,
                overrun,
                ..
            } => write!(
                f,
                "OVER-SPENT: {category}/{subcategory} by {}",
                format_dollars(*overrun)
            ),
        }
    }
}

/// An advisory compliance finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComplianceWarning {
    /// A line is more than 90% utilized.
    HighUtilization {
        /// Line ID.
        line_id: BudgetLineId,
        /// Line category.
        category: String,
        /// Line subcategory.
        subcategory: String,
        /// Utilization percentage.
        utilization_pct: Decimal,
    },
    /// Expenditures were recorded without a receipt reference.
    MissingReceipts {
        /// Number of expenditures lacking a receipt.
        count: u64,
    },
}

impl fmt::Display for ComplianceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighUtilization {
                category,
                subcategory,
                utilization_pct,
                ..
            } => write!(
                f,
                "HIGH UTILIZATION ({}%): {category}/{subcategory}",
                format_pct(*utilization_pct)
            ),
            Self::MissingReceipts { count } => {
                write!(f, "{count} expenditure(s) missing receipt references")
            }
        }
    }
}

/// Result of a compliance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Budget ID.
    pub budget_id: BudgetId,
    /// True when there are no issues.
    pub compliant: bool,
    /// Hard violations.
    pub issues: Vec<ComplianceIssue>,
    /// Advisory findings.
    pub warnings: Vec<ComplianceWarning>,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
}

/// Stateless compliance checker.
pub struct ComplianceService;

impl ComplianceService {
    /// Checks a variance report.
    ///
    /// `missing_receipts` is the number of the budget's expenditures that
    /// carry no receipt reference.
    #[must_use]
    pub fn check(
        variance: &VarianceReport,
        missing_receipts: u64,
        now: DateTime<Utc>,
    ) -> ComplianceReport {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        if variance.unallocated < Decimal::ZERO {
            issues.push(ComplianceIssue::OverAllocated {
                excess: variance.unallocated.abs(),
            });
        }

        for line in &variance.lines {
            if line.available < Decimal::ZERO {
                issues.push(ComplianceIssue::OverSpent {
                    line_id: line.line_id,
                    category: line.category.clone(),
                    subcategory: line.subcategory.clone(),
                    overrun: line.available.abs(),
                });
            } else if line.utilization_pct > HIGH_UTILIZATION_PCT {
                warnings.push(ComplianceWarning::HighUtilization {
                    line_id: line.line_id,
                    category: line.category.clone(),
                    subcategory: line.subcategory.clone(),
                    utilization_pct: line.utilization_pct,
                });
            }
        }

        if missing_receipts > 0 {
            warnings.push(ComplianceWarning::MissingReceipts {
                count: missing_receipts,
            });
        }

        ComplianceReport {
            budget_id: variance.budget_id,
            compliant: issues.is_empty(),
            issues,
            warnings,
            checked_at: now,
        }
    }
}
