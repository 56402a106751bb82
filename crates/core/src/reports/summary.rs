//! Executive summary text report.

use std::fmt;

use rust_decimal::Decimal;

use crate::budget::{ComplianceReport, LineStatus, VarianceReport};

use super::format::{format_amount, format_dollars, format_pct};

const RULE_WIDTH: usize = 65;
const SECTION_WIDTH: usize = 40;

/// Fixed-width executive summary of a budget's variance and compliance.
///
/// Rendered through `Display`.
pub struct ExecutiveSummary<'a> {
    variance: &'a VarianceReport,
    compliance: &'a ComplianceReport,
}

impl<'a> ExecutiveSummary<'a> {
    /// Creates a summary over the two reports of the same budget.
    #[must_use]
    pub fn new(variance: &'a VarianceReport, compliance: &'a ComplianceReport) -> Self {
        Self {
            variance,
            compliance,
        }
    }

    fn write_money(f: &mut fmt::Formatter<'_>, label: &str, amount: Decimal) -> fmt::Result {
        writeln!(f, "  {label:<15}: ${:>15}", format_amount(amount))
    }
}

impl fmt::Display for ExecutiveSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.variance;
        let c = self.compliance;
        let rule = "=".repeat(RULE_WIDTH);
        let section = "-".repeat(SECTION_WIDTH);

        writeln!(f, "{rule}")?;
        writeln!(f, "BUDGET EXECUTIVE SUMMARY")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Budget Title    : {}", v.title)?;
        writeln!(f, "Department      : {}", v.department)?;
        writeln!(f, "Fiscal Year     : {}", v.fiscal_year)?;
        writeln!(f, "Status          : {}", v.status.as_str().to_uppercase())?;
        writeln!(f)?;

        writeln!(f, "FINANCIAL OVERVIEW")?;
        writeln!(f, "{section}")?;
        Self::write_money(f, "Total Budget", v.total_budget)?;
        Self::write_money(f, "Total Allocated", v.total_allocated)?;
        Self::write_money(f, "Total Spent", v.total_spent)?;
        Self::write_money(f, "Total Committed", v.total_committed)?;
        Self::write_money(f, "Available", v.total_available)?;
        writeln!(
            f,
            "  {:<15}: {:>14}%",
            "Utilization",
            format_pct(v.overall_utilization_pct)
        )?;
        writeln!(f)?;

        writeln!(f, "LINE ITEMS")?;
        writeln!(f, "{section}")?;
        for line in &v.lines {
            let flag = match line.status {
                LineStatus::Ok => "✓",
                LineStatus::Warning => "⚠",
                LineStatus::OverBudget => "🔴",
            };
            writeln!(f, "  {flag} {}/{}", line.category, line.subcategory)?;
            writeln!(
                f,
                "      Allocated: {} | Spent: {} | {}%",
                format_dollars(line.allocated),
                format_dollars(line.spent),
                format_pct(line.utilization_pct)
            )?;
        }
        writeln!(f)?;

        writeln!(f, "COMPLIANCE STATUS")?;
        writeln!(f, "{section}")?;
        let status = if c.compliant {
            "COMPLIANT ✓"
        } else {
            "NON-COMPLIANT ✗"
        };
        writeln!(f, "  Status  : {status}")?;
        if !c.issues.is_empty() {
            writeln!(f, "  Issues:")?;
            for issue in &c.issues {
                writeln!(f, "    🔴 {issue}")?;
            }
        }
        if !c.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &c.warnings {
                writeln!(f, "    ⚠ {warning}")?;
            }
        }
        write!(f, "{rule}")
    }
}
