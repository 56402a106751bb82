//! Property-based tests for budget module.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use budgetry_shared::types::{BudgetId, BudgetLineId};

use super::compliance::{ComplianceIssue, ComplianceService};
use super::error::BudgetError;
use super::funds::FundsService;
use super::lifecycle::LifecycleService;
use super::types::{BudgetLine, BudgetStatus};
use super::variance::{LineStatus, VarianceService};

fn line(allocated: Decimal) -> BudgetLine {
    BudgetLine {
        id: BudgetLineId::new(),
        budget_id: BudgetId::new(),
        category: "Operations".to_string(),
        subcategory: "General".to_string(),
        allocated,
        spent: Decimal::ZERO,
        committed: Decimal::ZERO,
        created_at: Utc::now(),
    }
}

/// Cents in [1, 10_000_000.00].
fn amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn status() -> impl Strategy<Value = BudgetStatus> {
    prop::sample::select(BudgetStatus::ALL.to_vec())
}

#[derive(Debug, Clone, Copy)]
enum FundsOp {
    Spend(Decimal),
    Commit(Decimal),
}

fn funds_op() -> impl Strategy<Value = FundsOp> {
    prop_oneof![
        amount().prop_map(FundsOp::Spend),
        amount().prop_map(FundsOp::Commit),
    ]
}

proptest! {
    /// Any sequence of spends and commitments keeps spent + committed within allocation.
    #[test]
    fn prop_funds_never_exceed_allocation(
        allocated in amount(),
        ops in prop::collection::vec(funds_op(), 1..40),
    ) {
        let mut l = line(allocated);

        for op in ops {
            let before = l.clone();
            let result = match op {
                FundsOp::Spend(a) => FundsService::spend(&mut l, a),
                FundsOp::Commit(a) => FundsService::commit(&mut l, a),
            };

            match result {
                Ok(()) => {}
                Err(BudgetError::InsufficientFunds { requested, available }) => {
                    prop_assert!(requested > available);
                    prop_assert_eq!(&l, &before);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }

            prop_assert!(l.spent >= Decimal::ZERO);
            prop_assert!(l.committed >= Decimal::ZERO);
            prop_assert!(l.spent + l.committed <= l.allocated);
            prop_assert!(l.available() >= Decimal::ZERO);
        }
    }

    /// Spend applies exactly the requested amount to `spent` only.
    #[test]
    fn prop_spend_is_exact(allocated in amount(), requested in amount()) {
        let mut l = line(allocated);
        let result = FundsService::spend(&mut l, requested);

        if requested <= allocated {
            prop_assert!(result.is_ok());
            prop_assert_eq!(l.spent, requested);
            prop_assert_eq!(l.committed, Decimal::ZERO);
            prop_assert_eq!(l.available(), allocated - requested);
        } else {
            let is_insufficient = matches!(result, Err(BudgetError::InsufficientFunds { .. }));
            prop_assert!(is_insufficient);
            prop_assert_eq!(l.spent, Decimal::ZERO);
        }
    }

    /// Only the three forward transitions succeed; everything else is rejected.
    #[test]
    fn prop_transitions_are_forward_only(from in status()) {
        let now = Utc::now();

        let approve = LifecycleService::approve(from, "Treasurer", now);
        prop_assert_eq!(approve.is_ok(), from == BudgetStatus::Draft);

        let activate = LifecycleService::activate(from, now);
        prop_assert_eq!(activate.is_ok(), from == BudgetStatus::Approved);

        let close = LifecycleService::close(from, now);
        prop_assert_eq!(close.is_ok(), from == BudgetStatus::Active);

        for action in [approve, activate, close].into_iter().flatten() {
            prop_assert!(LifecycleService::is_valid_transition(from, action.new_status()));
            prop_assert!(action.new_status() > from);
        }
    }

    /// Line utilization is spent / allocated as a percentage with 2 dp.
    #[test]
    fn prop_utilization_bounds(allocated in amount(), fraction in 0u32..=100) {
        let mut l = line(allocated);
        let to_spend = (allocated * Decimal::from(fraction) / dec!(100)).round_dp(2);
        if to_spend > Decimal::ZERO {
            FundsService::spend(&mut l, to_spend).unwrap();
        }

        let pct = l.utilization_pct();
        prop_assert!(pct >= Decimal::ZERO);
        prop_assert!(pct <= dec!(100));
        prop_assert!(pct.scale() <= 2);
    }

    /// Variance totals are the sums of the lines, and compliance agrees with line tags.
    #[test]
    fn prop_variance_totals_and_compliance(
        total in amount(),
        figures in prop::collection::vec((amount(), 0u32..=120, 0u32..=50), 0..8),
    ) {
        let budget = LifecycleService::create_budget(
            super::types::CreateBudgetInput {
                title: "Property".to_string(),
                fiscal_year: 2026,
                total_amount: total,
                department: "Finance".to_string(),
                notes: String::new(),
            },
            Utc::now(),
        ).unwrap();

        let lines: Vec<BudgetLine> = figures
            .iter()
            .map(|(allocated, spent_pct, committed_pct)| {
                let mut l = line(*allocated);
                l.budget_id = budget.id;
                l.spent = (*allocated * Decimal::from(*spent_pct) / dec!(100)).round_dp(2);
                l.committed = (*allocated * Decimal::from(*committed_pct) / dec!(100)).round_dp(2);
                l
            })
            .collect();

        let report = VarianceService::compute(&budget, &lines).unwrap();
        let allocated: Decimal = lines.iter().map(|l| l.allocated).sum();
        let spent: Decimal = lines.iter().map(|l| l.spent).sum();

        prop_assert_eq!(report.total_allocated, allocated);
        prop_assert_eq!(report.total_spent, spent);
        prop_assert_eq!(report.unallocated, total - allocated);
        prop_assert_eq!(report.lines.len(), lines.len());

        let compliance = ComplianceService::check(&report, 0, Utc::now());
        let over_spent = compliance
            .issues
            .iter()
            .filter(|i| matches!(i, ComplianceIssue::OverSpent { .. }))
            .count();
        let over_budget = report
            .lines
            .iter()
            .filter(|l| l.status == LineStatus::OverBudget)
            .count();

        prop_assert_eq!(over_spent, over_budget);
        prop_assert_eq!(compliance.compliant, compliance.issues.is_empty());
        prop_assert_eq!(
            compliance.compliant,
            report.unallocated >= Decimal::ZERO && over_budget == 0
        );
    }
}
