//! End-to-end ledger tests against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

use budgetry_shared::types::{BudgetId, BudgetLineId, SpendPolicy};

use super::{BudgetLedger, InMemoryLedgerStore, LedgerSettings};
use crate::audit::AuditAction;
use crate::budget::{
    BudgetError, BudgetFilter, BudgetLine, BudgetOperation, BudgetStatus, CommitFundsInput,
    ComplianceIssue, ComplianceWarning, CreateBudgetInput, CreateBudgetLineInput, LineStatus,
    RecordExpenditureInput,
};

type Ledger = BudgetLedger<InMemoryLedgerStore>;

fn ledger() -> Ledger {
    ledger_with(SpendPolicy::AnyStatus)
}

fn ledger_with(spend_policy: SpendPolicy) -> Ledger {
    BudgetLedger::new(
        Arc::new(InMemoryLedgerStore::new(Duration::from_secs(5))),
        LedgerSettings {
            spend_policy,
            system_actor: "system".to_string(),
        },
    )
}

fn budget_input(department: &str, fiscal_year: i32, total_amount: Decimal) -> CreateBudgetInput {
    CreateBudgetInput {
        title: format!("{department} FY{fiscal_year}"),
        fiscal_year,
        total_amount,
        department: department.to_string(),
        notes: String::new(),
    }
}

fn line_input(category: &str, subcategory: &str, allocated: Decimal) -> CreateBudgetLineInput {
    CreateBudgetLineInput {
        category: category.to_string(),
        subcategory: subcategory.to_string(),
        allocated,
    }
}

fn spend(amount: Decimal) -> RecordExpenditureInput {
    RecordExpenditureInput {
        vendor: "Acme Supplies".to_string(),
        amount,
        description: "Materials".to_string(),
        approved_by: "Director".to_string(),
        date: None,
        receipt_ref: Some("RCPT-001".to_string()),
    }
}

fn commit(amount: Decimal) -> CommitFundsInput {
    CommitFundsInput {
        amount,
        description: "Purchase order".to_string(),
    }
}

/// Creates a budget with one line and walks it to `status`.
async fn budget_with_line(
    ledger: &Ledger,
    status: BudgetStatus,
    allocated: Decimal,
) -> (BudgetId, BudgetLine) {
    let budget = ledger
        .create_budget(budget_input("Public Works", 2026, dec!(1000000)))
        .await
        .unwrap();
    let line = ledger
        .add_line(budget.id, line_input("Infrastructure", "Roads", allocated))
        .await
        .unwrap();

    if status >= BudgetStatus::Approved {
        ledger.approve(budget.id, "Council").await.unwrap();
    }
    if status >= BudgetStatus::Active {
        ledger.activate(budget.id).await.unwrap();
    }
    if status >= BudgetStatus::Closed {
        ledger.close(budget.id).await.unwrap();
    }
    (budget.id, line)
}

#[tokio::test]
async fn test_full_lifecycle_with_audit_trail() {
    let ledger = ledger();
    let budget = ledger
        .create_budget(budget_input("Health", 2026, dec!(1000000)))
        .await
        .unwrap();
    assert_eq!(budget.status, BudgetStatus::Draft);

    let line = ledger
        .add_line(budget.id, line_input("Personnel", "Nurses", dec!(500000)))
        .await
        .unwrap();
    let approved = ledger.approve(budget.id, "City Council").await.unwrap();
    assert_eq!(approved.status, BudgetStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some("City Council"));
    assert!(approved.approved_at.is_some());

    assert_eq!(ledger.activate(budget.id).await.unwrap().status, BudgetStatus::Active);
    ledger.record_expenditure(line.id, spend(dec!(1250.5))).await.unwrap();
    ledger.commit_funds(line.id, commit(dec!(100))).await.unwrap();
    assert_eq!(ledger.close(budget.id).await.unwrap().status, BudgetStatus::Closed);

    let trail = ledger.audit_trail(budget.id).await.unwrap();
    let actions: Vec<AuditAction> = trail.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::CreateBudget,
            AuditAction::AddLine,
            AuditAction::ApproveBudget,
            AuditAction::ActivateBudget,
            AuditAction::RecordExpenditure,
            AuditAction::CommitFunds,
            AuditAction::CloseBudget,
        ]
    );
    assert!(trail.iter().all(|e| e.actor == "system"));
    assert_eq!(trail[0].details, "Budget for Health FY2026");
    assert_eq!(trail[1].details, "Personnel/Nurses: $500,000.00");
    assert_eq!(trail[2].details, "Approved by City Council");
    assert_eq!(trail[4].details, "Acme Supplies: $1,250.50 - Materials");
    assert_eq!(trail[5].details, "$100.00 - Purchase order");
}

#[tokio::test]
async fn test_unspent_line_variance() {
    let ledger = ledger();
    let budget = ledger
        .create_budget(budget_input("Education", 2026, dec!(1000000)))
        .await
        .unwrap();
    ledger
        .add_line(budget.id, line_input("Personnel", "Teachers", dec!(500000)))
        .await
        .unwrap();

    let report = ledger.compute_variance(budget.id).await.unwrap();
    assert_eq!(report.total_allocated, dec!(500000));
    assert_eq!(report.unallocated, dec!(500000));
    assert_eq!(report.overall_utilization_pct, Decimal::ZERO);
}

#[tokio::test]
async fn test_overspend_is_rejected_and_spent_unchanged() {
    let ledger = ledger();
    let (budget_id, line) = budget_with_line(&ledger, BudgetStatus::Active, dec!(10000)).await;

    let result = ledger.record_expenditure(line.id, spend(dec!(15000))).await;
    assert!(matches!(
        result,
        Err(BudgetError::InsufficientFunds { requested, available })
            if requested == dec!(15000) && available == dec!(10000)
    ));

    let lines = ledger.list_lines(budget_id).await.unwrap();
    assert_eq!(lines[0].spent, Decimal::ZERO);
    assert!(ledger.list_expenditures(budget_id).await.unwrap().is_empty());
    assert_eq!(ledger.audit_trail(budget_id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_spend_updates_variance() {
    let ledger = ledger();
    let (budget_id, line) = budget_with_line(&ledger, BudgetStatus::Active, dec!(300000)).await;

    let expenditure = ledger
        .record_expenditure(line.id, spend(dec!(50000)))
        .await
        .unwrap();
    assert_eq!(expenditure.category, "Infrastructure");
    assert_eq!(expenditure.line_id, line.id);

    let report = ledger.compute_variance(budget_id).await.unwrap();
    assert_eq!(report.total_spent, dec!(50000));
    assert_eq!(report.lines[0].utilization_pct, dec!(16.67));
    assert_eq!(report.lines[0].status, LineStatus::Ok);
}

#[tokio::test]
async fn test_missing_receipt_warning() {
    let ledger = ledger();
    let (budget_id, line) = budget_with_line(&ledger, BudgetStatus::Active, dec!(1000)).await;

    let mut input = spend(dec!(10));
    input.receipt_ref = None;
    ledger.record_expenditure(line.id, input).await.unwrap();
    ledger.record_expenditure(line.id, spend(dec!(10))).await.unwrap();

    let report = ledger.check_compliance(budget_id).await.unwrap();
    assert!(report.compliant);
    let missing: Vec<&ComplianceWarning> = report
        .warnings
        .iter()
        .filter(|w| matches!(w, ComplianceWarning::MissingReceipts { .. }))
        .collect();
    assert_eq!(missing, vec![&ComplianceWarning::MissingReceipts { count: 1 }]);
}

#[tokio::test]
async fn test_over_allocation_is_detected_not_prevented() {
    let ledger = ledger();
    let budget = ledger
        .create_budget(budget_input("Parks", 2026, dec!(1000)))
        .await
        .unwrap();
    ledger
        .add_line(budget.id, line_input("Maintenance", "Mowing", dec!(800)))
        .await
        .unwrap();
    ledger
        .add_line(budget.id, line_input("Maintenance", "Trails", dec!(700)))
        .await
        .unwrap();

    let report = ledger.check_compliance(budget.id).await.unwrap();
    assert!(!report.compliant);
    assert_eq!(
        report.issues,
        vec![ComplianceIssue::OverAllocated { excess: dec!(500) }]
    );
}

#[rstest]
#[case(BudgetStatus::Draft)]
#[case(BudgetStatus::Approved)]
#[case(BudgetStatus::Active)]
#[case(BudgetStatus::Closed)]
#[tokio::test]
async fn test_out_of_order_transitions_leave_status_unchanged(#[case] status: BudgetStatus) {
    let ledger = ledger();
    let (budget_id, _) = budget_with_line(&ledger, status, dec!(100)).await;

    if status != BudgetStatus::Draft {
        assert!(matches!(
            ledger.approve(budget_id, "Council").await,
            Err(BudgetError::InvalidState { operation: BudgetOperation::Approve, .. })
        ));
    }
    if status != BudgetStatus::Approved {
        assert!(matches!(
            ledger.activate(budget_id).await,
            Err(BudgetError::InvalidState { operation: BudgetOperation::Activate, .. })
        ));
    }
    if status != BudgetStatus::Active {
        assert!(matches!(
            ledger.close(budget_id).await,
            Err(BudgetError::InvalidState { operation: BudgetOperation::Close, .. })
        ));
    }

    assert_eq!(ledger.get_budget(budget_id).await.unwrap().status, status);
}

#[rstest]
#[case(BudgetStatus::Active)]
#[case(BudgetStatus::Closed)]
#[tokio::test]
async fn test_add_line_rejected_after_activation(#[case] status: BudgetStatus) {
    let ledger = ledger();
    let (budget_id, _) = budget_with_line(&ledger, status, dec!(100)).await;

    let result = ledger
        .add_line(budget_id, line_input("Equipment", "Radios", dec!(50)))
        .await;
    assert!(matches!(
        result,
        Err(BudgetError::InvalidState { operation: BudgetOperation::AddLine, status: s }) if s == status
    ));
    assert_eq!(ledger.list_lines(budget_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_add_line_touches_budget() {
    let ledger = ledger();
    let budget = ledger
        .create_budget(budget_input("Library", 2026, dec!(100)))
        .await
        .unwrap();
    let line = ledger
        .add_line(budget.id, line_input("Books", "Fiction", dec!(10)))
        .await
        .unwrap();

    let stored = ledger.get_budget(budget.id).await.unwrap();
    assert_eq!(stored.updated_at, line.created_at);
}

#[tokio::test]
async fn test_blank_approver_rejected() {
    let ledger = ledger();
    let (budget_id, _) = budget_with_line(&ledger, BudgetStatus::Draft, dec!(100)).await;

    assert!(matches!(
        ledger.approve(budget_id, "  ").await,
        Err(BudgetError::InvalidInput(_))
    ));
    assert_eq!(ledger.get_budget(budget_id).await.unwrap().status, BudgetStatus::Draft);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let ledger = ledger();
    let budget_id = BudgetId::new();
    let line_id = BudgetLineId::new();

    assert!(matches!(ledger.approve(budget_id, "x").await, Err(BudgetError::NotFound(_))));
    assert!(matches!(
        ledger.add_line(budget_id, line_input("a", "b", dec!(1))).await,
        Err(BudgetError::NotFound(_))
    ));
    assert!(matches!(ledger.compute_variance(budget_id).await, Err(BudgetError::NotFound(_))));
    assert!(matches!(ledger.check_compliance(budget_id).await, Err(BudgetError::NotFound(_))));
    assert!(matches!(ledger.list_expenditures(budget_id).await, Err(BudgetError::NotFound(_))));
    assert!(matches!(
        ledger.record_expenditure(line_id, spend(dec!(1))).await,
        Err(BudgetError::LineNotFound(_))
    ));
    assert!(matches!(
        ledger.commit_funds(line_id, commit(dec!(1))).await,
        Err(BudgetError::LineNotFound(_))
    ));
}

#[rstest]
#[case(dec!(0))]
#[case(dec!(-1))]
#[case(dec!(12.34567))]
#[case(dec!(0.00001))]
#[case(Decimal::MAX)]
#[tokio::test]
async fn test_invalid_amounts_rejected(#[case] amount: Decimal) {
    let ledger = ledger();
    let (budget_id, line) = budget_with_line(&ledger, BudgetStatus::Active, dec!(100)).await;

    assert!(matches!(
        ledger.record_expenditure(line.id, spend(amount)).await,
        Err(BudgetError::InvalidInput(_))
    ));
    assert!(matches!(
        ledger.commit_funds(line.id, commit(amount)).await,
        Err(BudgetError::InvalidInput(_))
    ));

    let lines = ledger.list_lines(budget_id).await.unwrap();
    assert_eq!(lines[0].spent, Decimal::ZERO);
    assert_eq!(lines[0].committed, Decimal::ZERO);
}

#[tokio::test]
async fn test_oversized_amounts_rejected_and_analysis_still_runs() {
    let ledger = ledger();
    assert!(matches!(
        ledger
            .create_budget(budget_input("Treasury", 2026, Decimal::MAX))
            .await,
        Err(BudgetError::InvalidInput(_))
    ));

    let budget = ledger
        .create_budget(budget_input("Treasury", 2026, dec!(100)))
        .await
        .unwrap();
    let half = Decimal::MAX / dec!(2) + Decimal::ONE;
    for subcategory in ["Reserve", "Contingency"] {
        assert!(matches!(
            ledger
                .add_line(budget.id, line_input("Funds", subcategory, half))
                .await,
            Err(BudgetError::InvalidInput(_))
        ));
    }

    let report = ledger.compute_variance(budget.id).await.unwrap();
    assert!(report.lines.is_empty());
    let stats = ledger.budget_stats().await.unwrap();
    assert_eq!(stats.total_budgets, 1);
    assert_eq!(stats.total_budget_amount, dec!(100));
}

#[tokio::test]
async fn test_largest_amounts_aggregate_without_overflow() {
    let ledger = ledger();
    let largest = dec!(999999999999999.9999);
    let mut budget_id = None;
    for department in ["Treasury", "Pensions", "Defense"] {
        let budget = ledger
            .create_budget(budget_input(department, 2026, largest))
            .await
            .unwrap();
        for subcategory in ["Reserve", "Contingency", "Transfers"] {
            ledger
                .add_line(budget.id, line_input("Funds", subcategory, largest))
                .await
                .unwrap();
        }
        budget_id = Some(budget.id);
    }
    let budget_id = budget_id.unwrap();

    let report = ledger.compute_variance(budget_id).await.unwrap();
    assert_eq!(report.total_allocated, largest * dec!(3));
    assert_eq!(report.unallocated, largest - largest * dec!(3));
    ledger.check_compliance(budget_id).await.unwrap();
    ledger.executive_summary(budget_id).await.unwrap();

    let stats = ledger.budget_stats().await.unwrap();
    assert_eq!(stats.total_budget_amount, largest * dec!(3));
    assert_eq!(stats.overall_utilization_pct, Decimal::ZERO);
}

#[tokio::test]
async fn test_commitment_blocks_spend_until_available() {
    let ledger = ledger();
    let (budget_id, line) = budget_with_line(&ledger, BudgetStatus::Active, dec!(1000)).await;

    let updated = ledger.commit_funds(line.id, commit(dec!(800))).await.unwrap();
    assert_eq!(updated.committed, dec!(800));
    assert_eq!(updated.available(), dec!(200));

    assert!(matches!(
        ledger.record_expenditure(line.id, spend(dec!(200.01))).await,
        Err(BudgetError::InsufficientFunds { .. })
    ));
    ledger.record_expenditure(line.id, spend(dec!(200))).await.unwrap();

    let lines = ledger.list_lines(budget_id).await.unwrap();
    assert_eq!(lines[0].committed, dec!(800));
    assert_eq!(lines[0].spent, dec!(200));
    assert_eq!(lines[0].available(), Decimal::ZERO);
}

#[rstest]
#[case(SpendPolicy::AnyStatus, BudgetStatus::Draft, true)]
#[case(SpendPolicy::AnyStatus, BudgetStatus::Closed, true)]
#[case(SpendPolicy::ActiveOnly, BudgetStatus::Approved, false)]
#[case(SpendPolicy::ActiveOnly, BudgetStatus::Active, true)]
#[case(SpendPolicy::ActiveOnly, BudgetStatus::Closed, false)]
#[tokio::test]
async fn test_spend_policy_gates_funds_operations(
    #[case] policy: SpendPolicy,
    #[case] status: BudgetStatus,
    #[case] allowed: bool,
) {
    let ledger = ledger_with(policy);
    let (_, line) = budget_with_line(&ledger, status, dec!(100)).await;

    let spent = ledger.record_expenditure(line.id, spend(dec!(10))).await;
    let committed = ledger.commit_funds(line.id, commit(dec!(10))).await;

    if allowed {
        assert!(spent.is_ok());
        assert!(committed.is_ok());
    } else {
        assert!(matches!(
            spent,
            Err(BudgetError::InvalidState { operation: BudgetOperation::RecordExpenditure, .. })
        ));
        assert!(matches!(
            committed,
            Err(BudgetError::InvalidState { operation: BudgetOperation::CommitFunds, .. })
        ));
    }
}

#[tokio::test]
async fn test_list_budgets_filters_newest_first() {
    let ledger = ledger();
    let first = ledger
        .create_budget(budget_input("Fire", 2025, dec!(10)))
        .await
        .unwrap();
    let second = ledger
        .create_budget(budget_input("Fire", 2026, dec!(20)))
        .await
        .unwrap();
    ledger
        .create_budget(budget_input("Police", 2026, dec!(30)))
        .await
        .unwrap();

    let fire = ledger
        .list_budgets(BudgetFilter {
            department: Some("Fire".to_string()),
            fiscal_year: None,
        })
        .await
        .unwrap();
    let ids: Vec<BudgetId> = fire.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let fy2026 = ledger
        .list_budgets(BudgetFilter {
            department: None,
            fiscal_year: Some(2026),
        })
        .await
        .unwrap();
    assert_eq!(fy2026.len(), 2);
    assert_eq!(ledger.list_budgets(BudgetFilter::default()).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_expenditures_listed_newest_date_first() {
    let ledger = ledger();
    let (budget_id, line) = budget_with_line(&ledger, BudgetStatus::Active, dec!(1000)).await;

    for day in [3, 10, 1] {
        let mut input = spend(dec!(5));
        input.date = chrono::NaiveDate::from_ymd_opt(2026, 2, day);
        ledger.record_expenditure(line.id, input).await.unwrap();
    }

    let days: Vec<u32> = ledger
        .list_expenditures(budget_id)
        .await
        .unwrap()
        .iter()
        .map(|e| chrono::Datelike::day(&e.date))
        .collect();
    assert_eq!(days, vec![10, 3, 1]);
}

#[tokio::test]
async fn test_budget_stats() {
    let ledger = ledger();
    let (_, line) = budget_with_line(&ledger, BudgetStatus::Active, dec!(300000)).await;
    ledger
        .record_expenditure(line.id, spend(dec!(50000)))
        .await
        .unwrap();
    ledger
        .create_budget(budget_input("Transit", 2026, dec!(1000000)))
        .await
        .unwrap();

    let stats = ledger.budget_stats().await.unwrap();
    assert_eq!(stats.total_budgets, 2);
    assert_eq!(stats.total_budget_amount, dec!(2000000));
    assert_eq!(stats.total_spent, dec!(50000));
    assert_eq!(stats.overall_utilization_pct, dec!(2.5));
    assert_eq!(stats.by_status[&BudgetStatus::Draft], 1);
    assert_eq!(stats.by_status[&BudgetStatus::Active], 1);
    assert_eq!(stats.by_status[&BudgetStatus::Closed], 0);
}

#[tokio::test]
async fn test_executive_summary_renders() {
    let ledger = ledger();
    let (budget_id, line) = budget_with_line(&ledger, BudgetStatus::Active, dec!(300000)).await;
    ledger
        .record_expenditure(line.id, spend(dec!(50000)))
        .await
        .unwrap();

    let text = ledger.executive_summary(budget_id).await.unwrap();
    assert!(text.contains("BUDGET EXECUTIVE SUMMARY"));
    assert!(text.contains("Public Works"));
    assert!(text.contains("Infrastructure/Roads"));
    assert!(text.contains("COMPLIANT"));
}

/// N concurrent spends of slightly more than allocated / N: exactly N - 1 fit.
#[rstest]
#[case(2)]
#[case(8)]
#[case(16)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_spends_never_overdraw(#[case] n: u32) {
    let ledger = ledger();
    let allocated = dec!(1000);
    let (budget_id, line) = budget_with_line(&ledger, BudgetStatus::Active, allocated).await;
    let amount = allocated / Decimal::from(n) + dec!(0.01);

    let barrier = Arc::new(Barrier::new(n as usize));
    let tasks = (0..n).map(|_| {
        let ledger = ledger.clone();
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            ledger.record_expenditure(line.id, spend(amount)).await
        })
    });

    let results: Vec<Result<_, BudgetError>> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(BudgetError::InsufficientFunds { .. })))
        .count();
    assert_eq!(successes, n as usize - 1);
    assert_eq!(insufficient, 1);

    let lines = ledger.list_lines(budget_id).await.unwrap();
    assert!(lines[0].spent <= allocated);
    assert_eq!(lines[0].spent, amount * Decimal::from(n - 1));
    assert_eq!(
        ledger.list_expenditures(budget_id).await.unwrap().len(),
        n as usize - 1
    );
}

#[tokio::test]
async fn test_concurrent_commits_and_spends_respect_allocation() {
    let ledger = ledger();
    let (budget_id, line) = budget_with_line(&ledger, BudgetStatus::Active, dec!(500)).await;

    let tasks = (0..20).map(|i| {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            if i % 2 == 0 {
                ledger.commit_funds(line.id, commit(dec!(37))).await.map(|_| ())
            } else {
                ledger.record_expenditure(line.id, spend(dec!(41))).await.map(|_| ())
            }
        })
    });
    join_all(tasks).await;

    let lines = ledger.list_lines(budget_id).await.unwrap();
    assert!(lines[0].spent + lines[0].committed <= lines[0].allocated);
}
