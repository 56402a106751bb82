//! Budget ledger service.
//!
//! Orchestrates the lifecycle state machine and funds engine against a
//! [`LedgerStore`]. Validation runs inside the store's atomic unit; the
//! service only builds the closures and the audit entries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use budgetry_shared::config::LedgerConfig;
use budgetry_shared::types::{BudgetId, BudgetLineId, SpendPolicy};

use super::store::{LedgerStore, LineMutation};
use crate::audit::{AuditAction, AuditEntry};
use crate::budget::{
    Budget, BudgetError, BudgetFilter, BudgetLine, BudgetOperation, BudgetStatus,
    CommitFundsInput, ComplianceReport, ComplianceService, CreateBudgetInput,
    CreateBudgetLineInput, Expenditure, FundsService, LifecycleAction, LifecycleService,
    RecordExpenditureInput, VarianceReport, VarianceService,
};
use crate::reports::format::format_dollars;
use crate::reports::{BudgetStats, ExecutiveSummary};

/// Runtime settings for [`BudgetLedger`].
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Which budget statuses accept expenditures and commitments.
    pub spend_policy: SpendPolicy,
    /// Actor recorded on audit entries.
    pub system_actor: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl From<&LedgerConfig> for LedgerSettings {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            spend_policy: config.spend_policy,
            system_actor: config.system_actor.clone(),
        }
    }
}

/// The budget ledger.
pub struct BudgetLedger<S: LedgerStore> {
    store: Arc<S>,
    settings: LedgerSettings,
}

impl<S: LedgerStore> Clone for BudgetLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings.clone(),
        }
    }
}

impl<S: LedgerStore> BudgetLedger<S> {
    /// Creates a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<S>, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Creates a budget in Draft status.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidInput` if the total amount is negative or
    /// out of the persistable range.
    pub async fn create_budget(&self, input: CreateBudgetInput) -> Result<Budget, BudgetError> {
        let now = Utc::now();
        let budget = LifecycleService::create_budget(input, now)?;
        let audit = AuditEntry::new(
            budget.id,
            AuditAction::CreateBudget,
            format!("Budget for {} FY{}", budget.department, budget.fiscal_year),
            self.actor(),
            now,
        );

        let budget = self.store.insert_budget(budget, audit).await?;
        info!(
            budget_id = %budget.id,
            department = %budget.department,
            fiscal_year = budget.fiscal_year,
            total_amount = %budget.total_amount,
            "Budget created"
        );
        Ok(budget)
    }

    /// Adds a line to a Draft or Approved budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound`, `BudgetError::InvalidState`, or
    /// `BudgetError::InvalidInput`.
    pub async fn add_line(
        &self,
        budget_id: BudgetId,
        input: CreateBudgetLineInput,
    ) -> Result<BudgetLine, BudgetError> {
        let actor = self.actor();
        let now = Utc::now();

        let line = self
            .store
            .insert_line(budget_id, move |budget| {
                let line = LifecycleService::new_line(budget, input, now)?;
                budget.updated_at = now;
                let audit = AuditEntry::new(
                    budget.id,
                    AuditAction::AddLine,
                    format!(
                        "{}/{}: {}",
                        line.category,
                        line.subcategory,
                        format_dollars(line.allocated)
                    ),
                    actor,
                    now,
                );
                Ok((line, audit))
            })
            .await?;

        info!(
            budget_id = %budget_id,
            line_id = %line.id,
            category = %line.category,
            subcategory = %line.subcategory,
            allocated = %line.allocated,
            "Budget line added"
        );
        Ok(line)
    }

    /// Approves a Draft budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound`, `BudgetError::InvalidState`, or
    /// `BudgetError::InvalidInput` for a blank approver.
    pub async fn approve(&self, budget_id: BudgetId, approved_by: &str) -> Result<Budget, BudgetError> {
        let approved_by = approved_by.to_string();
        self.transition(budget_id, move |status, now| {
            LifecycleService::approve(status, &approved_by, now)
        })
        .await
    }

    /// Activates an Approved budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` or `BudgetError::InvalidState`.
    pub async fn activate(&self, budget_id: BudgetId) -> Result<Budget, BudgetError> {
        self.transition(budget_id, LifecycleService::activate).await
    }

    /// Closes an Active budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` or `BudgetError::InvalidState`.
    pub async fn close(&self, budget_id: BudgetId) -> Result<Budget, BudgetError> {
        self.transition(budget_id, LifecycleService::close).await
    }

    async fn transition<F>(&self, budget_id: BudgetId, decide: F) -> Result<Budget, BudgetError>
    where
        F: FnOnce(BudgetStatus, DateTime<Utc>) -> Result<LifecycleAction, BudgetError> + Send,
    {
        let actor = self.actor();
        let now = Utc::now();

        let budget = self
            .store
            .update_budget(budget_id, move |budget| {
                let action = decide(budget.status, now)?;
                action.apply(budget);
                Ok(AuditEntry::new(
                    budget.id,
                    action.audit_action(),
                    action.audit_details(),
                    actor,
                    action.occurred_at(),
                ))
            })
            .await?;

        info!(budget_id = %budget.id, status = %budget.status, "Budget status changed");
        Ok(budget)
    }

    /// Records an expenditure against a line.
    ///
    /// The availability check and the increment of `spent` happen in one
    /// atomic unit.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidInput` for a non-positive or unpersistable amount,
    /// `BudgetError::LineNotFound`, `BudgetError::InsufficientFunds`, or
    /// `BudgetError::InvalidState` when the spend policy forbids it.
    pub async fn record_expenditure(
        &self,
        line_id: BudgetLineId,
        input: RecordExpenditureInput,
    ) -> Result<Expenditure, BudgetError> {
        FundsService::validate_amount(input.amount)
            .inspect_err(|e| Self::log_rejection(line_id, input.amount, e))?;

        let policy = self.settings.spend_policy;
        let actor = self.actor();
        let now = Utc::now();
        let amount = input.amount;

        let result = self
            .store
            .update_line(line_id, move |budget, line| {
                FundsService::check_policy(policy, budget.status, BudgetOperation::RecordExpenditure)?;
                FundsService::spend(line, input.amount)?;
                let details = format!(
                    "{}: {} - {}",
                    input.vendor,
                    format_dollars(input.amount),
                    input.description
                );
                let expenditure = FundsService::expenditure_for(line, input, now.date_naive(), now);
                Ok(LineMutation {
                    expenditure: Some(expenditure),
                    audit: AuditEntry::new(
                        budget.id,
                        AuditAction::RecordExpenditure,
                        details,
                        actor,
                        now,
                    ),
                })
            })
            .await;

        let outcome = result.inspect_err(|e| Self::log_rejection(line_id, amount, e))?;
        let expenditure = outcome.expenditure.ok_or_else(|| {
            BudgetError::Database("store did not return the recorded expenditure".to_string())
        })?;

        info!(
            line_id = %line_id,
            expenditure_id = %expenditure.id,
            vendor = %expenditure.vendor,
            amount = %expenditure.amount,
            available = %outcome.line.available(),
            "Expenditure recorded"
        );
        Ok(expenditure)
    }

    /// Commits (encumbers) funds on a line.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidInput` for a non-positive or unpersistable amount,
    /// `BudgetError::LineNotFound`, `BudgetError::InsufficientFunds`, or
    /// `BudgetError::InvalidState` when the spend policy forbids it.
    pub async fn commit_funds(
        &self,
        line_id: BudgetLineId,
        input: CommitFundsInput,
    ) -> Result<BudgetLine, BudgetError> {
        FundsService::validate_amount(input.amount)
            .inspect_err(|e| Self::log_rejection(line_id, input.amount, e))?;

        let policy = self.settings.spend_policy;
        let actor = self.actor();
        let now = Utc::now();
        let amount = input.amount;

        let result = self
            .store
            .update_line(line_id, move |budget, line| {
                FundsService::check_policy(policy, budget.status, BudgetOperation::CommitFunds)?;
                FundsService::commit(line, input.amount)?;
                Ok(LineMutation {
                    expenditure: None,
                    audit: AuditEntry::new(
                        budget.id,
                        AuditAction::CommitFunds,
                        format!("{} - {}", format_dollars(input.amount), input.description),
                        actor,
                        now,
                    ),
                })
            })
            .await;

        let outcome = result.inspect_err(|e| Self::log_rejection(line_id, amount, e))?;
        info!(
            line_id = %line_id,
            amount = %amount,
            committed = %outcome.line.committed,
            available = %outcome.line.available(),
            "Funds committed"
        );
        Ok(outcome.line)
    }

    fn log_rejection(line_id: BudgetLineId, amount: Decimal, err: &BudgetError) {
        match err {
            BudgetError::InsufficientFunds { available, .. } => {
                warn!(
                    line_id = %line_id,
                    amount = %amount,
                    available = %available,
                    error_code = err.error_code(),
                    "Insufficient funds"
                );
            }
            BudgetError::InvalidState { status, .. } => {
                warn!(
                    line_id = %line_id,
                    status = %status,
                    error_code = err.error_code(),
                    "Funds operation rejected by spend policy"
                );
            }
            BudgetError::InvalidInput(reason) => {
                warn!(line_id = %line_id, reason = %reason, error_code = err.error_code(), "Invalid amount");
            }
            BudgetError::TransientStoreFailure(reason) => {
                warn!(
                    line_id = %line_id,
                    reason = %reason,
                    error_code = err.error_code(),
                    "Store busy"
                );
            }
            BudgetError::NotFound(_) | BudgetError::LineNotFound(_) | BudgetError::Database(_) => {}
        }
    }

    /// Computes planned vs actual figures for a budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the budget does not exist, or
    /// `BudgetError::InvalidInput` if its totals overflow.
    pub async fn compute_variance(&self, budget_id: BudgetId) -> Result<VarianceReport, BudgetError> {
        let snapshot = self
            .store
            .snapshot(budget_id)
            .await?
            .ok_or(BudgetError::NotFound(budget_id))?;
        VarianceService::compute(&snapshot.budget, &snapshot.lines)
    }

    /// Runs the compliance checks for a budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the budget does not exist.
    pub async fn check_compliance(&self, budget_id: BudgetId) -> Result<ComplianceReport, BudgetError> {
        Ok(self.analyze(budget_id).await?.1)
    }

    async fn analyze(
        &self,
        budget_id: BudgetId,
    ) -> Result<(VarianceReport, ComplianceReport), BudgetError> {
        let snapshot = self
            .store
            .snapshot(budget_id)
            .await?
            .ok_or(BudgetError::NotFound(budget_id))?;
        let variance = VarianceService::compute(&snapshot.budget, &snapshot.lines)?;
        let compliance = ComplianceService::check(&variance, snapshot.missing_receipts, Utc::now());

        debug!(
            budget_id = %budget_id,
            compliant = compliance.compliant,
            issues = compliance.issues.len(),
            warnings = compliance.warnings.len(),
            "Compliance checked"
        );
        Ok((variance, compliance))
    }

    /// Renders the executive summary text report for a budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the budget does not exist.
    pub async fn executive_summary(&self, budget_id: BudgetId) -> Result<String, BudgetError> {
        let (variance, compliance) = self.analyze(budget_id).await?;
        Ok(ExecutiveSummary::new(&variance, &compliance).to_string())
    }

    /// Finds a budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the budget does not exist.
    pub async fn get_budget(&self, budget_id: BudgetId) -> Result<Budget, BudgetError> {
        self.store
            .budget(budget_id)
            .await?
            .ok_or(BudgetError::NotFound(budget_id))
    }

    /// Lists budgets, newest first.
    pub async fn list_budgets(&self, filter: BudgetFilter) -> Result<Vec<Budget>, BudgetError> {
        let budgets = self.store.list_budgets(filter).await?;
        debug!(count = budgets.len(), "Budgets listed");
        Ok(budgets)
    }

    /// Lists the lines of a budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the budget does not exist.
    pub async fn list_lines(&self, budget_id: BudgetId) -> Result<Vec<BudgetLine>, BudgetError> {
        self.get_budget(budget_id).await?;
        self.store.lines(budget_id).await
    }

    /// Lists the expenditures of a budget, most recent date first.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the budget does not exist.
    pub async fn list_expenditures(&self, budget_id: BudgetId) -> Result<Vec<Expenditure>, BudgetError> {
        self.get_budget(budget_id).await?;
        self.store.expenditures(budget_id).await
    }

    /// Returns the audit trail of a budget, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the budget does not exist.
    pub async fn audit_trail(&self, budget_id: BudgetId) -> Result<Vec<AuditEntry>, BudgetError> {
        self.get_budget(budget_id).await?;
        self.store.audit_trail(budget_id).await
    }

    /// Computes ledger-wide statistics.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidInput` if the ledger totals overflow.
    pub async fn budget_stats(&self) -> Result<BudgetStats, BudgetError> {
        let totals = self.store.totals().await?;
        Ok(BudgetStats::from_totals(&totals))
    }

    fn actor(&self) -> String {
        self.settings.system_actor.clone()
    }
}
