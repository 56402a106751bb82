//! Funds ledger arithmetic.
//!
//! Every spend or commitment is checked against the line's available amount
//! and applied to exactly one accumulator. Committed and spent are
//! independent: recording an expenditure never releases a commitment.
//!
//! These functions are pure. Callers must run check and increment inside
//! one atomic unit of the store, otherwise two requests can both pass the
//! check against the same stale line.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use budgetry_shared::types::{ExpenditureId, SpendPolicy};

use super::error::{BudgetError, BudgetOperation};
use super::types::{BudgetLine, BudgetStatus, Expenditure, RecordExpenditureInput, validate_money};

/// Stateless service for funds arithmetic.
pub struct FundsService;

impl FundsService {
    /// Checks the spend policy against the budget status.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidState` when the policy forbids spending
    /// in the current status.
    pub fn check_policy(
        policy: SpendPolicy,
        status: BudgetStatus,
        operation: BudgetOperation,
    ) -> Result<(), BudgetError> {
        match (policy, status) {
            (SpendPolicy::AnyStatus, _) | (SpendPolicy::ActiveOnly, BudgetStatus::Active) => {
                Ok(())
            }
            (
                SpendPolicy::ActiveOnly,
                BudgetStatus::Draft | BudgetStatus::Approved | BudgetStatus::Closed,
            ) => Err(BudgetError::InvalidState { operation, status }),
        }
    }

    /// Validates that an amount is strictly positive and persistable.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidInput` for zero or negative amounts,
    /// amounts not below `MAX_AMOUNT`, and amounts with more than four
    /// decimal places.
    pub fn validate_amount(amount: Decimal) -> Result<(), BudgetError> {
        if amount <= Decimal::ZERO {
            return Err(BudgetError::InvalidInput(format!(
                "amount must be positive, got {amount}"
            )));
        }
        validate_money("amount", amount)
    }

    /// Ensures the line can absorb `amount`.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InsufficientFunds` if `amount` exceeds what is available.
    pub fn ensure_available(line: &BudgetLine, amount: Decimal) -> Result<(), BudgetError> {
        let available = line.available();
        if amount > available {
            return Err(BudgetError::InsufficientFunds {
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    /// Adds `amount` to the line's spent accumulator after validation.
    ///
    /// The line is untouched when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidInput` or `BudgetError::InsufficientFunds`.
    pub fn spend(line: &mut BudgetLine, amount: Decimal) -> Result<(), BudgetError> {
        Self::validate_amount(amount)?;
        Self::ensure_available(line, amount)?;
        line.spent += amount;
        Ok(())
    }

    /// Adds `amount` to the line's committed accumulator after validation.
    ///
    /// The line is untouched when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidInput` or `BudgetError::InsufficientFunds`.
    pub fn commit(line: &mut BudgetLine, amount: Decimal) -> Result<(), BudgetError> {
        Self::validate_amount(amount)?;
        Self::ensure_available(line, amount)?;
        line.committed += amount;
        Ok(())
    }

    /// Builds the expenditure record for a spend against `line`.
    ///
    /// The line category is copied so reports do not depend on the line later.
    #[must_use]
    pub fn expenditure_for(
        line: &BudgetLine,
        input: RecordExpenditureInput,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Expenditure {
        Expenditure {
            id: ExpenditureId::new(),
            line_id: line.id,
            vendor: input.vendor,
            amount: input.amount,
            description: input.description,
            approved_by: input.approved_by,
            date: input.date.unwrap_or(today),
            created_at: now,
            receipt_ref: input.receipt_ref,
            category: line.category.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use budgetry_shared::types::{BudgetId, BudgetLineId};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn line(allocated: Decimal) -> BudgetLine {
        BudgetLine {
            id: BudgetLineId::new(),
            budget_id: BudgetId::new(),
            category: "Equipment".to_string(),
            subcategory: "Vehicles".to_string(),
            allocated,
            spent: Decimal::ZERO,
            committed: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    fn spend_input(amount: Decimal) -> RecordExpenditureInput {
        RecordExpenditureInput {
            vendor: "Acme Motors".to_string(),
            amount,
            description: "Patrol car".to_string(),
            approved_by: "Fleet Manager".to_string(),
            date: None,
            receipt_ref: None,
        }
    }

    #[test]
    fn test_spend_within_allocation() {
        let mut l = line(dec!(300000));
        FundsService::spend(&mut l, dec!(50000)).unwrap();
        assert_eq!(l.spent, dec!(50000));
        assert_eq!(l.committed, Decimal::ZERO);
        assert_eq!(l.available(), dec!(250000));
    }

    #[test]
    fn test_spend_exactly_available() {
        let mut l = line(dec!(100));
        FundsService::spend(&mut l, dec!(100)).unwrap();
        assert_eq!(l.available(), Decimal::ZERO);
    }

    #[test]
    fn test_overspend_rejected_and_line_unchanged() {
        let mut l = line(dec!(10000));
        let before = l.clone();
        let result = FundsService::spend(&mut l, dec!(15000));

        assert!(matches!(
            result,
            Err(BudgetError::InsufficientFunds { requested, available })
                if requested == dec!(15000) && available == dec!(10000)
        ));
        assert_eq!(l, before);
    }

    #[test]
    fn test_commitment_reduces_available_for_spend() {
        let mut l = line(dec!(1000));
        FundsService::commit(&mut l, dec!(700)).unwrap();
        assert_eq!(l.committed, dec!(700));

        let result = FundsService::spend(&mut l, dec!(301));
        assert!(matches!(result, Err(BudgetError::InsufficientFunds { .. })));
        assert_eq!(l.spent, Decimal::ZERO);
    }

    #[test]
    fn test_spend_does_not_release_commitment() {
        let mut l = line(dec!(1000));
        FundsService::commit(&mut l, dec!(400)).unwrap();
        FundsService::spend(&mut l, dec!(400)).unwrap();
        assert_eq!(l.committed, dec!(400));
        assert_eq!(l.spent, dec!(400));
        assert_eq!(l.available(), dec!(200));
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-5))]
    #[case(dec!(12.34567))]
    #[case(dec!(0.00001))]
    #[case(Decimal::MAX)]
    fn test_invalid_amounts_rejected(#[case] amount: Decimal) {
        let mut l = line(dec!(1000));
        assert!(matches!(
            FundsService::spend(&mut l, amount),
            Err(BudgetError::InvalidInput(_))
        ));
        assert!(matches!(
            FundsService::commit(&mut l, amount),
            Err(BudgetError::InvalidInput(_))
        ));
        assert_eq!(l.spent, Decimal::ZERO);
        assert_eq!(l.committed, Decimal::ZERO);
    }

    #[rstest]
    #[case(SpendPolicy::AnyStatus, BudgetStatus::Draft, true)]
    #[case(SpendPolicy::AnyStatus, BudgetStatus::Closed, true)]
    #[case(SpendPolicy::ActiveOnly, BudgetStatus::Active, true)]
    #[case(SpendPolicy::ActiveOnly, BudgetStatus::Draft, false)]
    #[case(SpendPolicy::ActiveOnly, BudgetStatus::Approved, false)]
    #[case(SpendPolicy::ActiveOnly, BudgetStatus::Closed, false)]
    fn test_spend_policy(
        #[case] policy: SpendPolicy,
        #[case] status: BudgetStatus,
        #[case] allowed: bool,
    ) {
        let result = FundsService::check_policy(policy, status, BudgetOperation::CommitFunds);
        assert_eq!(result.is_ok(), allowed);
    }

    #[test]
    fn test_expenditure_copies_line_category_and_defaults_date() {
        let l = line(dec!(1000));
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let expenditure = FundsService::expenditure_for(&l, spend_input(dec!(10)), today, Utc::now());

        assert_eq!(expenditure.line_id, l.id);
        assert_eq!(expenditure.category, "Equipment");
        assert_eq!(expenditure.date, today);
        assert!(expenditure.receipt_ref.is_none());
    }

    #[test]
    fn test_expenditure_keeps_explicit_date() {
        let l = line(dec!(1000));
        let date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        let mut input = spend_input(dec!(10));
        input.date = Some(date);
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

        let expenditure = FundsService::expenditure_for(&l, input, today, Utc::now());
        assert_eq!(expenditure.date, date);
    }
}
