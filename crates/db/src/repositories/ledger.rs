//! PostgreSQL implementation of the ledger store.
//!
//! Every mutation runs in one database transaction:
//! `BEGIN`, `SET LOCAL lock_timeout`, `SELECT ... FOR UPDATE` on the target
//! rows, validation by the core closure, writes plus audit insert, `COMMIT`.
//! Any error drops the transaction, which rolls it back.
//!
//! Lock order is always budget row, then line row.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    AccessMode, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, IsolationLevel, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, RuntimeErr, Set, TransactionTrait,
};
use sea_orm::sea_query::JoinType;
use tracing::debug;

use budgetry_core::audit::{AuditAction, AuditEntry};
use budgetry_core::budget::{
    Budget, BudgetError, BudgetFilter, BudgetLine, BudgetStatus, Expenditure,
};
use budgetry_core::ledger::{
    BudgetSnapshot, LedgerStore, LedgerTotals, LineMutation, LineOutcome,
};
use budgetry_shared::types::{AuditEntryId, BudgetId, BudgetLineId, ExpenditureId};

use crate::entities::{
    audit_log, budget_lines, budgets, expenditures,
    sea_orm_active_enums::BudgetStatus as DbBudgetStatus,
};

/// SQLSTATEs worth retrying: lock_not_available, serialization_failure, deadlock_detected.
const TRANSIENT_SQLSTATES: [&str; 3] = ["55P03", "40001", "40P01"];

/// Ledger store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
    lock_timeout: Duration,
}

impl LedgerRepository {
    /// Creates a new repository over a connection pool.
    ///
    /// Row locks not granted within `lock_timeout` fail the operation with
    /// `BudgetError::TransientStoreFailure`.
    #[must_use]
    pub fn new(db: DatabaseConnection, lock_timeout: Duration) -> Self {
        Self { db, lock_timeout }
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Opens a write transaction with the lock timeout applied.
    async fn begin_locked(&self) -> Result<DatabaseTransaction, BudgetError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let sql = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        txn.execute_unprepared(&sql).await.map_err(map_db_err)?;
        Ok(txn)
    }

    /// Opens a read-only transaction that sees one consistent snapshot.
    async fn begin_snapshot(&self) -> Result<DatabaseTransaction, BudgetError> {
        self.db
            .begin_with_config(
                Some(IsolationLevel::RepeatableRead),
                Some(AccessMode::ReadOnly),
            )
            .await
            .map_err(map_db_err)
    }

    async fn lock_budget(
        txn: &DatabaseTransaction,
        id: BudgetId,
        exclusive: bool,
    ) -> Result<budgets::Model, BudgetError> {
        let query = budgets::Entity::find_by_id(id.into_inner());
        let query = if exclusive {
            query.lock_exclusive()
        } else {
            query.lock_shared()
        };
        query
            .one(txn)
            .await
            .map_err(map_db_err)?
            .ok_or(BudgetError::NotFound(id))
    }

    async fn find_lines<C: ConnectionTrait>(
        conn: &C,
        budget_id: BudgetId,
    ) -> Result<Vec<BudgetLine>, BudgetError> {
        let models = budget_lines::Entity::find()
            .filter(budget_lines::Column::BudgetId.eq(budget_id.into_inner()))
            .order_by_asc(budget_lines::Column::Category)
            .order_by_asc(budget_lines::Column::Subcategory)
            .order_by_asc(budget_lines::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(map_db_err)?;
        Ok(models.into_iter().map(line_from_model).collect())
    }

    async fn insert_audit(txn: &DatabaseTransaction, entry: AuditEntry) -> Result<(), BudgetError> {
        audit_active_model(&entry)
            .insert(txn)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }
}

impl LedgerStore for LedgerRepository {
    async fn insert_budget(&self, budget: Budget, audit: AuditEntry) -> Result<Budget, BudgetError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let model = budget_active_model(&budget)
            .insert(&txn)
            .await
            .map_err(map_db_err)?;
        Self::insert_audit(&txn, audit).await?;

        txn.commit().await.map_err(map_db_err)?;
        Ok(budget_from_model(model))
    }

    async fn update_budget<F>(&self, id: BudgetId, f: F) -> Result<Budget, BudgetError>
    where
        F: FnOnce(&mut Budget) -> Result<AuditEntry, BudgetError> + Send,
    {
        let txn = self.begin_locked().await?;
        let mut budget = budget_from_model(Self::lock_budget(&txn, id, true).await?);

        let audit = f(&mut budget)?;

        let model = budget_active_model(&budget)
            .update(&txn)
            .await
            .map_err(map_db_err)?;
        Self::insert_audit(&txn, audit).await?;

        txn.commit().await.map_err(map_db_err)?;
        Ok(budget_from_model(model))
    }

    async fn insert_line<F>(&self, budget_id: BudgetId, f: F) -> Result<BudgetLine, BudgetError>
    where
        F: FnOnce(&mut Budget) -> Result<(BudgetLine, AuditEntry), BudgetError> + Send,
    {
        let txn = self.begin_locked().await?;
        let mut budget = budget_from_model(Self::lock_budget(&txn, budget_id, true).await?);

        let (line, audit) = f(&mut budget)?;

        budget_active_model(&budget)
            .update(&txn)
            .await
            .map_err(map_db_err)?;
        let model = line_active_model(&line)
            .insert(&txn)
            .await
            .map_err(map_db_err)?;
        Self::insert_audit(&txn, audit).await?;

        txn.commit().await.map_err(map_db_err)?;
        Ok(line_from_model(model))
    }

    async fn update_line<F>(&self, line_id: BudgetLineId, f: F) -> Result<LineOutcome, BudgetError>
    where
        F: FnOnce(&Budget, &mut BudgetLine) -> Result<LineMutation, BudgetError> + Send,
    {
        let txn = self.begin_locked().await?;

        let owner = budget_lines::Entity::find_by_id(line_id.into_inner())
            .select_only()
            .column(budget_lines::Column::BudgetId)
            .into_tuple::<uuid::Uuid>()
            .one(&txn)
            .await
            .map_err(map_db_err)?
            .ok_or(BudgetError::LineNotFound(line_id))?;

        // Shared lock keeps the status stable without blocking other lines.
        let budget = budget_from_model(Self::lock_budget(&txn, BudgetId::from(owner), false).await?);
        let mut line = budget_lines::Entity::find_by_id(line_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(map_db_err)?
            .map(line_from_model)
            .ok_or(BudgetError::LineNotFound(line_id))?;

        let mutation = f(&budget, &mut line)?;

        let model = budget_lines::ActiveModel {
            id: Set(line.id.into_inner()),
            spent: Set(line.spent),
            committed: Set(line.committed),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(map_db_err)?;

        let expenditure = match mutation.expenditure {
            Some(expenditure) => Some(expenditure_from_model(
                expenditure_active_model(&expenditure)
                    .insert(&txn)
                    .await
                    .map_err(map_db_err)?,
            )),
            None => None,
        };
        Self::insert_audit(&txn, mutation.audit).await?;

        txn.commit().await.map_err(map_db_err)?;
        Ok(LineOutcome {
            line: line_from_model(model),
            expenditure,
        })
    }

    async fn budget(&self, id: BudgetId) -> Result<Option<Budget>, BudgetError> {
        let model = budgets::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(model.map(budget_from_model))
    }

    async fn lines(&self, budget_id: BudgetId) -> Result<Vec<BudgetLine>, BudgetError> {
        Self::find_lines(&self.db, budget_id).await
    }

    async fn snapshot(&self, budget_id: BudgetId) -> Result<Option<BudgetSnapshot>, BudgetError> {
        let txn = self.begin_snapshot().await?;

        let Some(model) = budgets::Entity::find_by_id(budget_id.into_inner())
            .one(&txn)
            .await
            .map_err(map_db_err)?
        else {
            return Ok(None);
        };

        let lines = Self::find_lines(&txn, budget_id).await?;
        let missing_receipts = expenditures::Entity::find()
            .join(JoinType::InnerJoin, expenditures::Relation::BudgetLines.def())
            .filter(budget_lines::Column::BudgetId.eq(budget_id.into_inner()))
            .filter(expenditures::Column::ReceiptRef.is_null())
            .count(&txn)
            .await
            .map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;
        debug!(budget_id = %budget_id, lines = lines.len(), "Snapshot read");
        Ok(Some(BudgetSnapshot {
            budget: budget_from_model(model),
            lines,
            missing_receipts,
        }))
    }

    async fn list_budgets(&self, filter: BudgetFilter) -> Result<Vec<Budget>, BudgetError> {
        let mut query = budgets::Entity::find();
        if let Some(department) = filter.department {
            query = query.filter(budgets::Column::Department.eq(department));
        }
        if let Some(fiscal_year) = filter.fiscal_year {
            query = query.filter(budgets::Column::FiscalYear.eq(fiscal_year));
        }

        let models = query
            .order_by_desc(budgets::Column::CreatedAt)
            .order_by_desc(budgets::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(models.into_iter().map(budget_from_model).collect())
    }

    async fn expenditures(&self, budget_id: BudgetId) -> Result<Vec<Expenditure>, BudgetError> {
        let models = expenditures::Entity::find()
            .join(JoinType::InnerJoin, expenditures::Relation::BudgetLines.def())
            .filter(budget_lines::Column::BudgetId.eq(budget_id.into_inner()))
            .order_by_desc(expenditures::Column::Date)
            .order_by_desc(expenditures::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(models.into_iter().map(expenditure_from_model).collect())
    }

    async fn audit_trail(&self, budget_id: BudgetId) -> Result<Vec<AuditEntry>, BudgetError> {
        let models = audit_log::Entity::find()
            .filter(audit_log::Column::BudgetId.eq(budget_id.into_inner()))
            .order_by_asc(audit_log::Column::Timestamp)
            .order_by_asc(audit_log::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        models.into_iter().map(audit_from_model).collect()
    }

    async fn totals(&self) -> Result<LedgerTotals, BudgetError> {
        let txn = self.begin_snapshot().await?;

        let counts: Vec<(DbBudgetStatus, i64)> = budgets::Entity::find()
            .select_only()
            .column(budgets::Column::Status)
            .column_as(budgets::Column::Id.count(), "count")
            .group_by(budgets::Column::Status)
            .into_tuple()
            .all(&txn)
            .await
            .map_err(map_db_err)?;

        let total_budget_amount: Option<Decimal> = budgets::Entity::find()
            .select_only()
            .column_as(budgets::Column::TotalAmount.sum(), "total")
            .into_tuple()
            .one(&txn)
            .await
            .map_err(map_db_err)?
            .flatten();

        let total_spent: Option<Decimal> = budget_lines::Entity::find()
            .select_only()
            .column_as(budget_lines::Column::Spent.sum(), "total")
            .into_tuple()
            .one(&txn)
            .await
            .map_err(map_db_err)?
            .flatten();

        txn.commit().await.map_err(map_db_err)?;

        let by_status: BTreeMap<BudgetStatus, u64> = counts
            .into_iter()
            .map(|(status, count)| (status.into(), u64::try_from(count).unwrap_or(0)))
            .collect();

        Ok(LedgerTotals {
            by_status,
            total_budget_amount: total_budget_amount.unwrap_or_default().normalize(),
            total_spent: total_spent.unwrap_or_default().normalize(),
        })
    }
}

/// Maps a database error onto the ledger error taxonomy.
///
/// Lock timeouts, serialization failures, deadlocks, and pool acquire
/// timeouts are retryable; everything else is a plain database error.
#[must_use]
pub fn map_db_err(err: DbErr) -> BudgetError {
    if is_transient(&err) {
        BudgetError::TransientStoreFailure(err.to_string())
    } else {
        BudgetError::Database(err.to_string())
    }
}

fn is_transient(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) => true,
        DbErr::Conn(RuntimeErr::SqlxError(e))
        | DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e)) => is_transient_sqlx(e),
        _ => false,
    }
}

fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref())),
        _ => false,
    }
}

impl From<BudgetStatus> for DbBudgetStatus {
    fn from(status: BudgetStatus) -> Self {
        match status {
            BudgetStatus::Draft => Self::Draft,
            BudgetStatus::Approved => Self::Approved,
            BudgetStatus::Active => Self::Active,
            BudgetStatus::Closed => Self::Closed,
        }
    }
}

impl From<DbBudgetStatus> for BudgetStatus {
    fn from(status: DbBudgetStatus) -> Self {
        match status {
            DbBudgetStatus::Draft => Self::Draft,
            DbBudgetStatus::Approved => Self::Approved,
            DbBudgetStatus::Active => Self::Active,
            DbBudgetStatus::Closed => Self::Closed,
        }
    }
}

fn budget_from_model(model: budgets::Model) -> Budget {
    Budget {
        id: BudgetId::from(model.id),
        title: model.title,
        fiscal_year: model.fiscal_year,
        total_amount: model.total_amount.normalize(),
        department: model.department,
        status: model.status.into(),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        approved_by: model.approved_by,
        approved_at: model.approved_at.map(|t| t.with_timezone(&Utc)),
        notes: model.notes,
    }
}

fn budget_active_model(budget: &Budget) -> budgets::ActiveModel {
    budgets::ActiveModel {
        id: Set(budget.id.into_inner()),
        title: Set(budget.title.clone()),
        fiscal_year: Set(budget.fiscal_year),
        total_amount: Set(budget.total_amount),
        department: Set(budget.department.clone()),
        status: Set(budget.status.into()),
        approved_by: Set(budget.approved_by.clone()),
        approved_at: Set(budget.approved_at.map(Into::into)),
        notes: Set(budget.notes.clone()),
        created_at: Set(budget.created_at.into()),
        updated_at: Set(budget.updated_at.into()),
    }
}

fn line_from_model(model: budget_lines::Model) -> BudgetLine {
    BudgetLine {
        id: BudgetLineId::from(model.id),
        budget_id: BudgetId::from(model.budget_id),
        category: model.category,
        subcategory: model.subcategory,
        allocated: model.allocated.normalize(),
        spent: model.spent.normalize(),
        committed: model.committed.normalize(),
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn line_active_model(line: &BudgetLine) -> budget_lines::ActiveModel {
    budget_lines::ActiveModel {
        id: Set(line.id.into_inner()),
        budget_id: Set(line.budget_id.into_inner()),
        category: Set(line.category.clone()),
        subcategory: Set(line.subcategory.clone()),
        allocated: Set(line.allocated),
        spent: Set(line.spent),
        committed: Set(line.committed),
        created_at: Set(line.created_at.into()),
    }
}

fn expenditure_from_model(model: expenditures::Model) -> Expenditure {
    Expenditure {
        id: ExpenditureId::from(model.id),
        line_id: BudgetLineId::from(model.budget_line_id),
        vendor: model.vendor,
        amount: model.amount.normalize(),
        description: model.description,
        approved_by: model.approved_by,
        date: model.date,
        created_at: model.created_at.with_timezone(&Utc),
        receipt_ref: model.receipt_ref,
        category: model.category,
    }
}

fn expenditure_active_model(expenditure: &Expenditure) -> expenditures::ActiveModel {
    expenditures::ActiveModel {
        id: Set(expenditure.id.into_inner()),
        budget_line_id: Set(expenditure.line_id.into_inner()),
        vendor: Set(expenditure.vendor.clone()),
        amount: Set(expenditure.amount),
        description: Set(expenditure.description.clone()),
        approved_by: Set(expenditure.approved_by.clone()),
        date: Set(expenditure.date),
        receipt_ref: Set(expenditure.receipt_ref.clone()),
        category: Set(expenditure.category.clone()),
        created_at: Set(expenditure.created_at.into()),
    }
}

fn audit_from_model(model: audit_log::Model) -> Result<AuditEntry, BudgetError> {
    let action = AuditAction::parse(&model.action).ok_or_else(|| {
        BudgetError::Database(format!("unknown audit action: {}", model.action))
    })?;
    Ok(AuditEntry {
        id: AuditEntryId::from(model.id),
        budget_id: model.budget_id.map(BudgetId::from),
        action,
        details: model.details,
        timestamp: model.timestamp.with_timezone(&Utc),
        actor: model.actor,
    })
}

fn audit_active_model(entry: &AuditEntry) -> audit_log::ActiveModel {
    audit_log::ActiveModel {
        id: Set(entry.id.into_inner()),
        budget_id: Set(entry.budget_id.map(BudgetId::into_inner)),
        action: Set(entry.action.as_str().to_string()),
        details: Set(entry.details.clone()),
        actor: Set(entry.actor.clone()),
        timestamp: Set(entry.timestamp.into()),
    }
}
