//! Initial database migration.
//!
//! Creates the budget status enum, the ledger tables, and the triggers that
//! keep expenditures and audit entries append-only.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: LEDGER TABLES
        // ============================================================
        db.execute_unprepared(BUDGETS_SQL).await?;
        db.execute_unprepared(BUDGET_LINES_SQL).await?;
        db.execute_unprepared(EXPENDITURES_SQL).await?;
        db.execute_unprepared(AUDIT_LOG_SQL).await?;

        // ============================================================
        // PART 3: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE budget_status AS ENUM ('draft', 'approved', 'active', 'closed');
";

const BUDGETS_SQL: &str = r"
CREATE TABLE budgets (
    id UUID PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    fiscal_year INTEGER NOT NULL,
    total_amount NUMERIC(19, 4) NOT NULL,
    department VARCHAR(255) NOT NULL,
    status budget_status NOT NULL DEFAULT 'draft',
    approved_by VARCHAR(255),
    approved_at TIMESTAMPTZ,
    notes TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_budgets_total_amount CHECK (total_amount >= 0),
    CONSTRAINT chk_budgets_approval CHECK (
        status = 'draft' OR (approved_by IS NOT NULL AND approved_at IS NOT NULL)
    )
);

-- Listing by department / fiscal year, newest first
CREATE INDEX idx_budgets_department ON budgets(department, fiscal_year, created_at DESC);
CREATE INDEX idx_budgets_fiscal_year ON budgets(fiscal_year, created_at DESC);
CREATE INDEX idx_budgets_status ON budgets(status);
";

const BUDGET_LINES_SQL: &str = r"
CREATE TABLE budget_lines (
    id UUID PRIMARY KEY,
    budget_id UUID NOT NULL REFERENCES budgets(id) ON DELETE CASCADE,
    category VARCHAR(255) NOT NULL,
    subcategory VARCHAR(255) NOT NULL,
    allocated NUMERIC(19, 4) NOT NULL,
    spent NUMERIC(19, 4) NOT NULL DEFAULT 0,
    committed NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_budget_lines_allocated CHECK (allocated >= 0),
    CONSTRAINT chk_budget_lines_spent CHECK (spent >= 0),
    CONSTRAINT chk_budget_lines_committed CHECK (committed >= 0)
);

CREATE INDEX idx_budget_lines_budget ON budget_lines(budget_id, category, subcategory);
";

const EXPENDITURES_SQL: &str = r"
CREATE TABLE expenditures (
    id UUID PRIMARY KEY,
    budget_line_id UUID NOT NULL REFERENCES budget_lines(id) ON DELETE RESTRICT,
    vendor VARCHAR(255) NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    description TEXT NOT NULL,
    approved_by VARCHAR(255) NOT NULL,
    date DATE NOT NULL,
    receipt_ref VARCHAR(255),
    category VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_expenditures_amount CHECK (amount > 0)
);

CREATE INDEX idx_expenditures_line ON expenditures(budget_line_id, date DESC);

-- Compliance check counts expenditures without receipts
CREATE INDEX idx_expenditures_missing_receipt ON expenditures(budget_line_id) WHERE receipt_ref IS NULL;
";

const AUDIT_LOG_SQL: &str = r"
CREATE TABLE audit_log (
    id UUID PRIMARY KEY,
    budget_id UUID REFERENCES budgets(id) ON DELETE RESTRICT,
    action VARCHAR(50) NOT NULL,
    details TEXT NOT NULL DEFAULT '',
    actor VARCHAR(255) NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_audit_log_budget ON audit_log(budget_id, timestamp);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_append_only_modification
-- Expenditures and audit entries are never edited or deleted
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_append_only_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Rows in % are append-only', TG_TABLE_NAME;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_expenditures_append_only
BEFORE UPDATE OR DELETE ON expenditures
FOR EACH ROW
EXECUTE FUNCTION prevent_append_only_modification();

CREATE TRIGGER trg_audit_log_append_only
BEFORE UPDATE OR DELETE ON audit_log
FOR EACH ROW
EXECUTE FUNCTION prevent_append_only_modification();

-- ============================================================
-- FUNCTION: enforce_budget_status_order
-- Status only moves draft -> approved -> active -> closed
-- ============================================================
CREATE OR REPLACE FUNCTION enforce_budget_status_order()
RETURNS TRIGGER AS $$
BEGIN
    IF NEW.status <> OLD.status AND NOT (
        (OLD.status = 'draft' AND NEW.status = 'approved') OR
        (OLD.status = 'approved' AND NEW.status = 'active') OR
        (OLD.status = 'active' AND NEW.status = 'closed')
    ) THEN
        RAISE EXCEPTION 'Invalid budget status transition: % -> %', OLD.status, NEW.status;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_budget_status_order
BEFORE UPDATE ON budgets
FOR EACH ROW
EXECUTE FUNCTION enforce_budget_status_order();
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS audit_log CASCADE;
DROP TABLE IF EXISTS expenditures CASCADE;
DROP TABLE IF EXISTS budget_lines CASCADE;
DROP TABLE IF EXISTS budgets CASCADE;
DROP FUNCTION IF EXISTS prevent_append_only_modification();
DROP FUNCTION IF EXISTS enforce_budget_status_order();
DROP TYPE IF EXISTS budget_status;
";
