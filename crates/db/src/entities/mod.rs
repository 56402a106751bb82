//! `SeaORM` entities for the ledger tables.

pub mod prelude;

pub mod audit_log;
pub mod budget_lines;
pub mod budgets;
pub mod expenditures;
pub mod sea_orm_active_enums;
