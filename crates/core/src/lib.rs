//! Core business logic for Budgetry.
//!
//! This crate contains the budget ledger with ZERO database dependencies.
//! Persistence is reached only through the `LedgerStore` trait.
//!
//! # Modules
//!
//! - `budget` - Lifecycle state machine, funds arithmetic, variance and compliance
//! - `audit` - Audit log entries
//! - `ledger` - Store trait, in-memory store, and the `BudgetLedger` service
//! - `reports` - Executive summary and ledger statistics

pub mod audit;
pub mod budget;
pub mod ledger;
pub mod reports;
