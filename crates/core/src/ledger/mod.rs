//! The budget ledger: storage seam, in-memory store, and orchestration service.
//!
//! - `store` - the `LedgerStore` trait every backend implements
//! - `memory` - a mutex-serialized in-process store
//! - `service` - `BudgetLedger`, which drives lifecycle and funds operations

pub mod memory;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use memory::InMemoryLedgerStore;
pub use service::{BudgetLedger, LedgerSettings};
pub use store::{BudgetSnapshot, LedgerStore, LedgerTotals, LineMutation, LineOutcome};
