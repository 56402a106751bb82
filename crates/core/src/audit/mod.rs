//! Append-only audit trail of ledger actions.
//!
//! Entries are built by the ledger service alongside each mutation and
//! persisted by the store in the same atomic unit. They are never updated
//! or deleted.

pub mod types;

pub use types::{AuditAction, AuditEntry};
