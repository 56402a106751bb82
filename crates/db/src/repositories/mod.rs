//! Repository implementations over `SeaORM`.

pub mod ledger;

pub use ledger::{LedgerRepository, map_db_err};
