//! PostgreSQL enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The `budget_status` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "budget_status")]
pub enum BudgetStatus {
    /// Being drafted.
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Approved.
    #[sea_orm(string_value = "approved")]
    Approved,
    /// In execution.
    #[sea_orm(string_value = "active")]
    Active,
    /// Closed.
    #[sea_orm(string_value = "closed")]
    Closed,
}
