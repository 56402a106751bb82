//! Entity re-exports.

pub use super::audit_log::Entity as AuditLog;
pub use super::budget_lines::Entity as BudgetLines;
pub use super::budgets::Entity as Budgets;
pub use super::expenditures::Entity as Expenditures;
