//! Database migration runner for Budgetry.
//!
//! Usage:
//!   budgetry-migrator up      - Run all pending migrations
//!   budgetry-migrator down    - Roll back the last migration
//!   budgetry-migrator status  - Show migration status
//!   budgetry-migrator fresh   - Drop all tables and re-run migrations
//!
//! The connection string comes from `DATABASE_URL`.

use budgetry_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    cli::run_cli(Migrator).await;
}
