//! Budgetry CLI
//!
//! Command-line front end for the budget ledger. Structured results are
//! printed to stdout as JSON; logs go to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use budgetry_core::budget::{Budget, BudgetError};
use budgetry_core::ledger::{BudgetLedger, LedgerSettings};
use budgetry_core::reports::format_dollars;
use budgetry_db::migration::Migrator;
use budgetry_db::{LedgerRepository, connect};
use budgetry_shared::{AppConfig, AppError};

mod cli;

use cli::{Cli, Command};

type Ledger = BudgetLedger<LedgerRepository>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "budgetry=debug"
    } else {
        "budgetry=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(code) = error_code(&err) {
                debug!(error_code = code, "Command failed");
            }
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load().map_err(AppError::from)?;
    if let Some(spend_policy) = cli.spend_policy {
        config.ledger.spend_policy = spend_policy;
    }

    let db = connect(&config.database)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
        .context("failed to connect to database")?;
    if config.database.auto_migrate {
        Migrator::up(&db, None)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
            .context("failed to apply migrations")?;
        debug!("Migrations up to date");
    }

    let store = LedgerRepository::new(db, config.ledger.lock_timeout());
    let ledger = BudgetLedger::new(Arc::new(store), LedgerSettings::from(&config.ledger));
    info!(spend_policy = %config.ledger.spend_policy.as_str(), "Ledger ready");

    execute(&ledger, cli.command).await.map_err(AppError::from)?;
    Ok(())
}

async fn execute(ledger: &Ledger, command: Command) -> Result<(), BudgetError> {
    match command {
        Command::Create(args) => print_json(&ledger.create_budget(args.into()).await?),
        Command::AddLine(args) => {
            let budget_id = args.budget_id;
            print_json(&ledger.add_line(budget_id, args.into()).await?);
        }
        Command::Approve { budget_id, by } => print_json(&ledger.approve(budget_id, &by).await?),
        Command::Activate { budget_id } => print_json(&ledger.activate(budget_id).await?),
        Command::Close { budget_id } => print_json(&ledger.close(budget_id).await?),
        Command::Spend(args) => {
            let line_id = args.line_id;
            print_json(&ledger.record_expenditure(line_id, args.into()).await?);
        }
        Command::Commit(args) => {
            let line_id = args.line_id;
            print_json(&ledger.commit_funds(line_id, args.into()).await?);
        }
        Command::Variance { budget_id } => print_json(&ledger.compute_variance(budget_id).await?),
        Command::Compliance { budget_id } => {
            print_json(&ledger.check_compliance(budget_id).await?);
        }
        Command::Summary { budget_id } => println!("{}", ledger.executive_summary(budget_id).await?),
        Command::Expenditures { budget_id } => {
            print_json(&ledger.list_expenditures(budget_id).await?);
        }
        Command::Audit { budget_id } => print_json(&ledger.audit_trail(budget_id).await?),
        Command::Stats => print_json(&ledger.budget_stats().await?),
        Command::List(args) => {
            for budget in ledger.list_budgets(args.into()).await? {
                println!("{}", list_row(&budget));
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("error: failed to serialize output: {e}"),
    }
}

/// One-line listing entry: `[STATUS] title - department FYyear $amount`.
fn list_row(budget: &Budget) -> String {
    format!(
        "[{}] {} - {} FY{} {}",
        budget.status.as_str().to_uppercase(),
        budget.title,
        budget.department,
        budget.fiscal_year,
        format_dollars(budget.total_amount)
    )
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<AppError>().map_or(1, AppError::exit_code)
}

fn error_code(err: &anyhow::Error) -> Option<&'static str> {
    err.downcast_ref::<AppError>().map(AppError::error_code)
}
