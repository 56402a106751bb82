//! Command-line arguments.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use budgetry_core::budget::{
    BudgetFilter, CommitFundsInput, CreateBudgetInput, CreateBudgetLineInput,
    RecordExpenditureInput,
};
use budgetry_shared::types::{BudgetId, BudgetLineId, SpendPolicy};

/// Budgetry command-line interface.
#[derive(Debug, Parser)]
#[command(name = "budgetry")]
#[command(about = "Budget ledger: lifecycle, funds control, variance and compliance", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the configured spend policy (any_status or active_only)
    #[arg(long, global = true, value_parser = parse_spend_policy)]
    pub spend_policy: Option<SpendPolicy>,

    #[command(subcommand)]
    pub command: Command,
}

fn parse_spend_policy(s: &str) -> Result<SpendPolicy, String> {
    SpendPolicy::parse(s).ok_or_else(|| format!("expected any_status or active_only, got '{s}'"))
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a draft budget
    Create(CreateArgs),
    /// Add a line item to a draft or approved budget
    AddLine(AddLineArgs),
    /// Approve a draft budget
    Approve {
        /// Budget ID
        budget_id: BudgetId,
        /// Who approves the budget
        #[arg(long)]
        by: String,
    },
    /// Activate an approved budget
    Activate {
        /// Budget ID
        budget_id: BudgetId,
    },
    /// Close an active budget
    Close {
        /// Budget ID
        budget_id: BudgetId,
    },
    /// Record an expenditure against a line
    Spend(SpendArgs),
    /// Encumber funds on a line
    Commit(CommitArgs),
    /// Show planned vs actual figures
    Variance {
        /// Budget ID
        budget_id: BudgetId,
    },
    /// Run the compliance check
    Compliance {
        /// Budget ID
        budget_id: BudgetId,
    },
    /// Print the executive summary report
    Summary {
        /// Budget ID
        budget_id: BudgetId,
    },
    /// List a budget's expenditures, newest first
    Expenditures {
        /// Budget ID
        budget_id: BudgetId,
    },
    /// Show a budget's audit trail
    Audit {
        /// Budget ID
        budget_id: BudgetId,
    },
    /// Show ledger-wide statistics
    Stats,
    /// List budgets, newest first
    List(ListArgs),
}

/// Arguments for `create`.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Budget title
    #[arg(long)]
    pub title: String,
    /// Fiscal year
    #[arg(long)]
    pub fiscal_year: i32,
    /// Budget ceiling
    #[arg(long)]
    pub amount: Decimal,
    /// Owning department
    #[arg(long)]
    pub department: String,
    /// Free-text notes
    #[arg(long, default_value = "")]
    pub notes: String,
}

impl From<CreateArgs> for CreateBudgetInput {
    fn from(args: CreateArgs) -> Self {
        Self {
            title: args.title,
            fiscal_year: args.fiscal_year,
            total_amount: args.amount,
            department: args.department,
            notes: args.notes,
        }
    }
}

/// Arguments for `add-line`.
#[derive(Debug, Args)]
pub struct AddLineArgs {
    /// Budget ID
    pub budget_id: BudgetId,
    /// Spending category
    #[arg(long)]
    pub category: String,
    /// Spending subcategory
    #[arg(long)]
    pub subcategory: String,
    /// Amount allocated to the line
    #[arg(long)]
    pub allocated: Decimal,
}

impl From<AddLineArgs> for CreateBudgetLineInput {
    fn from(args: AddLineArgs) -> Self {
        Self {
            category: args.category,
            subcategory: args.subcategory,
            allocated: args.allocated,
        }
    }
}

/// Arguments for `spend`.
#[derive(Debug, Args)]
pub struct SpendArgs {
    /// Budget line ID
    pub line_id: BudgetLineId,
    /// Paid vendor
    #[arg(long)]
    pub vendor: String,
    /// Amount disbursed
    #[arg(long)]
    pub amount: Decimal,
    /// What the money was spent on
    #[arg(long)]
    pub description: String,
    /// Who approved the expenditure
    #[arg(long)]
    pub approved_by: String,
    /// Expenditure date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// Receipt reference
    #[arg(long)]
    pub receipt: Option<String>,
}

impl From<SpendArgs> for RecordExpenditureInput {
    fn from(args: SpendArgs) -> Self {
        Self {
            vendor: args.vendor,
            amount: args.amount,
            description: args.description,
            approved_by: args.approved_by,
            date: args.date,
            receipt_ref: args.receipt,
        }
    }
}

/// Arguments for `commit`.
#[derive(Debug, Args)]
pub struct CommitArgs {
    /// Budget line ID
    pub line_id: BudgetLineId,
    /// Amount to encumber
    #[arg(long)]
    pub amount: Decimal,
    /// Reason for the commitment
    #[arg(long)]
    pub description: String,
}

impl From<CommitArgs> for CommitFundsInput {
    fn from(args: CommitArgs) -> Self {
        Self {
            amount: args.amount,
            description: args.description,
        }
    }
}

/// Arguments for `list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only budgets of this department
    #[arg(long)]
    pub department: Option<String>,
    /// Only budgets of this fiscal year
    #[arg(long)]
    pub fiscal_year: Option<i32>,
}

impl From<ListArgs> for BudgetFilter {
    fn from(args: ListArgs) -> Self {
        Self {
            department: args.department,
            fiscal_year: args.fiscal_year,
        }
    }
}
