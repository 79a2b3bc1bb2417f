//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Tally - Understand your budget and find savings
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Budget analysis and savings assistant", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: <config_dir>/tally/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the cache and saved records
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List or select budgets
    Budgets {
        #[command(subcommand)]
        action: Option<BudgetsAction>,
    },

    /// Re-download transactions for the selected budget
    Sync {
        /// Months of history, counting the current month
        #[arg(short, long)]
        months: Option<u32>,
    },

    /// Analyze spending and look for savings
    Analyze {
        /// Months of history, counting the current month
        #[arg(short, long)]
        months: Option<u32>,

        /// Only include transactions on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Only include transactions on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Only include these accounts (id or name, repeatable)
        #[arg(long)]
        account: Vec<String>,

        /// Leave out these categories (repeatable)
        #[arg(long)]
        exclude_category: Vec<String>,

        /// Ignore transactions smaller than this absolute amount
        #[arg(long)]
        min_amount: Option<f64>,

        /// Print the full insights as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a report
    Report {
        /// Report type: summary, detailed, savings, trends
        #[arg(default_value = "summary")]
        report_type: String,

        /// Months of history, counting the current month
        #[arg(short, long)]
        months: Option<u32>,
    },

    /// List transactions, newest first
    Transactions {
        /// Category name contains (case-insensitive)
        #[arg(long)]
        category: Option<String>,

        /// Payee name contains (case-insensitive)
        #[arg(long)]
        payee: Option<String>,

        /// Maximum rows (max 100)
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Minimum absolute amount
        #[arg(long)]
        min_amount: Option<f64>,

        /// Maximum absolute amount
        #[arg(long)]
        max_amount: Option<f64>,

        /// Write CSV to stdout instead of a table
        #[arg(long)]
        csv: bool,
    },

    /// Ask the assistant about your budget
    Chat {
        /// Ask a single question and exit (interactive when omitted)
        #[arg(short, long)]
        question: Option<String>,
    },

    /// Manage the transaction cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show or update what the assistant knows about you
    Context {
        #[command(subcommand)]
        action: Option<ContextAction>,
    },
}

#[derive(Subcommand)]
pub enum BudgetsAction {
    /// List budgets for the configured token
    List,

    /// Select the budget other commands use
    Select {
        /// Budget id or name
        budget: String,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Delete all cached downloads
    Clear,
}

#[derive(Subcommand)]
pub enum ContextAction {
    /// Show the saved context
    Show,

    /// Update the saved context (only given fields change)
    Set {
        /// Your name
        #[arg(long)]
        name: Option<String>,

        /// People in the household
        #[arg(long)]
        household_size: Option<u32>,

        /// Monthly take-home income
        #[arg(long)]
        monthly_income: Option<f64>,

        /// Monthly savings goal
        #[arg(long)]
        savings_target: Option<f64>,

        /// Spending areas to focus on (repeatable; replaces the saved list)
        #[arg(long)]
        focus: Vec<String>,

        /// Free-form notes (repeatable; replaces the saved list)
        #[arg(long)]
        note: Vec<String>,
    },
}
