//! Tally CLI - Budget analysis and savings assistant
//!
//! Usage:
//!   tally budgets select Household   Choose the budget to work on
//!   tally analyze --months 3         Spending patterns and savings
//!   tally report savings             Plain-text report
//!   tally chat                       Ask the assistant

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::{Context as _, Result};
use clap::Parser;
use tally_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (warn)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Budgets { action } => match action {
            None | Some(BudgetsAction::List) => commands::cmd_budgets_list(&config).await,
            Some(BudgetsAction::Select { budget }) => {
                commands::cmd_budgets_select(&config, &budget).await
            }
        },
        Commands::Sync { months } => commands::cmd_sync(&config, months).await,
        Commands::Analyze {
            months,
            from,
            to,
            account,
            exclude_category,
            min_amount,
            json,
        } => {
            let filter = commands::build_filter(from, to, account, exclude_category, min_amount)?;
            commands::cmd_analyze(&config, months, filter.as_ref(), json).await
        }
        Commands::Report {
            report_type,
            months,
        } => {
            let kind = report_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            commands::cmd_report(&config, kind, months).await
        }
        Commands::Transactions {
            category,
            payee,
            limit,
            min_amount,
            max_amount,
            csv,
        } => {
            let params = tally_core::tools::ListTransactionsParams {
                category,
                payee,
                limit: Some(limit),
                min_amount,
                max_amount,
            };
            commands::cmd_transactions(&config, &params, csv).await
        }
        Commands::Chat { question } => commands::cmd_chat(&config, question.as_deref()).await,
        Commands::Cache { action } => match action {
            CacheAction::Clear => commands::cmd_cache_clear(&config),
        },
        Commands::Context { action } => match action {
            None | Some(ContextAction::Show) => commands::cmd_context_show(&config),
            Some(ContextAction::Set {
                name,
                household_size,
                monthly_income,
                savings_target,
                focus,
                note,
            }) => {
                let update = commands::ContextUpdate {
                    name,
                    household_size,
                    monthly_income,
                    savings_target,
                    focus_areas: focus,
                    notes: note,
                };
                commands::cmd_context_set(&config, &update)
            }
        },
    }
}
