//! Analyze command implementation

use std::collections::HashSet;

use anyhow::Result;
use chrono::NaiveDate;
use tally_core::{analyze, format_currency, render_report, Config, FilterConfig, ReportKind};

use super::load_transactions;

/// Filter from the command-line flags; `None` when no flag narrows anything
pub fn build_filter(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    accounts: Vec<String>,
    excluded_categories: Vec<String>,
    min_amount: Option<f64>,
) -> Result<Option<FilterConfig>> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            anyhow::bail!("--from ({}) is after --to ({})", from, to);
        }
    }
    if min_amount.is_some_and(|m| m < 0.0) {
        anyhow::bail!("--min-amount must not be negative");
    }

    let filter = FilterConfig {
        start_date: from,
        end_date: to,
        accounts: (!accounts.is_empty()).then(|| accounts.into_iter().collect::<HashSet<_>>()),
        excluded_categories: (!excluded_categories.is_empty())
            .then(|| excluded_categories.into_iter().collect::<HashSet<_>>()),
        min_amount,
    };

    Ok((filter != FilterConfig::default()).then_some(filter))
}

pub async fn cmd_analyze(
    config: &Config,
    months: Option<u32>,
    filter: Option<&FilterConfig>,
    json: bool,
) -> Result<()> {
    let (budget, transactions) = load_transactions(config, months).await?;
    let insights = analyze(&transactions, filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }

    println!();
    println!("📊 {} ({} transactions)", budget.name, transactions.len());
    println!();
    println!("{}", render_report(ReportKind::Summary, &insights));

    if !insights.outliers.is_empty() {
        println!();
        println!(
            "   {} unusually large transaction(s); see 'tally report detailed'",
            insights.outliers.len()
        );
    }
    if !insights.savings_opportunities.is_empty() {
        println!(
            "   Potential savings: {} (details: 'tally report savings')",
            format_currency(insights.total_potential_savings())
        );
    }
    Ok(())
}
