//! Report command implementation

use anyhow::Result;
use tally_core::{analyze, render_report, Config, ReportKind};

use super::load_transactions;

pub async fn cmd_report(config: &Config, kind: ReportKind, months: Option<u32>) -> Result<()> {
    let (budget, transactions) = load_transactions(config, months).await?;
    let insights = analyze(&transactions, None);

    tracing::debug!(report = %kind, budget = %budget.name, "Rendering report");
    println!("{}", render_report(kind, &insights));
    Ok(())
}
