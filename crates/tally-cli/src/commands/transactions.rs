//! Transaction command implementations

use std::io::Write;

use anyhow::Result;
use tally_core::tools::{
    filter_transactions, ListTransactionsParams, TransactionSummary, DEFAULT_LIST_LIMIT,
    MAX_LIST_LIMIT,
};
use tally_core::Config;

use super::{colored_amount, load_transactions, truncate};

pub async fn cmd_transactions(
    config: &Config,
    params: &ListTransactionsParams,
    csv: bool,
) -> Result<()> {
    if let (Some(min), Some(max)) = (params.min_amount, params.max_amount) {
        if min > max {
            anyhow::bail!("--min-amount must not exceed --max-amount");
        }
    }

    let (_, transactions) = load_transactions(config, None).await?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let matched = filter_transactions(&transactions, params);
    let rows: Vec<TransactionSummary> = matched
        .iter()
        .take(limit)
        .map(|t| TransactionSummary::from(*t))
        .collect();

    if csv {
        let stdout = std::io::stdout();
        return write_csv(stdout.lock(), &rows);
    }

    if rows.is_empty() {
        println!("No matching transactions.");
        return Ok(());
    }

    println!();
    println!("📝 Transactions ({} of {})", rows.len(), matched.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for row in &rows {
        println!(
            "   {} │ {} │ {:<28} │ {}",
            row.date,
            colored_amount(row.amount),
            truncate(row.payee.as_deref().unwrap_or("-"), 28),
            truncate(&row.category, 24)
        );
    }
    Ok(())
}

/// CSV with a header row
pub fn write_csv<W: Write>(writer: W, rows: &[TransactionSummary]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
