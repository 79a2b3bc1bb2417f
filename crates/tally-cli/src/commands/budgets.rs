//! Budget command implementations

use anyhow::Result;
use tally_core::{BudgetSelection, Config};

use super::{open_service, open_store};

pub async fn cmd_budgets_list(config: &Config) -> Result<()> {
    let service = open_service(config)?;
    let budgets = service.list_budgets().await?;
    let selected = open_store(config).load_selection()?;

    if budgets.is_empty() {
        println!("No budgets found for this token.");
        return Ok(());
    }

    println!();
    println!("📒 Budgets");
    println!("   ─────────────────────────────────────────────────────────────");
    for budget in &budgets {
        let marker = if selected.as_ref().is_some_and(|s| s.id == budget.id) {
            "*"
        } else {
            " "
        };
        let modified = budget
            .last_modified_on
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into());
        println!("   {} {:<30} {:<38} {}", marker, budget.name, budget.id, modified);
    }

    if selected.is_none() {
        println!();
        println!("   Select one with: tally budgets select <name>");
    }
    Ok(())
}

pub async fn cmd_budgets_select(config: &Config, budget: &str) -> Result<()> {
    let service = open_service(config)?;
    let found = service.resolve_budget(budget).await?;

    open_store(config).save_selection(&BudgetSelection::new(&found.id, &found.name))?;
    println!("✓ Selected budget: {} ({})", found.name, found.id);
    Ok(())
}
