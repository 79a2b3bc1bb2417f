//! User context command implementations

use anyhow::Result;
use serde_json::{json, Map, Value};
use tally_core::Config;

use super::open_store;

/// Fields given on the command line; absent ones are left alone
#[derive(Debug, Default)]
pub struct ContextUpdate {
    pub name: Option<String>,
    pub household_size: Option<u32>,
    pub monthly_income: Option<f64>,
    pub savings_target: Option<f64>,
    pub focus_areas: Vec<String>,
    pub notes: Vec<String>,
}

impl ContextUpdate {
    /// Partial JSON document for `Store::update_context`
    pub fn to_json(&self) -> Value {
        let mut profile = Map::new();
        if let Some(ref name) = self.name {
            profile.insert("name".into(), json!(name));
        }
        if let Some(size) = self.household_size {
            profile.insert("household_size".into(), json!(size));
        }
        if let Some(income) = self.monthly_income {
            profile.insert("monthly_income".into(), json!(income));
        }

        let mut goals = Map::new();
        if let Some(target) = self.savings_target {
            goals.insert("savings_target".into(), json!(target));
        }
        if !self.focus_areas.is_empty() {
            goals.insert("focus_areas".into(), json!(self.focus_areas));
        }

        let mut update = Map::new();
        if !profile.is_empty() {
            update.insert("profile".into(), Value::Object(profile));
        }
        if !goals.is_empty() {
            update.insert("goals".into(), Value::Object(goals));
        }
        if !self.notes.is_empty() {
            update.insert("notes".into(), json!(self.notes));
        }
        Value::Object(update)
    }
}

pub fn cmd_context_show(config: &Config) -> Result<()> {
    let context = open_store(config).load_context()?;
    println!("{}", context.render());
    Ok(())
}

pub fn cmd_context_set(config: &Config, update: &ContextUpdate) -> Result<()> {
    let update = update.to_json();
    if update.as_object().is_some_and(|o| o.is_empty()) {
        anyhow::bail!("Nothing to update. Pass at least one field, e.g. --name or --note");
    }

    let context = open_store(config).update_context(update)?;
    println!("✓ Context updated");
    println!();
    println!("{}", context.render());
    Ok(())
}
