//! Persisted user records
//!
//! Two small JSON documents live in the data directory: the user's own
//! context (profile, goals, notes) that is shown to the chat model, and the
//! currently selected budget.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub household_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Goals {
    /// Monthly amount the user wants to put aside
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_target: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub focus_areas: Vec<String>,
}

/// What the user has told us about themselves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub goals: Goals,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl UserContext {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Plain-text rendering for prompts and `context show`
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "No user context provided.".to_string();
        }

        let mut lines = Vec::new();
        if let Some(ref name) = self.profile.name {
            lines.push(format!("Name: {}", name));
        }
        if let Some(size) = self.profile.household_size {
            lines.push(format!("Household size: {}", size));
        }
        if let Some(income) = self.profile.monthly_income {
            lines.push(format!("Monthly income: ${:.2}", income));
        }
        if let Some(target) = self.goals.savings_target {
            lines.push(format!("Savings target: ${:.2}/month", target));
        }
        if !self.goals.focus_areas.is_empty() {
            lines.push(format!("Focus areas: {}", self.goals.focus_areas.join(", ")));
        }
        if !self.notes.is_empty() {
            lines.push("Notes:".to_string());
            for note in &self.notes {
                lines.push(format!("- {}", note));
            }
        }
        lines.join("\n")
    }
}

/// Shallow per-group merge of `update` into `base`
///
/// Top-level keys present in the update win. When both sides hold an object
/// for the same key, the update's fields replace the base's one by one.
/// Arrays are replaced, never appended.
pub fn merge_json(base: &mut Value, update: Value) {
    match (base, update) {
        (Value::Object(base_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                let both_objects = matches!(
                    (base_map.get(&key), &value),
                    (Some(Value::Object(_)), Value::Object(_))
                );
                if !both_objects {
                    base_map.insert(key, value);
                    continue;
                }
                if let (Some(Value::Object(existing)), Value::Object(fields)) =
                    (base_map.get_mut(&key), value)
                {
                    existing.extend(fields);
                }
            }
        }
        (base, update) => *base = update,
    }
}

/// The budget all commands operate on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSelection {
    pub id: String,
    pub name: String,
    pub selected_at: DateTime<Utc>,
}

impl BudgetSelection {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            selected_at: Utc::now(),
        }
    }
}

/// Reads and writes the JSON records under the data directory
pub struct Store {
    context_path: PathBuf,
    selection_path: PathBuf,
}

impl Store {
    pub fn new(context_path: impl Into<PathBuf>, selection_path: impl Into<PathBuf>) -> Self {
        Self {
            context_path: context_path.into(),
            selection_path: selection_path.into(),
        }
    }

    /// Store rooted at a data directory, using the standard file names
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(
            data_dir.join("user_context.json"),
            data_dir.join("budget.json"),
        )
    }

    /// Saved user context, or an empty one
    pub fn load_context(&self) -> Result<UserContext> {
        match read_json(&self.context_path)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(UserContext::default()),
        }
    }

    pub fn save_context(&self, context: &UserContext) -> Result<()> {
        write_json(&self.context_path, &serde_json::to_value(context)?)
    }

    /// Merge a partial update into the saved context and persist the result
    pub fn update_context(&self, update: Value) -> Result<UserContext> {
        if !update.is_object() {
            return Err(Error::InvalidData(
                "Context update must be a JSON object".into(),
            ));
        }

        let mut current = serde_json::to_value(self.load_context()?)?;
        merge_json(&mut current, update);
        let merged: UserContext = serde_json::from_value(current)?;
        self.save_context(&merged)?;

        tracing::debug!(path = %self.context_path.display(), "User context updated");
        Ok(merged)
    }

    pub fn load_selection(&self) -> Result<Option<BudgetSelection>> {
        match read_json(&self.selection_path)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn save_selection(&self, selection: &BudgetSelection) -> Result<()> {
        write_json(&self.selection_path, &serde_json::to_value(selection)?)?;
        tracing::info!(budget = %selection.name, "Budget selected");
        Ok(())
    }

    /// Forget the selected budget; returns whether one was selected
    pub fn clear_selection(&self) -> Result<bool> {
        if self.selection_path.exists() {
            fs::remove_file(&self.selection_path)?;
            return Ok(true);
        }
        Ok(false)
    }
}

fn read_json(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::InvalidData(format!("No parent directory: {}", path.display())))?;
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| Error::InvalidData(format!("Failed to write {}: {}", path.display(), e)))?;
    Ok(())
}
