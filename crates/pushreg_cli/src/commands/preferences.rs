//! Preferences command implementation.

use pushreg_core::Preference;
use serde::Serialize;
use std::path::Path;

/// A preference as listed.
#[derive(Debug, Serialize)]
pub struct PreferenceRow {
    /// Key.
    pub key: String,
    /// Label.
    pub label: String,
    /// Declared type.
    pub kind: String,
    /// Assigned value.
    pub value: Option<serde_json::Value>,
}

impl From<&Preference> for PreferenceRow {
    fn from(pref: &Preference) -> Self {
        Self {
            key: pref.key.clone(),
            label: pref.label.clone(),
            kind: pref.kind.to_string(),
            value: pref.value.as_ref().map(|v| match v {
                pushreg_core::PreferenceValue::String(s) => serde_json::json!(s),
                pushreg_core::PreferenceValue::Number(n) => serde_json::json!(n),
                pushreg_core::PreferenceValue::Bool(b) => serde_json::json!(b),
            }),
        }
    }
}

/// Runs the preferences command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let state = super::load(path)?;
    let rows: Vec<PreferenceRow> = state.preferences.all().iter().map(PreferenceRow::from).collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            if rows.is_empty() {
                println!("No preferences declared");
                return Ok(());
            }
            println!("{:<25}  {:<8}  {:<20}  LABEL", "KEY", "TYPE", "VALUE");
            for row in &rows {
                let value = row
                    .value
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "(unset)".to_string());
                println!("{:<25}  {:<8}  {:<20}  {}", row.key, row.kind, value, row.label);
            }
        }
    }

    Ok(())
}
