//! Declared, typed preferences.
//!
//! A preference must be declared with a key, label and type before a value
//! can be assigned. Every successful mutation bumps the store revision; the
//! store is dirty while its revision differs from the last revision the
//! server confirmed.

use crate::error::{CoreError, CoreResult};
use pushreg_protocol::{WirePreference, WirePreferenceKind, WireValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum preference key length in characters.
pub const MAX_KEY_LEN: usize = 25;

/// Maximum preference label length in characters.
pub const MAX_LABEL_LEN: usize = 1024;

/// Maximum string preference value length in characters.
pub const MAX_STRING_VALUE_LEN: usize = 255;

/// Declared type of a preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreferenceKind {
    /// Text value.
    String,
    /// Numeric value.
    Numeric,
    /// Boolean value.
    Boolean,
}

impl PreferenceKind {
    /// Returns the type name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Numeric => "Numeric",
            Self::Boolean => "Boolean",
        }
    }

    fn to_wire(self) -> WirePreferenceKind {
        match self {
            Self::String => WirePreferenceKind::String,
            Self::Numeric => WirePreferenceKind::Numeric,
            Self::Boolean => WirePreferenceKind::Boolean,
        }
    }
}

impl fmt::Display for PreferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed preference value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PreferenceValue {
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
}

impl PreferenceValue {
    /// Returns the preference type this value belongs to.
    pub const fn kind(&self) -> PreferenceKind {
        match self {
            Self::String(_) => PreferenceKind::String,
            Self::Number(_) => PreferenceKind::Numeric,
            Self::Bool(_) => PreferenceKind::Boolean,
        }
    }

    /// Returns the boolean value, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the numeric value, if this is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string value, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn validate(&self) -> CoreResult<()> {
        match self {
            Self::String(s) if s.chars().count() > MAX_STRING_VALUE_LEN => Err(
                CoreError::validation(format!(
                    "string value exceeds {MAX_STRING_VALUE_LEN} characters"
                )),
            ),
            Self::Number(n) if !n.is_finite() => {
                Err(CoreError::validation("numeric value must be finite"))
            }
            _ => Ok(()),
        }
    }

    fn to_wire(&self) -> WireValue {
        match self {
            Self::String(s) => WireValue::Text(s.clone()),
            Self::Number(n) => WireValue::Number(*n),
            Self::Bool(b) => WireValue::Bool(*b),
        }
    }
}

impl fmt::Display for PreferenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A declared preference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    /// Unique key.
    pub key: String,
    /// Human-readable label.
    pub label: String,
    /// Declared type.
    pub kind: PreferenceKind,
    /// Assigned value, absent until first assignment.
    pub value: Option<PreferenceValue>,
}

impl Preference {
    fn to_wire(&self) -> WirePreference {
        WirePreference {
            key: self.key.clone(),
            label: self.label.clone(),
            kind: self.kind.to_wire(),
            value: self.value.as_ref().map(PreferenceValue::to_wire),
        }
    }
}

/// Validates a preference key: 1 to 25 characters of `[A-Za-z0-9_]`.
pub fn validate_key(key: &str) -> CoreResult<()> {
    if key.is_empty() || key.chars().count() > MAX_KEY_LEN {
        return Err(CoreError::validation(format!(
            "key must be 1-{MAX_KEY_LEN} characters"
        )));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CoreError::validation(format!(
            "key {key:?} may only contain letters, digits and underscores"
        )));
    }
    Ok(())
}

/// Validates a preference label: 1 to 1024 characters.
pub fn validate_label(label: &str) -> CoreResult<()> {
    let len = label.chars().count();
    if len == 0 || len > MAX_LABEL_LEN {
        return Err(CoreError::validation(format!(
            "label must be 1-{MAX_LABEL_LEN} characters"
        )));
    }
    Ok(())
}

/// Ordered set of declared preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceStore {
    entries: Vec<Preference>,
    revision: u64,
    synced_revision: u64,
}

impl PreferenceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a preference.
    ///
    /// Re-declaring a key with the same type updates its label and keeps
    /// the value. Re-declaring with a different type fails.
    pub fn declare(&mut self, key: &str, label: &str, kind: PreferenceKind) -> CoreResult<()> {
        validate_key(key)?;
        validate_label(label)?;

        if let Some(existing) = self.find_mut(key) {
            if existing.kind != kind {
                return Err(CoreError::validation(format!(
                    "{key} is already declared as {}",
                    existing.kind
                )));
            }
            if existing.label == label {
                return Ok(());
            }
            existing.label = label.to_string();
        } else {
            self.entries.push(Preference {
                key: key.to_string(),
                label: label.to_string(),
                kind,
                value: None,
            });
        }
        self.bump();
        Ok(())
    }

    /// Assigns a value to a declared preference.
    ///
    /// On error the prior value is left unchanged.
    pub fn set_value(&mut self, key: &str, value: PreferenceValue) -> CoreResult<()> {
        let entry = self.find_mut(key).ok_or_else(|| CoreError::UndefinedKey {
            key: key.to_string(),
        })?;
        if entry.kind != value.kind() {
            return Err(CoreError::TypeMismatch {
                key: key.to_string(),
                expected: entry.kind.name(),
                actual: value.kind().name(),
            });
        }
        value.validate()?;

        if entry.value.as_ref() == Some(&value) {
            return Ok(());
        }
        entry.value = Some(value);
        self.bump();
        Ok(())
    }

    /// Returns the preference declared under `key`.
    pub fn get(&self, key: &str) -> Option<&Preference> {
        self.entries.iter().find(|p| p.key == key)
    }

    /// Returns all preferences in declaration order.
    pub fn all(&self) -> &[Preference] {
        &self.entries
    }

    /// Removes a preference. It must be declared again before reuse.
    pub fn remove(&mut self, key: &str) -> CoreResult<Preference> {
        let index = self
            .entries
            .iter()
            .position(|p| p.key == key)
            .ok_or_else(|| CoreError::UndefinedKey {
                key: key.to_string(),
            })?;
        let removed = self.entries.remove(index);
        self.bump();
        Ok(removed)
    }

    /// Removes every preference.
    pub fn clear_all(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        self.entries.clear();
        self.bump();
    }

    /// Returns the number of declared preferences.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the current revision.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the last revision the server confirmed.
    pub fn synced_revision(&self) -> u64 {
        self.synced_revision
    }

    /// Returns true if the store changed since the last confirmed sync.
    pub fn is_dirty(&self) -> bool {
        self.revision != self.synced_revision
    }

    /// Records that the server confirmed `revision`.
    pub fn mark_synced(&mut self, revision: u64) {
        self.synced_revision = revision;
    }

    /// Returns the full preference set in wire form.
    pub fn to_wire(&self) -> Vec<WirePreference> {
        self.entries.iter().map(Preference::to_wire).collect()
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut Preference> {
        self.entries.iter_mut().find(|p| p.key == key)
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}
